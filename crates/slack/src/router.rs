use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Instant;

use tokio::sync::Mutex;
use tracing::{info, warn};

use curator_core::dialogue::{
    DialogueEngine, DialogueObserver, Effect, Session, SessionId, SessionStatus,
};
use curator_core::domain::user::{UserId, UserRecord};
use curator_db::repositories::UserRepository;
use curator_monitor::{display_list, match_channels, ChannelLookup, ItemSink, NO_MATCH_SENTINEL};

use crate::messages::IncomingMessage;
use crate::script::{
    bot_script, ADD_ITEM_ACTION, CHANNELS_VAR, CURATE_FLOW, FLOW_VAR, LINK_VAR, LOOKUP_ACTION,
    MATCH_TOPIC, NO_MATCH_TOPIC, SHUTDOWN_ACTION, SHUTDOWN_TOPIC,
};
use crate::triggers::{classify, format_uptime, Intent};

/// Records terminal transitions of link-curation sessions so the router can
/// append the closing message after the effects of the ending turn.
#[derive(Default)]
struct ClosingObserver {
    pending: StdMutex<Vec<SessionStatus>>,
}

impl ClosingObserver {
    fn drain(&self) -> Vec<SessionStatus> {
        match self.pending.lock() {
            Ok(mut pending) => pending.drain(..).collect(),
            Err(poisoned) => poisoned.into_inner().drain(..).collect(),
        }
    }
}

impl DialogueObserver for ClosingObserver {
    fn session_ended(&self, session: &Session, status: SessionStatus) {
        if session.var(FLOW_VAR) != Some(CURATE_FLOW) {
            return;
        }
        match self.pending.lock() {
            Ok(mut pending) => pending.push(status),
            Err(poisoned) => poisoned.into_inner().push(status),
        }
    }
}

/// Routes raw messages: replies already inside an active session go to the
/// dialogue engine; everything else is matched against the trigger table.
/// The router owns the session registry (one active session per conversation
/// key) and performs the external calls the engine requests.
pub struct MessageRouter {
    engine: DialogueEngine,
    closings: Arc<ClosingObserver>,
    lookup: Arc<dyn ChannelLookup>,
    sink: Arc<dyn ItemSink>,
    users: Arc<dyn UserRepository>,
    sessions: Mutex<HashMap<String, Session>>,
    bot_name: String,
    started_at: Instant,
    shutdown_requested: AtomicBool,
}

impl MessageRouter {
    pub fn new(
        bot_name: impl Into<String>,
        lookup: Arc<dyn ChannelLookup>,
        sink: Arc<dyn ItemSink>,
        users: Arc<dyn UserRepository>,
    ) -> Self {
        let closings = Arc::new(ClosingObserver::default());
        let engine = DialogueEngine::new(bot_script()).with_observer(closings.clone());

        Self {
            engine,
            closings,
            lookup,
            sink,
            users,
            sessions: Mutex::new(HashMap::new()),
            bot_name: bot_name.into(),
            started_at: Instant::now(),
            shutdown_requested: AtomicBool::new(false),
        }
    }

    /// True once a confirmed shutdown request has been processed; the host
    /// loop is expected to stop pumping and exit on its own schedule.
    pub fn shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }

    /// Handles one message and returns the replies to send, in order.
    pub async fn handle_message(&self, message: &IncomingMessage) -> Vec<String> {
        // Check out the active session so other conversations keep flowing
        // while this one awaits external calls.
        let active = self.sessions.lock().await.remove(&message.conversation_id);

        if let Some(mut session) = active {
            let mut replies = match self.engine.receive_reply(&mut session, &message.text) {
                Ok(effects) => self.apply_effects(&mut session, effects).await,
                Err(error) => {
                    warn!(
                        event_name = "dialogue.reply_rejected",
                        conversation_id = %message.conversation_id,
                        session_id = %session.id.0,
                        error = %error,
                        "active session rejected the reply"
                    );
                    Vec::new()
                }
            };
            replies.extend(self.closing_messages());

            if !session.status().is_terminal() {
                self.sessions.lock().await.insert(message.conversation_id.clone(), session);
            }
            return replies;
        }

        self.dispatch_trigger(message).await
    }

    async fn dispatch_trigger(&self, message: &IncomingMessage) -> Vec<String> {
        let Some(intent) = classify(&message.text) else {
            return Vec::new();
        };

        match intent {
            Intent::Greeting => vec![self.greet(&message.user_id).await],
            Intent::SetName(name) => vec![self.remember_name(&message.user_id, name).await],
            Intent::WhoAmI => vec![self.recall_name(&message.user_id).await],
            Intent::Identity => vec![self.identity()],
            Intent::CurateLink(link) => {
                self.start_curation(&message.conversation_id, link).await
            }
            Intent::Shutdown => self.start_shutdown(&message.conversation_id).await,
        }
    }

    async fn greet(&self, user_id: &str) -> String {
        match self.users.find_by_id(&UserId(user_id.to_owned())).await {
            Ok(Some(UserRecord { name: Some(name), .. })) => format!("Hello {name}!!"),
            Ok(_) => "Hello.".to_owned(),
            Err(error) => {
                warn!(
                    event_name = "store.user_lookup_failed",
                    user_id = %user_id,
                    error = %error,
                    "user store unavailable; greeting anonymously"
                );
                "Hello.".to_owned()
            }
        }
    }

    async fn remember_name(&self, user_id: &str, name: String) -> String {
        let record = UserRecord { id: UserId(user_id.to_owned()), name: Some(name.clone()) };
        match self.users.save(record).await {
            Ok(_) => format!("Got it. I will call you {name} from now on."),
            Err(error) => {
                warn!(
                    event_name = "store.user_save_failed",
                    user_id = %user_id,
                    error = %error,
                    "could not persist nickname"
                );
                "Sorry, I could not remember that right now.".to_owned()
            }
        }
    }

    async fn recall_name(&self, user_id: &str) -> String {
        match self.users.find_by_id(&UserId(user_id.to_owned())).await {
            Ok(Some(UserRecord { name: Some(name), .. })) => format!("Your name is {name}."),
            Ok(_) => "I don't know yet!".to_owned(),
            Err(error) => {
                warn!(
                    event_name = "store.user_lookup_failed",
                    user_id = %user_id,
                    error = %error,
                    "user store unavailable"
                );
                "I don't know yet!".to_owned()
            }
        }
    }

    fn identity(&self) -> String {
        let uptime = format_uptime(self.started_at.elapsed().as_secs());
        let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown-host".to_owned());
        format!(
            ":robot_face: I am a bot named <@{}>. I have been running for {} on {}.",
            self.bot_name, uptime, hostname
        )
    }

    async fn start_curation(&self, conversation_id: &str, link: String) -> Vec<String> {
        let seed = BTreeMap::from([
            (FLOW_VAR.to_owned(), CURATE_FLOW.to_owned()),
            (LINK_VAR.to_owned(), link),
        ]);
        let (mut session, effects) = self.engine.start(SessionId::generate(), seed);
        info!(
            event_name = "dialogue.session_started",
            conversation_id = %conversation_id,
            session_id = %session.id.0,
            topic = %session.topic(),
            "link curation session started"
        );

        let mut replies = self.apply_effects(&mut session, effects).await;
        replies.extend(self.closing_messages());

        if !session.status().is_terminal() {
            self.sessions.lock().await.insert(conversation_id.to_owned(), session);
        }
        replies
    }

    async fn start_shutdown(&self, conversation_id: &str) -> Vec<String> {
        let started =
            self.engine.start_in(SessionId::generate(), SHUTDOWN_TOPIC, BTreeMap::new());
        let (mut session, effects) = match started {
            Ok(started) => started,
            Err(error) => {
                warn!(
                    event_name = "dialogue.session_start_failed",
                    conversation_id = %conversation_id,
                    error = %error,
                    "could not start shutdown confirmation"
                );
                return Vec::new();
            }
        };

        let replies = self.apply_effects(&mut session, effects).await;
        if !session.status().is_terminal() {
            self.sessions.lock().await.insert(conversation_id.to_owned(), session);
        }
        replies
    }

    /// Interprets the engine's effect list: prompts and says become replies,
    /// action requests are performed here (the engine does no I/O), and any
    /// follow-up effects a performed action produces run next, in order.
    async fn apply_effects(&self, session: &mut Session, effects: Vec<Effect>) -> Vec<String> {
        let mut replies = Vec::new();
        let mut queue: VecDeque<Effect> = effects.into();

        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::Prompt(text) | Effect::Say(text) => replies.push(text),
                Effect::Ended(status) => {
                    info!(
                        event_name = "dialogue.session_ended",
                        session_id = %session.id.0,
                        status = ?status,
                        "dialogue session ended"
                    );
                }
                Effect::Action { name, payload } => {
                    let follow_up = self.perform_action(session, &name, &payload).await;
                    for effect in follow_up.into_iter().rev() {
                        queue.push_front(effect);
                    }
                }
            }
        }

        replies
    }

    async fn perform_action(
        &self,
        session: &mut Session,
        name: &str,
        payload: &BTreeMap<String, String>,
    ) -> Vec<Effect> {
        match name {
            LOOKUP_ACTION => {
                let query = payload.get("query").cloned().unwrap_or_default();
                self.resolve_lookup(session, &query).await
            }
            ADD_ITEM_ACTION => {
                let token = payload.get("uniqueid").cloned().unwrap_or_default();
                let item = payload.get("item").cloned().unwrap_or_default();
                self.submit_item(token, item);
                Vec::new()
            }
            SHUTDOWN_ACTION => {
                self.shutdown_requested.store(true, Ordering::SeqCst);
                Vec::new()
            }
            other => {
                warn!(
                    event_name = "dialogue.unknown_action",
                    action = %other,
                    "ignoring unknown action effect"
                );
                Vec::new()
            }
        }
    }

    /// Runs the lookup and routes the session: zero candidates go to the
    /// no-match topic with the sentinel bound, matches pin the candidate
    /// list on the session and show it in the selection topic. Lookup
    /// failures degrade to zero results so the dialogue never hangs.
    async fn resolve_lookup(&self, session: &mut Session, query: &str) -> Vec<Effect> {
        let channels = match self.lookup.list_channels().await {
            Ok(channels) => channels,
            Err(error) => {
                warn!(
                    event_name = "monitor.lookup_failed",
                    session_id = %session.id.0,
                    error = %error,
                    "channel lookup failed; treating as zero results"
                );
                Vec::new()
            }
        };

        let candidates = match_channels(&channels, query);
        let redirected = if candidates.is_empty() {
            session.pin_candidates(Vec::new());
            self.engine.redirect(
                session,
                NO_MATCH_TOPIC,
                [(CHANNELS_VAR.to_owned(), NO_MATCH_SENTINEL.to_owned())],
            )
        } else {
            let shown = display_list(&candidates);
            session.pin_candidates(candidates);
            self.engine.redirect(session, MATCH_TOPIC, [(CHANNELS_VAR.to_owned(), shown)])
        };

        match redirected {
            Ok(effects) => effects,
            Err(error) => {
                warn!(
                    event_name = "dialogue.redirect_failed",
                    session_id = %session.id.0,
                    error = %error,
                    "could not route lookup outcome"
                );
                Vec::new()
            }
        }
    }

    /// Fire-and-forget item submission: the call is not tied to the session
    /// lifetime and failures are logged, never surfaced to the user.
    fn submit_item(&self, token: String, item: String) {
        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            if let Err(error) = sink.add_item(&token, &item).await {
                warn!(
                    event_name = "monitor.add_item_failed",
                    correlation_token = %token,
                    error = %error,
                    "item submission failed; dropping"
                );
            }
        });
    }

    fn closing_messages(&self) -> Vec<String> {
        self.closings
            .drain()
            .into_iter()
            .map(|status| match status {
                SessionStatus::Completed => "Thanks!".to_owned(),
                _ => "OK, nevermind!".to_owned(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex as StdMutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use curator_db::repositories::{InMemoryUserRepository, UserRepository};
    use curator_core::domain::user::UserRecord;
    use curator_monitor::{Channel, ChannelLookup, ItemSink, MonitorError};

    use crate::messages::IncomingMessage;

    use super::MessageRouter;

    struct FakeLookup {
        channels: Vec<Channel>,
        fail: bool,
    }

    impl FakeLookup {
        fn with_channels() -> Self {
            Self {
                channels: vec![
                    Channel {
                        id: "1".to_owned(),
                        name: "Alpha".to_owned(),
                        token: "tok-1".to_owned(),
                    },
                    Channel {
                        id: "2".to_owned(),
                        name: "Beta".to_owned(),
                        token: "tok-2".to_owned(),
                    },
                ],
                fail: false,
            }
        }

        fn failing() -> Self {
            Self { channels: Vec::new(), fail: true }
        }
    }

    #[async_trait]
    impl ChannelLookup for FakeLookup {
        async fn list_channels(&self) -> Result<Vec<Channel>, MonitorError> {
            if self.fail {
                Err(MonitorError::Request("connection refused".to_owned()))
            } else {
                Ok(self.channels.clone())
            }
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        items: StdMutex<Vec<(String, String)>>,
        notify: Notify,
    }

    impl RecordingSink {
        fn items(&self) -> Vec<(String, String)> {
            self.items.lock().expect("sink lock").clone()
        }

        async fn wait_for_item(&self) {
            tokio::time::timeout(Duration::from_secs(1), self.notify.notified())
                .await
                .expect("item submission should arrive");
        }
    }

    #[async_trait]
    impl ItemSink for RecordingSink {
        async fn add_item(&self, token: &str, item: &str) -> Result<(), MonitorError> {
            self.items.lock().expect("sink lock").push((token.to_owned(), item.to_owned()));
            self.notify.notify_one();
            Ok(())
        }
    }

    fn router_with(lookup: FakeLookup) -> (Arc<MessageRouter>, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let router = Arc::new(MessageRouter::new(
            "curator",
            Arc::new(lookup),
            sink.clone(),
            Arc::new(InMemoryUserRepository::default()),
        ));
        (router, sink)
    }

    fn message(text: &str) -> IncomingMessage {
        IncomingMessage::new("C1", "U1", text)
    }

    #[tokio::test]
    async fn greets_anonymously_without_a_stored_name() {
        let (router, _) = router_with(FakeLookup::with_channels());
        let replies = router.handle_message(&message("hello")).await;
        assert_eq!(replies, vec!["Hello.".to_owned()]);
    }

    #[tokio::test]
    async fn greets_by_stored_nickname() {
        let users = Arc::new(InMemoryUserRepository::default());
        users.save(UserRecord::new("U1").with_name("Ada")).await.expect("seed user");
        let router = MessageRouter::new(
            "curator",
            Arc::new(FakeLookup::with_channels()),
            Arc::new(RecordingSink::default()),
            users,
        );

        let replies = router.handle_message(&message("hi")).await;
        assert_eq!(replies, vec!["Hello Ada!!".to_owned()]);
    }

    #[tokio::test]
    async fn remembers_and_recalls_a_nickname() {
        let (router, _) = router_with(FakeLookup::with_channels());

        let replies = router.handle_message(&message("call me Ada")).await;
        assert_eq!(replies, vec!["Got it. I will call you Ada from now on.".to_owned()]);

        let replies = router.handle_message(&message("who am I?")).await;
        assert_eq!(replies, vec!["Your name is Ada.".to_owned()]);
    }

    #[tokio::test]
    async fn identity_reports_name_and_uptime() {
        let (router, _) = router_with(FakeLookup::with_channels());
        let replies = router.handle_message(&message("who are you?")).await;
        assert_eq!(replies.len(), 1);
        assert!(replies[0].contains("I am a bot named <@curator>"));
        assert!(replies[0].contains("I have been running for"));
    }

    #[tokio::test]
    async fn unmatched_chatter_gets_no_reply() {
        let (router, _) = router_with(FakeLookup::with_channels());
        let replies = router.handle_message(&message("what a lovely day")).await;
        assert!(replies.is_empty());
    }

    #[tokio::test]
    async fn link_yes_path_files_the_item_into_the_selected_channel() {
        let (router, sink) = router_with(FakeLookup::with_channels());

        let replies =
            router.handle_message(&message("look at <http://example.com/a>")).await;
        assert_eq!(
            replies,
            vec!["That looks like a monitor link! Should I add it to the monitor?".to_owned()]
        );

        let replies = router.handle_message(&message("yes")).await;
        assert_eq!(
            replies,
            vec![
                "OK! I will add the link".to_owned(),
                "What project is this for?".to_owned(),
            ]
        );

        let replies = router.handle_message(&message("alpha")).await;
        assert_eq!(
            replies,
            vec![
                "OK, looking for alpha".to_owned(),
                "Pick a channel number from the list: [1] Alpha ;".to_owned(),
            ]
        );

        let replies = router.handle_message(&message("1")).await;
        assert_eq!(replies, vec!["OK, adding to Alpha".to_owned(), "Thanks!".to_owned()]);

        sink.wait_for_item().await;
        assert_eq!(
            sink.items(),
            vec![("tok-1".to_owned(), "http://example.com/a".to_owned())]
        );
    }

    #[tokio::test]
    async fn declining_the_link_stops_with_a_nevermind() {
        let (router, sink) = router_with(FakeLookup::with_channels());

        router.handle_message(&message("see <https://example.com/b>")).await;
        let replies = router.handle_message(&message("no")).await;

        assert_eq!(replies, vec!["OK, nevermind!".to_owned()]);
        assert!(sink.items().is_empty());

        // The terminal session is evicted: the next message hits triggers.
        let replies = router.handle_message(&message("hello")).await;
        assert_eq!(replies, vec!["Hello.".to_owned()]);
    }

    #[tokio::test]
    async fn unrelated_first_reply_stops_via_the_default_branch() {
        let (router, _) = router_with(FakeLookup::with_channels());

        router.handle_message(&message("see <https://example.com/b>")).await;
        let replies = router.handle_message(&message("maybe later")).await;

        assert_eq!(replies, vec!["OK, nevermind!".to_owned()]);
    }

    #[tokio::test]
    async fn unknown_project_routes_to_the_no_match_topic() {
        let (router, _) = router_with(FakeLookup::with_channels());

        router.handle_message(&message("see <https://example.com/c>")).await;
        router.handle_message(&message("yes")).await;
        let replies = router.handle_message(&message("xyz")).await;

        assert_eq!(
            replies,
            vec![
                "OK, looking for xyz".to_owned(),
                "No matches for that text.".to_owned(),
                "OK, nevermind!".to_owned(),
            ]
        );
    }

    #[tokio::test]
    async fn lookup_failure_degrades_to_the_no_match_topic() {
        let (router, _) = router_with(FakeLookup::failing());

        router.handle_message(&message("see <https://example.com/d>")).await;
        router.handle_message(&message("yes")).await;
        let replies = router.handle_message(&message("alpha")).await;

        assert_eq!(
            replies,
            vec![
                "OK, looking for alpha".to_owned(),
                "No matches for that text.".to_owned(),
                "OK, nevermind!".to_owned(),
            ]
        );
    }

    #[tokio::test]
    async fn selecting_an_id_off_the_list_apologizes_then_completes() {
        let (router, sink) = router_with(FakeLookup::with_channels());

        router.handle_message(&message("see <https://example.com/e>")).await;
        router.handle_message(&message("yes")).await;
        router.handle_message(&message("beta")).await;
        let replies = router.handle_message(&message("9")).await;

        assert_eq!(
            replies,
            vec!["Sorry, 9 isn't on the list".to_owned(), "Thanks!".to_owned()]
        );
        assert!(sink.items().is_empty());
    }

    #[tokio::test]
    async fn conversations_are_independent() {
        let (router, _) = router_with(FakeLookup::with_channels());

        let replies = router
            .handle_message(&IncomingMessage::new("C1", "U1", "see <http://example.com/x>"))
            .await;
        assert_eq!(replies.len(), 1);

        // A different conversation is not captured by C1's session.
        let replies = router.handle_message(&IncomingMessage::new("C2", "U2", "hello")).await;
        assert_eq!(replies, vec!["Hello.".to_owned()]);

        // C1's session is still pending its confirmation question.
        let replies = router
            .handle_message(&IncomingMessage::new("C1", "U1", "yes"))
            .await;
        assert_eq!(replies[0], "OK! I will add the link");
    }

    #[tokio::test]
    async fn confirmed_shutdown_sets_the_flag() {
        let (router, _) = router_with(FakeLookup::with_channels());

        let replies = router.handle_message(&message("shutdown")).await;
        assert_eq!(replies, vec!["Are you sure you want me to shutdown?".to_owned()]);
        assert!(!router.shutdown_requested());

        let replies = router.handle_message(&message("yes")).await;
        assert_eq!(replies, vec!["Bye!".to_owned()]);
        assert!(router.shutdown_requested());
    }

    #[tokio::test]
    async fn declined_shutdown_leaves_the_bot_running() {
        let (router, _) = router_with(FakeLookup::with_channels());

        router.handle_message(&message("shutdown")).await;
        let replies = router.handle_message(&message("absolutely not")).await;

        assert_eq!(replies, vec!["*Phew!*".to_owned()]);
        assert!(!router.shutdown_requested());
    }
}
