use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

use crate::template::render;

use super::script::{Control, Script, Step, StepExit};
use super::session::{Session, SessionId, SessionStatus};

/// A side effect requested by the engine, in emission order. The engine
/// performs no I/O itself; the driving caller interprets these.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    /// A question was emitted; the session is suspended awaiting a reply.
    Prompt(String),
    /// An outgoing message with no reply expected.
    Say(String),
    /// An external call request (lookup, item submission, ...).
    Action { name: String, payload: BTreeMap<String, String> },
    /// The session reached a terminal state.
    Ended(SessionStatus),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DialogueError {
    #[error("session `{session}` has no pending question to answer")]
    InvalidState { session: String },
    #[error("session `{session}` already ended as {status:?}")]
    SessionTerminated { session: String, status: SessionStatus },
    #[error("unknown topic `{topic}`")]
    UnknownTopic { topic: String },
}

/// Notified exactly once when a session transitions into a terminal state.
pub trait DialogueObserver: Send + Sync {
    fn session_ended(&self, session: &Session, status: SessionStatus);
}

#[derive(Default)]
pub struct NoopObserver;

impl DialogueObserver for NoopObserver {
    fn session_ended(&self, _session: &Session, _status: SessionStatus) {}
}

/// Runs sessions of one [`Script`] a reply-turn at a time.
///
/// The engine is stateless across calls: the session value carries all
/// conversation state, so callers own the session registry and the engine
/// can drive any number of independent sessions.
pub struct DialogueEngine {
    script: Script,
    observer: Arc<dyn DialogueObserver>,
}

impl DialogueEngine {
    pub fn new(script: Script) -> Self {
        Self { script, observer: Arc::new(NoopObserver) }
    }

    pub fn with_observer(mut self, observer: Arc<dyn DialogueObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn script(&self) -> &Script {
        &self.script
    }

    /// Creates a session in the script's entry topic and runs it until the
    /// first question (or completion, for topics that never ask).
    pub fn start(
        &self,
        id: SessionId,
        seed_variables: BTreeMap<String, String>,
    ) -> (Session, Vec<Effect>) {
        let mut session = Session::new(id, self.script.entry_topic(), seed_variables);
        let mut effects = Vec::new();
        self.run_from(&mut session, 0, &mut effects);
        (session, effects)
    }

    /// Like [`Self::start`], but entering the named topic instead of the
    /// entry topic.
    pub fn start_in(
        &self,
        id: SessionId,
        topic: &str,
        seed_variables: BTreeMap<String, String>,
    ) -> Result<(Session, Vec<Effect>), DialogueError> {
        if !self.script.has_topic(topic) {
            return Err(DialogueError::UnknownTopic { topic: topic.to_owned() });
        }
        let mut session = Session::new(id, topic, seed_variables);
        let mut effects = Vec::new();
        self.run_from(&mut session, 0, &mut effects);
        Ok((session, effects))
    }

    /// Feeds one user reply into the pending ask-step.
    ///
    /// Branch patterns are evaluated in declared order, first match wins; an
    /// unmatched reply falls to the default handler, or re-emits the prompt
    /// unchanged when no default exists. A handler requesting a topic change
    /// to an unknown topic fails with [`DialogueError::UnknownTopic`] and
    /// leaves the session untouched.
    pub fn receive_reply(
        &self,
        session: &mut Session,
        raw_text: &str,
    ) -> Result<Vec<Effect>, DialogueError> {
        self.ensure_active(session)?;
        let Some(index) = session.pending_step else {
            return Err(DialogueError::InvalidState { session: session.id.0.clone() });
        };
        let step = self.script.topic(session.topic()).and_then(|steps| steps.get(index));
        let Some(Step::Ask { prompt, branches, default }) = step else {
            return Err(DialogueError::InvalidState { session: session.id.0.clone() });
        };

        let handler = branches
            .iter()
            .find(|branch| raw_text.contains(&branch.pattern))
            .map(|branch| &branch.handler)
            .or(default.as_ref());

        let mut effects = Vec::new();
        let Some(handler) = handler else {
            // No match, no default: a no-op retry that re-asks the question.
            effects.push(Effect::Prompt(render(prompt, session.variables())));
            return Ok(effects);
        };
        let handler = Arc::clone(handler);

        let turn = handler(raw_text, session);
        if let Control::ChangeTopic(topic) = &turn.control {
            if !self.script.has_topic(topic) {
                return Err(DialogueError::UnknownTopic { topic: topic.clone() });
            }
        }

        for (name, value) in &turn.bind {
            session.set_var(name.clone(), value.clone());
        }
        for text in &turn.say {
            effects.push(Effect::Say(render(text, session.variables())));
        }
        for call in &turn.calls {
            effects.push(Effect::Action {
                name: call.name.clone(),
                payload: render_payload(&call.payload, session.variables()),
            });
        }

        match turn.control {
            Control::Next => {
                session.pending_step = None;
                self.run_from(session, index + 1, &mut effects);
            }
            Control::Hold => {
                effects.push(Effect::Prompt(render(prompt, session.variables())));
            }
            Control::Wait => {}
            Control::Stop => self.finish(session, SessionStatus::Stopped, &mut effects),
            Control::ChangeTopic(topic) => {
                session.topic = topic;
                session.pending_step = None;
                self.run_from(session, 0, &mut effects);
            }
        }

        Ok(effects)
    }

    /// External-driver counterpart of a handler topic change: binds
    /// variables, switches to the named topic, and runs it from its first
    /// step. Used to resolve a [`Control::Wait`] turn once a lookup result
    /// is in hand.
    pub fn redirect(
        &self,
        session: &mut Session,
        topic: &str,
        bindings: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Vec<Effect>, DialogueError> {
        self.ensure_active(session)?;
        if !self.script.has_topic(topic) {
            return Err(DialogueError::UnknownTopic { topic: topic.to_owned() });
        }

        for (name, value) in bindings {
            session.set_var(name, value);
        }
        session.topic = topic.to_owned();
        session.pending_step = None;

        let mut effects = Vec::new();
        self.run_from(session, 0, &mut effects);
        Ok(effects)
    }

    fn ensure_active(&self, session: &Session) -> Result<(), DialogueError> {
        if session.status().is_terminal() {
            return Err(DialogueError::SessionTerminated {
                session: session.id.0.clone(),
                status: session.status(),
            });
        }
        Ok(())
    }

    /// Runs the current topic from `start`, executing say/action steps
    /// inline (they never block) until a question suspends the session or
    /// the topic is exhausted and the session completes.
    fn run_from(&self, session: &mut Session, start: usize, effects: &mut Vec<Effect>) {
        let steps = self.script.topic(session.topic()).unwrap_or(&[]);
        let mut index = start;
        loop {
            match steps.get(index) {
                None => {
                    self.finish(session, SessionStatus::Completed, effects);
                    return;
                }
                Some(Step::Say { text, then }) => {
                    effects.push(Effect::Say(render(text, session.variables())));
                    match then {
                        StepExit::Continue => index += 1,
                        StepExit::Stop => {
                            self.finish(session, SessionStatus::Stopped, effects);
                            return;
                        }
                    }
                }
                Some(Step::Action { name, payload }) => {
                    effects.push(Effect::Action {
                        name: name.clone(),
                        payload: render_payload(payload, session.variables()),
                    });
                    index += 1;
                }
                Some(Step::Ask { prompt, .. }) => {
                    session.pending_step = Some(index);
                    effects.push(Effect::Prompt(render(prompt, session.variables())));
                    return;
                }
            }
        }
    }

    fn finish(&self, session: &mut Session, status: SessionStatus, effects: &mut Vec<Effect>) {
        session.status = status;
        session.pending_step = None;
        effects.push(Effect::Ended(status));
        self.observer.session_ended(session, status);
    }
}

fn render_payload(
    payload: &BTreeMap<String, String>,
    variables: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    payload.iter().map(|(key, value)| (key.clone(), render(value, variables))).collect()
}
