use curator_core::dialogue::{Script, Step, Turn};

/// Seed variable marking sessions that should get a closing message.
pub const FLOW_VAR: &str = "flow";
pub const CURATE_FLOW: &str = "curate";

/// The link captured from the triggering message.
pub const LINK_VAR: &str = "newlink";
/// The project text the user asked to look up.
pub const QUERY_VAR: &str = "query";
/// The rendered candidate list (or the no-match sentinel).
pub const CHANNELS_VAR: &str = "channels";

/// Topic entered when the lookup found candidates.
pub const MATCH_TOPIC: &str = "yes_thread";
/// Topic entered when the lookup found nothing.
pub const NO_MATCH_TOPIC: &str = "no_thread";
/// Entry topic of the shutdown confirmation.
pub const SHUTDOWN_TOPIC: &str = "shutdown";

/// Action effect names the router performs.
pub const LOOKUP_ACTION: &str = "lookup_channels";
pub const ADD_ITEM_ACTION: &str = "add_item";
pub const SHUTDOWN_ACTION: &str = "request_shutdown";

/// The bot's full topic table.
///
/// The link-curation flow enters at `default`: confirm the link, ask for the
/// project, then suspend while the router resolves the lookup and redirects
/// to `yes_thread` or `no_thread`. Channel selection resolves against the
/// candidate list pinned on the session for that turn - never a second
/// fetch, so the typed id always refers to the list the user saw.
pub fn bot_script() -> Script {
    Script::builder()
        .topic(
            "default",
            vec![
                Step::ask("That looks like a monitor link! Should I add it to the monitor?")
                    .branch("yes", |_, _| Turn::next().say("OK! I will add the link"))
                    .branch("no", |_, _| Turn::stop())
                    .default(|_, _| Turn::stop())
                    .build(),
                Step::ask("What project is this for?")
                    .default(|reply, _| {
                        let query = reply.trim().to_owned();
                        Turn::wait()
                            .say(format!("OK, looking for {query}"))
                            .bind(QUERY_VAR, query.clone())
                            .call(LOOKUP_ACTION, [(QUERY_VAR.to_owned(), query)])
                    })
                    .build(),
            ],
        )
        .topic(
            MATCH_TOPIC,
            vec![Step::ask("Pick a channel number from the list: {{channels}}")
                .default(|reply, session| {
                    let typed = reply.trim();
                    match session.candidates().iter().find(|candidate| candidate.id == typed) {
                        Some(candidate) => Turn::next()
                            .say(format!("OK, adding to {}", candidate.display_name))
                            .call(
                                ADD_ITEM_ACTION,
                                [
                                    (
                                        "uniqueid".to_owned(),
                                        candidate.correlation_token.clone(),
                                    ),
                                    ("item".to_owned(), "{{newlink}}".to_owned()),
                                ],
                            ),
                        None => Turn::next().say(format!("Sorry, {typed} isn't on the list")),
                    }
                })
                .build()],
        )
        .topic(NO_MATCH_TOPIC, vec![Step::say_then_stop("No matches for that text.")])
        .topic(
            SHUTDOWN_TOPIC,
            vec![Step::ask("Are you sure you want me to shutdown?")
                .branch("yes", |_, _| {
                    Turn::next().say("Bye!").call(SHUTDOWN_ACTION, std::iter::empty())
                })
                .default(|_, _| Turn::next().say("*Phew!*"))
                .build()],
        )
        .build()
}
