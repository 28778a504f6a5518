use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::session::Session;

/// Branch handler: reads the raw reply and the session, returns the [`Turn`]
/// the engine should apply. Handlers are pure; the engine owns all mutation.
pub type Handler = Arc<dyn Fn(&str, &Session) -> Turn + Send + Sync>;

/// What a handler asked the engine to do after its turn.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Control {
    /// Proceed to the next step of the current topic.
    #[default]
    Next,
    /// End the session as stopped.
    Stop,
    /// Jump to the first step of the named topic.
    ChangeTopic(String),
    /// Stay on the pending question and re-emit its prompt.
    Hold,
    /// Stay on the pending question silently; an external driver will
    /// resolve this turn through `DialogueEngine::redirect`.
    Wait,
}

/// An external-call request carried by a [`Turn`]. Payload values are
/// templates rendered against session variables at emission time.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ActionCall {
    pub name: String,
    pub payload: BTreeMap<String, String>,
}

/// The outcome of one handler invocation: messages to say, variables to
/// bind, and a control decision. Built fluently:
///
/// ```
/// use curator_core::dialogue::Turn;
///
/// let turn = Turn::next().say("OK! I will add the link").bind("confirmed", "true");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Turn {
    pub(crate) say: Vec<String>,
    pub(crate) bind: Vec<(String, String)>,
    pub(crate) calls: Vec<ActionCall>,
    pub(crate) control: Control,
}

impl Turn {
    pub fn next() -> Self {
        Self { control: Control::Next, ..Self::default() }
    }

    pub fn stop() -> Self {
        Self { control: Control::Stop, ..Self::default() }
    }

    pub fn change_topic(topic: impl Into<String>) -> Self {
        Self { control: Control::ChangeTopic(topic.into()), ..Self::default() }
    }

    pub fn hold() -> Self {
        Self { control: Control::Hold, ..Self::default() }
    }

    pub fn wait() -> Self {
        Self { control: Control::Wait, ..Self::default() }
    }

    pub fn say(mut self, text: impl Into<String>) -> Self {
        self.say.push(text.into());
        self
    }

    pub fn bind(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.bind.push((name.into(), value.into()));
        self
    }

    pub fn call(
        mut self,
        name: impl Into<String>,
        payload: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        self.calls.push(ActionCall {
            name: name.into(),
            payload: payload.into_iter().collect(),
        });
        self
    }
}

/// One (pattern, handler) pair of an ask-step. Patterns are case-sensitive
/// substrings evaluated in declared order; the first match wins.
#[derive(Clone)]
pub struct Branch {
    pub(crate) pattern: String,
    pub(crate) handler: Handler,
}

impl fmt::Debug for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Branch").field("pattern", &self.pattern).finish_non_exhaustive()
    }
}

/// What a say-step does once its message is emitted. Mirrors the message
/// `action` of the conversation system this replaces: most messages just
/// continue, a closing message ends the session as stopped.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum StepExit {
    #[default]
    Continue,
    Stop,
}

/// A single unit of interaction within a topic.
#[derive(Clone)]
pub enum Step {
    /// Prompt the user and wait for a matched reply.
    Ask { prompt: String, branches: Vec<Branch>, default: Option<Handler> },
    /// Emit a message and advance without waiting.
    Say { text: String, then: StepExit },
    /// Request an external call and advance without waiting. Payload values
    /// are templates rendered against session variables at emission time.
    Action { name: String, payload: BTreeMap<String, String> },
}

impl Step {
    pub fn ask(prompt: impl Into<String>) -> AskBuilder {
        AskBuilder { prompt: prompt.into(), branches: Vec::new(), default: None }
    }

    pub fn say(text: impl Into<String>) -> Self {
        Self::Say { text: text.into(), then: StepExit::Continue }
    }

    /// A closing message: emits, then stops the session.
    pub fn say_then_stop(text: impl Into<String>) -> Self {
        Self::Say { text: text.into(), then: StepExit::Stop }
    }

    pub fn action(
        name: impl Into<String>,
        payload: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        Self::Action { name: name.into(), payload: payload.into_iter().collect() }
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ask { prompt, branches, default } => f
                .debug_struct("Ask")
                .field("prompt", prompt)
                .field("branches", branches)
                .field("has_default", &default.is_some())
                .finish(),
            Self::Say { text, then } => {
                f.debug_struct("Say").field("text", text).field("then", then).finish()
            }
            Self::Action { name, payload } => {
                f.debug_struct("Action").field("name", name).field("payload", payload).finish()
            }
        }
    }
}

/// Builder for ask-steps. Branch order is dispatch order.
pub struct AskBuilder {
    prompt: String,
    branches: Vec<Branch>,
    default: Option<Handler>,
}

impl AskBuilder {
    pub fn branch<H>(mut self, pattern: impl Into<String>, handler: H) -> Self
    where
        H: Fn(&str, &Session) -> Turn + Send + Sync + 'static,
    {
        self.branches.push(Branch { pattern: pattern.into(), handler: Arc::new(handler) });
        self
    }

    pub fn default<H>(mut self, handler: H) -> Self
    where
        H: Fn(&str, &Session) -> Turn + Send + Sync + 'static,
    {
        self.default = Some(Arc::new(handler));
        self
    }

    pub fn build(self) -> Step {
        Step::Ask { prompt: self.prompt, branches: self.branches, default: self.default }
    }
}

/// The topic table of a dialogue: named, ordered step lists plus the entry
/// topic. Branching is expressed as data here rather than nested
/// conditionals, so branch order and fallback behavior stay inspectable.
#[derive(Clone, Debug)]
pub struct Script {
    entry: String,
    topics: BTreeMap<String, Vec<Step>>,
}

pub const DEFAULT_TOPIC: &str = "default";

impl Script {
    pub fn builder() -> ScriptBuilder {
        ScriptBuilder { entry: DEFAULT_TOPIC.to_owned(), topics: BTreeMap::new() }
    }

    pub fn entry_topic(&self) -> &str {
        &self.entry
    }

    pub fn topic(&self, name: &str) -> Option<&[Step]> {
        self.topics.get(name).map(Vec::as_slice)
    }

    pub fn has_topic(&self, name: &str) -> bool {
        self.topics.contains_key(name)
    }
}

#[derive(Debug)]
pub struct ScriptBuilder {
    entry: String,
    topics: BTreeMap<String, Vec<Step>>,
}

impl ScriptBuilder {
    pub fn entry(mut self, name: impl Into<String>) -> Self {
        self.entry = name.into();
        self
    }

    pub fn topic(mut self, name: impl Into<String>, steps: Vec<Step>) -> Self {
        self.topics.insert(name.into(), steps);
        self
    }

    pub fn build(self) -> Script {
        Script { entry: self.entry, topics: self.topics }
    }
}
