pub mod engine;
pub mod script;
pub mod session;

pub use engine::{DialogueEngine, DialogueError, DialogueObserver, Effect, NoopObserver};
pub use script::{ActionCall, AskBuilder, Control, Script, ScriptBuilder, Step, StepExit, Turn};
pub use session::{Session, SessionId, SessionStatus};
