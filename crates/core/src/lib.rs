//! Curator core - dialogue engine, domain types, configuration
//!
//! This crate holds the deterministic heart of curator:
//! - **Dialogue engine** (`dialogue`) - multi-turn scripts, sessions, branching
//! - **Domain types** (`domain`) - user records, lookup candidates
//! - **Templates** (`template`) - fail-soft `{{var}}` prompt substitution
//! - **Configuration** (`config`) - layered config with env overrides
//!
//! The engine performs no I/O: every outgoing message or external call is
//! returned to the caller as an ordered list of [`dialogue::Effect`] values.

pub mod config;
pub mod dialogue;
pub mod domain;
pub mod template;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use dialogue::{
    Control, DialogueEngine, DialogueError, DialogueObserver, Effect, NoopObserver, Script,
    ScriptBuilder, Session, SessionId, SessionStatus, Step, Turn,
};
pub use domain::candidate::MatchCandidate;
pub use domain::user::{UserId, UserRecord};
pub use template::render;
