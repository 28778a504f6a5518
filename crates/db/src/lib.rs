//! Persistence for curator - the user-record store.
//!
//! Only user records survive restarts; dialogue sessions are in-memory by
//! design. The store is exposed through the [`repositories::UserRepository`]
//! trait with a SQLite implementation and an in-memory fake for tests.

pub mod connection;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_settings, DbPool};
