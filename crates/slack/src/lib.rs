//! Chat interface - trigger routing and the link-curation dialogue
//!
//! This crate wires raw chat messages into the dialogue engine:
//! - **Triggers** (`triggers`) - maps incoming text to an intent
//! - **Script** (`script`) - the link-curation and shutdown dialogue topics
//! - **Router** (`router`) - owns active sessions per conversation, performs
//!   the external calls the engine requests, and collects replies
//! - **Transport** (`transport`) - pluggable connection seam and pump loop
//!
//! # Architecture
//!
//! ```text
//! ChatTransport → BotRunner → MessageRouter → DialogueEngine
//!                                  ↓
//!                     user store / monitor service
//! ```

pub mod messages;
pub mod router;
pub mod script;
pub mod transport;
pub mod triggers;

pub use messages::IncomingMessage;
pub use router::MessageRouter;
pub use transport::{BotRunner, ChatTransport, NoopChatTransport, ReconnectPolicy, TransportError};
