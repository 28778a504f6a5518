//! Monitor-service integration - channel lookup and item submission.
//!
//! The remote monitor exposes a single endpoint with an `action` query
//! parameter: `action=list` returns the channel directory, `action=add_item`
//! files an item into a channel. Lookup failures degrade to zero results and
//! item submission is best-effort; neither ever terminates a dialogue.

pub mod client;
pub mod matching;

pub use client::{
    Channel, ChannelLookup, HttpMonitorClient, ItemSink, MonitorError, NoopChannelLookup,
    NoopItemSink,
};
pub use matching::{display_list, match_channels, NO_MATCH_SENTINEL};
