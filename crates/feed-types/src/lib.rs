//! Shared types for the explorer realtime feed
//!
//! Used by both ends of the feed:
//! - `feed-client` decodes push frames and poll responses into [`Event`]s
//! - `feed-server` encodes published events into push frames
//!
//! Payloads stay opaque JSON objects. Only the identifying field of each
//! event kind is interpreted, through the alias lists in [`keys`].

pub mod event;
pub mod keys;
pub mod stats;
pub mod wire;

pub use event::{Event, EventError, EventKind, Payload};
pub use keys::{address, block_number, tx_hash};
pub use stats::StatsSnapshot;
pub use wire::PushFrame;

/// Default path of the stats snapshot endpoint
pub const STATS_PATH: &str = "/api/v1/stats";
