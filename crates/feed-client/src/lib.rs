//! Realtime feed client for the GXC explorer
//!
//! Keeps a dashboard in sync with the explorer's live event stream:
//! - WebSocket push is the primary transport
//! - Lost connections are retried with capped exponential backoff
//! - Once retries run out (or push is unavailable) a fixed-interval poller
//!   of the stats endpoint takes over
//! - Every transport feeds the same [`EventRouter`], and [`RecencyView`]
//!   absorbs the duplicates that overlapping transports produce
//!
//! One driver task owns all connection state. Transports run as separate
//! tasks and only talk to the driver through a channel, so callbacks never
//! run concurrently and never run after [`RealtimeFeed::disconnect`] returns.

pub mod config;
pub mod error;
pub mod feed;
pub mod poller;
pub mod push;
pub mod reconnect;
pub mod router;
pub mod selector;
pub mod state;
pub mod view;

mod driver;

pub use config::{EventHandler, FeedConfig, HandlerResult, Handlers, Hook, SubscriptionConfig};
pub use error::FeedError;
pub use feed::{FeedBuilder, RealtimeFeed};
pub use poller::{HttpSnapshotSource, SnapshotSource};
pub use push::{PushConnector, PushStream, WsConnector};
pub use reconnect::{BackoffPolicy, ReconnectController, ReconnectDecision, RetryState};
pub use router::EventRouter;
pub use selector::{Availability, Transport};
pub use state::{ConnectionState, FeedStatus};
pub use view::{RecencyList, RecencyView};

pub use feed_types::{Event, EventKind, Payload, PushFrame, StatsSnapshot};

/// Default poll interval (10 seconds)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10_000;

/// Reconnect attempts before push is abandoned
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 10;

/// First backoff step
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 1_000;

/// Longest backoff delay
pub const DEFAULT_BACKOFF_CAP_MS: u64 = 30_000;

/// Blocks kept in the recency view
pub const BLOCK_VIEW_CAPACITY: usize = 10;

/// Transactions kept in the recency view
pub const TX_VIEW_CAPACITY: usize = 20;

#[cfg(test)]
mod tests;
