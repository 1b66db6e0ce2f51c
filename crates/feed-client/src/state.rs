//! Connection state and the status snapshot published to observers

use std::fmt;

/// Push connection state. Only the driver mutates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Waiting for the reconnect timer
    Backoff,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Backoff => "backoff",
        };
        f.write_str(name)
    }
}

/// Point-in-time view of the feed, republished on every transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeedStatus {
    pub connection: ConnectionState,
    /// Current reconnect attempt (0 while connected)
    pub attempt: u32,
    /// Push retries ran out; no further connect attempts will be made
    pub push_exhausted: bool,
    /// Fallback poller running
    pub polling: bool,
    /// Stats refresh poller running alongside push
    pub stats_refresh: bool,
    /// `disconnect()` completed
    pub torn_down: bool,
}
