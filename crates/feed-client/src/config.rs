//! Subscription configuration

use crate::reconnect::BackoffPolicy;
use crate::{
    FeedError, DEFAULT_BACKOFF_BASE_MS, DEFAULT_BACKOFF_CAP_MS, DEFAULT_MAX_RECONNECT_ATTEMPTS,
    DEFAULT_POLL_INTERVAL_MS,
};
use feed_types::{EventKind, Payload};
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc, time::Duration};

/// Result returned by event handlers
pub type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Callback for one event kind
pub type EventHandler = Arc<dyn Fn(&Payload) -> HandlerResult + Send + Sync>;

/// Lifecycle notification (connected / disconnected)
pub type Hook = Arc<dyn Fn() + Send + Sync>;

/// Transport and retry settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Try the WebSocket push channel first
    pub use_push: bool,
    /// Allow the stats poller as a fallback
    pub use_pull: bool,
    /// Poll period of the fallback poller
    pub poll_interval_ms: u64,
    /// Reconnect attempts before push is abandoned for good
    pub max_reconnect_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_cap_ms: u64,
    /// Low-frequency stats poll that runs alongside push
    pub stats_refresh_interval_ms: Option<u64>,
    /// Give up on a push connect attempt after this long
    pub connect_timeout_ms: Option<u64>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            use_push: true,
            use_pull: true,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
            backoff_cap_ms: DEFAULT_BACKOFF_CAP_MS,
            stats_refresh_interval_ms: None,
            connect_timeout_ms: None,
        }
    }
}

impl FeedConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn stats_refresh_interval(&self) -> Option<Duration> {
        self.stats_refresh_interval_ms.map(Duration::from_millis)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            Duration::from_millis(self.backoff_base_ms),
            Duration::from_millis(self.backoff_cap_ms),
        )
    }

    /// Reject values the timers cannot work with
    pub fn validate(&self) -> Result<(), FeedError> {
        if self.poll_interval_ms == 0 {
            return Err(FeedError::InvalidConfig("poll_interval_ms must be positive".to_string()));
        }
        if self.stats_refresh_interval_ms == Some(0) {
            return Err(FeedError::InvalidConfig(
                "stats_refresh_interval_ms must be positive".to_string(),
            ));
        }
        if self.connect_timeout_ms == Some(0) {
            return Err(FeedError::InvalidConfig("connect_timeout_ms must be positive".to_string()));
        }
        if self.max_reconnect_attempts == 0 {
            return Err(FeedError::InvalidConfig(
                "max_reconnect_attempts must be positive".to_string(),
            ));
        }
        if self.backoff_cap_ms < self.backoff_base_ms {
            return Err(FeedError::InvalidConfig(format!(
                "backoff_cap_ms ({}) is below backoff_base_ms ({})",
                self.backoff_cap_ms, self.backoff_base_ms
            )));
        }
        Ok(())
    }
}

/// Caller-supplied callbacks, at most one per event kind
#[derive(Clone, Default)]
pub struct Handlers {
    pub on_block: Option<EventHandler>,
    pub on_transaction: Option<EventHandler>,
    pub on_address_update: Option<EventHandler>,
    pub on_stats_update: Option<EventHandler>,
    pub on_connected: Option<Hook>,
    pub on_disconnected: Option<Hook>,
}

impl Handlers {
    pub fn get(&self, kind: EventKind) -> Option<&EventHandler> {
        match kind {
            EventKind::Block => self.on_block.as_ref(),
            EventKind::Transaction => self.on_transaction.as_ref(),
            EventKind::AddressUpdate => self.on_address_update.as_ref(),
            EventKind::StatsUpdate => self.on_stats_update.as_ref(),
        }
    }

    /// Install a handler, replacing any previous one for the kind
    pub fn set<F>(&mut self, kind: EventKind, handler: F)
    where
        F: Fn(&Payload) -> HandlerResult + Send + Sync + 'static,
    {
        self.set_arc(kind, Arc::new(handler));
    }

    pub fn set_arc(&mut self, kind: EventKind, handler: EventHandler) {
        let slot = match kind {
            EventKind::Block => &mut self.on_block,
            EventKind::Transaction => &mut self.on_transaction,
            EventKind::AddressUpdate => &mut self.on_address_update,
            EventKind::StatsUpdate => &mut self.on_stats_update,
        };
        *slot = Some(handler);
    }
}

impl fmt::Debug for Handlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handlers")
            .field("on_block", &self.on_block.is_some())
            .field("on_transaction", &self.on_transaction.is_some())
            .field("on_address_update", &self.on_address_update.is_some())
            .field("on_stats_update", &self.on_stats_update.is_some())
            .field("on_connected", &self.on_connected.is_some())
            .field("on_disconnected", &self.on_disconnected.is_some())
            .finish()
    }
}

/// Everything a feed needs besides its transports. Fixed once the feed starts.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionConfig {
    pub config: FeedConfig,
    pub handlers: Handlers,
}
