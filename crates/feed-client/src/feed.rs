//! Feed handle and builder

use crate::config::{FeedConfig, HandlerResult, Handlers, SubscriptionConfig};
use crate::driver::{Command, FeedDriver};
use crate::poller::SnapshotSource;
use crate::push::PushConnector;
use crate::state::{ConnectionState, FeedStatus};
use crate::FeedError;
use feed_types::{EventKind, Payload};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};

/// Handle to a running feed
///
/// Dropping every handle tears the feed down just like [`disconnect`](Self::disconnect),
/// without waiting for it.
#[derive(Clone)]
pub struct RealtimeFeed {
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<FeedStatus>,
}

impl RealtimeFeed {
    pub fn builder() -> FeedBuilder {
        FeedBuilder::new()
    }

    /// Close the push connection, cancel any pending reconnect and stop
    /// polling. No callback runs once this returns. Safe to call twice.
    pub async fn disconnect(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.commands.send(Command::Teardown(ack_tx)).await.is_err() {
            // Driver already gone
            return;
        }
        let _ = ack_rx.await;
    }

    pub fn status(&self) -> FeedStatus {
        *self.status.borrow()
    }

    pub fn state(&self) -> ConnectionState {
        self.status.borrow().connection
    }

    /// Watch status transitions
    pub fn subscribe_status(&self) -> watch::Receiver<FeedStatus> {
        self.status.clone()
    }

    /// Whether the feed has not been torn down
    pub fn is_active(&self) -> bool {
        !self.status.borrow().torn_down && !self.commands.is_closed()
    }
}

/// Assembles a [`RealtimeFeed`]
///
/// ```no_run
/// # use feed_client::{RealtimeFeed, WsConnector, HttpSnapshotSource};
/// # async fn run() -> Result<(), feed_client::FeedError> {
/// let feed = RealtimeFeed::builder()
///     .push(WsConnector::new("ws://localhost:3000/ws"))
///     .pull(HttpSnapshotSource::new("http://localhost:3000/api/v1/stats")?)
///     .on_block(|block| {
///         println!("block {:?}", block.get("number"));
///         Ok(())
///     })
///     .start()?;
/// feed.disconnect().await;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct FeedBuilder {
    subscription: SubscriptionConfig,
    connector: Option<Arc<dyn PushConnector>>,
    source: Option<Arc<dyn SnapshotSource>>,
}

impl FeedBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: FeedConfig) -> Self {
        self.subscription.config = config;
        self
    }

    pub fn handlers(mut self, handlers: Handlers) -> Self {
        self.subscription.handlers = handlers;
        self
    }

    pub fn use_push(mut self, enabled: bool) -> Self {
        self.subscription.config.use_push = enabled;
        self
    }

    pub fn use_pull(mut self, enabled: bool) -> Self {
        self.subscription.config.use_pull = enabled;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.subscription.config.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn stats_refresh_interval(mut self, interval: Duration) -> Self {
        self.subscription.config.stats_refresh_interval_ms = Some(interval.as_millis() as u64);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.subscription.config.connect_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.subscription.config.max_reconnect_attempts = attempts;
        self
    }

    pub fn push(self, connector: impl PushConnector + 'static) -> Self {
        self.push_arc(Arc::new(connector))
    }

    pub fn push_arc(mut self, connector: Arc<dyn PushConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn pull(self, source: impl SnapshotSource + 'static) -> Self {
        self.pull_arc(Arc::new(source))
    }

    pub fn pull_arc(mut self, source: Arc<dyn SnapshotSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Install the handler for `kind`
    pub fn on<F>(mut self, kind: EventKind, handler: F) -> Self
    where
        F: Fn(&Payload) -> HandlerResult + Send + Sync + 'static,
    {
        self.subscription.handlers.set(kind, handler);
        self
    }

    pub fn on_block<F>(self, handler: F) -> Self
    where
        F: Fn(&Payload) -> HandlerResult + Send + Sync + 'static,
    {
        self.on(EventKind::Block, handler)
    }

    pub fn on_transaction<F>(self, handler: F) -> Self
    where
        F: Fn(&Payload) -> HandlerResult + Send + Sync + 'static,
    {
        self.on(EventKind::Transaction, handler)
    }

    pub fn on_address_update<F>(self, handler: F) -> Self
    where
        F: Fn(&Payload) -> HandlerResult + Send + Sync + 'static,
    {
        self.on(EventKind::AddressUpdate, handler)
    }

    pub fn on_stats_update<F>(self, handler: F) -> Self
    where
        F: Fn(&Payload) -> HandlerResult + Send + Sync + 'static,
    {
        self.on(EventKind::StatsUpdate, handler)
    }

    pub fn on_connected<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.subscription.handlers.on_connected = Some(Arc::new(hook));
        self
    }

    pub fn on_disconnected<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.subscription.handlers.on_disconnected = Some(Arc::new(hook));
        self
    }

    /// Validate the configuration and spawn the feed. Must be called from
    /// within a Tokio runtime.
    pub fn start(self) -> Result<RealtimeFeed, FeedError> {
        self.subscription.config.validate()?;

        let (command_tx, command_rx) = mpsc::channel(8);
        let (status_tx, status_rx) = watch::channel(FeedStatus::default());

        let driver = FeedDriver::new(
            self.subscription,
            self.connector,
            self.source,
            command_rx,
            status_tx,
        );
        tokio::spawn(driver.run());

        Ok(RealtimeFeed {
            commands: command_tx,
            status: status_rx,
        })
    }
}
