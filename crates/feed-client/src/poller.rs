//! Pull poller: fixed-interval fetches of the stats snapshot endpoint

use crate::driver::Inbound;
use crate::FeedError;
use async_trait::async_trait;
use feed_types::{Event, EventKind};
use serde_json::Value;
use std::fmt;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Produces raw stats snapshots
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch(&self) -> Result<Value, FeedError>;

    /// Name used in logs
    fn describe(&self) -> String {
        "snapshot".to_string()
    }
}

/// Fetches snapshots with an HTTP GET. Anything but `200 OK` is a failure.
pub struct HttpSnapshotSource {
    client: reqwest::Client,
    url: String,
}

impl HttpSnapshotSource {
    pub fn new(url: impl Into<String>) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self::with_client(client, url))
    }

    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SnapshotSource for HttpSnapshotSource {
    async fn fetch(&self) -> Result<Value, FeedError> {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(FeedError::HttpStatus(status.as_u16()));
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| FeedError::MalformedPayload(e.into()))
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Why a poller runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PollRole {
    /// Replaces push after failure
    Fallback,
    /// Low-frequency stats refresh next to push
    StatsRefresh,
}

impl fmt::Display for PollRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollRole::Fallback => f.write_str("fallback"),
            PollRole::StatsRefresh => f.write_str("stats refresh"),
        }
    }
}

/// Fetches immediately on start, then once per interval until stopped
pub(crate) struct PullPoller {
    source: Arc<dyn SnapshotSource>,
    interval: Duration,
    role: PollRole,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
    generation: u64,
}

impl PullPoller {
    pub fn new(source: Arc<dyn SnapshotSource>, interval: Duration, role: PollRole) -> Self {
        Self {
            source,
            interval,
            role,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
            generation: 0,
        }
    }

    /// Start polling. A running poller is restarted on a fresh schedule.
    pub(crate) fn start(&mut self, tx: mpsc::Sender<Inbound>) {
        self.stop();
        self.generation += 1;

        let running = Arc::new(AtomicBool::new(true));
        self.running = running.clone();

        tracing::info!(
            "Starting {} poller on {} every {}ms",
            self.role,
            self.source.describe(),
            self.interval.as_millis()
        );

        let source = self.source.clone();
        let interval = self.interval;
        let role = self.role;
        let generation = self.generation;

        self.handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                if !running.load(Ordering::SeqCst) {
                    break;
                }

                let body = match source.fetch().await {
                    Ok(body) => body,
                    Err(e) => {
                        tracing::warn!("Polling error: {}", e);
                        continue;
                    }
                };

                match Event::decode(EventKind::StatsUpdate, body) {
                    Ok(event) => {
                        if !running.load(Ordering::SeqCst) {
                            break;
                        }
                        let inbound = Inbound::Poll {
                            role,
                            generation,
                            event,
                        };
                        if tx.send(inbound).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::warn!("Dropping malformed stats snapshot: {}", e),
                }
            }
        }));
    }

    /// Stop polling. Returns whether the poller was running.
    pub fn stop(&mut self) -> bool {
        self.running.store(false, Ordering::SeqCst);
        match self.handle.take() {
            Some(handle) => {
                handle.abort();
                tracing::info!("Stopped {} poller", self.role);
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }
}

impl Drop for PullPoller {
    fn drop(&mut self) {
        self.stop();
    }
}
