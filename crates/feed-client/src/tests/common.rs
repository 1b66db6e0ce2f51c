//! Scripted transports and recorders shared by the feed tests

use crate::{FeedBuilder, FeedError, PushConnector, PushStream, SnapshotSource};
use async_trait::async_trait;
use feed_types::{EventKind, Payload, PushFrame};
use futures::channel::mpsc::{unbounded, UnboundedSender};
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::time::Instant;

/// What one connect call does
pub enum Script {
    /// Connect error
    Fail,
    /// Never completes
    Hang,
    /// Connects, delivers the frames, then the server closes
    Close(Vec<PushFrame>),
    /// Connects, delivers the frames, then stays open
    Hold(Vec<PushFrame>),
}

/// Connector that plays back scripts in order. Once they run out every
/// connect fails.
#[derive(Default)]
pub struct ScriptedConnector {
    scripts: Mutex<VecDeque<Script>>,
    attempts: Mutex<Vec<Instant>>,
    open: Mutex<Vec<UnboundedSender<Result<PushFrame, FeedError>>>>,
}

impl ScriptedConnector {
    pub fn new(scripts: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            ..Default::default()
        })
    }

    pub fn always_failing() -> Arc<Self> {
        Self::new(Vec::new())
    }

    pub fn attempts(&self) -> Vec<Instant> {
        self.attempts.lock().clone()
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.lock().len()
    }

    /// Gaps between consecutive connect calls, in milliseconds
    pub fn gaps_ms(&self) -> Vec<u128> {
        self.attempts()
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).as_millis())
            .collect()
    }

    /// Send a frame on the newest held connection
    pub fn send(&self, frame: PushFrame) {
        if let Some(sender) = self.open.lock().last() {
            let _ = sender.unbounded_send(Ok(frame));
        }
    }

    /// End every held connection as if the server went away
    pub fn drop_connections(&self) {
        self.open.lock().clear();
    }
}

#[async_trait]
impl PushConnector for ScriptedConnector {
    async fn connect(&self) -> Result<PushStream, FeedError> {
        self.attempts.lock().push(Instant::now());
        let script = self.scripts.lock().pop_front().unwrap_or(Script::Fail);

        match script {
            Script::Fail => Err(FeedError::Connection("connection refused".to_string())),
            Script::Hang => std::future::pending().await,
            Script::Close(frames) => Ok(stream::iter(frames.into_iter().map(Ok)).boxed()),
            Script::Hold(frames) => {
                let (sender, receiver) = unbounded();
                for frame in frames {
                    let _ = sender.unbounded_send(Ok(frame));
                }
                self.open.lock().push(sender);
                Ok(receiver.boxed())
            }
        }
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

/// Snapshot source counting its fetches
#[derive(Default)]
pub struct CountingSource {
    fetches: Mutex<Vec<Instant>>,
}

impl CountingSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.lock().len()
    }

    pub fn gaps_ms(&self) -> Vec<u128> {
        self.fetches
            .lock()
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).as_millis())
            .collect()
    }
}

#[async_trait]
impl SnapshotSource for CountingSource {
    async fn fetch(&self) -> Result<Value, FeedError> {
        let mut fetches = self.fetches.lock();
        fetches.push(Instant::now());
        Ok(json!({ "total_blocks": fetches.len() as u64 }))
    }
}

/// Records everything the router delivers
#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<(EventKind, Payload)>>,
    connected: Mutex<u32>,
    disconnected: Mutex<u32>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record(&self, kind: EventKind, payload: &Payload) {
        self.events.lock().push((kind, payload.clone()));
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events.lock().iter().filter(|(k, _)| *k == kind).count()
    }

    pub fn payloads(&self, kind: EventKind) -> Vec<Payload> {
        self.events
            .lock()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, p)| p.clone())
            .collect()
    }

    pub fn total(&self) -> usize {
        self.events.lock().len()
    }

    pub fn connected(&self) -> u32 {
        *self.connected.lock()
    }

    pub fn disconnected(&self) -> u32 {
        *self.disconnected.lock()
    }
}

/// Wire every handler and hook of `builder` to `recorder`
pub fn attach(recorder: &Arc<Recorder>, builder: FeedBuilder) -> FeedBuilder {
    let mut builder = builder;
    for kind in EventKind::ALL {
        let sink = recorder.clone();
        builder = builder.on(kind, move |payload| {
            sink.record(kind, payload);
            Ok(())
        });
    }

    let on_up = recorder.clone();
    let on_down = recorder.clone();
    builder
        .on_connected(move || *on_up.connected.lock() += 1)
        .on_disconnected(move || *on_down.disconnected.lock() += 1)
}

pub fn frame(kind: EventKind, data: Value) -> PushFrame {
    PushFrame {
        event: kind.channel().to_string(),
        data,
    }
}

/// Let spawned tasks run without moving the paused clock far
pub async fn settle() {
    tokio::time::sleep(std::time::Duration::from_millis(1)).await;
}
