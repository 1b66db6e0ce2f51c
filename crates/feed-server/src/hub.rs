//! Feed Hub - fans published events out to every push client
//!
//! Also holds the stats snapshot served over HTTP, so a published
//! `stats_update` is visible to pollers and push clients alike.

use dashmap::DashMap;
use feed_types::{Event, EventError, PushFrame, StatsSnapshot};
use parking_lot::RwLock;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};
use tokio::sync::broadcast;

/// Client ID
pub type ClientId = u64;

/// Messages fanned out to connection tasks
#[derive(Clone, Debug)]
pub enum HubMessage {
    /// Serialized frame to forward as a text message
    Frame(Arc<str>),
    /// Close every open connection
    CloseAll,
}

/// Connected push client
#[derive(Clone, Debug)]
pub struct ClientInfo {
    pub id: ClientId,
    pub peer: SocketAddr,
}

/// Shared state behind the push and HTTP servers
pub struct FeedHub {
    sender: broadcast::Sender<HubMessage>,
    /// Connected clients by ID
    clients: DashMap<ClientId, ClientInfo>,
    next_id: AtomicU64,
    /// Body of the stats endpoint
    stats: RwLock<Value>,
    /// When set the stats endpoint answers 503
    stats_unavailable: AtomicBool,
}

impl FeedHub {
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// `capacity` is how many frames a slow client may fall behind
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            clients: DashMap::new(),
            next_id: AtomicU64::new(1),
            stats: RwLock::new(Value::Object(StatsSnapshot::default().to_payload())),
            stats_unavailable: AtomicBool::new(false),
        }
    }

    /// Register a new connection
    pub fn register(&self, peer: SocketAddr) -> (ClientId, broadcast::Receiver<HubMessage>) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.clients.insert(id, ClientInfo { id, peer });
        tracing::debug!("Registered push client {} from {}", id, peer);
        (id, self.sender.subscribe())
    }

    /// Remove a connection. Returns false if it was not registered.
    pub fn unregister(&self, id: ClientId) -> bool {
        if self.clients.remove(&id).is_some() {
            tracing::debug!("Removed push client {}", id);
            true
        } else {
            false
        }
    }

    /// Broadcast an event. A stats update also replaces the served snapshot.
    /// Returns the number of connections the frame was queued for.
    pub fn publish(&self, event: &Event) -> Result<usize, EventError> {
        if let Event::StatsUpdate(payload) = event {
            *self.stats.write() = Value::Object(payload.clone());
        }
        self.publish_frame(&PushFrame::from_event(event))
    }

    /// Broadcast a raw frame, including names clients do not know
    pub fn publish_frame(&self, frame: &PushFrame) -> Result<usize, EventError> {
        let text = frame.to_json()?;
        tracing::debug!("Publishing {} to {} clients", frame.event, self.client_count());
        Ok(self.send(HubMessage::Frame(text.into())))
    }

    /// Close all open push connections. Clients may reconnect.
    pub fn close_all(&self) -> usize {
        tracing::info!("Closing {} push connections", self.client_count());
        self.send(HubMessage::CloseAll)
    }

    fn send(&self, message: HubMessage) -> usize {
        // No receivers is not an error for a broadcast hub
        self.sender.send(message).unwrap_or(0)
    }

    /// Replace the snapshot served by the stats endpoint
    pub fn set_stats(&self, stats: Value) {
        *self.stats.write() = stats;
    }

    pub fn stats(&self) -> Value {
        self.stats.read().clone()
    }

    /// Make the stats endpoint fail, or recover
    pub fn set_stats_unavailable(&self, unavailable: bool) {
        self.stats_unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn stats_unavailable(&self) -> bool {
        self.stats_unavailable.load(Ordering::SeqCst)
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn has_client(&self, id: ClientId) -> bool {
        self.clients.contains_key(&id)
    }

    pub fn clients(&self) -> Vec<ClientInfo> {
        self.clients.iter().map(|entry| entry.value().clone()).collect()
    }
}

impl Default for FeedHub {
    fn default() -> Self {
        Self::new()
    }
}
