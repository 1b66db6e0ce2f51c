//! Feed Server - development stand-in for the explorer's realtime endpoints
//!
//! Provides the two surfaces the feed client talks to:
//! - WebSocket: pushes `new_block`, `new_transaction`, `address_update`
//!   and `stats_update` frames to every connected client
//! - HTTP: `GET /api/v1/stats` returns the latest stats snapshot

pub mod http_server;
pub mod hub;
pub mod ws_server;

pub use http_server::StatsHttpServer;
pub use hub::{ClientId, ClientInfo, FeedHub, HubMessage};
pub use ws_server::PushServer;

use std::{net::SocketAddr, sync::Arc};

/// Feed server configuration
#[derive(Clone, Debug)]
pub struct FeedServerConfig {
    /// HTTP stats bind address
    pub http_addr: String,
    /// WebSocket bind address
    pub ws_addr: String,
}

impl Default for FeedServerConfig {
    fn default() -> Self {
        Self {
            http_addr: "127.0.0.1:3000".to_string(),
            ws_addr: "127.0.0.1:3001".to_string(),
        }
    }
}

/// Addresses a running server is bound to
#[derive(Clone, Copy, Debug)]
pub struct BoundAddrs {
    pub http: SocketAddr,
    pub ws: SocketAddr,
}

impl BoundAddrs {
    pub fn stats_url(&self) -> String {
        format!("http://{}{}", self.http, feed_types::STATS_PATH)
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.ws)
    }
}

/// Combined server (HTTP + WebSocket) over one hub
pub struct FeedServer {
    config: FeedServerConfig,
    hub: Arc<FeedHub>,
}

impl FeedServer {
    pub fn new(config: FeedServerConfig) -> Self {
        Self {
            config,
            hub: Arc::new(FeedHub::new()),
        }
    }

    pub fn hub(&self) -> Arc<FeedHub> {
        self.hub.clone()
    }

    /// Start both listeners in the background
    pub async fn spawn(&self) -> anyhow::Result<BoundAddrs> {
        let http = StatsHttpServer::new(self.hub.clone())
            .spawn(&self.config.http_addr)
            .await?;
        let ws = PushServer::new(self.hub.clone()).spawn(&self.config.ws_addr).await?;
        Ok(BoundAddrs { http, ws })
    }
}
