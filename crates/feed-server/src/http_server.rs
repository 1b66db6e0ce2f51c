//! HTTP Stats Server
//!
//! Serves the stats snapshot that the client's poller fetches.

use crate::hub::FeedHub;
use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use feed_types::STATS_PATH;
use serde_json::json;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

/// HTTP Stats Server
pub struct StatsHttpServer {
    hub: Arc<FeedHub>,
}

impl StatsHttpServer {
    pub fn new(hub: Arc<FeedHub>) -> Self {
        Self { hub }
    }

    /// Create the Axum router
    pub fn router(self) -> Router {
        // Dashboards poll from the browser
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

        Router::new()
            .route(STATS_PATH, get(handle_stats))
            .route("/health", get(handle_health))
            .layer(cors)
            .with_state(self.hub)
    }

    /// Bind and serve until the process exits
    pub async fn run(self, addr: &str) -> anyhow::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("HTTP stats server listening on {}", listener.local_addr()?);

        axum::serve(listener, self.router()).await?;
        Ok(())
    }

    /// Bind, then serve in the background. Returns the bound address.
    pub async fn spawn(self, addr: &str) -> anyhow::Result<SocketAddr> {
        let listener = TcpListener::bind(addr).await?;
        let local = listener.local_addr()?;
        tracing::info!("HTTP stats server listening on {}", local);

        let router = self.router();
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                tracing::error!("HTTP stats server failed: {}", e);
            }
        });
        Ok(local)
    }
}

async fn handle_stats(State(hub): State<Arc<FeedHub>>) -> Response {
    if hub.stats_unavailable() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "stats unavailable" })),
        )
            .into_response();
    }

    (StatusCode::OK, Json(hub.stats())).into_response()
}

async fn handle_health(State(hub): State<Arc<FeedHub>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "clients": hub.client_count(),
    }))
}
