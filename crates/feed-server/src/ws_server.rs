//! WebSocket Push Server
//!
//! Every connection receives every frame published to the hub. Anything
//! the client sends is ignored apart from close and ping.

use crate::hub::{FeedHub, HubMessage};
use futures::{SinkExt, StreamExt};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::error::RecvError;
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// WebSocket Push Server
pub struct PushServer {
    hub: Arc<FeedHub>,
}

impl PushServer {
    pub fn new(hub: Arc<FeedHub>) -> Self {
        Self { hub }
    }

    /// Run the push server
    pub async fn run(self, addr: &str) -> anyhow::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("WebSocket push server listening on {}", listener.local_addr()?);
        accept_loop(listener, self.hub).await;
        Ok(())
    }

    /// Bind, then accept in the background. Returns the bound address.
    pub async fn spawn(self, addr: &str) -> anyhow::Result<SocketAddr> {
        let listener = TcpListener::bind(addr).await?;
        let local = listener.local_addr()?;
        tracing::info!("WebSocket push server listening on {}", local);

        tokio::spawn(accept_loop(listener, self.hub));
        Ok(local)
    }
}

async fn accept_loop(listener: TcpListener, hub: Arc<FeedHub>) {
    while let Ok((stream, peer_addr)) = listener.accept().await {
        let hub = hub.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, hub).await {
                tracing::warn!("WebSocket connection error from {}: {}", peer_addr, e);
            }
        });
    }
}

/// Handle a single WebSocket connection
async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    hub: Arc<FeedHub>,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let (client_id, mut frames) = hub.register(peer_addr);
    tracing::info!("Push client {} connected from {}", client_id, peer_addr);

    let result: anyhow::Result<()> = async {
        loop {
            tokio::select! {
                message = frames.recv() => match message {
                    Ok(HubMessage::Frame(text)) => {
                        ws_sender.send(Message::Text(text.to_string())).await?;
                    }
                    Ok(HubMessage::CloseAll) => {
                        ws_sender.send(Message::Close(None)).await?;
                        break;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Push client {} lagged, skipped {} frames", client_id, skipped);
                    }
                    Err(RecvError::Closed) => break,
                },
                incoming = ws_receiver.next() => match incoming {
                    Some(Ok(Message::Ping(data))) => ws_sender.send(Message::Pong(data)).await?,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                },
            }
        }
        Ok(())
    }
    .await;

    hub.unregister(client_id);
    tracing::info!("Push client {} disconnected", client_id);
    result
}
