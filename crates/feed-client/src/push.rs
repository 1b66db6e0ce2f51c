//! Push channel: connectors and the per-connection session task

use crate::driver::Inbound;
use crate::FeedError;
use async_trait::async_trait;
use feed_types::{Event, PushFrame};
use futures::stream::BoxStream;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Frames received on one push connection. The stream ending, or yielding
/// an error, means the connection is gone.
pub type PushStream = BoxStream<'static, Result<PushFrame, FeedError>>;

/// Opens push connections
#[async_trait]
pub trait PushConnector: Send + Sync {
    async fn connect(&self) -> Result<PushStream, FeedError>;

    /// Name used in logs
    fn describe(&self) -> String {
        "push".to_string()
    }
}

/// WebSocket push connector
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl PushConnector for WsConnector {
    async fn connect(&self) -> Result<PushStream, FeedError> {
        if !self.url.starts_with("ws://") && !self.url.starts_with("wss://") {
            return Err(FeedError::Connection(format!(
                "invalid WebSocket URL: {}",
                self.url
            )));
        }

        let (ws_stream, _) = connect_async(self.url.as_str()).await?;
        tracing::debug!("WebSocket handshake with {} complete", self.url);

        let frames = ws_stream.filter_map(|msg| async move {
            match msg {
                Ok(Message::Text(text)) => decode_frame(&text),
                Ok(Message::Binary(data)) => match String::from_utf8(data) {
                    Ok(text) => decode_frame(&text),
                    Err(_) => {
                        tracing::debug!("Dropping non UTF-8 binary frame");
                        None
                    }
                },
                Ok(Message::Close(frame)) => Some(Err(FeedError::Connection(match frame {
                    Some(frame) => format!("closed by server: {}", frame.reason),
                    None => "closed by server".to_string(),
                }))),
                Ok(_) => None,
                Err(e) => Some(Err(e.into())),
            }
        });

        Ok(frames.boxed())
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

fn decode_frame(text: &str) -> Option<Result<PushFrame, FeedError>> {
    match PushFrame::parse(text) {
        Ok(frame) => Some(Ok(frame)),
        Err(e) => {
            tracing::warn!("Dropping undecodable push frame: {}", e);
            None
        }
    }
}

/// What a session reports to the driver
#[derive(Debug)]
pub(crate) enum PushSignal {
    Connected,
    Event(Event),
    Closed(String),
    ConnectFailed(FeedError),
}

/// Spawn one connect-and-receive session. Messages are tagged with
/// `generation` so the driver can ignore sessions it has replaced.
pub(crate) fn spawn_session(
    connector: Arc<dyn PushConnector>,
    generation: u64,
    connect_timeout: Option<Duration>,
    tx: mpsc::Sender<Inbound>,
) -> JoinHandle<()> {
    tokio::spawn(run_session(connector, generation, connect_timeout, tx))
}

async fn run_session(
    connector: Arc<dyn PushConnector>,
    generation: u64,
    connect_timeout: Option<Duration>,
    tx: mpsc::Sender<Inbound>,
) {
    let connecting = connector.connect();
    let result = match connect_timeout {
        Some(limit) => match tokio::time::timeout(limit, connecting).await {
            Ok(result) => result,
            Err(_) => Err(FeedError::ConnectTimeout(limit.as_millis() as u64)),
        },
        None => connecting.await,
    };

    let mut stream = match result {
        Ok(stream) => stream,
        Err(e) => {
            report(&tx, generation, PushSignal::ConnectFailed(e)).await;
            return;
        }
    };

    if !report(&tx, generation, PushSignal::Connected).await {
        return;
    }

    let reason = loop {
        match stream.next().await {
            Some(Ok(frame)) => {
                let name = frame.event.clone();
                match frame.into_event() {
                    Ok(Some(event)) => {
                        tracing::debug!("Received {} via push", name);
                        if !report(&tx, generation, PushSignal::Event(event)).await {
                            return;
                        }
                    }
                    Ok(None) => tracing::trace!("Ignoring push message '{}'", name),
                    Err(e) => tracing::warn!("Dropping malformed '{}' message: {}", name, e),
                }
            }
            Some(Err(e)) => break e.to_string(),
            None => break "stream ended".to_string(),
        }
    };

    report(&tx, generation, PushSignal::Closed(reason)).await;
}

/// Returns false once the driver has gone away
async fn report(tx: &mpsc::Sender<Inbound>, generation: u64, signal: PushSignal) -> bool {
    tx.send(Inbound::Push { generation, signal }).await.is_ok()
}
