//! Feed client errors
//!
//! None of these are fatal. Each is logged where it occurs and the adapter
//! either recovers (reconnect, next poll tick) or degrades to inert.

use feed_types::EventError;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("push transport unavailable")]
    TransportUnavailable,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("connect timed out after {0}ms")]
    ConnectTimeout(u64),

    #[error("malformed payload: {0}")]
    MalformedPayload(#[from] EventError),

    #[error("fetch failed: {0}")]
    Fetch(String),

    #[error("unexpected HTTP status {0}")]
    HttpStatus(u16),

    #[error("{kind} handler failed: {reason}")]
    Handler { kind: String, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl FeedError {
    pub(crate) fn handler(kind: impl fmt::Display, reason: impl Into<String>) -> Self {
        Self::Handler {
            kind: kind.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for FeedError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        FeedError::Connection(e.to_string())
    }
}

impl From<reqwest::Error> for FeedError {
    fn from(e: reqwest::Error) -> Self {
        FeedError::Fetch(e.to_string())
    }
}
