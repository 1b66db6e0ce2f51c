//! Feed events and their validation

use crate::keys;
use crate::stats::StatsSnapshot;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Opaque application payload carried by every event
pub type Payload = serde_json::Map<String, Value>;

/// Errors raised while decoding frames and payloads
#[derive(Error, Debug)]
pub enum EventError {
    #[error("{kind} payload is not a JSON object")]
    NotAnObject { kind: EventKind },

    #[error("{kind} payload has none of the identifying fields {fields:?}")]
    MissingField {
        kind: EventKind,
        fields: &'static [&'static str],
    },

    #[error("invalid stats payload: {0}")]
    InvalidStats(String),

    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The four kinds of event the feed carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Block,
    Transaction,
    AddressUpdate,
    StatsUpdate,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::Block,
        EventKind::Transaction,
        EventKind::AddressUpdate,
        EventKind::StatsUpdate,
    ];

    /// Name of the push message carrying this kind
    pub fn channel(&self) -> &'static str {
        match self {
            EventKind::Block => "new_block",
            EventKind::Transaction => "new_transaction",
            EventKind::AddressUpdate => "address_update",
            EventKind::StatsUpdate => "stats_update",
        }
    }

    /// Look up a kind by push message name
    pub fn from_channel(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.channel() == name)
    }

    /// Alias list of the identifying field, if the kind has one
    pub fn key_fields(&self) -> Option<&'static [&'static str]> {
        match self {
            EventKind::Block => Some(keys::BLOCK_NUMBER_FIELDS),
            EventKind::Transaction => Some(keys::TX_HASH_FIELDS),
            EventKind::AddressUpdate => Some(keys::ADDRESS_FIELDS),
            EventKind::StatsUpdate => None,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.channel())
    }
}

/// A single feed event
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Block(Payload),
    Transaction(Payload),
    AddressUpdate(Payload),
    StatsUpdate(Payload),
}

impl Event {
    /// Wrap a payload without validating it
    pub fn new(kind: EventKind, payload: Payload) -> Self {
        match kind {
            EventKind::Block => Event::Block(payload),
            EventKind::Transaction => Event::Transaction(payload),
            EventKind::AddressUpdate => Event::AddressUpdate(payload),
            EventKind::StatsUpdate => Event::StatsUpdate(payload),
        }
    }

    /// Build an event from raw JSON, rejecting payloads that lack the
    /// identifying field for their kind.
    pub fn decode(kind: EventKind, data: Value) -> Result<Self, EventError> {
        let payload = match data {
            Value::Object(map) => map,
            _ => return Err(EventError::NotAnObject { kind }),
        };

        let valid = match kind {
            EventKind::Block => keys::block_number(&payload).is_some(),
            EventKind::Transaction => keys::tx_hash(&payload).is_some(),
            EventKind::AddressUpdate => keys::address(&payload).is_some(),
            EventKind::StatsUpdate => {
                StatsSnapshot::from_payload(&payload)?;
                true
            }
        };

        if !valid {
            return Err(EventError::MissingField {
                kind,
                fields: kind.key_fields().unwrap_or(&[]),
            });
        }

        Ok(Self::new(kind, payload))
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Event::Block(_) => EventKind::Block,
            Event::Transaction(_) => EventKind::Transaction,
            Event::AddressUpdate(_) => EventKind::AddressUpdate,
            Event::StatsUpdate(_) => EventKind::StatsUpdate,
        }
    }

    pub fn payload(&self) -> &Payload {
        match self {
            Event::Block(p) | Event::Transaction(p) | Event::AddressUpdate(p) | Event::StatsUpdate(p) => p,
        }
    }

    pub fn into_payload(self) -> Payload {
        match self {
            Event::Block(p) | Event::Transaction(p) | Event::AddressUpdate(p) | Event::StatsUpdate(p) => p,
        }
    }
}
