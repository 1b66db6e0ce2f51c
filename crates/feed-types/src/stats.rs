//! Network statistics snapshot

use crate::event::{EventError, Payload};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

/// Aggregate chain statistics served by the snapshot endpoint and carried
/// by `stats_update` messages. Every field is optional; unknown fields are
/// preserved in `extra`. Counts keep whatever JSON number the explorer sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_blocks: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_transactions: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_addresses: Option<Number>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_supply: Option<f64>,
    #[serde(flatten)]
    pub extra: Payload,
}

impl StatsSnapshot {
    /// Parse and type-check a stats payload
    pub fn from_payload(payload: &Payload) -> Result<Self, EventError> {
        serde_json::from_value(Value::Object(payload.clone()))
            .map_err(|e| EventError::InvalidStats(e.to_string()))
    }

    /// Block count as an integer, when it is one
    pub fn block_count(&self) -> Option<u64> {
        self.total_blocks.as_ref().and_then(Number::as_u64)
    }

    /// Convert back into an opaque payload
    pub fn to_payload(&self) -> Payload {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Payload::new(),
        }
    }
}
