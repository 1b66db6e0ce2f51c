//! Push channel framing
//!
//! A frame is a named message with a JSON body. Two encodings are accepted
//! on the way in:
//! - object form: `{"event": "new_block", "data": {...}}`
//! - array form:  `["new_block", {...}]`
//!
//! Frames are always written in object form.

use crate::event::{Event, EventError, EventKind, Payload};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A named message received from or sent to the push channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushFrame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl PushFrame {
    pub fn new(kind: EventKind, payload: Payload) -> Self {
        Self {
            event: kind.channel().to_string(),
            data: Value::Object(payload),
        }
    }

    pub fn from_event(event: &Event) -> Self {
        Self::new(event.kind(), event.payload().clone())
    }

    /// Parse a text frame in either accepted encoding
    pub fn parse(text: &str) -> Result<Self, EventError> {
        match serde_json::from_str::<Value>(text)? {
            Value::Object(mut map) => {
                let event = match map.remove("event") {
                    Some(Value::String(name)) => name,
                    _ => return Err(EventError::InvalidFrame("missing event name".to_string())),
                };
                let data = map.remove("data").unwrap_or(Value::Null);
                Ok(Self { event, data })
            }
            Value::Array(items) => {
                let mut items = items.into_iter();
                let event = match items.next() {
                    Some(Value::String(name)) => name,
                    _ => return Err(EventError::InvalidFrame("missing event name".to_string())),
                };
                let data = items.next().unwrap_or(Value::Null);
                Ok(Self { event, data })
            }
            other => Err(EventError::InvalidFrame(format!(
                "expected object or array, got {}",
                type_name(&other)
            ))),
        }
    }

    /// Serialize in object form
    pub fn to_json(&self) -> Result<String, EventError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode into an event. Unknown message names yield `Ok(None)`.
    pub fn into_event(self) -> Result<Option<Event>, EventError> {
        match EventKind::from_channel(&self.event) {
            Some(kind) => Event::decode(kind, self.data).map(Some),
            None => Ok(None),
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
