//! Identifying-field extraction
//!
//! Producers disagree on field names, so each identifier is looked up
//! through an ordered alias list. The first alias holding a usable value wins.

use crate::event::Payload;
use serde_json::Value;

/// Accepted names for a block's height, in priority order
pub const BLOCK_NUMBER_FIELDS: &[&str] = &["number", "block_number", "height"];

/// Accepted names for a transaction's hash, in priority order
pub const TX_HASH_FIELDS: &[&str] = &["hash", "tx_hash", "txid"];

/// Accepted names for an address, in priority order
pub const ADDRESS_FIELDS: &[&str] = &["address", "addr"];

/// Try each alias in order and return the first value `parse` accepts
pub fn lookup<T>(
    payload: &Payload,
    aliases: &[&str],
    parse: impl Fn(&Value) -> Option<T>,
) -> Option<T> {
    aliases
        .iter()
        .filter_map(|name| payload.get(*name))
        .find_map(parse)
}

/// Block number, accepting integers and decimal strings
pub fn block_number(payload: &Payload) -> Option<u64> {
    lookup(payload, BLOCK_NUMBER_FIELDS, |value| match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Transaction hash, any non-blank string
pub fn tx_hash(payload: &Payload) -> Option<String> {
    lookup(payload, TX_HASH_FIELDS, non_blank)
}

/// Address string, any non-blank string
pub fn address(payload: &Payload) -> Option<String> {
    lookup(payload, ADDRESS_FIELDS, non_blank)
}

fn non_blank(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
