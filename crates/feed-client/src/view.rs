//! Bounded recency view of blocks and transactions
//!
//! This is where duplicate deliveries are absorbed. Push and the poller may
//! overlap, and the server may replay events after a reconnect, so every
//! insert is keyed and idempotent.

use crate::{BLOCK_VIEW_CAPACITY, TX_VIEW_CAPACITY};
use feed_types::{keys, Event, Payload, StatsSnapshot};
use std::collections::VecDeque;

/// Newest-first list holding at most `capacity` uniquely keyed entries
#[derive(Debug, Clone)]
pub struct RecencyList<K, T> {
    entries: VecDeque<(K, T)>,
    capacity: usize,
}

impl<K: PartialEq, T> RecencyList<K, T> {
    /// A zero capacity is treated as one
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Insert at the front unless the key is already present. Evicts the
    /// oldest entry when full.
    pub fn insert(&mut self, key: K, item: T) -> bool {
        if self.contains(&key) {
            return false;
        }

        self.entries.push_front((key, item));
        while self.entries.len() > self.capacity {
            self.entries.pop_back();
        }
        true
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn get(&self, key: &K) -> Option<&T> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, item)| item)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries, newest first
    pub fn iter(&self) -> impl Iterator<Item = (&K, &T)> {
        self.entries.iter().map(|(k, item)| (k, item))
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// The dashboard's latest blocks, transactions and stats
#[derive(Debug, Clone)]
pub struct RecencyView {
    blocks: RecencyList<u64, Payload>,
    transactions: RecencyList<String, Payload>,
    stats: Option<StatsSnapshot>,
}

impl RecencyView {
    pub fn new() -> Self {
        Self::with_capacities(BLOCK_VIEW_CAPACITY, TX_VIEW_CAPACITY)
    }

    pub fn with_capacities(blocks: usize, transactions: usize) -> Self {
        Self {
            blocks: RecencyList::new(blocks),
            transactions: RecencyList::new(transactions),
            stats: None,
        }
    }

    /// Returns false for duplicates and for blocks without a usable number
    pub fn apply_block(&mut self, block: &Payload) -> bool {
        match keys::block_number(block) {
            Some(number) => self.blocks.insert(number, block.clone()),
            None => {
                tracing::warn!("Rejecting block without a block number");
                false
            }
        }
    }

    /// Returns false for duplicates and for transactions without a hash
    pub fn apply_transaction(&mut self, tx: &Payload) -> bool {
        match keys::tx_hash(tx) {
            Some(hash) => self.transactions.insert(hash, tx.clone()),
            None => {
                tracing::warn!("Rejecting transaction without a hash");
                false
            }
        }
    }

    /// Replace the stats snapshot. Returns false if the payload does not parse.
    pub fn apply_stats(&mut self, stats: &Payload) -> bool {
        match StatsSnapshot::from_payload(stats) {
            Ok(snapshot) => {
                self.stats = Some(snapshot);
                true
            }
            Err(e) => {
                tracing::warn!("Rejecting stats update: {}", e);
                false
            }
        }
    }

    /// Apply whatever the event carries. Address updates do not touch the view.
    pub fn apply(&mut self, event: &Event) -> bool {
        match event {
            Event::Block(p) => self.apply_block(p),
            Event::Transaction(p) => self.apply_transaction(p),
            Event::StatsUpdate(p) => self.apply_stats(p),
            Event::AddressUpdate(_) => false,
        }
    }

    pub fn blocks(&self) -> &RecencyList<u64, Payload> {
        &self.blocks
    }

    pub fn transactions(&self) -> &RecencyList<String, Payload> {
        &self.transactions
    }

    pub fn stats(&self) -> Option<&StatsSnapshot> {
        self.stats.as_ref()
    }

    /// Block numbers, newest first
    pub fn block_numbers(&self) -> Vec<u64> {
        self.blocks.keys().copied().collect()
    }

    /// Transaction hashes, newest first
    pub fn tx_hashes(&self) -> Vec<String> {
        self.transactions.keys().cloned().collect()
    }
}

impl Default for RecencyView {
    fn default() -> Self {
        Self::new()
    }
}
