//! In-memory implementation of the key-value backend contract.
//!
//! Suitable for single-process deployments and tests. It honours the full
//! contract the tracker relies on: atomic compare-and-swap, create-if-absent,
//! ordered range scans and per-item expiry.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;
use tracker_core::backend::{Backend, Item, NO_LIMIT};
use tracker_core::clock::{Clock, SystemClock};
use tracker_core::error::{Result, TrackerError};

/// Backend storing items in an ordered map.
///
/// Items whose expiry is at or before the clock's current time are treated
/// as absent and dropped on the next write.
pub struct InMemoryBackend {
    items: Arc<RwLock<BTreeMap<String, Item>>>,
    /// Revision counter stamped on every write
    next_id: AtomicI64,
    clock: Arc<dyn Clock>,
}

impl InMemoryBackend {
    /// Creates an empty backend on the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty backend on the given clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            items: Arc::new(RwLock::new(BTreeMap::new())),
            next_id: AtomicI64::new(1),
            clock,
        }
    }

    fn stamp(&self, mut item: Item) -> Item {
        item.id = self.next_id.fetch_add(1, Ordering::SeqCst);
        item
    }

    fn purge_expired(items: &mut BTreeMap<String, Item>, now: DateTime<Utc>) {
        items.retain(|_, item| !is_expired(item, now));
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn is_expired(item: &Item, now: DateTime<Utc>) -> bool {
    item.expires.is_some_and(|expires| expires <= now)
}

fn not_found(key: &str) -> TrackerError {
    TrackerError::not_found("Item", key)
}

#[async_trait]
impl Backend for InMemoryBackend {
    async fn get(&self, key: &str) -> Result<Item> {
        let now = self.clock.now();
        let items = self.items.read().await;
        items
            .get(key)
            .filter(|item| !is_expired(item, now))
            .cloned()
            .ok_or_else(|| not_found(key))
    }

    async fn put(&self, item: Item) -> Result<Item> {
        let now = self.clock.now();
        let mut items = self.items.write().await;
        Self::purge_expired(&mut items, now);

        let item = self.stamp(item);
        items.insert(item.key.clone(), item.clone());
        Ok(item)
    }

    async fn create(&self, item: Item) -> Result<Item> {
        let now = self.clock.now();
        let mut items = self.items.write().await;
        Self::purge_expired(&mut items, now);

        if items.contains_key(&item.key) {
            return Err(TrackerError::already_exists(format!(
                "key {:?} already exists",
                item.key
            )));
        }
        let item = self.stamp(item);
        items.insert(item.key.clone(), item.clone());
        Ok(item)
    }

    async fn compare_and_swap(&self, expected: &Item, replace: Item) -> Result<Item> {
        if expected.key != replace.key {
            return Err(TrackerError::bad_parameter(format!(
                "expected key {:?} and replacement key {:?} differ",
                expected.key, replace.key
            )));
        }

        let now = self.clock.now();
        let mut items = self.items.write().await;
        Self::purge_expired(&mut items, now);

        let current = items.get(&expected.key).ok_or_else(|| not_found(&expected.key))?;
        if current.value != expected.value {
            return Err(TrackerError::compare_failed(format!(
                "current value of {:?} does not match expected",
                expected.key
            )));
        }

        let item = self.stamp(replace);
        items.insert(item.key.clone(), item.clone());
        Ok(item)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let now = self.clock.now();
        let mut items = self.items.write().await;
        match items.remove(key) {
            Some(item) if !is_expired(&item, now) => Ok(()),
            _ => Err(not_found(key)),
        }
    }

    async fn get_range(&self, start: &[u8], end: &[u8], limit: usize) -> Result<Vec<Item>> {
        let now = self.clock.now();
        let items = self.items.read().await;
        let matching = items
            .values()
            .filter(|item| item.key.as_bytes() >= start)
            .filter(|item| end.is_empty() || item.key.as_bytes() < end)
            .filter(|item| !is_expired(item, now))
            .cloned();

        Ok(if limit == NO_LIMIT {
            matching.collect()
        } else {
            matching.take(limit).collect()
        })
    }

    fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }
}
