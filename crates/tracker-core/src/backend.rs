//! Key-value backend contract.
//!
//! The tracker never holds locks. All coordination between processes goes
//! through the atomic compare-and-swap offered by a [`Backend`]
//! implementation, and physical cleanup through its per-item expiry.

use crate::clock::Clock;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Separator between key segments.
pub const SEPARATOR: char = '/';

/// Passed as `limit` to [`Backend::get_range`] to return every item.
pub const NO_LIMIT: usize = 0;

/// A stored value as seen by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub key: String,
    pub value: Vec<u8>,
    /// Backend-enforced expiry. `None` means the backend never reclaims the
    /// item on its own.
    pub expires: Option<DateTime<Utc>>,
    /// Revision stamped by the backend on every write
    pub id: i64,
}

impl Item {
    pub fn new(key: impl Into<String>, value: Vec<u8>, expires: Option<DateTime<Utc>>) -> Self {
        Self {
            key: key.into(),
            value,
            expires,
            id: 0,
        }
    }
}

/// Builds a key from segments: `key(&["a", "b"])` is `"/a/b"`.
pub fn key(parts: &[&str]) -> String {
    let mut key = String::new();
    for part in parts {
        key.push(SEPARATOR);
        key.push_str(part);
    }
    key
}

/// The exclusive upper bound of a prefix scan: the prefix with its last
/// byte incremented, carrying over `0xff` bytes.
pub fn range_end(prefix: &str) -> Vec<u8> {
    let mut end = prefix.as_bytes().to_vec();
    while let Some(last) = end.pop() {
        if last < u8::MAX {
            end.push(last + 1);
            return end;
        }
    }
    // Every byte was 0xff: the scan is unbounded above.
    Vec::new()
}

/// An abstract shared key-value store.
///
/// Implementations report absence as `NotFound`, create collisions as
/// `AlreadyExists` and stale compare-and-swap pre-images as `CompareFailed`.
/// Items whose expiry has passed must behave as absent.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Reads one item.
    async fn get(&self, key: &str) -> Result<Item>;

    /// Writes an item unconditionally.
    async fn put(&self, item: Item) -> Result<Item>;

    /// Writes an item only if the key is absent.
    async fn create(&self, item: Item) -> Result<Item>;

    /// Replaces the stored item with `replace` only if its value still
    /// equals `expected.value`.
    async fn compare_and_swap(&self, expected: &Item, replace: Item) -> Result<Item>;

    /// Deletes an item.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Returns items with `start <= key < end` in key order. An empty `end`
    /// means no upper bound. `limit` of [`NO_LIMIT`] returns everything.
    async fn get_range(&self, start: &[u8], end: &[u8], limit: usize) -> Result<Vec<Item>>;

    /// The time source shared by everything using this backend.
    fn clock(&self) -> Arc<dyn Clock>;
}
