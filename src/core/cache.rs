//! Cache backend trait
//!
//! One key space, four disjoint value shapes per key: scalar string with
//! optional TTL, field map, ordered list, unordered member set. The command
//! set mirrors Redis so the Redis backend is a thin mapping and the local
//! backend reproduces the same observable results.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::Result;

/// Abstract interface for the key/value cache
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Get the backend ID
    fn id(&self) -> &str;

    // --- scalar ---

    /// Set a scalar value; `None` TTL persists until deleted or evicted
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

    /// Get a scalar value
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Delete a key of any shape; returns the number of keys removed
    async fn delete(&self, key: &str) -> Result<u64>;

    /// Check whether a key exists
    async fn exists(&self, key: &str) -> Result<bool>;

    // --- hash ---

    /// Set a field; returns 1 if the field was created, 0 if overwritten
    async fn set_field(&self, key: &str, field: &str, value: &str) -> Result<u64>;

    /// Get one field
    async fn get_field(&self, key: &str, field: &str) -> Result<Option<String>>;

    /// Get all fields; empty when the key is absent
    async fn get_all_fields(&self, key: &str) -> Result<HashMap<String, String>>;

    /// Delete one field; returns the number of fields removed
    async fn delete_field(&self, key: &str, field: &str) -> Result<u64>;

    // --- list ---

    /// Push to the tail; returns the new length
    async fn append(&self, key: &str, value: &str) -> Result<u64>;

    /// Push each value to the head in turn; returns the new length
    async fn prepend(&self, key: &str, values: &[String]) -> Result<u64>;

    /// Inclusive range; negative indices count from the tail
    async fn range(&self, key: &str, start: i64, end: i64) -> Result<Vec<String>>;

    /// Remove every occurrence of `value`; returns the number removed
    async fn remove_from_list(&self, key: &str, value: &str) -> Result<u64>;

    // --- set ---

    /// Add members; returns how many were not already present
    async fn add_members(&self, key: &str, members: &[String]) -> Result<u64>;

    /// All members, unordered
    async fn members(&self, key: &str) -> Result<Vec<String>>;

    /// Membership test
    async fn is_member(&self, key: &str, member: &str) -> Result<bool>;

    /// Remove a member; returns the number removed
    async fn remove_member(&self, key: &str, member: &str) -> Result<u64>;

    /// Release the underlying connection
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Resolve a Redis-style inclusive `[start, end]` range against a list length.
///
/// Negative indices count from the tail (`-1` is the last element).
/// Returns `None` when the range selects nothing.
pub fn resolve_range(len: usize, start: i64, end: i64) -> Option<(usize, usize)> {
    if len == 0 {
        return None;
    }
    let len = len as i64;
    let start = if start < 0 { (start + len).max(0) } else { start };
    let end = if end < 0 { end + len } else { end.min(len - 1) };

    if start > end || start >= len || end < 0 {
        return None;
    }
    Some((start as usize, end as usize))
}
