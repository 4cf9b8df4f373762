//! In-process cache backend
//!
//! Uses moka async cache (Send + Sync, per-entry expiry).
//! No external services required.

use async_trait::async_trait;
use moka::future::Cache;
use moka::ops::compute::Op;
use moka::Expiry;
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

use crate::core::cache::{resolve_range, CacheBackend};
use crate::error::Result;

/// A cached value; each key holds exactly one shape
#[derive(Debug, Clone, PartialEq)]
pub enum CacheValue {
    Scalar { value: String, ttl: Option<Duration> },
    Hash(HashMap<String, String>),
    List(VecDeque<String>),
    Set(HashSet<String>),
}

/// Only scalars carry a TTL; rewriting a key as a collection clears it
struct ValueExpiry;

impl Expiry<String, CacheValue> for ValueExpiry {
    fn expire_after_create(&self, _key: &String, value: &CacheValue, _created_at: Instant) -> Option<Duration> {
        match value {
            CacheValue::Scalar { ttl, .. } => *ttl,
            _ => None,
        }
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheValue,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        match value {
            CacheValue::Scalar { ttl, .. } => *ttl,
            _ => None,
        }
    }
}

/// In-process cache backend
#[derive(Clone)]
pub struct LocalCache {
    entries: Cache<String, CacheValue>,
}

impl LocalCache {
    /// Create a new cache holding at most `max_capacity` keys
    pub fn new(max_capacity: u64) -> Self {
        LocalCache {
            entries: Cache::builder()
                .max_capacity(max_capacity)
                .expire_after(ValueExpiry)
                .build(),
        }
    }

    /// Atomically read-modify-write one key.
    ///
    /// `f` sees the current value (if any) and returns the operation to
    /// apply plus the command's reply.
    async fn mutate<R, F>(&self, key: &str, f: F) -> R
    where
        R: Default,
        F: FnOnce(Option<CacheValue>) -> (Op<CacheValue>, R),
    {
        let mut reply = None;
        self.entries
            .entry(key.to_string())
            .and_compute_with(|entry| {
                let (op, r) = f(entry.map(|e| e.into_value()));
                reply = Some(r);
                std::future::ready(op)
            })
            .await;
        reply.unwrap_or_default()
    }

    async fn list(&self, key: &str) -> Option<VecDeque<String>> {
        match self.entries.get(key).await {
            Some(CacheValue::List(list)) => Some(list),
            _ => None,
        }
    }

    async fn set_members(&self, key: &str) -> Option<HashSet<String>> {
        match self.entries.get(key).await {
            Some(CacheValue::Set(set)) => Some(set),
            _ => None,
        }
    }

    async fn hash(&self, key: &str) -> Option<HashMap<String, String>> {
        match self.entries.get(key).await {
            Some(CacheValue::Hash(hash)) => Some(hash),
            _ => None,
        }
    }
}

impl Default for LocalCache {
    fn default() -> Self {
        Self::new(10_000)
    }
}

/// Write back a collection, dropping the key once it is empty
fn put_or_remove(value: CacheValue, empty: bool) -> Op<CacheValue> {
    if empty {
        Op::Remove
    } else {
        Op::Put(value)
    }
}

#[async_trait]
impl CacheBackend for LocalCache {
    fn id(&self) -> &str {
        "local"
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        self.entries
            .insert(
                key.to_string(),
                CacheValue::Scalar {
                    value: value.to_string(),
                    ttl,
                },
            )
            .await;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        match self.entries.get(key).await {
            Some(CacheValue::Scalar { value, .. }) => Ok(Some(value)),
            _ => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<u64> {
        // Expired but not yet evicted entries read as absent here, unlike `remove`
        Ok(self
            .mutate(key, |current| match current {
                Some(_) => (Op::Remove, 1),
                None => (Op::Nop, 0),
            })
            .await)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.entries.get(key).await.is_some())
    }

    async fn set_field(&self, key: &str, field: &str, value: &str) -> Result<u64> {
        Ok(self
            .mutate(key, |current| {
                let mut hash = match current {
                    Some(CacheValue::Hash(hash)) => hash,
                    _ => HashMap::new(),
                };
                let created = hash.insert(field.to_string(), value.to_string()).is_none();
                (Op::Put(CacheValue::Hash(hash)), u64::from(created))
            })
            .await)
    }

    async fn get_field(&self, key: &str, field: &str) -> Result<Option<String>> {
        Ok(self.hash(key).await.and_then(|mut hash| hash.remove(field)))
    }

    async fn get_all_fields(&self, key: &str) -> Result<HashMap<String, String>> {
        Ok(self.hash(key).await.unwrap_or_default())
    }

    async fn delete_field(&self, key: &str, field: &str) -> Result<u64> {
        Ok(self
            .mutate(key, |current| match current {
                Some(CacheValue::Hash(mut hash)) => {
                    let removed = hash.remove(field).is_some();
                    let empty = hash.is_empty();
                    (put_or_remove(CacheValue::Hash(hash), empty), u64::from(removed))
                }
                _ => (Op::Nop, 0),
            })
            .await)
    }

    async fn append(&self, key: &str, value: &str) -> Result<u64> {
        Ok(self
            .mutate(key, |current| {
                let mut list = match current {
                    Some(CacheValue::List(list)) => list,
                    _ => VecDeque::new(),
                };
                list.push_back(value.to_string());
                let len = list.len() as u64;
                (Op::Put(CacheValue::List(list)), len)
            })
            .await)
    }

    async fn prepend(&self, key: &str, values: &[String]) -> Result<u64> {
        Ok(self
            .mutate(key, |current| {
                let mut list = match current {
                    Some(CacheValue::List(list)) => list,
                    _ => VecDeque::new(),
                };
                for value in values {
                    list.push_front(value.clone());
                }
                let len = list.len() as u64;
                (Op::Put(CacheValue::List(list)), len)
            })
            .await)
    }

    async fn range(&self, key: &str, start: i64, end: i64) -> Result<Vec<String>> {
        let Some(list) = self.list(key).await else {
            return Ok(Vec::new());
        };
        Ok(match resolve_range(list.len(), start, end) {
            Some((from, to)) => list.into_iter().skip(from).take(to - from + 1).collect(),
            None => Vec::new(),
        })
    }

    async fn remove_from_list(&self, key: &str, value: &str) -> Result<u64> {
        Ok(self
            .mutate(key, |current| match current {
                Some(CacheValue::List(mut list)) => {
                    let before = list.len();
                    list.retain(|v| v != value);
                    let removed = (before - list.len()) as u64;
                    let empty = list.is_empty();
                    (put_or_remove(CacheValue::List(list), empty), removed)
                }
                _ => (Op::Nop, 0),
            })
            .await)
    }

    async fn add_members(&self, key: &str, members: &[String]) -> Result<u64> {
        Ok(self
            .mutate(key, |current| {
                let mut set = match current {
                    Some(CacheValue::Set(set)) => set,
                    _ => HashSet::new(),
                };
                let added = members.iter().filter(|m| set.insert((*m).clone())).count() as u64;
                (Op::Put(CacheValue::Set(set)), added)
            })
            .await)
    }

    async fn members(&self, key: &str) -> Result<Vec<String>> {
        Ok(self
            .set_members(key)
            .await
            .map(|set| set.into_iter().collect())
            .unwrap_or_default())
    }

    async fn is_member(&self, key: &str, member: &str) -> Result<bool> {
        Ok(self
            .set_members(key)
            .await
            .is_some_and(|set| set.contains(member)))
    }

    async fn remove_member(&self, key: &str, member: &str) -> Result<u64> {
        Ok(self
            .mutate(key, |current| match current {
                Some(CacheValue::Set(mut set)) => {
                    let removed = set.remove(member);
                    let empty = set.is_empty();
                    (put_or_remove(CacheValue::Set(set), empty), u64::from(removed))
                }
                _ => (Op::Nop, 0),
            })
            .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn test_scalar() {
        let cache = LocalCache::default();

        assert_eq!(cache.get("k").await.unwrap(), None);
        cache.set("k", "v", None).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));
        assert!(cache.exists("k").await.unwrap());

        assert_eq!(cache.delete("k").await.unwrap(), 1);
        assert_eq!(cache.delete("k").await.unwrap(), 0);
        assert!(!cache.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_scalar_ttl_expires() {
        let cache = LocalCache::default();
        cache.set("k", "v", Some(Duration::from_millis(200))).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_after_expiry_removes_nothing() {
        let cache = LocalCache::default();
        cache.set("k", "v", Some(Duration::from_millis(100))).await.unwrap();

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!cache.exists("k").await.unwrap());
        assert_eq!(cache.delete("k").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_set_without_ttl_clears_ttl() {
        let cache = LocalCache::default();
        cache.set("k", "v1", Some(Duration::from_millis(200))).await.unwrap();
        cache.set("k", "v2", None).await.unwrap();

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn test_hash() {
        let cache = LocalCache::default();

        assert_eq!(cache.set_field("h", "a", "1").await.unwrap(), 1);
        assert_eq!(cache.set_field("h", "a", "2").await.unwrap(), 0);
        assert_eq!(cache.set_field("h", "b", "3").await.unwrap(), 1);

        assert_eq!(cache.get_field("h", "a").await.unwrap().as_deref(), Some("2"));
        assert_eq!(cache.get_field("h", "zz").await.unwrap(), None);

        let all = cache.get_all_fields("h").await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all["b"], "3");
        assert!(cache.get_all_fields("missing").await.unwrap().is_empty());

        assert_eq!(cache.delete_field("h", "a").await.unwrap(), 1);
        assert_eq!(cache.delete_field("h", "a").await.unwrap(), 0);
        assert_eq!(cache.delete_field("h", "b").await.unwrap(), 1);
        assert!(!cache.exists("h").await.unwrap());
    }

    #[tokio::test]
    async fn test_list() {
        let cache = LocalCache::default();

        assert_eq!(cache.append("l", "b").await.unwrap(), 1);
        assert_eq!(cache.append("l", "c").await.unwrap(), 2);
        assert_eq!(cache.prepend("l", &strings(&["a", "z"])).await.unwrap(), 4);

        assert_eq!(cache.range("l", 0, -1).await.unwrap(), strings(&["z", "a", "b", "c"]));
        assert_eq!(cache.range("l", -2, -1).await.unwrap(), strings(&["b", "c"]));
        assert_eq!(cache.range("l", 1, 1).await.unwrap(), strings(&["a"]));
        assert!(cache.range("l", 3, 1).await.unwrap().is_empty());
        assert!(cache.range("missing", 0, -1).await.unwrap().is_empty());

        cache.append("l", "a").await.unwrap();
        assert_eq!(cache.remove_from_list("l", "a").await.unwrap(), 2);
        assert_eq!(cache.range("l", 0, -1).await.unwrap(), strings(&["z", "b", "c"]));
        assert_eq!(cache.remove_from_list("l", "nope").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_set() {
        let cache = LocalCache::default();

        assert_eq!(cache.add_members("s", &strings(&["a", "b", "a"])).await.unwrap(), 2);
        assert_eq!(cache.add_members("s", &strings(&["b", "c"])).await.unwrap(), 1);

        let mut members = cache.members("s").await.unwrap();
        members.sort();
        assert_eq!(members, strings(&["a", "b", "c"]));

        assert!(cache.is_member("s", "a").await.unwrap());
        assert!(!cache.is_member("s", "x").await.unwrap());
        assert!(!cache.is_member("missing", "a").await.unwrap());

        assert_eq!(cache.remove_member("s", "a").await.unwrap(), 1);
        assert_eq!(cache.remove_member("s", "a").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_wrong_shape() {
        let cache = LocalCache::default();
        cache.set("k", "v", Some(Duration::from_millis(200))).await.unwrap();

        // Reads of another shape see nothing
        assert!(cache.get_all_fields("k").await.unwrap().is_empty());
        assert!(cache.range("k", 0, -1).await.unwrap().is_empty());
        assert!(!cache.is_member("k", "v").await.unwrap());

        // Writes of another shape replace the value and its TTL
        assert_eq!(cache.append("k", "x").await.unwrap(), 1);
        assert_eq!(cache.get("k").await.unwrap(), None);

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(cache.range("k", 0, -1).await.unwrap(), strings(&["x"]));
    }
}
