//! Cache module - typed key/value cache with an explicit connection lifecycle
//!
//! `CacheLayer` is constructed disconnected, connected once at startup and
//! disconnected at shutdown. Every operation in between goes through the
//! one shared backend; outside that window operations fail with
//! `Error::Connection`.
//!
//! Backends:
//! - `LocalCache`: in-process (moka)
//! - `RedisCache`: shared Redis server

mod local;
mod redis;

pub use local::{CacheValue, LocalCache};
pub use self::redis::RedisCache;

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::{CacheBackendType, CacheConfig};
use crate::core::CacheBackend;
use crate::error::{Error, Result};

/// Open the backend selected by configuration
pub async fn open_backend(config: &CacheConfig) -> Result<Arc<dyn CacheBackend>> {
    match config.backend {
        CacheBackendType::Local => Ok(Arc::new(LocalCache::new(config.local.max_capacity))),
        CacheBackendType::Redis => Ok(Arc::new(RedisCache::connect(&config.redis).await?)),
    }
}

fn validate_ttl(ttl: Option<Duration>) -> Result<()> {
    if ttl.is_some_and(|t| t.is_zero()) {
        return Err(Error::Validation("ttl must be positive".into()));
    }
    Ok(())
}

fn require_values(name: &str, values: &[String]) -> Result<()> {
    if values.is_empty() {
        return Err(Error::Validation(format!("at least one {} is required", name)));
    }
    Ok(())
}

/// Typed cache over a shared backend connection
#[derive(Default)]
pub struct CacheLayer {
    backend: RwLock<Option<Arc<dyn CacheBackend>>>,
}

impl CacheLayer {
    /// Create a disconnected cache layer
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a layer already attached to `backend`
    pub fn with_backend(backend: Arc<dyn CacheBackend>) -> Self {
        CacheLayer {
            backend: RwLock::new(Some(backend)),
        }
    }

    /// Connect using configuration; a no-op when already connected
    pub async fn connect(&self, config: &CacheConfig) -> Result<()> {
        let mut slot = self.backend.write().await;
        if slot.is_some() {
            debug!("Cache already connected");
            return Ok(());
        }

        let backend = open_backend(config).await?;
        info!(backend = backend.id(), "Cache connected");
        *slot = Some(backend);
        Ok(())
    }

    /// Attach an already-open backend, replacing any current one
    pub async fn attach(&self, backend: Arc<dyn CacheBackend>) {
        info!(backend = backend.id(), "Cache attached");
        *self.backend.write().await = Some(backend);
    }

    /// Release the connection; later operations fail with `Error::Connection`
    pub async fn disconnect(&self) -> Result<()> {
        let backend = self.backend.write().await.take();
        if let Some(backend) = backend {
            backend.close().await?;
            info!(backend = backend.id(), "Cache disconnected");
        }
        Ok(())
    }

    /// Whether a backend is attached
    pub async fn is_connected(&self) -> bool {
        self.backend.read().await.is_some()
    }

    async fn backend(&self) -> Result<Arc<dyn CacheBackend>> {
        self.backend
            .read()
            .await
            .clone()
            .ok_or_else(|| Error::Connection("cache is not connected".into()))
    }

    // --- scalar ---

    /// Set a scalar; `None` TTL persists until deleted or evicted
    pub async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        validate_ttl(ttl)?;
        self.backend().await?.set(key, value, ttl).await
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        self.backend().await?.get(key).await
    }

    pub async fn delete(&self, key: &str) -> Result<u64> {
        self.backend().await?.delete(key).await
    }

    pub async fn exists(&self, key: &str) -> Result<bool> {
        self.backend().await?.exists(key).await
    }

    /// Store a value as a JSON scalar
    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) -> Result<()> {
        let encoded = serde_json::to_string(value)?;
        self.set(key, &encoded, ttl).await
    }

    /// Read a JSON scalar written by [`CacheLayer::set_json`]
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    // --- hash ---

    pub async fn set_field(&self, key: &str, field: &str, value: &str) -> Result<u64> {
        self.backend().await?.set_field(key, field, value).await
    }

    pub async fn get_field(&self, key: &str, field: &str) -> Result<Option<String>> {
        self.backend().await?.get_field(key, field).await
    }

    pub async fn get_all_fields(&self, key: &str) -> Result<HashMap<String, String>> {
        self.backend().await?.get_all_fields(key).await
    }

    pub async fn delete_field(&self, key: &str, field: &str) -> Result<u64> {
        self.backend().await?.delete_field(key, field).await
    }

    // --- list ---

    pub async fn append(&self, key: &str, value: &str) -> Result<u64> {
        self.backend().await?.append(key, value).await
    }

    pub async fn prepend(&self, key: &str, values: &[String]) -> Result<u64> {
        require_values("value", values)?;
        self.backend().await?.prepend(key, values).await
    }

    pub async fn range(&self, key: &str, start: i64, end: i64) -> Result<Vec<String>> {
        self.backend().await?.range(key, start, end).await
    }

    pub async fn remove_from_list(&self, key: &str, value: &str) -> Result<u64> {
        self.backend().await?.remove_from_list(key, value).await
    }

    // --- set ---

    pub async fn add_members(&self, key: &str, members: &[String]) -> Result<u64> {
        require_values("member", members)?;
        self.backend().await?.add_members(key, members).await
    }

    pub async fn members(&self, key: &str) -> Result<Vec<String>> {
        self.backend().await?.members(key).await
    }

    pub async fn is_member(&self, key: &str, member: &str) -> Result<bool> {
        self.backend().await?.is_member(key, member).await
    }

    pub async fn remove_member(&self, key: &str, member: &str) -> Result<u64> {
        self.backend().await?.remove_member(key, member).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    async fn connected() -> CacheLayer {
        let cache = CacheLayer::new();
        cache.connect(&CacheConfig::default()).await.unwrap();
        cache
    }

    #[tokio::test]
    async fn test_set_get_with_ttl() {
        let cache = connected().await;

        assert_ok!(cache.set("k", "v", Some(Duration::from_secs(1))).await);
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_expired_key_counts_zero() {
        let cache = connected().await;
        cache.set("gone", "v", Some(Duration::from_millis(100))).await.unwrap();
        cache.set("kept", "v", None).await.unwrap();

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(cache.delete("gone").await.unwrap(), 0);
        assert_eq!(cache.delete("kept").await.unwrap(), 1);
        assert!(!cache.exists("kept").await.unwrap());
    }

    #[tokio::test]
    async fn test_operations_before_connect_fail() {
        let cache = CacheLayer::new();
        assert!(!cache.is_connected().await);

        assert!(matches!(cache.get("k").await, Err(Error::Connection(_))));
        assert!(matches!(cache.set_field("h", "f", "v").await, Err(Error::Connection(_))));
        assert!(matches!(cache.append("l", "v").await, Err(Error::Connection(_))));
        assert!(matches!(cache.members("s").await, Err(Error::Connection(_))));
    }

    #[tokio::test]
    async fn test_operations_after_disconnect_fail() {
        let cache = connected().await;
        cache.set("k", "v", None).await.unwrap();

        cache.disconnect().await.unwrap();
        assert!(!cache.is_connected().await);
        assert!(matches!(cache.get("k").await, Err(Error::Connection(_))));

        // Disconnecting twice is harmless
        assert_ok!(cache.disconnect().await);
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let cache = connected().await;
        cache.set("k", "v", None).await.unwrap();
        cache.connect(&CacheConfig::default()).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_validation() {
        let cache = connected().await;
        assert!(matches!(
            cache.set("k", "v", Some(Duration::ZERO)).await,
            Err(Error::Validation(_))
        ));
        assert!(matches!(cache.prepend("l", &[]).await, Err(Error::Validation(_))));
        assert!(matches!(cache.add_members("s", &[]).await, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_json_round_trip() {
        let cache = CacheLayer::with_backend(Arc::new(LocalCache::default()));
        cache.set_json("vec", &vec![0.5f32, -1.0], None).await.unwrap();

        let vector: Option<Vec<f32>> = cache.get_json("vec").await.unwrap();
        assert_eq!(vector, Some(vec![0.5, -1.0]));
        assert_eq!(cache.get_json::<Vec<f32>>("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_sub_apis_share_connection() {
        let cache = connected().await;

        assert_eq!(cache.set_field("user:1", "name", "ada").await.unwrap(), 1);
        assert_eq!(cache.append("queue", "job-1").await.unwrap(), 1);
        assert_eq!(cache.add_members("tags", &["a".into(), "b".into()]).await.unwrap(), 2);

        assert_eq!(cache.get_field("user:1", "name").await.unwrap().as_deref(), Some("ada"));
        assert_eq!(cache.range("queue", 0, -1).await.unwrap(), vec!["job-1".to_string()]);
        assert!(cache.is_member("tags", "b").await.unwrap());
        assert_eq!(cache.remove_member("tags", "b").await.unwrap(), 1);
        assert!(cache.exists("queue").await.unwrap());
    }
}
