//! Redis cache backend
//!
//! One multiplexed `ConnectionManager` shared by every command. Each
//! command is bounded by the configured command timeout; a timeout is
//! reported as a connection failure.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisResult};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tracing::info;

use crate::config::RedisConfig;
use crate::core::cache::CacheBackend;
use crate::error::{Error, Result};

/// Cache backend talking to a Redis server
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
    command_timeout: Duration,
}

impl RedisCache {
    /// Connect to the configured server
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        info!(address = %config.address(), db = config.db, "Connecting to Redis");

        let client = redis::Client::open(config.url())?;
        let conn = tokio::time::timeout(config.connect_timeout, client.get_connection_manager())
            .await
            .map_err(|_| {
                Error::Connection(format!(
                    "timed out connecting to Redis at {} after {:?}",
                    config.address(),
                    config.connect_timeout
                ))
            })??;

        info!("Redis connection established");
        Ok(RedisCache {
            conn,
            command_timeout: config.command_timeout,
        })
    }

    /// Run one command under the command timeout
    async fn run<T, F>(&self, command: &str, fut: F) -> Result<T>
    where
        F: Future<Output = RedisResult<T>>,
    {
        match tokio::time::timeout(self.command_timeout, fut).await {
            Ok(result) => result.map_err(Error::from),
            Err(_) => Err(Error::Connection(format!(
                "redis {} timed out after {:?}",
                command, self.command_timeout
            ))),
        }
    }
}

fn to_isize(n: i64) -> isize {
    isize::try_from(n).unwrap_or(if n < 0 { isize::MIN } else { isize::MAX })
}

#[async_trait]
impl CacheBackend for RedisCache {
    fn id(&self) -> &str {
        "redis"
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.conn.clone();
        match ttl {
            Some(ttl) => {
                let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
                self.run("PSETEX", conn.pset_ex::<_, _, ()>(key, value, millis)).await
            }
            None => self.run("SET", conn.set::<_, _, ()>(key, value)).await,
        }
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        self.run("GET", conn.get(key)).await
    }

    async fn delete(&self, key: &str) -> Result<u64> {
        let mut conn = self.conn.clone();
        self.run("DEL", conn.del(key)).await
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        self.run("EXISTS", conn.exists(key)).await
    }

    async fn set_field(&self, key: &str, field: &str, value: &str) -> Result<u64> {
        let mut conn = self.conn.clone();
        self.run("HSET", conn.hset(key, field, value)).await
    }

    async fn get_field(&self, key: &str, field: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        self.run("HGET", conn.hget(key, field)).await
    }

    async fn get_all_fields(&self, key: &str) -> Result<HashMap<String, String>> {
        let mut conn = self.conn.clone();
        self.run("HGETALL", conn.hgetall(key)).await
    }

    async fn delete_field(&self, key: &str, field: &str) -> Result<u64> {
        let mut conn = self.conn.clone();
        self.run("HDEL", conn.hdel(key, field)).await
    }

    async fn append(&self, key: &str, value: &str) -> Result<u64> {
        let mut conn = self.conn.clone();
        self.run("RPUSH", conn.rpush(key, value)).await
    }

    async fn prepend(&self, key: &str, values: &[String]) -> Result<u64> {
        let mut conn = self.conn.clone();
        self.run("LPUSH", conn.lpush(key, values)).await
    }

    async fn range(&self, key: &str, start: i64, end: i64) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        self.run("LRANGE", conn.lrange(key, to_isize(start), to_isize(end)))
            .await
    }

    async fn remove_from_list(&self, key: &str, value: &str) -> Result<u64> {
        let mut conn = self.conn.clone();
        self.run("LREM", conn.lrem(key, 0, value)).await
    }

    async fn add_members(&self, key: &str, members: &[String]) -> Result<u64> {
        let mut conn = self.conn.clone();
        self.run("SADD", conn.sadd(key, members)).await
    }

    async fn members(&self, key: &str) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        self.run("SMEMBERS", conn.smembers(key)).await
    }

    async fn is_member(&self, key: &str, member: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        self.run("SISMEMBER", conn.sismember(key, member)).await
    }

    async fn remove_member(&self, key: &str, member: &str) -> Result<u64> {
        let mut conn = self.conn.clone();
        self.run("SREM", conn.srem(key, member)).await
    }
}
