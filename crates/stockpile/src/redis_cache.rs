// Copyright (c) The Armature Project Authors.
// Licensed under the MIT License.

use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use pulse::Clock;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;

use crate::{CacheBackend, CacheEntry, CacheStats};

const DEFAULT_TTL: Duration = Duration::from_secs(300);
const SCAN_DELETE_CHUNK: usize = 100;

/// Connection settings for [`RedisCache`].
#[derive(Debug, Clone)]
pub struct RedisCacheConfig {
    /// Redis host name.
    pub host: String,
    /// Redis port.
    pub port: u16,
    /// Database index.
    pub db: i64,
    /// Optional password.
    pub password: Option<String>,
    /// TTL applied when a write does not carry its own. `None` disables expiry.
    pub default_ttl: Option<Duration>,
    /// Prefix prepended to every key, isolating caches that share an instance.
    pub namespace: String,
}

impl Default for RedisCacheConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_owned(),
            port: 6379,
            db: 0,
            password: None,
            default_ttl: Some(DEFAULT_TTL),
            namespace: "armature".to_owned(),
        }
    }
}

impl RedisCacheConfig {
    fn url(&self) -> String {
        match &self.password {
            Some(password) => format!(
                "redis://:{password}@{}:{}/{}",
                self.host, self.port, self.db
            ),
            None => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }
}

/// Cache tier backed by a shared Redis instance.
///
/// Values are serialized as JSON and stored under namespaced keys, with the effective TTL
/// applied at write time through Redis expiry. The connection is established lazily on the
/// first operation and multiplexed afterwards.
///
/// Operations are best-effort: an unreachable server is reported through `tracing` and
/// behaves as a miss on reads and a no-op on writes, so an ailing cache never takes the
/// client down with it.
pub struct RedisCache<V> {
    config: RedisCacheConfig,
    client: redis::Client,
    connection: OnceCell<ConnectionManager>,
    clock: Clock,
    stats: Mutex<CacheStats>,
    _values: PhantomData<fn() -> V>,
}

impl<V> std::fmt::Debug for RedisCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache")
            .field("namespace", &self.config.namespace)
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .finish_non_exhaustive()
    }
}

impl<V> RedisCache<V> {
    /// Creates the cache. The connection is not established until first use.
    ///
    /// # Errors
    ///
    /// Returns the underlying error when the connection settings are malformed.
    pub fn new(config: RedisCacheConfig, clock: Clock) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(config.url().as_str())?;
        Ok(Self {
            config,
            client,
            connection: OnceCell::new(),
            clock,
            stats: Mutex::new(CacheStats::default()),
            _values: PhantomData,
        })
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{key}", self.config.namespace)
    }

    async fn connection(&self) -> Result<ConnectionManager, redis::RedisError> {
        self.connection
            .get_or_try_init(|| ConnectionManager::new(self.client.clone()))
            .await
            .cloned()
    }
}

#[async_trait]
impl<V> CacheBackend<V> for RedisCache<V>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Option<V> {
        let key = self.namespaced(key);

        let stored: Option<String> = match self.connection().await {
            Ok(mut connection) => match connection.get(&key).await {
                Ok(stored) => stored,
                Err(error) => {
                    tracing::warn!(%error, key, "redis get failed");
                    None
                }
            },
            Err(error) => {
                tracing::warn!(%error, "redis connection failed");
                None
            }
        };

        let value = stored.and_then(|raw| match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(error) => {
                tracing::warn!(%error, key, "cached value failed to deserialize");
                None
            }
        });

        let mut stats = self.stats.lock();
        if value.is_some() {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }

        value
    }

    async fn set(&self, key: &str, value: V, ttl: Option<Duration>, _etag: Option<String>) {
        let key = self.namespaced(key);
        let effective_ttl = ttl.map_or(self.config.default_ttl, Some);

        let serialized = match serde_json::to_string(&value) {
            Ok(serialized) => serialized,
            Err(error) => {
                tracing::warn!(%error, key, "value failed to serialize");
                return;
            }
        };

        let Ok(mut connection) = self.connection().await.map_err(log_connection_error) else {
            return;
        };

        let outcome: Result<(), redis::RedisError> = match effective_ttl {
            Some(ttl) if ttl > Duration::ZERO => {
                connection
                    .set_ex(&key, serialized, ttl.as_secs().max(1))
                    .await
            }
            _ => connection.set(&key, serialized).await,
        };

        match outcome {
            Ok(()) => self.stats.lock().sets += 1,
            Err(error) => tracing::warn!(%error, key, "redis set failed"),
        }
    }

    async fn delete(&self, key: &str) -> bool {
        let key = self.namespaced(key);

        let Ok(mut connection) = self.connection().await.map_err(log_connection_error) else {
            return false;
        };

        match connection.del::<_, i64>(&key).await {
            Ok(removed) if removed > 0 => {
                self.stats.lock().deletes += 1;
                true
            }
            Ok(_) => false,
            Err(error) => {
                tracing::warn!(%error, key, "redis delete failed");
                false
            }
        }
    }

    async fn exists(&self, key: &str) -> bool {
        let key = self.namespaced(key);

        let Ok(mut connection) = self.connection().await.map_err(log_connection_error) else {
            return false;
        };

        match connection.exists(&key).await {
            Ok(exists) => exists,
            Err(error) => {
                tracing::warn!(%error, key, "redis exists failed");
                false
            }
        }
    }

    async fn clear(&self) {
        let pattern = format!("{}:*", self.config.namespace);

        let Ok(mut connection) = self.connection().await.map_err(log_connection_error) else {
            return;
        };

        let keys: Vec<String> = {
            let mut iter = match connection.scan_match::<_, String>(&pattern).await {
                Ok(iter) => iter,
                Err(error) => {
                    tracing::warn!(%error, pattern, "redis scan failed");
                    return;
                }
            };

            let mut keys = Vec::new();
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
            keys
        };

        let Ok(mut connection) = self.connection().await.map_err(log_connection_error) else {
            return;
        };

        for chunk in keys.chunks(SCAN_DELETE_CHUNK) {
            if let Err(error) = connection.del::<_, i64>(chunk).await {
                tracing::warn!(%error, "redis bulk delete failed");
            }
        }
    }

    async fn entry(&self, key: &str) -> Option<CacheEntry<V>> {
        let namespaced = self.namespaced(key);

        let Ok(mut connection) = self.connection().await.map_err(log_connection_error) else {
            return None;
        };

        let stored: Option<String> = connection.get(&namespaced).await.ok()?;
        let value: V = serde_json::from_str(stored.as_deref()?).ok()?;

        // Redis does not retain the creation time, so the entry is reconstructed with the
        // read time and the remaining TTL reported by the server.
        let ttl = match connection.ttl::<_, i64>(&namespaced).await {
            Ok(seconds) if seconds >= 0 => u64::try_from(seconds).ok().map(Duration::from_secs),
            _ => None,
        };

        Some(CacheEntry::new(value, self.clock.now()).with_ttl(ttl))
    }

    fn stats(&self) -> CacheStats {
        *self.stats.lock()
    }
}

fn log_connection_error(error: redis::RedisError) {
    tracing::warn!(%error, "redis connection failed");
}
