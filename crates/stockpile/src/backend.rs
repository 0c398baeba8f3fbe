// Copyright (c) The Armature Project Authors.
// Licensed under the MIT License.

use std::time::Duration;

use async_trait::async_trait;

use crate::{CacheEntry, CacheStats};

/// Abstract cache operations shared by every tier.
///
/// Implementations are best-effort: a backend that cannot reach its store behaves as a miss
/// on reads and a no-op on writes rather than surfacing transport errors to the caller. The
/// in-process tier is [`MemoryCache`][crate::MemoryCache]; the `redis` feature adds
/// [`RedisCache`][crate::RedisCache].
///
/// Keys are plain strings; implementations prepend their configured namespace so that tiers
/// sharing a store stay isolated.
#[async_trait]
pub trait CacheBackend<V>: Send + Sync
where
    V: Clone + Send + Sync + 'static,
{
    /// Returns the live value stored under `key`, recording a hit or miss.
    async fn get(&self, key: &str) -> Option<V>;

    /// Stores `value` under `key`.
    ///
    /// `ttl` overrides the backend's default time to live when given; configure the
    /// backend with no default to make entries immortal.
    async fn set(&self, key: &str, value: V, ttl: Option<Duration>, etag: Option<String>);

    /// Removes the value stored under `key`. Returns whether something was removed.
    async fn delete(&self, key: &str) -> bool;

    /// Returns whether a live value is stored under `key`, without touching recency.
    async fn exists(&self, key: &str) -> bool;

    /// Removes every entry in this backend's namespace.
    async fn clear(&self);

    /// Returns the stored entry with its metadata, without touching recency or stats.
    async fn entry(&self, key: &str) -> Option<CacheEntry<V>>;

    /// Returns a snapshot of the operation counters.
    fn stats(&self) -> CacheStats;
}
