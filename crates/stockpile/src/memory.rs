// Copyright (c) The Armature Project Authors.
// Licensed under the MIT License.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use pulse::Clock;

use crate::{CacheBackend, CacheEntry, CacheStats};

const DEFAULT_TTL: Duration = Duration::from_secs(300);
const DEFAULT_MAX_SIZE: usize = 1000;

/// In-process cache with per-entry TTL and strict LRU eviction.
///
/// Entries are kept in access order: every read or write moves the entry to the
/// most-recently-used position, and capacity pressure always evicts the least recently used
/// entry first. Expired entries are swept lazily on every lookup and counted as evictions.
///
/// The cache is safe to share across tasks; the index is guarded by a mutex and no lock is
/// held across an await point.
#[derive(Debug)]
pub struct MemoryCache<V> {
    default_ttl: Option<Duration>,
    max_size: usize,
    namespace: String,
    clock: Clock,
    core: Mutex<Core<V>>,
}

#[derive(Debug)]
struct Core<V> {
    // Access order: least recently used at the front, most recent at the back.
    entries: Vec<(String, CacheEntry<V>)>,
    stats: CacheStats,
}

impl<V> MemoryCache<V> {
    /// Creates a cache with the defaults: 300s TTL, 1000 entries, no namespace.
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self {
            default_ttl: Some(DEFAULT_TTL),
            max_size: DEFAULT_MAX_SIZE,
            namespace: String::new(),
            clock,
            core: Mutex::new(Core {
                entries: Vec::new(),
                stats: CacheStats::default(),
            }),
        }
    }

    /// Sets the TTL applied when a write does not carry its own. `None` disables expiry.
    #[must_use]
    pub fn with_default_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Sets the maximum number of entries. Values below 1 are treated as 1.
    #[must_use]
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size.max(1);
        self
    }

    /// Sets the prefix prepended to every key.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Returns the number of entries currently stored, including not-yet-swept expired ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.core.lock().entries.len()
    }

    /// Returns whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.core.lock().entries.is_empty()
    }

    fn namespaced(&self, key: &str) -> String {
        if self.namespace.is_empty() {
            key.to_owned()
        } else {
            format!("{}:{key}", self.namespace)
        }
    }
}

impl<V> Core<V> {
    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == key)
    }

    fn sweep_expired(&mut self, now: std::time::SystemTime) {
        let before = self.entries.len();
        self.entries.retain(|(_, entry)| !entry.is_expired(now));
        self.stats.evictions += u64::try_from(before - self.entries.len()).unwrap_or(u64::MAX);
    }

    fn evict_lru(&mut self, max_size: usize) {
        while self.entries.len() >= max_size && !self.entries.is_empty() {
            self.entries.remove(0);
            self.stats.evictions += 1;
        }
    }
}

#[async_trait]
impl<V> CacheBackend<V> for MemoryCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Option<V> {
        let key = self.namespaced(key);
        let now = self.clock.now();
        let mut core = self.core.lock();

        core.sweep_expired(now);

        let Some(position) = core.position(&key) else {
            core.stats.misses += 1;
            return None;
        };

        // Move to the most-recently-used position.
        let (key, mut entry) = core.entries.remove(position);
        entry.touch(now);
        let value = entry.value().clone();
        core.entries.push((key, entry));
        core.stats.hits += 1;

        Some(value)
    }

    async fn set(&self, key: &str, value: V, ttl: Option<Duration>, etag: Option<String>) {
        let key = self.namespaced(key);
        let now = self.clock.now();
        let effective_ttl = ttl.map_or(self.default_ttl, Some);

        let mut entry = CacheEntry::new(value, now)
            .with_ttl(effective_ttl)
            .with_etag(etag);
        entry.touch(now);

        let mut core = self.core.lock();
        core.evict_lru(self.max_size);

        if let Some(position) = core.position(&key) {
            core.entries.remove(position);
        }
        core.entries.push((key, entry));
        core.stats.sets += 1;
    }

    async fn delete(&self, key: &str) -> bool {
        let key = self.namespaced(key);
        let mut core = self.core.lock();

        let Some(position) = core.position(&key) else {
            return false;
        };
        core.entries.remove(position);
        core.stats.deletes += 1;
        true
    }

    async fn exists(&self, key: &str) -> bool {
        let key = self.namespaced(key);
        let now = self.clock.now();
        let mut core = self.core.lock();

        let Some(position) = core.position(&key) else {
            return false;
        };
        if core.entries[position].1.is_expired(now) {
            core.entries.remove(position);
            return false;
        }
        true
    }

    async fn clear(&self) {
        self.core.lock().entries.clear();
    }

    async fn entry(&self, key: &str) -> Option<CacheEntry<V>> {
        let key = self.namespaced(key);
        let core = self.core.lock();
        core.position(&key).map(|position| core.entries[position].1.clone())
    }

    fn stats(&self) -> CacheStats {
        self.core.lock().stats
    }
}
