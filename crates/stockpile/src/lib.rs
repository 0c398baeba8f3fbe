// Copyright (c) The Armature Project Authors.
// Licensed under the MIT License.

//! Keyed response caching with TTL, strict LRU eviction, and a Redis tier.
//!
//! This crate provides the caching half of a read-through client: a [`CacheBackend`] trait
//! over keyed values with per-entry TTL, an in-process [`MemoryCache`] with strict
//! least-recently-used eviction, and (behind the `redis` feature) a [`RedisCache`] that
//! persists entries in a shared Redis instance. Both tiers expose the same operations, so
//! callers stay agnostic to which one is installed.
//!
//! Request identity is computed with [`fingerprint`], a deterministic SHA-256 digest of the
//! method, URL, sorted query parameters, and an opt-in subset of headers. Server cache
//! metadata is handled by [`parse_cache_control`].
//!
//! ```
//! use std::time::Duration;
//! use pulse::Clock;
//! use stockpile::{CacheBackend, MemoryCache};
//!
//! # futures::executor::block_on(async {
//! let cache = MemoryCache::new(Clock::system())
//!     .with_max_size(128)
//!     .with_default_ttl(Some(Duration::from_secs(300)));
//!
//! cache.set("user:1", "alice".to_string(), None, None).await;
//! assert_eq!(cache.get("user:1").await, Some("alice".to_string()));
//! assert_eq!(cache.stats().hits, 1);
//! # });
//! ```

mod backend;
mod cache_control;
mod entry;
mod fingerprint;
mod memory;
#[cfg(feature = "redis")]
mod redis_cache;
mod stats;

pub use backend::CacheBackend;
pub use cache_control::{Directive, parse_cache_control, render_cache_control};
pub use entry::CacheEntry;
pub use fingerprint::fingerprint;
pub use memory::MemoryCache;
#[cfg(feature = "redis")]
pub use redis_cache::{RedisCache, RedisCacheConfig};
pub use stats::CacheStats;
