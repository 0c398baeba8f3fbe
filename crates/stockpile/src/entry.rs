// Copyright (c) The Armature Project Authors.
// Licensed under the MIT License.

use std::time::{Duration, SystemTime};

/// A cached value with expiry metadata.
///
/// An entry remembers when it was created and how long it lives. A `ttl` of `None` means the
/// entry never expires. Expiry is evaluated against a caller-provided notion of "now" so the
/// cache stays testable with a controlled clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry<V> {
    value: V,
    created_at: SystemTime,
    ttl: Option<Duration>,
    etag: Option<String>,
    last_accessed: Option<SystemTime>,
}

impl<V> CacheEntry<V> {
    /// Creates an entry with no expiry.
    pub fn new(value: V, created_at: SystemTime) -> Self {
        Self {
            value,
            created_at,
            ttl: None,
            etag: None,
            last_accessed: None,
        }
    }

    /// Sets the time to live. `None` means the entry never expires.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    /// Attaches the entity tag the server returned with the cached response.
    #[must_use]
    pub fn with_etag(mut self, etag: Option<String>) -> Self {
        self.etag = etag;
        self
    }

    /// Returns a reference to the cached value.
    #[must_use]
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Consumes the entry and returns the cached value.
    #[must_use]
    pub fn into_value(self) -> V {
        self.value
    }

    /// Returns when the entry was created.
    #[must_use]
    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// Returns the time to live, `None` meaning the entry never expires.
    #[must_use]
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Returns the entity tag, if any.
    #[must_use]
    pub fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    /// Returns when the entry was last read through the cache.
    #[must_use]
    pub fn last_accessed(&self) -> Option<SystemTime> {
        self.last_accessed
    }

    pub(crate) fn touch(&mut self, now: SystemTime) {
        self.last_accessed = Some(now);
    }

    /// Returns whether the entry has outlived its TTL at the given time.
    #[must_use]
    pub fn is_expired(&self, now: SystemTime) -> bool {
        match self.ttl {
            None => false,
            Some(ttl) => now
                .duration_since(self.created_at)
                .is_ok_and(|age| age >= ttl),
        }
    }

    /// Returns the remaining lifetime at the given time; `None` means unbounded.
    #[must_use]
    pub fn ttl_remaining(&self, now: SystemTime) -> Option<Duration> {
        let ttl = self.ttl?;
        let age = now.duration_since(self.created_at).unwrap_or_default();
        Some(ttl.saturating_sub(age))
    }
}
