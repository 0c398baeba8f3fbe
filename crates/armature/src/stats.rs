// Copyright (c) The Armature Project Authors.
// Licensed under the MIT License.

use std::sync::atomic::{AtomicU64, Ordering};

/// A snapshot of the client-wide counters.
///
/// Counters are monotonic and mutated only by the execution pipeline; [`reset`][crate::Client::reset_stats]
/// is the single explicit exception.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct ClientStats {
    /// Physical attempts issued (one per retry-loop iteration).
    pub total_requests: u64,
    /// Calls that completed with a success response.
    pub successful_requests: u64,
    /// Attempts that failed in the transport.
    pub failed_requests: u64,
    /// Retries performed (delays actually slept).
    pub total_retries: u64,
    /// Calls answered from the cache without touching the network.
    pub cache_hits: u64,
    /// Cacheable calls that had to go to the network.
    pub cache_misses: u64,
    /// Calls denied by the circuit breaker.
    pub circuit_breaker_trips: u64,
}

impl ClientStats {
    /// Returns the fraction of attempts that ended in a success response.
    #[must_use]
    #[expect(clippy::cast_precision_loss, reason = "counters stay far below 2^52")]
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        self.successful_requests as f64 / self.total_requests as f64
    }

    /// Returns the fraction of cacheable calls answered from the cache.
    #[must_use]
    #[expect(clippy::cast_precision_loss, reason = "counters stay far below 2^52")]
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            return 0.0;
        }
        self.cache_hits as f64 / total as f64
    }
}

/// A compact retry-behavior summary derived from the client counters.
#[derive(Debug, Clone, Copy, PartialEq)]
#[non_exhaustive]
pub struct RetrySummary {
    /// Physical attempts issued.
    pub total_requests: u64,
    /// Calls that completed with a success response.
    pub successful: u64,
    /// Attempts that failed in the transport.
    pub failed: u64,
    /// Retries performed.
    pub total_retries: u64,
    /// Average retries per attempt.
    pub avg_retries: f64,
    /// Calls denied by the circuit breaker.
    pub circuit_breaker_trips: u64,
}

/// The live counters behind [`ClientStats`], shared across concurrent calls.
#[derive(Debug, Default)]
pub(crate) struct StatsCells {
    pub total_requests: AtomicU64,
    pub successful_requests: AtomicU64,
    pub failed_requests: AtomicU64,
    pub total_retries: AtomicU64,
    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,
    pub circuit_breaker_trips: AtomicU64,
}

impl StatsCells {
    pub fn snapshot(&self) -> ClientStats {
        ClientStats {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            total_retries: self.total_retries.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            circuit_breaker_trips: self.circuit_breaker_trips.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.total_requests.store(0, Ordering::Relaxed);
        self.successful_requests.store(0, Ordering::Relaxed);
        self.failed_requests.store(0, Ordering::Relaxed);
        self.total_retries.store(0, Ordering::Relaxed);
        self.cache_hits.store(0, Ordering::Relaxed);
        self.cache_misses.store(0, Ordering::Relaxed);
        self.circuit_breaker_trips.store(0, Ordering::Relaxed);
    }

    #[expect(clippy::cast_precision_loss, reason = "counters stay far below 2^52")]
    pub fn retry_summary(&self) -> RetrySummary {
        let snapshot = self.snapshot();
        let avg_retries = if snapshot.total_requests == 0 {
            0.0
        } else {
            snapshot.total_retries as f64 / snapshot.total_requests as f64
        };

        RetrySummary {
            total_requests: snapshot.total_requests,
            successful: snapshot.successful_requests,
            failed: snapshot.failed_requests,
            total_retries: snapshot.total_retries,
            avg_retries,
            circuit_breaker_trips: snapshot.circuit_breaker_trips,
        }
    }
}
