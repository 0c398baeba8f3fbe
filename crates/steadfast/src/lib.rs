// Copyright (c) The Armature Project Authors.
// Licensed under the MIT License.

//! Retry and circuit breaking primitives for fault-prone remote calls.
//!
//! This crate provides the decision-making half of a resilient client: given the outcome of an
//! attempt against a remote service, it answers whether another attempt is worthwhile, how long
//! to wait before it, and whether the service should be considered unhealthy.
//!
//! # Core Types
//!
//! - [`RetryPolicy`] and [`BackoffPolicy`] decide retry eligibility and inter-attempt delays
//!   (exponential backoff with symmetric jitter, `Retry-After` overrides).
//! - [`CircuitBreaker`] is a three-state machine ([`CircuitState`]) that gates attempts,
//!   counting failures and recoveries.
//! - [`RetryStats`] aggregates attempt outcomes across calls.
//!
//! The crate performs no I/O and never sleeps; callers own the attempt loop and use
//! [`pulse::Clock`] for the actual waiting. This keeps every decision deterministic and
//! testable.

pub mod breaker;
pub mod retry;
mod rnd;

pub use breaker::{
    BreakerConfig, BreakerMetrics, BreakerSnapshot, CircuitBreaker, CircuitState, FailureKind,
    ListenerId,
};
pub use retry::{BackoffPolicy, RetryPolicy, RetryStats, parse_retry_after};

/// An invalid configuration value was rejected at construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid configuration: {reason}")]
pub struct ConfigError {
    reason: String,
}

impl ConfigError {
    /// Creates an error describing the rejected value.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Returns a human-readable description of the rejected value.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

#[cfg(test)]
mod tests {
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;

    #[test]
    fn assert_types() {
        assert_impl_all!(ConfigError: Debug, Clone, Send, Sync, std::error::Error);
        assert_impl_all!(CircuitBreaker: Send, Sync);
        assert_impl_all!(RetryPolicy: Debug, Clone, Send, Sync);
    }

    #[test]
    fn config_error_display() {
        let err = ConfigError::new("max_attempts must be at least 1");
        assert_eq!(
            err.to_string(),
            "invalid configuration: max_attempts must be at least 1"
        );
        assert_eq!(err.reason(), "max_attempts must be at least 1");
    }
}
