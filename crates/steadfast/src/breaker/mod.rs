// Copyright (c) The Armature Project Authors.
// Licensed under the MIT License.

//! Circuit breaking for preventing cascading failures.
//!
//! A [`CircuitBreaker`] tracks the health of a downstream dependency through three states:
//!
//! - **Closed**: normal operation; consecutive failures are counted.
//! - **Open**: the failure threshold was reached; requests are rejected without being
//!   attempted until the recovery timeout elapses.
//! - **Half-open**: a probe window after recovery; successes accumulate toward closing the
//!   circuit again, and any failure reopens it immediately.
//!
//! The breaker never executes anything itself. Callers ask for permission with
//! [`CircuitBreaker::allow_request`], run the operation, and report the outcome with
//! [`CircuitBreaker::record_success`] or [`CircuitBreaker::record_failure`]:
//!
//! ```
//! use pulse::Clock;
//! use steadfast::breaker::{BreakerConfig, CircuitBreaker, CircuitState, FailureKind};
//!
//! let breaker = CircuitBreaker::new(
//!     BreakerConfig::new().with_failure_threshold(2),
//!     Clock::system(),
//! )
//! .unwrap();
//!
//! assert!(breaker.allow_request());
//! breaker.record_failure(Some(FailureKind::Connection));
//! breaker.record_failure(Some(FailureKind::Connection));
//!
//! assert_eq!(breaker.state(), CircuitState::Open);
//! assert!(!breaker.allow_request());
//! ```
//!
//! State-change listeners run synchronously under the transition, so they observe every
//! change in order; they should be fast and must not call back into mutating breaker
//! operations. Read-only accessors ([`CircuitBreaker::state`], [`CircuitBreaker::snapshot`],
//! [`CircuitBreaker::metrics`]) are lock-free and safe to call from a listener.

mod config;
mod machine;

pub use config::{BreakerConfig, FailureKind};
pub use machine::{BreakerMetrics, BreakerSnapshot, CircuitBreaker, CircuitState, ListenerId};
