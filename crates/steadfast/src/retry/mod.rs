// Copyright (c) The Armature Project Authors.
// Licensed under the MIT License.

//! Retry decision making: backoff delays, eligibility, and statistics.
//!
//! The retry engine is pure decision logic. Callers drive the attempt loop, present each
//! outcome, and perform the waiting themselves:
//!
//! ```
//! use std::time::Duration;
//! use steadfast::{BackoffPolicy, RetryPolicy};
//!
//! let policy = RetryPolicy::new()
//!     .with_max_attempts(3)
//!     .with_backoff(
//!         BackoffPolicy::new()
//!             .with_initial_delay(Duration::from_secs(1))
//!             .with_multiplier(2.0)
//!             .with_jitter(false),
//!     );
//! policy.validate().unwrap();
//!
//! // Delays between attempts grow exponentially: 1s after attempt 1, 2s after attempt 2.
//! assert_eq!(policy.backoff_ref().delay_for(1), Duration::from_secs(1));
//! assert_eq!(policy.backoff_ref().delay_for(2), Duration::from_secs(2));
//! ```
//!
//! A server-provided `Retry-After` (see [`parse_retry_after`]) takes precedence over the
//! computed backoff when the policy allows it, capped by
//! [`max_retry_after`][RetryPolicy::max_retry_after].

mod backoff;
mod policy;
mod retry_after;
mod stats;

pub use backoff::BackoffPolicy;
pub use policy::RetryPolicy;
pub use retry_after::parse_retry_after;
pub use stats::RetryStats;
