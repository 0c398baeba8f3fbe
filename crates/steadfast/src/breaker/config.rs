// Copyright (c) The Armature Project Authors.
// Licensed under the MIT License.

use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::time::Duration;

use crate::ConfigError;

const DEFAULT_FAILURE_THRESHOLD: u32 = 5;
const DEFAULT_SUCCESS_THRESHOLD: u32 = 2;
const DEFAULT_RECOVERY_TIMEOUT: Duration = Duration::from_secs(60);

/// Classifies the cause of a recorded failure.
///
/// The breaker can be configured to count only certain kinds of failure against its
/// threshold, e.g. to open on connection failures but ignore timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum FailureKind {
    /// The attempt exceeded its deadline.
    Timeout,

    /// The connection could not be established.
    Connection,

    /// The server answered with a failure status.
    Status,

    /// The server rejected the request due to rate limiting.
    RateLimit,

    /// Any other transport-level failure.
    Transport,
}

impl Display for FailureKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::Connection => write!(f, "connection"),
            Self::Status => write!(f, "status"),
            Self::RateLimit => write!(f, "rate_limit"),
            Self::Transport => write!(f, "transport"),
        }
    }
}

/// Configuration for a [`CircuitBreaker`][super::CircuitBreaker].
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    failure_threshold: u32,
    success_threshold: u32,
    recovery_timeout: Duration,
    expected_kinds: Option<HashSet<FailureKind>>,
    excluded_kinds: HashSet<FailureKind>,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl BreakerConfig {
    /// Creates a configuration with the defaults: open after 5 failures, close after 2
    /// half-open successes, 60s recovery timeout, every failure kind counted.
    #[must_use]
    pub fn new() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            success_threshold: DEFAULT_SUCCESS_THRESHOLD,
            recovery_timeout: DEFAULT_RECOVERY_TIMEOUT,
            expected_kinds: None,
            excluded_kinds: HashSet::new(),
        }
    }

    /// Sets how many failures open the circuit.
    #[must_use]
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Sets how many half-open successes close the circuit.
    #[must_use]
    pub fn with_success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold;
        self
    }

    /// Sets how long the circuit stays open before a probe is permitted.
    #[must_use]
    pub fn with_recovery_timeout(mut self, timeout: Duration) -> Self {
        self.recovery_timeout = timeout;
        self
    }

    /// Restricts failure counting to the given kinds. Without this, every kind counts.
    #[must_use]
    pub fn with_expected_kinds(mut self, kinds: impl IntoIterator<Item = FailureKind>) -> Self {
        self.expected_kinds = Some(kinds.into_iter().collect());
        self
    }

    /// Excludes the given kinds from failure counting.
    #[must_use]
    pub fn with_excluded_kinds(mut self, kinds: impl IntoIterator<Item = FailureKind>) -> Self {
        self.excluded_kinds = kinds.into_iter().collect();
        self
    }

    /// Returns how many failures open the circuit.
    #[must_use]
    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    /// Returns how many half-open successes close the circuit.
    #[must_use]
    pub fn success_threshold(&self) -> u32 {
        self.success_threshold
    }

    /// Returns how long the circuit stays open before a probe is permitted.
    #[must_use]
    pub fn recovery_timeout(&self) -> Duration {
        self.recovery_timeout
    }

    /// Returns whether a failure with the given cause counts against the threshold.
    ///
    /// A failure without a cause always counts.
    #[must_use]
    pub fn counts(&self, kind: Option<FailureKind>) -> bool {
        let Some(kind) = kind else {
            return true;
        };

        if self.excluded_kinds.contains(&kind) {
            return false;
        }

        self.expected_kinds
            .as_ref()
            .is_none_or(|expected| expected.contains(&kind))
    }

    /// Rejects nonsensical configurations.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when either threshold is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.failure_threshold < 1 {
            return Err(ConfigError::new("failure_threshold must be at least 1"));
        }
        if self.success_threshold < 1 {
            return Err(ConfigError::new("success_threshold must be at least 1"));
        }
        Ok(())
    }
}
