// Copyright (c) The Armature Project Authors.
// Licensed under the MIT License.

use std::collections::BTreeSet;
use std::time::Duration;

use http::Method;

use crate::ConfigError;
use crate::retry::BackoffPolicy;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_MAX_RETRY_AFTER: Duration = Duration::from_secs(300);
const DEFAULT_RETRY_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Governs whether and how failed attempts are retried.
///
/// The policy combines the backoff schedule with eligibility rules: which status codes are
/// retryable, which methods are idempotent, whether timeouts and connection failures warrant
/// another attempt, and how a server-provided `Retry-After` interacts with the backoff.
///
/// A non-idempotent method is still retried on 429, because a rate-limited request is
/// guaranteed not to have taken effect; on other retryable statuses the server-side effect is
/// ambiguous and the attempt is surfaced as a failure instead. That rule lives with the
/// caller driving the attempt loop; this type answers the individual questions.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    retry_on_status: BTreeSet<u16>,
    backoff: BackoffPolicy,
    respect_retry_after: bool,
    max_retry_after: Duration,
    retry_on_timeout: bool,
    retry_on_connection_error: bool,
    idempotent_methods: BTreeSet<String>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryPolicy {
    /// Creates a policy with the defaults: 3 attempts, retry on 429/500/502/503/504,
    /// `Retry-After` honored up to 300s, timeouts and connection failures retried, and
    /// GET/HEAD/OPTIONS/PUT/DELETE treated as idempotent.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_on_status: DEFAULT_RETRY_STATUSES.into_iter().collect(),
            backoff: BackoffPolicy::new(),
            respect_retry_after: true,
            max_retry_after: DEFAULT_MAX_RETRY_AFTER,
            retry_on_timeout: true,
            retry_on_connection_error: true,
            idempotent_methods: [
                Method::GET,
                Method::HEAD,
                Method::OPTIONS,
                Method::PUT,
                Method::DELETE,
            ]
            .iter()
            .map(|m| m.as_str().to_owned())
            .collect(),
        }
    }

    /// Sets the total number of attempts, including the first.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Replaces the set of retryable status codes.
    #[must_use]
    pub fn with_retry_on_status(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.retry_on_status = statuses.into_iter().collect();
        self
    }

    /// Sets the backoff schedule.
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Sets whether a server-provided `Retry-After` overrides the backoff delay.
    #[must_use]
    pub fn with_respect_retry_after(mut self, respect: bool) -> Self {
        self.respect_retry_after = respect;
        self
    }

    /// Caps how long a `Retry-After` may postpone the next attempt.
    #[must_use]
    pub fn with_max_retry_after(mut self, cap: Duration) -> Self {
        self.max_retry_after = cap;
        self
    }

    /// Sets whether timed-out attempts are retried.
    #[must_use]
    pub fn with_retry_on_timeout(mut self, retry: bool) -> Self {
        self.retry_on_timeout = retry;
        self
    }

    /// Sets whether connection failures are retried.
    #[must_use]
    pub fn with_retry_on_connection_error(mut self, retry: bool) -> Self {
        self.retry_on_connection_error = retry;
        self
    }

    /// Replaces the set of methods considered idempotent.
    #[must_use]
    pub fn with_idempotent_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.idempotent_methods = methods
            .into_iter()
            .map(|m| m.as_ref().to_ascii_uppercase())
            .collect();
        self
    }

    /// Rejects nonsensical policies.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when `max_attempts` is zero or the backoff schedule is
    /// invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts < 1 {
            return Err(ConfigError::new("max_attempts must be at least 1"));
        }
        self.backoff.validate()
    }

    /// Returns the total number of attempts, including the first.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the backoff schedule.
    #[must_use]
    pub fn backoff_ref(&self) -> &BackoffPolicy {
        &self.backoff
    }

    /// Returns whether a server-provided `Retry-After` overrides the backoff delay.
    #[must_use]
    pub fn respects_retry_after(&self) -> bool {
        self.respect_retry_after
    }

    /// Returns the cap applied to `Retry-After` delays.
    #[must_use]
    pub fn max_retry_after(&self) -> Duration {
        self.max_retry_after
    }

    /// Returns whether timed-out attempts are retried.
    #[must_use]
    pub fn retries_on_timeout(&self) -> bool {
        self.retry_on_timeout
    }

    /// Returns whether connection failures are retried.
    #[must_use]
    pub fn retries_on_connection_error(&self) -> bool {
        self.retry_on_connection_error
    }

    /// Returns whether the status code is in the retryable set.
    #[must_use]
    pub fn should_retry_status(&self, status: u16) -> bool {
        self.retry_on_status.contains(&status)
    }

    /// Returns whether the method is considered idempotent.
    #[must_use]
    pub fn is_idempotent(&self, method: &Method) -> bool {
        self.idempotent_methods.contains(method.as_str())
    }

    /// Caps a parsed `Retry-After` delay by the configured maximum.
    #[must_use]
    pub fn cap_retry_after(&self, delay: Duration) -> Duration {
        delay.min(self.max_retry_after)
    }
}
