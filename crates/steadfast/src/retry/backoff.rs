// Copyright (c) The Armature Project Authors.
// Licensed under the MIT License.

use std::time::Duration;

use crate::ConfigError;
use crate::rnd::Rnd;

const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(60);
const DEFAULT_MULTIPLIER: f64 = 2.0;
const DEFAULT_JITTER_RATIO: f64 = 0.1;

/// Exponential backoff with optional symmetric jitter.
///
/// For attempt `n` (1-indexed) the base delay is
/// `min(initial_delay * multiplier^(n-1), max_delay)`. When jitter is enabled, the delay is
/// drawn uniformly from `base ± base * jitter_ratio` and clamped back into
/// `[0, max_delay]`, so the configured ceiling holds for every attempt.
///
/// The first attempt never waits; delays apply only between attempts.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    jitter: bool,
    jitter_ratio: f64,
    rnd: Rnd,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl BackoffPolicy {
    /// Creates a policy with the default schedule: 1s initial delay doubling up to 60s,
    /// with ±10% jitter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            initial_delay: DEFAULT_INITIAL_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            multiplier: DEFAULT_MULTIPLIER,
            jitter: true,
            jitter_ratio: DEFAULT_JITTER_RATIO,
            rnd: Rnd::default(),
        }
    }

    /// Sets the delay after the first attempt.
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the ceiling no computed delay may exceed.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the per-attempt growth factor.
    #[must_use]
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Enables or disables jitter.
    #[must_use]
    pub fn with_jitter(mut self, enabled: bool) -> Self {
        self.jitter = enabled;
        self
    }

    /// Sets the jitter width as a fraction of the base delay.
    #[must_use]
    pub fn with_jitter_ratio(mut self, ratio: f64) -> Self {
        self.jitter_ratio = ratio;
        self
    }

    #[cfg(test)]
    pub(crate) fn with_rnd(mut self, rnd: Rnd) -> Self {
        self.rnd = rnd;
        self
    }

    /// Returns the delay after the first attempt.
    #[must_use]
    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    /// Returns the delay ceiling.
    #[must_use]
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Returns the per-attempt growth factor.
    #[must_use]
    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// Returns whether jitter is applied.
    #[must_use]
    pub fn has_jitter(&self) -> bool {
        self.jitter
    }

    /// Rejects nonsensical schedules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when `max_delay < initial_delay`, the multiplier is below 1,
    /// or the jitter ratio lies outside `[0, 1]`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_delay < self.initial_delay {
            return Err(ConfigError::new("max_delay must be >= initial_delay"));
        }
        if self.multiplier < 1.0 {
            return Err(ConfigError::new("multiplier must be >= 1.0"));
        }
        if !(0.0..=1.0).contains(&self.jitter_ratio) {
            return Err(ConfigError::new("jitter_ratio must be within [0, 1]"));
        }
        Ok(())
    }

    /// Computes the delay to wait after the given attempt (1-indexed).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let base_secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let base = secs_to_duration_saturating(base_secs).min(self.max_delay);

        if !self.jitter {
            return base;
        }

        // Uniform draw from base ± base * jitter_ratio; negative results clamp to zero and
        // the max_delay ceiling holds even after jitter.
        let spread = base.as_secs_f64() * self.jitter_ratio;
        let offset = spread.mul_add(2.0 * self.rnd.next_f64(), -spread);
        secs_to_duration_saturating(base.as_secs_f64() + offset).min(self.max_delay)
    }
}

fn secs_to_duration_saturating(secs: f64) -> Duration {
    if secs <= 0.0 {
        return Duration::ZERO;
    }

    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}
