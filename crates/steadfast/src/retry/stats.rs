// Copyright (c) The Armature Project Authors.
// Licensed under the MIT License.

use std::collections::BTreeMap;
use std::time::Duration;

/// Aggregate retry statistics across calls.
///
/// Counts attempts and their outcomes, accumulates the delay actually spent waiting between
/// attempts, and keeps a histogram of terminal status codes. Reset is explicit; nothing here
/// resets on its own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryStats {
    total_attempts: u64,
    successful_attempts: u64,
    failed_attempts: u64,
    total_delay: Duration,
    delays_recorded: u64,
    terminal_statuses: BTreeMap<u16, u64>,
}

impl RetryStats {
    /// Creates an empty set of statistics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the outcome of one attempt.
    pub fn record_attempt(&mut self, success: bool) {
        self.total_attempts += 1;
        if success {
            self.successful_attempts += 1;
        } else {
            self.failed_attempts += 1;
        }
    }

    /// Records a delay slept between attempts.
    pub fn record_delay(&mut self, delay: Duration) {
        self.total_delay = self.total_delay.saturating_add(delay);
        self.delays_recorded += 1;
    }

    /// Records the status code a call terminated with.
    pub fn record_terminal_status(&mut self, status: u16) {
        *self.terminal_statuses.entry(status).or_insert(0) += 1;
    }

    /// Returns the number of attempts recorded.
    #[must_use]
    pub fn total_attempts(&self) -> u64 {
        self.total_attempts
    }

    /// Returns the number of successful attempts.
    #[must_use]
    pub fn successful_attempts(&self) -> u64 {
        self.successful_attempts
    }

    /// Returns the number of failed attempts.
    #[must_use]
    pub fn failed_attempts(&self) -> u64 {
        self.failed_attempts
    }

    /// Returns the cumulative delay spent waiting between attempts.
    #[must_use]
    pub fn total_delay(&self) -> Duration {
        self.total_delay
    }

    /// Returns the average recorded delay, zero before any delay was recorded.
    #[must_use]
    pub fn average_delay(&self) -> Duration {
        if self.delays_recorded == 0 {
            return Duration::ZERO;
        }
        self.total_delay
            .checked_div(u32::try_from(self.delays_recorded).unwrap_or(u32::MAX))
            .unwrap_or(Duration::ZERO)
    }

    /// Returns the histogram of terminal status codes.
    #[must_use]
    pub fn terminal_statuses(&self) -> &BTreeMap<u16, u64> {
        &self.terminal_statuses
    }

    /// Clears every counter.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_attempts_and_delays() {
        let mut stats = RetryStats::new();
        stats.record_attempt(true);
        stats.record_attempt(false);
        stats.record_attempt(false);
        stats.record_delay(Duration::from_secs(1));
        stats.record_delay(Duration::from_secs(2));
        stats.record_terminal_status(429);
        stats.record_terminal_status(429);
        stats.record_terminal_status(503);

        assert_eq!(stats.total_attempts(), 3);
        assert_eq!(stats.successful_attempts(), 1);
        assert_eq!(stats.failed_attempts(), 2);
        assert_eq!(stats.total_delay(), Duration::from_secs(3));
        assert_eq!(stats.average_delay(), Duration::from_millis(1500));
        assert_eq!(stats.terminal_statuses().get(&429), Some(&2));
        assert_eq!(stats.terminal_statuses().get(&503), Some(&1));
    }

    #[test]
    fn average_delay_is_zero_before_any_attempt() {
        assert_eq!(RetryStats::new().average_delay(), Duration::ZERO);
    }

    #[test]
    fn reset_is_idempotent() {
        let mut stats = RetryStats::new();
        stats.record_attempt(false);
        stats.record_delay(Duration::from_secs(5));
        stats.record_terminal_status(500);

        stats.reset();
        assert_eq!(stats, RetryStats::default());

        stats.reset();
        assert_eq!(stats, RetryStats::default());
    }
}
