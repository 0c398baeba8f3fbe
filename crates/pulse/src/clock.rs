// Copyright (c) The Armature Project Authors.
// Licensed under the MIT License.

use std::time::{Duration, Instant, SystemTime};

#[cfg(any(feature = "test-util", test))]
use std::sync::Arc;

#[cfg(any(feature = "test-util", test))]
use crate::clock_control::ControlledState;

/// A handle to the flow of time.
///
/// The clock provides the current absolute time ([`Clock::now`]), a monotonic reference point
/// ([`Clock::instant`]), and an asynchronous delay ([`Clock::delay`]). Components take a clock
/// by value at construction and clone it freely; clones share state.
///
/// The system clock delegates to the operating system and the async runtime's timer. The
/// controlled clock (available through `ClockControl` with the `test-util` feature) is frozen
/// at construction and only moves when explicitly advanced, which makes time-dependent logic
/// testable without real waiting.
#[derive(Clone, Debug)]
pub struct Clock(ClockInner);

#[derive(Clone, Debug)]
enum ClockInner {
    System,
    #[cfg(any(feature = "test-util", test))]
    Controlled(Arc<ControlledState>),
}

impl Clock {
    /// Creates a clock backed by the operating system and the runtime timer.
    #[must_use]
    pub fn system() -> Self {
        Self(ClockInner::System)
    }

    #[cfg(any(feature = "test-util", test))]
    pub(crate) fn controlled(state: Arc<ControlledState>) -> Self {
        Self(ClockInner::Controlled(state))
    }

    /// Returns the current absolute time.
    #[must_use]
    pub fn now(&self) -> SystemTime {
        match &self.0 {
            ClockInner::System => SystemTime::now(),
            #[cfg(any(feature = "test-util", test))]
            ClockInner::Controlled(state) => state.now(),
        }
    }

    /// Returns a monotonic point in time, suitable for measuring elapsed durations.
    #[must_use]
    pub fn instant(&self) -> Instant {
        match &self.0 {
            ClockInner::System => Instant::now(),
            #[cfg(any(feature = "test-util", test))]
            ClockInner::Controlled(state) => state.instant(),
        }
    }

    /// Waits for the given duration.
    ///
    /// On the system clock this suspends on the runtime timer. On a controlled clock with
    /// auto-advance enabled, the delay is recorded, time jumps forward, and the future
    /// completes immediately; with auto-advance disabled the future never completes, which
    /// is useful for exercising cancellation paths.
    pub async fn delay(&self, duration: Duration) {
        match &self.0 {
            ClockInner::System => tokio::time::sleep(duration).await,
            #[cfg(any(feature = "test-util", test))]
            ClockInner::Controlled(state) => state.delay(duration).await,
        }
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::system()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_moves_forward() {
        let clock = Clock::system();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);

        let i = clock.instant();
        assert!(clock.instant() >= i);
    }

    #[test]
    fn default_is_system() {
        let clock = Clock::default();
        assert!(matches!(clock.0, ClockInner::System));
    }

    #[tokio::test]
    async fn system_delay_completes() {
        let clock = Clock::system();
        clock.delay(Duration::from_millis(1)).await;
    }
}
