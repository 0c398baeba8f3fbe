// Copyright (c) The Armature Project Authors.
// Licensed under the MIT License.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use parking_lot::Mutex;

use crate::Clock;

/// Controls the flow of time for clocks created through it.
///
/// The control is frozen at construction: clocks derived from it report the same time until
/// [`ClockControl::advance`] is called. Delays requested through derived clocks are recorded
/// and, when auto-advance is enabled, jump time forward instead of waiting:
///
/// ```
/// use std::time::Duration;
/// use pulse::ClockControl;
///
/// # futures::executor::block_on(async {
/// let control = ClockControl::new().auto_advance(true);
/// let clock = control.to_clock();
///
/// let before = clock.now();
/// clock.delay(Duration::from_secs(30)).await; // returns immediately
/// assert_eq!(clock.now(), before + Duration::from_secs(30));
/// assert_eq!(control.sleeps(), vec![Duration::from_secs(30)]);
/// # });
/// ```
///
/// Cloning the control, or the clocks derived from it, preserves the shared state.
#[derive(Clone, Debug)]
pub struct ClockControl {
    state: Arc<ControlledState>,
}

#[derive(Debug)]
pub(crate) struct ControlledState {
    base_system: SystemTime,
    base_instant: Instant,
    shared: Mutex<Shared>,
}

#[derive(Debug)]
struct Shared {
    offset: Duration,
    auto_advance: bool,
    sleeps: Vec<Duration>,
}

impl ClockControl {
    /// Creates a new control frozen at the current system time.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(ControlledState {
                base_system: SystemTime::now(),
                base_instant: Instant::now(),
                shared: Mutex::new(Shared {
                    offset: Duration::ZERO,
                    auto_advance: false,
                    sleeps: Vec::new(),
                }),
            }),
        }
    }

    /// Sets whether delays advance time and complete immediately.
    ///
    /// When disabled (the default), delays requested through derived clocks never complete,
    /// which is useful for exercising cancellation.
    #[must_use]
    pub fn auto_advance(self, enabled: bool) -> Self {
        self.state.shared.lock().auto_advance = enabled;
        self
    }

    /// Creates a clock governed by this control.
    #[must_use]
    pub fn to_clock(&self) -> Clock {
        Clock::controlled(Arc::clone(&self.state))
    }

    /// Moves time forward by `duration`.
    pub fn advance(&self, duration: Duration) {
        let mut shared = self.state.shared.lock();
        shared.offset = shared.offset.saturating_add(duration);
    }

    /// Returns the delays requested through derived clocks, in request order.
    #[must_use]
    pub fn sleeps(&self) -> Vec<Duration> {
        self.state.shared.lock().sleeps.clone()
    }
}

impl Default for ClockControl {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlledState {
    pub(crate) fn now(&self) -> SystemTime {
        self.base_system + self.shared.lock().offset
    }

    pub(crate) fn instant(&self) -> Instant {
        self.base_instant + self.shared.lock().offset
    }

    pub(crate) async fn delay(&self, duration: Duration) {
        let auto_advance = {
            let mut shared = self.shared.lock();
            shared.sleeps.push(duration);
            if shared.auto_advance {
                shared.offset = shared.offset.saturating_add(duration);
            }
            shared.auto_advance
        };

        if !auto_advance {
            std::future::pending::<()>().await;
        }
    }
}
