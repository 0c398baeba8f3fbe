// Copyright (c) The Armature Project Authors.
// Licensed under the MIT License.

use std::fmt::{Display, Formatter};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use pulse::Clock;

use crate::ConfigError;
use crate::breaker::{BreakerConfig, FailureKind};

/// The state of a circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CircuitState {
    /// Normal operation; failures are counted.
    Closed,

    /// Requests are rejected until the recovery timeout elapses.
    Open,

    /// Probe window; successes accumulate toward closing, any failure reopens.
    HalfOpen,
}

impl CircuitState {
    fn as_u8(self) -> u8 {
        match self {
            Self::Closed => 0,
            Self::Open => 1,
            Self::HalfOpen => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Open,
            2 => Self::HalfOpen,
            _ => Self::Closed,
        }
    }
}

impl Display for CircuitState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// A read-only view of the breaker at one point in time.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct BreakerSnapshot {
    /// The circuit state.
    pub state: CircuitState,
    /// Consecutive failures counted in the current closed period, or total since opening.
    pub failure_count: u32,
    /// Successes accumulated in the current half-open period.
    pub success_count: u32,
    /// When the most recent counted failure happened.
    pub last_failure_time: Option<SystemTime>,
    /// How long the circuit stays open before a probe is permitted.
    pub recovery_timeout: Duration,
}

/// Monotonic operation counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub struct BreakerMetrics {
    /// Outcomes recorded (successes plus counted failures).
    pub total_calls: u64,
    /// Successes recorded.
    pub successful_calls: u64,
    /// Counted failures recorded.
    pub failed_calls: u64,
    /// Requests denied because the circuit was open.
    pub rejected_calls: u64,
    /// State changes since construction.
    pub state_transitions: u64,
}

/// Identifies a registered state-change listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(CircuitState, CircuitState) + Send + Sync>;

/// A three-state circuit breaker.
///
/// See the [module documentation][crate::breaker] for the state machine and usage. All
/// mutating operations are serialized; transitions are globally linearizable. The read-only
/// accessors never take the lock, so state-change listeners may call them freely.
pub struct CircuitBreaker {
    config: BreakerConfig,
    clock: Clock,
    core: Mutex<Core>,
    observed: Observed,
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
    next_listener_id: AtomicU64,
}

#[derive(Debug)]
struct Core {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure_instant: Option<Instant>,
}

/// Lock-free mirror of the observable state, written only while the core lock is held.
#[derive(Debug, Default)]
struct Observed {
    state: AtomicU8,
    failure_count: AtomicU32,
    success_count: AtomicU32,
    // Milliseconds since the Unix epoch; zero means no failure recorded yet.
    last_failure_epoch_ms: AtomicU64,
    total_calls: AtomicU64,
    successful_calls: AtomicU64,
    failed_calls: AtomicU64,
    rejected_calls: AtomicU64,
    state_transitions: AtomicU64,
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl CircuitBreaker {
    /// Creates a breaker in the closed state.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the configuration is invalid.
    pub fn new(config: BreakerConfig, clock: Clock) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            config,
            clock,
            core: Mutex::new(Core {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure_instant: None,
            }),
            observed: Observed::default(),
            listeners: Mutex::new(Vec::new()),
            next_listener_id: AtomicU64::new(0),
        })
    }

    /// Asks whether a request may proceed.
    ///
    /// On an open circuit whose recovery timeout has elapsed, this transitions to half-open
    /// and permits the probe. A denial is counted in
    /// [`rejected_calls`][BreakerMetrics::rejected_calls] and must not be reported back as a
    /// failure.
    pub fn allow_request(&self) -> bool {
        let mut core = self.core.lock();

        if core.state != CircuitState::Open {
            return true;
        }

        let recovered = core
            .last_failure_instant
            .is_none_or(|at| self.clock.instant().saturating_duration_since(at) >= self.config.recovery_timeout());

        if recovered {
            self.transition(&mut core, CircuitState::HalfOpen);
            true
        } else {
            self.observed.rejected_calls.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Records a successful call.
    pub fn record_success(&self) {
        let mut core = self.core.lock();

        self.observed.total_calls.fetch_add(1, Ordering::Relaxed);
        self.observed.successful_calls.fetch_add(1, Ordering::Relaxed);

        match core.state {
            CircuitState::HalfOpen => {
                core.success_count += 1;
                self.observed
                    .success_count
                    .store(core.success_count, Ordering::Relaxed);
                if core.success_count >= self.config.success_threshold() {
                    self.transition(&mut core, CircuitState::Closed);
                }
            }
            CircuitState::Closed => {
                core.failure_count = 0;
                self.observed.failure_count.store(0, Ordering::Relaxed);
            }
            CircuitState::Open => {}
        }
    }

    /// Records a failed call.
    ///
    /// The failure is counted only when its cause passes the configured kind filter; a
    /// failure without a cause always counts.
    pub fn record_failure(&self, kind: Option<FailureKind>) {
        if !self.config.counts(kind) {
            return;
        }

        let mut core = self.core.lock();

        self.observed.total_calls.fetch_add(1, Ordering::Relaxed);
        self.observed.failed_calls.fetch_add(1, Ordering::Relaxed);

        core.failure_count += 1;
        core.last_failure_instant = Some(self.clock.instant());
        self.observed
            .failure_count
            .store(core.failure_count, Ordering::Relaxed);
        self.observed
            .last_failure_epoch_ms
            .store(epoch_millis(self.clock.now()), Ordering::Relaxed);

        match core.state {
            CircuitState::HalfOpen => self.transition(&mut core, CircuitState::Open),
            CircuitState::Closed if core.failure_count >= self.config.failure_threshold() => {
                self.transition(&mut core, CircuitState::Open);
            }
            CircuitState::Closed | CircuitState::Open => {}
        }
    }

    /// Returns the breaker to the closed state with zeroed counts.
    pub fn reset(&self) {
        let mut core = self.core.lock();
        self.transition(&mut core, CircuitState::Closed);
        core.failure_count = 0;
        core.success_count = 0;
        core.last_failure_instant = None;
        self.observed.failure_count.store(0, Ordering::Relaxed);
        self.observed.success_count.store(0, Ordering::Relaxed);
        self.observed.last_failure_epoch_ms.store(0, Ordering::Relaxed);
    }

    /// Returns the current state. Lock-free.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.observed.state.load(Ordering::Relaxed))
    }

    /// Returns whether the circuit is currently closed. Lock-free.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state() == CircuitState::Closed
    }

    /// Returns whether the circuit is currently open. Lock-free.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    /// Returns whether the circuit is currently half-open. Lock-free.
    #[must_use]
    pub fn is_half_open(&self) -> bool {
        self.state() == CircuitState::HalfOpen
    }

    /// Returns the current failure count. Lock-free.
    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.observed.failure_count.load(Ordering::Relaxed)
    }

    /// Returns the configured recovery timeout.
    #[must_use]
    pub fn recovery_timeout(&self) -> Duration {
        self.config.recovery_timeout()
    }

    /// Returns a point-in-time view of the breaker. Lock-free.
    #[must_use]
    pub fn snapshot(&self) -> BreakerSnapshot {
        let epoch_ms = self.observed.last_failure_epoch_ms.load(Ordering::Relaxed);
        BreakerSnapshot {
            state: self.state(),
            failure_count: self.observed.failure_count.load(Ordering::Relaxed),
            success_count: self.observed.success_count.load(Ordering::Relaxed),
            last_failure_time: (epoch_ms != 0)
                .then(|| UNIX_EPOCH + Duration::from_millis(epoch_ms)),
            recovery_timeout: self.config.recovery_timeout(),
        }
    }

    /// Returns the operation counters. Lock-free.
    #[must_use]
    pub fn metrics(&self) -> BreakerMetrics {
        BreakerMetrics {
            total_calls: self.observed.total_calls.load(Ordering::Relaxed),
            successful_calls: self.observed.successful_calls.load(Ordering::Relaxed),
            failed_calls: self.observed.failed_calls.load(Ordering::Relaxed),
            rejected_calls: self.observed.rejected_calls.load(Ordering::Relaxed),
            state_transitions: self.observed.state_transitions.load(Ordering::Relaxed),
        }
    }

    /// Zeroes the call counters. State transitions keep accumulating.
    pub fn reset_metrics(&self) {
        self.observed.total_calls.store(0, Ordering::Relaxed);
        self.observed.successful_calls.store(0, Ordering::Relaxed);
        self.observed.failed_calls.store(0, Ordering::Relaxed);
        self.observed.rejected_calls.store(0, Ordering::Relaxed);
    }

    /// Registers a state-change listener, invoked synchronously on every transition with the
    /// old and new states, in registration order.
    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(CircuitState, CircuitState) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, Arc::new(listener)));
        id
    }

    /// Removes a previously registered listener. Returns whether it was present.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    fn transition(&self, core: &mut Core, new_state: CircuitState) {
        let old_state = core.state;
        if old_state == new_state {
            return;
        }

        core.state = new_state;
        if new_state == CircuitState::Closed {
            core.failure_count = 0;
            core.success_count = 0;
            self.observed.failure_count.store(0, Ordering::Relaxed);
            self.observed.success_count.store(0, Ordering::Relaxed);
        }
        if new_state == CircuitState::HalfOpen {
            core.success_count = 0;
            self.observed.success_count.store(0, Ordering::Relaxed);
        }

        self.observed.state.store(new_state.as_u8(), Ordering::Relaxed);
        self.observed.state_transitions.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(from = %old_state, to = %new_state, "circuit state changed");

        self.notify_listeners(old_state, new_state);
    }

    fn notify_listeners(&self, old_state: CircuitState, new_state: CircuitState) {
        let listeners = self.listeners.lock().clone();
        for (_, listener) in listeners {
            let outcome =
                std::panic::catch_unwind(AssertUnwindSafe(|| listener(old_state, new_state)));
            if outcome.is_err() {
                tracing::error!(from = %old_state, to = %new_state, "circuit state listener panicked");
            }
        }
    }
}

fn epoch_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
