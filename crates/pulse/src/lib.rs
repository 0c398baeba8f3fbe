// Copyright (c) The Armature Project Authors.
// Licensed under the MIT License.

//! Provides a minimal abstraction over machine time.
//!
//! Working with time is notoriously difficult to test. Code that calls
//! [`std::time::SystemTime::now`] or sleeps on the runtime directly cannot be exercised without
//! real waiting. This crate provides [`Clock`], a cheaply cloneable handle that yields the
//! current time and performs asynchronous delays, while allowing tests to freeze and advance
//! time deterministically.
//!
//! In production, construct the clock with [`Clock::system`]:
//!
//! ```
//! use pulse::Clock;
//!
//! let clock = Clock::system();
//! let before = clock.now();
//! assert!(clock.now() >= before);
//! ```
//!
//! In tests, enable the `test-util` feature and use `ClockControl` to obtain a controlled
//! clock whose time only moves when advanced. Cloned clocks share state: advancing time
//! through a control is visible to every clone handed out to other components.

mod clock;
#[cfg(any(feature = "test-util", test))]
mod clock_control;

pub use clock::Clock;
#[cfg(any(feature = "test-util", test))]
pub use clock_control::ClockControl;
