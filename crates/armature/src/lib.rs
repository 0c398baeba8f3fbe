// Copyright (c) The Armature Project Authors.
// Licensed under the MIT License.

//! Resilient HTTP client for rate-limited and failure-prone APIs.
//!
//! Armature turns one logical request into one or more wire attempts while suppressing
//! transient faults, respecting server backpressure, and preventing cascading failure. The
//! execution pipeline composes:
//!
//! - a retry engine with exponential backoff, jitter, and `Retry-After` handling
//!   ([`steadfast`]),
//! - a circuit breaker gating every attempt ([`steadfast::breaker`]),
//! - a read-through response cache with TTL and strict LRU eviction ([`stockpile`]),
//! - an ordered middleware chain with symmetric pre/post traversal ([`middleware`]),
//! - and a logging layer that redacts credentials before anything is emitted ([`shroud`]).
//!
//! # Quick Start
//!
//! ```no_run
//! use armature::{Client, RequestOptions};
//! use http::Method;
//!
//! # async fn example() -> Result<(), armature::Error> {
//! let client = Client::builder("https://api.example.com").build()?;
//!
//! let response = client
//!     .execute(
//!         Method::GET,
//!         "/users",
//!         RequestOptions::new().with_param("page", "1"),
//!     )
//!     .await?;
//!
//! assert!(response.is_success());
//! println!("{} in {:?}", response.status(), response.elapsed());
//! # Ok(())
//! # }
//! ```
//!
//! Rate limits and transient failures are handled inside `execute`: a 429 or retryable 5xx
//! sleeps per the backoff policy and tries again, a terminal outcome surfaces as a typed
//! [`Error`] carrying the url, method, attempts, and status involved. Repeated failures
//! open the circuit breaker, which rejects calls outright until the recovery timeout
//! elapses.
//!
//! # Blocking surface
//!
//! The [`blocking`] module exposes the same client over a private current-thread runtime;
//! both surfaces share a single internal state machine.

pub mod blocking;
mod client;
mod config;
mod error;
pub mod middleware;
mod request;
mod response;
mod stats;
pub mod transport;

pub use client::Client;
pub use config::ClientBuilder;
pub use error::Error;
pub use request::{Body, RequestContext, RequestOptions};
pub use response::{CachedResponse, Response, ResponseContext};
pub use stats::{ClientStats, RetrySummary};

// The policy and cache vocabulary callers configure the client with.
pub use shroud::{LogConfig, MaskStyle};
pub use steadfast::breaker::{BreakerConfig, CircuitState, FailureKind};
pub use steadfast::{BackoffPolicy, RetryPolicy};
