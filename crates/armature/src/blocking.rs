// Copyright (c) The Armature Project Authors.
// Licensed under the MIT License.

//! The blocking surface.
//!
//! [`blocking::Client`][Client] owns a private current-thread runtime and drives the exact
//! same execution pipeline as the async client; there is no separate state machine. Use it
//! from synchronous code only — constructing or calling it from inside an async runtime
//! panics, as with any nested `block_on`.

use std::time::Duration;

use http::Method;

use crate::config::ClientBuilder;
use crate::error::Error;
use crate::request::RequestOptions;
use crate::response::Response;
use crate::stats::{ClientStats, RetrySummary};

/// A blocking handle over the async [`Client`][crate::Client].
#[derive(Debug)]
pub struct Client {
    inner: crate::Client,
    runtime: tokio::runtime::Runtime,
}

impl Client {
    /// Constructs the client from a configured builder.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Runtime`] when the private runtime cannot be created, or any error
    /// [`ClientBuilder::build`] produces.
    pub fn new(builder: ClientBuilder) -> Result<Self, Error> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(Error::Runtime)?;
        let inner = builder.build()?;

        Ok(Self { inner, runtime })
    }

    /// Executes a logical request, blocking until it completes.
    ///
    /// # Errors
    ///
    /// Identical to [`Client::execute`][crate::Client::execute].
    pub fn execute(
        &self,
        method: Method,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<Response, Error> {
        self.runtime
            .block_on(self.inner.execute(method, endpoint, options))
    }

    /// Returns a snapshot of the client counters.
    #[must_use]
    pub fn stats(&self) -> ClientStats {
        self.inner.stats()
    }

    /// Returns a compact retry-behavior summary.
    #[must_use]
    pub fn retry_summary(&self) -> RetrySummary {
        self.inner.retry_summary()
    }

    /// Returns the delays slept during the most recent call.
    #[must_use]
    pub fn retry_delays(&self) -> Vec<Duration> {
        self.inner.retry_delays()
    }

    /// Zeroes the client counters and aggregate retry statistics.
    pub fn reset_stats(&self) {
        self.inner.reset_stats();
    }

    /// Returns the circuit breaker gating this client's attempts.
    #[must_use]
    pub fn breaker(&self) -> &steadfast::CircuitBreaker {
        self.inner.breaker()
    }

    /// Closes the client; further calls fail with [`Error::Closed`]. Idempotent.
    pub fn close(&self) {
        self.inner.close();
    }

    /// Returns whether the client is closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}
