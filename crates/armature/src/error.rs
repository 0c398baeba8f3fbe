// Copyright (c) The Armature Project Authors.
// Licensed under the MIT License.

use std::time::Duration;

use http::{HeaderMap, Method};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Everything that can go wrong executing a request.
///
/// Terminal errors carry enough diagnostic context — url, method, attempts, status, body —
/// that callers can act on them without correlating log output.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The server kept answering 429 until the allowed attempts ran out.
    #[error("rate limit exceeded after {attempts} attempts")]
    RateLimitExceeded {
        /// Attempts performed, including the first.
        attempts: u32,
        /// The server's final `Retry-After`, when it sent one.
        retry_after: Option<Duration>,
        /// The terminal status code (429).
        status: u16,
        /// The final response body.
        body: String,
        /// The final response headers.
        headers: HeaderMap,
    },

    /// The circuit breaker denied the request before any attempt was made.
    #[error("circuit breaker is open after {failure_count} failures")]
    CircuitOpen {
        /// Failures counted when the circuit opened.
        failure_count: u32,
        /// How long the circuit stays open before permitting a probe.
        recovery_timeout: Duration,
    },

    /// The server answered with a failure status that retrying cannot fix, or retries ran
    /// out on a retryable one.
    #[error("server error {status} after {attempts} attempts")]
    Server {
        /// The terminal status code.
        status: u16,
        /// Attempts performed.
        attempts: u32,
        /// The final response body.
        body: String,
    },

    /// The attempt deadline elapsed, with no retries left (or timeouts not retryable).
    #[error("{method} {url} timed out after {timeout:?}")]
    Timeout {
        /// The per-attempt deadline that elapsed.
        timeout: Duration,
        /// The request URL.
        url: String,
        /// The request method.
        method: Method,
        /// The transport's underlying error, when it produced one.
        #[source]
        source: Option<BoxError>,
    },

    /// The connection could not be established, with no retries left (or connection
    /// failures not retryable).
    #[error("{method} {url}: connection failed")]
    Connection {
        /// The request URL.
        url: String,
        /// The request method.
        method: Method,
        /// The transport's underlying error, when it produced one.
        #[source]
        source: Option<BoxError>,
    },

    /// The server answered 401.
    #[error("authentication failed (401)")]
    Authentication {
        /// The response body.
        body: String,
    },

    /// The server answered 403.
    #[error("authorization failed (403)")]
    Authorization {
        /// The response body.
        body: String,
    },

    /// The server answered 404.
    #[error("resource not found (404)")]
    NotFound {
        /// The response body.
        body: String,
    },

    /// A failure the other kinds do not cover, including unclassified transport errors and
    /// middleware failures.
    #[error("{method} {url}: {message}")]
    Request {
        /// The request URL.
        url: String,
        /// The request method.
        method: Method,
        /// What went wrong.
        message: String,
        /// The underlying error, when there is one.
        #[source]
        source: Option<BoxError>,
    },

    /// The transport could not be constructed.
    #[error("transport initialization failed")]
    TransportInit(#[source] BoxError),

    /// A configuration value was rejected at construction.
    #[error(transparent)]
    Config(#[from] steadfast::ConfigError),

    /// A redaction pattern failed to compile at construction.
    #[error(transparent)]
    Redaction(#[from] shroud::InvalidPattern),

    /// The async runtime backing the blocking surface could not be created.
    #[error("runtime failure")]
    Runtime(#[source] std::io::Error),

    /// The client was closed; no further requests are accepted.
    #[error("client is closed")]
    Closed,
}

impl Error {
    /// Returns the terminal HTTP status carried by this error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RateLimitExceeded { status, .. } | Self::Server { status, .. } => Some(*status),
            Self::Authentication { .. } => Some(401),
            Self::Authorization { .. } => Some(403),
            Self::NotFound { .. } => Some(404),
            _ => None,
        }
    }

    /// Returns the number of attempts performed before the error became terminal, if the
    /// error tracks attempts.
    #[must_use]
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Self::RateLimitExceeded { attempts, .. } | Self::Server { attempts, .. } => {
                Some(*attempts)
            }
            _ => None,
        }
    }
}
