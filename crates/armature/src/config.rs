// Copyright (c) The Armature Project Authors.
// Licensed under the MIT License.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use http::HeaderMap;
use pulse::Clock;
use shroud::LogConfig;
use steadfast::breaker::BreakerConfig;
use steadfast::{ConfigError, RetryPolicy};
use stockpile::CacheBackend;

use crate::middleware::MiddlewareChain;
use crate::response::CachedResponse;
use crate::transport::Transport;

pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub(crate) const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub(crate) const DEFAULT_USER_AGENT: &str = concat!("armature/", env!("CARGO_PKG_VERSION"));

/// Configures and constructs a [`Client`][crate::Client].
///
/// Every tunable is validated in [`build`][crate::ClientBuilder::build]; invalid
/// combinations are rejected there rather than surfacing later mid-request.
#[derive(Clone)]
pub struct ClientBuilder {
    pub(crate) base_url: String,
    pub(crate) timeout: Duration,
    pub(crate) connect_timeout: Duration,
    pub(crate) max_connections: usize,
    pub(crate) max_keepalive_connections: usize,
    pub(crate) default_headers: HeaderMap,
    pub(crate) user_agent: String,
    pub(crate) retry_policy: RetryPolicy,
    pub(crate) breaker_config: BreakerConfig,
    pub(crate) log_config: LogConfig,
    pub(crate) cache: Option<Arc<dyn CacheBackend<CachedResponse>>>,
    pub(crate) cacheable_methods: BTreeSet<String>,
    pub(crate) cache_include_headers: Vec<String>,
    pub(crate) middleware: Option<MiddlewareChain>,
    pub(crate) transport: Option<Arc<dyn Transport>>,
    pub(crate) clock: Clock,
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("retry_policy", &self.retry_policy)
            .field("breaker_config", &self.breaker_config)
            .finish_non_exhaustive()
    }
}

impl ClientBuilder {
    pub(crate) fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_connections: 100,
            max_keepalive_connections: 20,
            default_headers: HeaderMap::new(),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            retry_policy: RetryPolicy::new(),
            breaker_config: BreakerConfig::new(),
            log_config: LogConfig::new(),
            cache: None,
            cacheable_methods: [http::Method::GET]
                .iter()
                .map(|m| m.as_str().to_owned())
                .collect(),
            cache_include_headers: Vec::new(),
            middleware: None,
            transport: None,
            clock: Clock::system(),
        }
    }

    /// Sets the per-call timeout applied when a call does not carry its own.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the connection-establishment deadline.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Bounds the connection pool.
    #[must_use]
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Bounds the idle connections kept alive.
    #[must_use]
    pub fn max_keepalive_connections(mut self, max: usize) -> Self {
        self.max_keepalive_connections = max;
        self
    }

    /// Replaces the headers merged under every call's own headers.
    #[must_use]
    pub fn default_headers(mut self, headers: HeaderMap) -> Self {
        self.default_headers = headers;
        self
    }

    /// Sets the `User-Agent` applied when a request has none.
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Sets the circuit breaker configuration.
    #[must_use]
    pub fn breaker(mut self, config: BreakerConfig) -> Self {
        self.breaker_config = config;
        self
    }

    /// Sets the logging and redaction configuration.
    #[must_use]
    pub fn log_config(mut self, config: LogConfig) -> Self {
        self.log_config = config;
        self
    }

    /// Installs a response cache.
    #[must_use]
    pub fn cache(mut self, cache: Arc<dyn CacheBackend<CachedResponse>>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Replaces the set of methods eligible for caching (GET by default).
    #[must_use]
    pub fn cacheable_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.cacheable_methods = methods
            .into_iter()
            .map(|m| m.as_ref().to_ascii_uppercase())
            .collect();
        self
    }

    /// Names the headers that participate in the cache fingerprint.
    ///
    /// Responses that vary by header need this opt-in; by default no header affects
    /// request identity.
    #[must_use]
    pub fn cache_include_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.cache_include_headers = headers
            .into_iter()
            .map(|h| h.as_ref().to_ascii_lowercase())
            .collect();
        self
    }

    /// Replaces the default middleware chain.
    #[must_use]
    pub fn middleware(mut self, chain: MiddlewareChain) -> Self {
        self.middleware = Some(chain);
        self
    }

    /// Replaces the transport. Used by tests and by callers bringing their own stack.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Replaces the clock driving delays and expiry.
    #[must_use]
    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.is_empty() {
            return Err(ConfigError::new("base_url must not be empty"));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::new("timeout must be greater than zero"));
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::new("connect_timeout must be greater than zero"));
        }
        if self.max_connections < 1 {
            return Err(ConfigError::new("max_connections must be at least 1"));
        }
        self.retry_policy.validate()?;
        self.breaker_config.validate()
    }
}
