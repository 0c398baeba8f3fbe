// Copyright (c) The Armature Project Authors.
// Licensed under the MIT License.

//! The client and its execution pipeline.
//!
//! [`Client::execute`] turns one logical request into one or more wire attempts: cache
//! lookup, middleware pre-phase, then the attempt loop — breaker gate, transport attempt,
//! outcome classification, backoff sleep — and finally the middleware post-phase and cache
//! store. The loop is written once, against the async surface; the blocking surface in
//! [`crate::blocking`] drives the same machine.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use http::{HeaderMap, Method, header};
use parking_lot::Mutex;
use pulse::Clock;
use shroud::RequestLogger;
use steadfast::breaker::{CircuitBreaker, FailureKind};
use steadfast::{RetryPolicy, RetryStats, parse_retry_after};
use stockpile::{CacheBackend, fingerprint};

use crate::config::ClientBuilder;
use crate::error::Error;
use crate::middleware::MiddlewareChain;
use crate::request::{RequestContext, RequestOptions};
use crate::response::{CachedResponse, Response, ResponseContext};
use crate::stats::{ClientStats, RetrySummary, StatsCells};
use crate::transport::{Transport, TransportError, TransportRequest, TransportResponse};

/// A resilient HTTP client for rate-limited and failure-prone APIs.
///
/// The client is cheap to clone and safe to share; any number of concurrent
/// [`execute`][Client::execute] calls may run against the same instance. Construction goes
/// through [`Client::builder`], which validates every tunable up front.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.inner.base_url)
            .field("closed", &self.inner.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

pub(crate) struct ClientInner {
    base_url: String,
    default_timeout: Duration,
    default_headers: HeaderMap,
    cacheable_methods: BTreeSet<String>,
    cache_include_headers: Vec<String>,
    transport: Arc<dyn Transport>,
    breaker: Arc<CircuitBreaker>,
    cache: Option<Arc<dyn CacheBackend<CachedResponse>>>,
    chain: MiddlewareChain,
    logger: Arc<RequestLogger>,
    policy: RetryPolicy,
    clock: Clock,
    stats: StatsCells,
    retry_stats: Mutex<RetryStats>,
    last_delays: Mutex<Vec<Duration>>,
    closed: AtomicBool,
}

impl ClientBuilder {
    /// Validates the configuration and constructs the client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for invalid tunables, [`Error::Redaction`] for redaction
    /// patterns that do not compile, and [`Error::TransportInit`] when the default
    /// transport cannot be built.
    pub fn build(self) -> Result<Client, Error> {
        self.validate()?;

        let logger = Arc::new(RequestLogger::new(self.log_config.clone())?);
        let breaker = Arc::new(CircuitBreaker::new(
            self.breaker_config.clone(),
            self.clock.clone(),
        )?);

        // Surface breaker transitions through the redacting logger. The listener holds a
        // weak reference; a strong one would keep the breaker alive through itself.
        {
            let logger = Arc::clone(&logger);
            let weak = Arc::downgrade(&breaker);
            breaker.add_listener(move |old, new| {
                let failures = weak.upgrade().map_or(0, |breaker| breaker.failure_count());
                logger.circuit_transition(&old.to_string(), &new.to_string(), failures);
            });
        }

        let chain = match self.middleware {
            Some(chain) => chain,
            None => MiddlewareChain::with_defaults(
                self.clock.clone(),
                self.user_agent.clone(),
                Arc::clone(&logger),
            ),
        };

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Self::default_transport(
                self.connect_timeout,
                self.max_connections,
                self.max_keepalive_connections,
            )?,
        };

        Ok(Client {
            inner: Arc::new(ClientInner {
                base_url: self.base_url,
                default_timeout: self.timeout,
                default_headers: self.default_headers,
                cacheable_methods: self.cacheable_methods,
                cache_include_headers: self.cache_include_headers,
                transport,
                breaker,
                cache: self.cache,
                chain,
                logger,
                policy: self.retry_policy,
                clock: self.clock,
                stats: StatsCells::default(),
                retry_stats: Mutex::new(RetryStats::new()),
                last_delays: Mutex::new(Vec::new()),
                closed: AtomicBool::new(false),
            }),
        })
    }

    #[cfg(feature = "reqwest-transport")]
    fn default_transport(
        connect_timeout: Duration,
        max_connections: usize,
        max_keepalive_connections: usize,
    ) -> Result<Arc<dyn Transport>, Error> {
        use crate::transport::{ReqwestTransport, TransportConfig};

        let transport = ReqwestTransport::new(&TransportConfig {
            connect_timeout,
            max_connections,
            max_keepalive_connections,
        })
        .map_err(|error| Error::TransportInit(Box::new(error)))?;

        Ok(Arc::new(transport))
    }

    #[cfg(not(feature = "reqwest-transport"))]
    fn default_transport(
        _connect_timeout: Duration,
        _max_connections: usize,
        _max_keepalive_connections: usize,
    ) -> Result<Arc<dyn Transport>, Error> {
        Err(Error::TransportInit(
            "no transport configured and the reqwest-transport feature is disabled".into(),
        ))
    }
}

impl Client {
    /// Starts configuring a client for the given base URL.
    #[must_use]
    pub fn builder(base_url: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(base_url)
    }

    /// Executes a logical request against `endpoint`, retrying per policy.
    ///
    /// `endpoint` is resolved against the client's base URL unless it is already absolute.
    ///
    /// # Errors
    ///
    /// Returns one of the terminal error kinds in [`Error`]; see the crate documentation
    /// for the taxonomy.
    pub async fn execute(
        &self,
        method: Method,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<Response, Error> {
        self.inner.execute(method, endpoint, options).await
    }

    /// Returns a snapshot of the client counters.
    #[must_use]
    pub fn stats(&self) -> ClientStats {
        self.inner.stats.snapshot()
    }

    /// Returns a compact retry-behavior summary.
    #[must_use]
    pub fn retry_summary(&self) -> RetrySummary {
        self.inner.stats.retry_summary()
    }

    /// Returns the delays slept during the most recent call.
    #[must_use]
    pub fn retry_delays(&self) -> Vec<Duration> {
        self.inner.last_delays.lock().clone()
    }

    /// Returns the aggregate retry statistics.
    #[must_use]
    pub fn retry_stats(&self) -> RetryStats {
        self.inner.retry_stats.lock().clone()
    }

    /// Zeroes the client counters and aggregate retry statistics. Idempotent.
    pub fn reset_stats(&self) {
        self.inner.stats.reset();
        self.inner.retry_stats.lock().reset();
        self.inner.last_delays.lock().clear();
    }

    /// Returns the circuit breaker gating this client's attempts.
    #[must_use]
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.inner.breaker
    }

    /// Returns the installed cache backend, if any.
    #[must_use]
    pub fn cache(&self) -> Option<Arc<dyn CacheBackend<CachedResponse>>> {
        self.inner.cache.clone()
    }

    /// Closes the client. Further [`execute`][Client::execute] calls fail with
    /// [`Error::Closed`]. Idempotent; underlying resources are released when the last
    /// clone drops.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
    }

    /// Returns whether [`close`][Client::close] has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

impl ClientInner {
    async fn execute(
        &self,
        method: Method,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<Response, Error> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::Closed);
        }

        let url = self.build_url(endpoint);
        let merged_headers = self.merge_headers(&options.headers);
        let request_id = short_request_id();

        // Read-side short circuit: a hit bypasses the attempt loop entirely, touching
        // neither total_requests nor the breaker.
        let cache_key = (options.use_cache
            && self.cache.is_some()
            && self.cacheable_methods.contains(method.as_str()))
        .then(|| {
            fingerprint(
                method.as_str(),
                &url,
                &options.params,
                &header_pairs(&merged_headers),
                &self.cache_include_headers,
            )
        });

        if let (Some(key), Some(cache)) = (&cache_key, &self.cache) {
            if let Some(cached) = cache.get(key).await {
                self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(request.id = %request_id, url = %url, "cache hit");
                return Ok(cached.into_response());
            }
            self.stats.cache_misses.fetch_add(1, Ordering::Relaxed);
        }

        let mut context = RequestContext {
            method,
            url,
            headers: merged_headers,
            params: options.params,
            body: options.body,
            timeout: options.timeout.unwrap_or(self.default_timeout),
            metadata: std::collections::HashMap::from([(
                "request_id".to_owned(),
                serde_json::Value::String(request_id.clone()),
            )]),
            request_id,
        };

        // A failing pre-phase aborts before any attempt; middlewares later in the chain
        // never saw the request, so the error phase is not run.
        self.chain.run_before(&mut context)?;

        self.last_delays.lock().clear();
        let max_attempts = self.policy.max_attempts();
        let mut attempt = 0;

        while attempt < max_attempts {
            attempt += 1;
            self.stats.total_requests.fetch_add(1, Ordering::Relaxed);

            if !self.breaker.allow_request() {
                self.stats.circuit_breaker_trips.fetch_add(1, Ordering::Relaxed);
                let snapshot = self.breaker.snapshot();
                return self.fail(
                    &context,
                    Error::CircuitOpen {
                        failure_count: snapshot.failure_count,
                        recovery_timeout: snapshot.recovery_timeout,
                    },
                );
            }

            let started = self.clock.instant();
            let outcome = self.transport.send(to_transport_request(&context)).await;
            let elapsed = self
                .clock
                .instant()
                .saturating_duration_since(started);

            match outcome {
                Ok(response) => {
                    match self
                        .handle_response(&context, response, attempt, elapsed, cache_key.as_deref())
                        .await?
                    {
                        AttemptVerdict::Done(response) => return Ok(response),
                        AttemptVerdict::RetryAfter(delay) => {
                            self.clock.delay(delay).await;
                        }
                    }
                }
                Err(error) => {
                    if let Some(delay) = self.handle_transport_error(&context, error, attempt)? {
                        self.clock.delay(delay).await;
                    }
                }
            }
        }

        // Every terminal path returns inside the loop; reaching this point means the
        // bookkeeping above let an attempt slip through unaccounted.
        let error = Error::Request {
            url: context.url.clone(),
            method: context.method.clone(),
            message: "request failed after all retries".to_owned(),
            source: None,
        };
        self.fail(&context, error)
    }

    async fn handle_response(
        &self,
        context: &RequestContext,
        response: TransportResponse,
        attempt: u32,
        elapsed: Duration,
        cache_key: Option<&str>,
    ) -> Result<AttemptVerdict, Error> {
        let TransportResponse {
            status,
            headers,
            body,
        } = response;
        let code = status.as_u16();

        if self.policy.should_retry_status(code) {
            return self.handle_retryable_status(context, code, headers, body, attempt);
        }

        match code {
            401 => {
                return Err(self.terminal_status_failure(
                    context,
                    code,
                    Error::Authentication {
                        body: String::from_utf8_lossy(&body).into_owned(),
                    },
                ));
            }
            403 => {
                return Err(self.terminal_status_failure(
                    context,
                    code,
                    Error::Authorization {
                        body: String::from_utf8_lossy(&body).into_owned(),
                    },
                ));
            }
            404 => {
                return Err(self.terminal_status_failure(
                    context,
                    code,
                    Error::NotFound {
                        body: String::from_utf8_lossy(&body).into_owned(),
                    },
                ));
            }
            code if code >= 500 => {
                return Err(self.terminal_status_failure(
                    context,
                    code,
                    Error::Server {
                        status: code,
                        attempts: attempt,
                        body: String::from_utf8_lossy(&body).into_owned(),
                    },
                ));
            }
            _ => {}
        }

        // Terminal success: the breaker heals, the post-phase runs, and 2xx responses
        // become cache candidates.
        self.breaker.record_success();
        self.stats.successful_requests.fetch_add(1, Ordering::Relaxed);
        {
            let mut retry_stats = self.retry_stats.lock();
            retry_stats.record_attempt(true);
            retry_stats.record_terminal_status(code);
        }

        let mut response_context = ResponseContext::new(status, headers, body, elapsed);
        if let Err(error) = self.chain.run_after(context, &mut response_context) {
            // The breaker success already recorded stands; only the call fails.
            self.chain.run_on_error(context, &error);
            return Err(error);
        }

        if let (Some(key), Some(cache)) = (cache_key, &self.cache)
            && response_context.status().is_success()
        {
            let etag = response_context
                .headers()
                .get(header::ETAG)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned);
            cache
                .set(
                    key,
                    CachedResponse::from_context(&response_context),
                    None,
                    etag,
                )
                .await;
        }

        Ok(AttemptVerdict::Done(response_context.into_response()))
    }

    fn handle_retryable_status(
        &self,
        context: &RequestContext,
        code: u16,
        headers: HeaderMap,
        body: bytes::Bytes,
        attempt: u32,
    ) -> Result<AttemptVerdict, Error> {
        // A 429 guarantees the request had no effect, so even non-idempotent methods may
        // retry it. Other retryable statuses leave the server-side effect ambiguous.
        if code != 429 && !self.policy.is_idempotent(&context.method) {
            return Err(self.terminal_status_failure(
                context,
                code,
                Error::Server {
                    status: code,
                    attempts: attempt,
                    body: String::from_utf8_lossy(&body).into_owned(),
                },
            ));
        }

        let retry_after = (code == 429)
            .then(|| {
                headers
                    .get(header::RETRY_AFTER)
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| parse_retry_after(value, self.clock.now()))
            })
            .flatten();

        if attempt >= self.policy.max_attempts() {
            // Exhaustion is the one point where a rate-limited call counts against the
            // breaker; intermediate 429s never do.
            let kind = if code == 429 {
                FailureKind::RateLimit
            } else {
                FailureKind::Status
            };
            self.breaker.record_failure(Some(kind));
            {
                let mut retry_stats = self.retry_stats.lock();
                retry_stats.record_attempt(false);
                retry_stats.record_terminal_status(code);
            }

            let error = if code == 429 {
                Error::RateLimitExceeded {
                    attempts: attempt,
                    retry_after,
                    status: code,
                    body: String::from_utf8_lossy(&body).into_owned(),
                    headers,
                }
            } else {
                Error::Server {
                    status: code,
                    attempts: attempt,
                    body: String::from_utf8_lossy(&body).into_owned(),
                }
            };
            return self.fail(context, error);
        }

        let delay = match retry_after {
            Some(retry_after) if self.policy.respects_retry_after() => {
                self.policy.cap_retry_after(retry_after)
            }
            _ => self.policy.backoff_ref().delay_for(attempt),
        };

        self.plan_retry(context, attempt, delay, &retry_reason(code, retry_after));
        Ok(AttemptVerdict::RetryAfter(delay))
    }

    fn handle_transport_error(
        &self,
        context: &RequestContext,
        error: TransportError,
        attempt: u32,
    ) -> Result<Option<Duration>, Error> {
        self.stats.failed_requests.fetch_add(1, Ordering::Relaxed);
        self.retry_stats.lock().record_attempt(false);

        match error {
            TransportError::Timeout(source) => {
                self.breaker.record_failure(Some(FailureKind::Timeout));
                if self.policy.retries_on_timeout() && attempt < self.policy.max_attempts() {
                    let delay = self.policy.backoff_ref().delay_for(attempt);
                    self.plan_retry(context, attempt, delay, "timed out");
                    return Ok(Some(delay));
                }
                self.fail(
                    context,
                    Error::Timeout {
                        timeout: context.timeout,
                        url: context.url.clone(),
                        method: context.method.clone(),
                        source,
                    },
                )
            }
            TransportError::Connect(source) => {
                self.breaker.record_failure(Some(FailureKind::Connection));
                if self.policy.retries_on_connection_error()
                    && attempt < self.policy.max_attempts()
                {
                    let delay = self.policy.backoff_ref().delay_for(attempt);
                    self.plan_retry(context, attempt, delay, "connection failed");
                    return Ok(Some(delay));
                }
                self.fail(
                    context,
                    Error::Connection {
                        url: context.url.clone(),
                        method: context.method.clone(),
                        source,
                    },
                )
            }
            TransportError::Other(source) => {
                self.breaker.record_failure(Some(FailureKind::Transport));
                self.fail(
                    context,
                    Error::Request {
                        url: context.url.clone(),
                        method: context.method.clone(),
                        message: "transport failure".to_owned(),
                        source: Some(source),
                    },
                )
            }
        }
    }

    /// Records a terminal status failure on the breaker and aggregate statistics.
    fn terminal_status_failure(&self, context: &RequestContext, code: u16, error: Error) -> Error {
        self.breaker.record_failure(Some(FailureKind::Status));
        {
            let mut retry_stats = self.retry_stats.lock();
            retry_stats.record_attempt(false);
            retry_stats.record_terminal_status(code);
        }
        self.chain.run_on_error(context, &error);
        error
    }

    /// Books a planned retry: per-call delays, counters, aggregate stats, and the retry
    /// log event.
    fn plan_retry(&self, context: &RequestContext, attempt: u32, delay: Duration, reason: &str) {
        self.last_delays.lock().push(delay);
        self.stats.total_retries.fetch_add(1, Ordering::Relaxed);
        self.retry_stats.lock().record_delay(delay);
        self.logger.retry(
            &context.request_id,
            attempt,
            self.policy.max_attempts(),
            delay,
            reason,
        );
    }

    /// Runs the error phase and returns the terminal error.
    fn fail<T>(&self, context: &RequestContext, error: Error) -> Result<T, Error> {
        self.chain.run_on_error(context, &error);
        Err(error)
    }

    fn build_url(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return endpoint.to_owned();
        }
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    fn merge_headers(&self, headers: &HeaderMap) -> HeaderMap {
        let mut merged = self.default_headers.clone();
        for (name, value) in headers {
            merged.insert(name.clone(), value.clone());
        }
        merged
    }
}

enum AttemptVerdict {
    Done(Response),
    RetryAfter(Duration),
}

fn to_transport_request(context: &RequestContext) -> TransportRequest {
    TransportRequest {
        method: context.method.clone(),
        url: context.url.clone(),
        headers: context.headers.clone(),
        params: context.params.clone(),
        body: context.body.clone(),
        timeout: context.timeout,
    }
}

fn header_pairs(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_owned(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

fn short_request_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

fn retry_reason(code: u16, retry_after: Option<Duration>) -> String {
    if code == 429 {
        match retry_after {
            Some(delay) => format!("rate limited (429), retry-after {:.0}s", delay.as_secs_f64()),
            None => "rate limited (429)".to_owned(),
        }
    } else {
        format!("server error ({code})")
    }
}
