// Copyright (c) The Armature Project Authors.
// Licensed under the MIT License.

//! The middleware chain: ordered request/response transformers.
//!
//! Middlewares observe and mutate each call. The pre-phase runs in insertion order before
//! the first attempt; the post-phase runs in reverse insertion order after the winning
//! attempt, like layers of an onion; the error-phase runs in reverse when a call ends in a
//! terminal error. Mutations made in the pre-phase are visible to every later middleware and
//! to the transport; the post-phase sees the mutated request context, not a copy.

use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use http::HeaderValue;
use http::header::{CONTENT_TYPE, USER_AGENT};
use pulse::Clock;
use shroud::RequestLogger;

use crate::error::Error;
use crate::request::RequestContext;
use crate::response::ResponseContext;

/// A request/response transformer installed on the client.
///
/// All three operations are synchronous and must be fast; anything slow belongs in the
/// transport, not the chain.
pub trait Middleware: Send + Sync {
    /// Observes and mutates the request before any attempt. An error aborts the call
    /// before the first attempt.
    ///
    /// # Errors
    ///
    /// Implementations may fail the call by returning any [`Error`].
    fn before(&self, request: &mut RequestContext) -> Result<(), Error>;

    /// Observes and mutates the response after the winning attempt. An error aborts the
    /// call, but the recorded breaker success stands.
    ///
    /// # Errors
    ///
    /// Implementations may fail the call by returning any [`Error`].
    fn after(&self, request: &RequestContext, response: &mut ResponseContext)
    -> Result<(), Error>;

    /// Observes a terminal error. Best-effort; the error propagates regardless.
    fn on_error(&self, request: &RequestContext, error: &Error) {
        let _ = (request, error);
    }
}

/// An ordered sequence of middlewares with symmetric pre/post traversal.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl std::fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareChain")
            .field("len", &self.middlewares.len())
            .finish()
    }
}

impl MiddlewareChain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the default chain: timing, user agent, content type, logging.
    #[must_use]
    pub fn with_defaults(
        clock: Clock,
        user_agent: impl Into<String>,
        logger: Arc<RequestLogger>,
    ) -> Self {
        Self::new()
            .with(TimingMiddleware::new(clock))
            .with(UserAgentMiddleware::new(user_agent))
            .with(ContentTypeMiddleware::new())
            .with(LoggingMiddleware::new(logger))
    }

    /// Appends a middleware, returning the chain for further building.
    #[must_use]
    pub fn with(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    /// Appends a middleware in place.
    pub fn add(&mut self, middleware: impl Middleware + 'static) {
        self.middlewares.push(Arc::new(middleware));
    }

    /// Removes every middleware.
    pub fn clear(&mut self) {
        self.middlewares.clear();
    }

    /// Returns the number of middlewares installed.
    #[must_use]
    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    /// Returns whether the chain is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    pub(crate) fn run_before(&self, request: &mut RequestContext) -> Result<(), Error> {
        for middleware in &self.middlewares {
            middleware.before(request)?;
        }
        Ok(())
    }

    pub(crate) fn run_after(
        &self,
        request: &RequestContext,
        response: &mut ResponseContext,
    ) -> Result<(), Error> {
        for middleware in self.middlewares.iter().rev() {
            middleware.after(request, response)?;
        }
        Ok(())
    }

    pub(crate) fn run_on_error(&self, request: &RequestContext, error: &Error) {
        for middleware in self.middlewares.iter().rev() {
            middleware.on_error(request, error);
        }
    }
}

/// Records the start time in request metadata and fills in the response's elapsed time.
#[derive(Debug)]
pub struct TimingMiddleware {
    clock: Clock,
}

const TIMING_START_KEY: &str = "timing_start_secs";

impl TimingMiddleware {
    /// Creates the middleware.
    #[must_use]
    pub fn new(clock: Clock) -> Self {
        Self { clock }
    }

    fn now_secs(&self) -> f64 {
        self.clock
            .now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64()
    }
}

impl Middleware for TimingMiddleware {
    fn before(&self, request: &mut RequestContext) -> Result<(), Error> {
        request
            .metadata_mut()
            .insert(TIMING_START_KEY.to_owned(), self.now_secs().into());
        Ok(())
    }

    fn after(
        &self,
        request: &RequestContext,
        response: &mut ResponseContext,
    ) -> Result<(), Error> {
        if let Some(start) = request.metadata().get(TIMING_START_KEY).and_then(|v| v.as_f64()) {
            let elapsed = (self.now_secs() - start).max(0.0);
            response.set_elapsed(Duration::try_from_secs_f64(elapsed).unwrap_or(Duration::ZERO));
        }
        Ok(())
    }
}

/// Sets a default `User-Agent` header when the request has none.
#[derive(Debug)]
pub struct UserAgentMiddleware {
    user_agent: String,
}

impl UserAgentMiddleware {
    /// Creates the middleware with the given product string.
    #[must_use]
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
        }
    }
}

impl Middleware for UserAgentMiddleware {
    fn before(&self, request: &mut RequestContext) -> Result<(), Error> {
        if !request.headers().contains_key(USER_AGENT)
            && let Ok(value) = HeaderValue::from_str(&self.user_agent)
        {
            request.headers_mut().insert(USER_AGENT, value);
        }
        Ok(())
    }

    fn after(&self, _request: &RequestContext, _response: &mut ResponseContext) -> Result<(), Error> {
        Ok(())
    }
}

/// Sets `Content-Type` on requests with a body and annotates responses with `is_json`.
#[derive(Debug)]
pub struct ContentTypeMiddleware {
    default_content_type: String,
}

impl ContentTypeMiddleware {
    /// Creates the middleware defaulting to `application/json`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            default_content_type: "application/json".to_owned(),
        }
    }

    /// Overrides the content type applied to bodies without one.
    #[must_use]
    pub fn with_default(mut self, content_type: impl Into<String>) -> Self {
        self.default_content_type = content_type.into();
        self
    }
}

impl Default for ContentTypeMiddleware {
    fn default() -> Self {
        Self::new()
    }
}

impl Middleware for ContentTypeMiddleware {
    fn before(&self, request: &mut RequestContext) -> Result<(), Error> {
        if request.body().is_some()
            && !request.headers().contains_key(CONTENT_TYPE)
            && let Ok(value) = HeaderValue::from_str(&self.default_content_type)
        {
            request.headers_mut().insert(CONTENT_TYPE, value);
        }
        Ok(())
    }

    fn after(
        &self,
        _request: &RequestContext,
        response: &mut ResponseContext,
    ) -> Result<(), Error> {
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .unwrap_or_default();
        let is_json = content_type.contains("application/json");

        let metadata = response.metadata_mut();
        metadata.insert("content_type".to_owned(), content_type.into());
        metadata.insert("is_json".to_owned(), is_json.into());
        Ok(())
    }
}

/// Injects default headers without overwriting caller-provided ones.
#[derive(Debug)]
pub struct HeaderDefaultsMiddleware {
    headers: http::HeaderMap,
}

impl HeaderDefaultsMiddleware {
    /// Creates the middleware with the given defaults.
    #[must_use]
    pub fn new(headers: http::HeaderMap) -> Self {
        Self { headers }
    }
}

impl Middleware for HeaderDefaultsMiddleware {
    fn before(&self, request: &mut RequestContext) -> Result<(), Error> {
        for (name, value) in &self.headers {
            if !request.headers().contains_key(name) {
                request.headers_mut().insert(name.clone(), value.clone());
            }
        }
        Ok(())
    }

    fn after(&self, _request: &RequestContext, _response: &mut ResponseContext) -> Result<(), Error> {
        Ok(())
    }
}

/// Emits the request-start, response, and error events through the redacting logger.
#[derive(Debug)]
pub struct LoggingMiddleware {
    logger: Arc<RequestLogger>,
}

impl LoggingMiddleware {
    /// Creates the middleware.
    #[must_use]
    pub fn new(logger: Arc<RequestLogger>) -> Self {
        Self { logger }
    }
}

impl Middleware for LoggingMiddleware {
    fn before(&self, request: &mut RequestContext) -> Result<(), Error> {
        let body = request.body().map(crate::request::Body::as_text);
        self.logger.request_started(
            request.request_id(),
            request.method().as_str(),
            request.url(),
            request.headers(),
            body.as_deref(),
        );
        Ok(())
    }

    fn after(
        &self,
        request: &RequestContext,
        response: &mut ResponseContext,
    ) -> Result<(), Error> {
        let body = String::from_utf8_lossy(response.body());
        self.logger.response(
            request.request_id(),
            response.status().as_u16(),
            response.headers(),
            response.elapsed(),
            Some(&body),
        );
        Ok(())
    }

    fn on_error(&self, request: &RequestContext, error: &Error) {
        self.logger.error(request.request_id(), error);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use bytes::Bytes;
    use http::{HeaderMap, Method, StatusCode};
    use pulse::ClockControl;

    use super::*;
    use crate::request::Body;

    fn request_context() -> RequestContext {
        RequestContext {
            method: Method::GET,
            url: "https://api.example.com/u".to_owned(),
            headers: HeaderMap::new(),
            params: Vec::new(),
            body: None,
            timeout: Duration::from_secs(30),
            metadata: HashMap::new(),
            request_id: "abcd1234".to_owned(),
        }
    }

    fn response_context() -> ResponseContext {
        ResponseContext::new(
            StatusCode::OK,
            HeaderMap::new(),
            Bytes::new(),
            Duration::ZERO,
        )
    }

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Middleware for Recorder {
        fn before(&self, _request: &mut RequestContext) -> Result<(), Error> {
            self.log.lock().unwrap().push(format!("{}:before", self.name));
            Ok(())
        }

        fn after(
            &self,
            _request: &RequestContext,
            _response: &mut ResponseContext,
        ) -> Result<(), Error> {
            self.log.lock().unwrap().push(format!("{}:after", self.name));
            Ok(())
        }

        fn on_error(&self, _request: &RequestContext, _error: &Error) {
            self.log.lock().unwrap().push(format!("{}:error", self.name));
        }
    }

    #[test]
    fn pre_phase_is_forward_post_and_error_phases_reverse() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = MiddlewareChain::new()
            .with(Recorder {
                name: "a",
                log: Arc::clone(&log),
            })
            .with(Recorder {
                name: "b",
                log: Arc::clone(&log),
            });

        let mut request = request_context();
        chain.run_before(&mut request).unwrap();
        let mut response = response_context();
        chain.run_after(&request, &mut response).unwrap();
        chain.run_on_error(&request, &Error::Closed);

        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:before", "b:before", "b:after", "a:after", "b:error", "a:error"]
        );
    }

    #[test]
    fn pre_phase_mutations_are_visible_downstream() {
        struct SetHeader;
        impl Middleware for SetHeader {
            fn before(&self, request: &mut RequestContext) -> Result<(), Error> {
                request
                    .headers_mut()
                    .insert("x-tenant", "acme".parse().unwrap());
                Ok(())
            }
            fn after(
                &self,
                _request: &RequestContext,
                _response: &mut ResponseContext,
            ) -> Result<(), Error> {
                Ok(())
            }
        }

        struct AssertHeader;
        impl Middleware for AssertHeader {
            fn before(&self, request: &mut RequestContext) -> Result<(), Error> {
                assert_eq!(request.headers().get("x-tenant").unwrap(), "acme");
                Ok(())
            }
            fn after(
                &self,
                request: &RequestContext,
                _response: &mut ResponseContext,
            ) -> Result<(), Error> {
                // The post-phase sees the mutated request context, not a copy.
                assert_eq!(request.headers().get("x-tenant").unwrap(), "acme");
                Ok(())
            }
        }

        let chain = MiddlewareChain::new().with(SetHeader).with(AssertHeader);
        let mut request = request_context();
        chain.run_before(&mut request).unwrap();
        let mut response = response_context();
        chain.run_after(&request, &mut response).unwrap();
    }

    #[test]
    fn failing_pre_phase_stops_the_chain() {
        let log = Arc::new(Mutex::new(Vec::new()));

        struct Fail;
        impl Middleware for Fail {
            fn before(&self, _request: &mut RequestContext) -> Result<(), Error> {
                Err(Error::Closed)
            }
            fn after(
                &self,
                _request: &RequestContext,
                _response: &mut ResponseContext,
            ) -> Result<(), Error> {
                Ok(())
            }
        }

        let chain = MiddlewareChain::new().with(Fail).with(Recorder {
            name: "late",
            log: Arc::clone(&log),
        });

        let mut request = request_context();
        assert!(chain.run_before(&mut request).is_err());
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn user_agent_set_only_when_absent() {
        let middleware = UserAgentMiddleware::new("armature/0.1");
        let mut request = request_context();

        middleware.before(&mut request).unwrap();
        assert_eq!(request.headers().get(USER_AGENT).unwrap(), "armature/0.1");

        let mut request = request_context();
        request
            .headers_mut()
            .insert(USER_AGENT, "custom/2.0".parse().unwrap());
        middleware.before(&mut request).unwrap();
        assert_eq!(request.headers().get(USER_AGENT).unwrap(), "custom/2.0");
    }

    #[test]
    fn content_type_applied_only_with_body() {
        let middleware = ContentTypeMiddleware::new();

        let mut without_body = request_context();
        middleware.before(&mut without_body).unwrap();
        assert!(!without_body.headers().contains_key(CONTENT_TYPE));

        let mut with_body = request_context();
        with_body.set_body(Some(Body::Json(serde_json::json!({"a": 1}))));
        middleware.before(&mut with_body).unwrap();
        assert_eq!(
            with_body.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[test]
    fn content_type_annotates_response() {
        let middleware = ContentTypeMiddleware::new();
        let request = request_context();

        let mut response = response_context();
        response
            .headers
            .insert(CONTENT_TYPE, "application/json; charset=utf-8".parse().unwrap());
        middleware.after(&request, &mut response).unwrap();

        assert_eq!(
            response.metadata().get("is_json"),
            Some(&serde_json::Value::Bool(true))
        );

        let mut plain = response_context();
        plain
            .headers
            .insert(CONTENT_TYPE, "text/plain".parse().unwrap());
        middleware.after(&request, &mut plain).unwrap();
        assert_eq!(
            plain.metadata().get("is_json"),
            Some(&serde_json::Value::Bool(false))
        );
    }

    #[test]
    fn header_defaults_do_not_overwrite() {
        let mut defaults = HeaderMap::new();
        defaults.insert("x-env", "prod".parse().unwrap());
        defaults.insert("x-team", "core".parse().unwrap());
        let middleware = HeaderDefaultsMiddleware::new(defaults);

        let mut request = request_context();
        request.headers_mut().insert("x-env", "staging".parse().unwrap());
        middleware.before(&mut request).unwrap();

        assert_eq!(request.headers().get("x-env").unwrap(), "staging");
        assert_eq!(request.headers().get("x-team").unwrap(), "core");
    }

    #[test]
    fn timing_fills_elapsed_from_metadata() {
        let control = ClockControl::new();
        let middleware = TimingMiddleware::new(control.to_clock());

        let mut request = request_context();
        middleware.before(&mut request).unwrap();
        assert!(request.metadata().contains_key(TIMING_START_KEY));

        control.advance(Duration::from_millis(1500));

        let mut response = response_context();
        middleware.after(&request, &mut response).unwrap();

        // Epoch seconds round-trip through f64, so allow sub-millisecond slack.
        let elapsed = response.elapsed();
        let expected = Duration::from_millis(1500);
        let drift = elapsed.max(expected) - elapsed.min(expected);
        assert!(drift < Duration::from_millis(1), "elapsed was {elapsed:?}");
    }
}
