// Copyright (c) The Armature Project Authors.
// Licensed under the MIT License.

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, Method};

/// A request body.
#[derive(Debug, Clone)]
pub enum Body {
    /// A JSON document, serialized on the wire with `Content-Type: application/json`.
    Json(serde_json::Value),
    /// Raw bytes, sent as-is.
    Bytes(Bytes),
}

impl Body {
    /// Renders the body as text for logging purposes.
    #[must_use]
    pub fn as_text(&self) -> String {
        match self {
            Self::Json(value) => value.to_string(),
            Self::Bytes(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        }
    }
}

/// Per-call options for [`Client::execute`][crate::Client::execute].
///
/// Everything is optional; the defaults are no parameters, no extra headers, no body, the
/// client-level timeout, and caching enabled (for cacheable methods).
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub(crate) params: Vec<(String, String)>,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Option<Body>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) use_cache: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestOptions {
    /// Creates empty options with caching enabled.
    #[must_use]
    pub fn new() -> Self {
        Self {
            params: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
            timeout: None,
            use_cache: true,
        }
    }

    /// Adds a query parameter.
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    /// Replaces the query parameters.
    #[must_use]
    pub fn with_params(mut self, params: impl IntoIterator<Item = (String, String)>) -> Self {
        self.params = params.into_iter().collect();
        self
    }

    /// Adds a header. Later writes to the same name win over client defaults.
    #[must_use]
    pub fn with_header(mut self, name: http::HeaderName, value: http::HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Attaches a JSON body.
    #[must_use]
    pub fn with_json(mut self, value: serde_json::Value) -> Self {
        self.body = Some(Body::Json(value));
        self
    }

    /// Attaches a raw byte body.
    #[must_use]
    pub fn with_bytes(mut self, bytes: impl Into<Bytes>) -> Self {
        self.body = Some(Body::Bytes(bytes.into()));
        self
    }

    /// Overrides the client-level timeout for this call.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Enables or disables the cache for this call.
    #[must_use]
    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }
}

/// The mutable view of a request as it moves through the middleware pre-phase.
///
/// Middlewares run in insertion order and see each other's mutations; after the pre-phase
/// the context is frozen from the caller's perspective and drives every attempt. The
/// metadata bag carries annotations between the pre- and post-phases of the same call.
#[derive(Debug)]
pub struct RequestContext {
    pub(crate) method: Method,
    pub(crate) url: String,
    pub(crate) headers: HeaderMap,
    pub(crate) params: Vec<(String, String)>,
    pub(crate) body: Option<Body>,
    pub(crate) timeout: Duration,
    pub(crate) metadata: HashMap<String, serde_json::Value>,
    pub(crate) request_id: String,
}

impl RequestContext {
    /// Returns the request method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the absolute request URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the request headers for mutation.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Returns the query parameters.
    #[must_use]
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// Returns the body, if any.
    #[must_use]
    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    /// Replaces the body.
    pub fn set_body(&mut self, body: Option<Body>) {
        self.body = body;
    }

    /// Returns the effective per-attempt timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns the metadata bag.
    #[must_use]
    pub fn metadata(&self) -> &HashMap<String, serde_json::Value> {
        &self.metadata
    }

    /// Returns the metadata bag for mutation.
    pub fn metadata_mut(&mut self) -> &mut HashMap<String, serde_json::Value> {
        &mut self.metadata
    }

    /// Returns the short id correlating every event of this call.
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }
}
