// Copyright (c) The Armature Project Authors.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use serde::{Deserialize, Serialize};

/// A completed HTTP response.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    elapsed: Duration,
}

impl Response {
    pub(crate) fn new(
        status: StatusCode,
        headers: HeaderMap,
        body: Bytes,
        elapsed: Duration,
    ) -> Self {
        Self {
            status,
            headers,
            body,
            elapsed,
        }
    }

    /// Returns the status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the response headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the raw body bytes.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns how long the winning attempt took.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Returns the body as text, replacing invalid UTF-8.
    #[must_use]
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Deserializes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns the underlying error when the body is not valid JSON for `T`.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Returns whether the status is in the 2xx range.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// The mutable view of a response as it moves through the middleware post-phase.
#[derive(Debug)]
pub struct ResponseContext {
    pub(crate) status: StatusCode,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
    pub(crate) elapsed: Duration,
    pub(crate) metadata: HashMap<String, serde_json::Value>,
}

impl ResponseContext {
    pub(crate) fn new(status: StatusCode, headers: HeaderMap, body: Bytes, elapsed: Duration) -> Self {
        Self {
            status,
            headers,
            body,
            elapsed,
            metadata: HashMap::new(),
        }
    }

    /// Returns the status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the response headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the raw body bytes.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the elapsed time recorded so far.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Overrides the elapsed time.
    pub fn set_elapsed(&mut self, elapsed: Duration) {
        self.elapsed = elapsed;
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

    pub(crate) fn into_response(self) -> Response {
        Response::new(self.status, self.headers, self.body, self.elapsed)
    }
}

/// The serializable form a response takes inside a cache tier.
///
/// Header names that fail to parse on the way back (for instance, after a foreign writer
/// shared the cache namespace) are dropped rather than failing the whole hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    elapsed_secs: f64,
}

impl CachedResponse {
    pub(crate) fn from_context(context: &ResponseContext) -> Self {
        Self {
            status: context.status.as_u16(),
            headers: context
                .headers
                .iter()
                .map(|(name, value)| {
                    (
                        name.as_str().to_owned(),
                        String::from_utf8_lossy(value.as_bytes()).into_owned(),
                    )
                })
                .collect(),
            body: context.body.to_vec(),
            elapsed_secs: context.elapsed.as_secs_f64(),
        }
    }

    pub(crate) fn into_response(self) -> Response {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            if let (Ok(name), Ok(value)) = (
                name.parse::<HeaderName>(),
                value.parse::<HeaderValue>(),
            ) {
                headers.append(name, value);
            }
        }

        Response::new(
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK),
            headers,
            Bytes::from(self.body),
            Duration::try_from_secs_f64(self.elapsed_secs).unwrap_or(Duration::ZERO),
        )
    }
}
