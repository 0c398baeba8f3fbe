// Copyright (c) The Armature Project Authors.
// Licensed under the MIT License.

//! The transport seam: one physical attempt on the wire.
//!
//! The pipeline is transport-agnostic. It hands a [`Transport`] one fully-resolved attempt
//! at a time and classifies the outcome; everything below — TLS, connection pooling, DNS —
//! belongs to the transport implementation. The default implementation
//! ([`ReqwestTransport`], behind the `reqwest-transport` feature) delegates to `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};

use crate::request::Body;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// One fully-resolved physical attempt.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// The request method.
    pub method: Method,
    /// The absolute URL.
    pub url: String,
    /// The headers to send.
    pub headers: HeaderMap,
    /// Query parameters appended to the URL.
    pub params: Vec<(String, String)>,
    /// The body, if any.
    pub body: Option<Body>,
    /// The overall deadline for this attempt. Reset for each attempt; retries never share
    /// a deadline with prior attempts.
    pub timeout: Duration,
}

/// The raw result of one attempt.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// The status code.
    pub status: StatusCode,
    /// The response headers.
    pub headers: HeaderMap,
    /// The full response body.
    pub body: Bytes,
}

/// How an attempt failed, classified for the retry engine.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The attempt deadline elapsed.
    #[error("attempt timed out")]
    Timeout(#[source] Option<BoxError>),

    /// The connection could not be established.
    #[error("connection failed")]
    Connect(#[source] Option<BoxError>),

    /// Anything else the transport could not classify.
    #[error("transport failure")]
    Other(#[source] BoxError),
}

/// Performs the actual HTTP exchange for a single attempt.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Executes one attempt, honoring the request's deadline.
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// Connection pool settings handed to the transport at construction.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Deadline for establishing a connection.
    pub connect_timeout: Duration,
    /// Upper bound on concurrent connections the caller intends to use.
    pub max_connections: usize,
    /// Upper bound on idle connections kept alive per host.
    pub max_keepalive_connections: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            max_connections: 100,
            max_keepalive_connections: 20,
        }
    }
}

/// The default transport, backed by a pooled `reqwest` client.
#[cfg(feature = "reqwest-transport")]
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

#[cfg(feature = "reqwest-transport")]
impl ReqwestTransport {
    /// Builds the transport and its connection pool.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Other`] when the underlying client cannot be constructed.
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .pool_max_idle_per_host(config.max_keepalive_connections)
            .build()
            .map_err(|error| TransportError::Other(Box::new(error)))?;

        Ok(Self { client })
    }
}

#[cfg(feature = "reqwest-transport")]
#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method, &request.url)
            .timeout(request.timeout)
            .headers(request.headers);

        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }

        builder = match request.body {
            Some(Body::Json(value)) => builder.json(&value),
            Some(Body::Bytes(bytes)) => builder.body(bytes),
            None => builder,
        };

        let response = builder.send().await.map_err(classify_reqwest_error)?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(classify_reqwest_error)?;

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(feature = "reqwest-transport")]
fn classify_reqwest_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout(Some(Box::new(error)))
    } else if error.is_connect() {
        TransportError::Connect(Some(Box::new(error)))
    } else {
        TransportError::Other(Box::new(error))
    }
}
