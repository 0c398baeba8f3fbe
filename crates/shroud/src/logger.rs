// Copyright (c) The Armature Project Authors.
// Licensed under the MIT License.

use std::time::Duration;

use http::HeaderMap;

use crate::mask::MaskStyle;
use crate::redactor::{InvalidPattern, Redactor};

const DEFAULT_REDACT_HEADERS: &[&str] = &[
    "authorization",
    "x-api-key",
    "api-key",
    "apikey",
    "x-auth-token",
    "cookie",
    "set-cookie",
    "x-csrf-token",
];

const DEFAULT_REDACT_PATTERNS: &[&str] = &[
    r#"password["']?\s*[:=]\s*["']?([^\s"'&]+)"#,
    r#"token["']?\s*[:=]\s*["']?([^\s"'&]+)"#,
    r#"secret["']?\s*[:=]\s*["']?([^\s"'&]+)"#,
    r#"api_?key["']?\s*[:=]\s*["']?([^\s"'&]+)"#,
    r"Bearer\s+(\S+)",
    r"Basic\s+(\S+)",
];

const DEFAULT_REDACT_QUERY_PARAMS: &[&str] = &[
    "password",
    "token",
    "secret",
    "api_key",
    "apikey",
    "access_token",
];

/// What gets logged, and how secrets are masked on the way out.
#[derive(Debug, Clone)]
pub struct LogConfig {
    log_request_headers: bool,
    log_response_headers: bool,
    log_request_body: bool,
    log_response_body: bool,
    log_timing: bool,
    redact_headers: Vec<String>,
    redact_patterns: Vec<String>,
    redact_query_params: Vec<String>,
    mask_style: MaskStyle,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl LogConfig {
    /// Creates a configuration with the built-in redaction lists, request headers and
    /// timing logged, and partial masking.
    #[must_use]
    pub fn new() -> Self {
        Self {
            log_request_headers: true,
            log_response_headers: false,
            log_request_body: false,
            log_response_body: false,
            log_timing: true,
            redact_headers: DEFAULT_REDACT_HEADERS
                .iter()
                .map(|s| (*s).to_owned())
                .collect(),
            redact_patterns: DEFAULT_REDACT_PATTERNS
                .iter()
                .map(|s| (*s).to_owned())
                .collect(),
            redact_query_params: DEFAULT_REDACT_QUERY_PARAMS
                .iter()
                .map(|s| (*s).to_owned())
                .collect(),
            mask_style: MaskStyle::default(),
        }
    }

    /// Sets whether request headers are logged.
    #[must_use]
    pub fn with_log_request_headers(mut self, enabled: bool) -> Self {
        self.log_request_headers = enabled;
        self
    }

    /// Sets whether response headers are logged.
    #[must_use]
    pub fn with_log_response_headers(mut self, enabled: bool) -> Self {
        self.log_response_headers = enabled;
        self
    }

    /// Sets whether request bodies are logged.
    #[must_use]
    pub fn with_log_request_body(mut self, enabled: bool) -> Self {
        self.log_request_body = enabled;
        self
    }

    /// Sets whether response bodies are logged.
    #[must_use]
    pub fn with_log_response_body(mut self, enabled: bool) -> Self {
        self.log_response_body = enabled;
        self
    }

    /// Sets whether response timing is logged.
    #[must_use]
    pub fn with_log_timing(mut self, enabled: bool) -> Self {
        self.log_timing = enabled;
        self
    }

    /// Replaces the list of header names masked in full.
    #[must_use]
    pub fn with_redact_headers(mut self, headers: impl IntoIterator<Item = String>) -> Self {
        self.redact_headers = headers.into_iter().collect();
        self
    }

    /// Replaces the list of redaction patterns applied to text surfaces.
    #[must_use]
    pub fn with_redact_patterns(mut self, patterns: impl IntoIterator<Item = String>) -> Self {
        self.redact_patterns = patterns.into_iter().collect();
        self
    }

    /// Replaces the list of query parameter names masked in URLs.
    #[must_use]
    pub fn with_redact_query_params(mut self, params: impl IntoIterator<Item = String>) -> Self {
        self.redact_query_params = params.into_iter().collect();
        self
    }

    /// Sets the masking style.
    #[must_use]
    pub fn with_mask_style(mut self, style: MaskStyle) -> Self {
        self.mask_style = style;
        self
    }

    /// Returns the header names masked in full.
    #[must_use]
    pub fn redact_headers(&self) -> &[String] {
        &self.redact_headers
    }

    /// Returns the redaction patterns applied to text surfaces.
    #[must_use]
    pub fn redact_patterns(&self) -> &[String] {
        &self.redact_patterns
    }

    /// Returns the query parameter names masked in URLs.
    #[must_use]
    pub fn redact_query_params(&self) -> &[String] {
        &self.redact_query_params
    }

    /// Returns the masking style.
    #[must_use]
    pub fn mask_style(&self) -> MaskStyle {
        self.mask_style
    }
}

/// Emits structured, redacted events for each stage of a request's life.
///
/// Every event carries the short request id threaded through the attempt loop, so one call's
/// events correlate without the caller chasing timestamps.
#[derive(Debug)]
pub struct RequestLogger {
    config: LogConfig,
    redactor: Redactor,
}

impl RequestLogger {
    /// Builds the logger, compiling the redaction patterns once.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidPattern`] when a configured redaction pattern does not compile.
    pub fn new(config: LogConfig) -> Result<Self, InvalidPattern> {
        let redactor = Redactor::new(&config)?;
        Ok(Self { config, redactor })
    }

    /// Returns the redactor backing this logger.
    #[must_use]
    pub fn redactor(&self) -> &Redactor {
        &self.redactor
    }

    /// Logs the start of a logical request.
    pub fn request_started(
        &self,
        request_id: &str,
        method: &str,
        url: &str,
        headers: &HeaderMap,
        body: Option<&str>,
    ) {
        let redacted_url = self.redactor.redact_url(url);
        tracing::info!(
            request.id = request_id,
            http.method = method,
            http.url = %redacted_url,
            "request started"
        );

        if self.config.log_request_headers {
            let headers = self.redactor.redact_headers(headers);
            tracing::debug!(
                request.id = request_id,
                headers = ?headers,
                "request headers"
            );
        }

        if self.config.log_request_body
            && let Some(body) = body
        {
            let body = self.redactor.redact_text(body);
            tracing::debug!(
                request.id = request_id,
                body = %body,
                "request body"
            );
        }
    }

    /// Logs a completed response. Statuses of 400 and above log at warn level.
    pub fn response(
        &self,
        request_id: &str,
        status: u16,
        headers: &HeaderMap,
        duration: Duration,
        body: Option<&str>,
    ) {
        if status >= 400 {
            tracing::warn!(
                request.id = request_id,
                http.status = status,
                duration.seconds = duration.as_secs_f64(),
                "response"
            );
        } else if self.config.log_timing {
            tracing::info!(
                request.id = request_id,
                http.status = status,
                duration.seconds = duration.as_secs_f64(),
                "response"
            );
        } else {
            tracing::info!(
                request.id = request_id,
                http.status = status,
                "response"
            );
        }

        if self.config.log_response_headers {
            let headers = self.redactor.redact_headers(headers);
            tracing::debug!(
                request.id = request_id,
                headers = ?headers,
                "response headers"
            );
        }

        if self.config.log_response_body
            && let Some(body) = body
        {
            let body = self.redactor.redact_text(body);
            tracing::debug!(
                request.id = request_id,
                body = %body,
                "response body"
            );
        }
    }

    /// Logs a retry decision with the planned delay and reason.
    pub fn retry(
        &self,
        request_id: &str,
        attempt: u32,
        max_attempts: u32,
        delay: Duration,
        reason: &str,
    ) {
        tracing::warn!(
            request.id = request_id,
            retry.attempt = attempt,
            retry.max_attempts = max_attempts,
            retry.delay_seconds = delay.as_secs_f64(),
            retry.reason = reason,
            "retrying"
        );
    }

    /// Logs a terminal error. The rendered error passes through text redaction.
    pub fn error(&self, request_id: &str, error: &dyn std::fmt::Display) {
        let rendered = self.redactor.redact_text(&error.to_string());
        tracing::error!(
            request.id = request_id,
            error = %rendered,
            "request failed"
        );
    }

    /// Logs a circuit state transition.
    pub fn circuit_transition(&self, from: &str, to: &str, failure_count: u32) {
        tracing::warn!(
            circuit.from = from,
            circuit.to = to,
            circuit.failures = failure_count,
            "circuit state changed"
        );
    }
}
