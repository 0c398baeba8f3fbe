// Copyright (c) The Armature Project Authors.
// Licensed under the MIT License.

use std::collections::HashSet;

use http::HeaderMap;
use regex::{Regex, RegexBuilder};

use crate::logger::LogConfig;
use crate::mask::MaskStyle;

/// A redaction pattern failed to compile.
#[derive(Debug, thiserror::Error)]
#[error("invalid redaction pattern: {0}")]
pub struct InvalidPattern(#[from] regex::Error);

/// Masks sensitive material across headers, query strings, and free text.
///
/// The redactor is built once from a [`LogConfig`] — patterns compile at construction and
/// the instance is read-only afterwards, so it can be shared freely across tasks.
#[derive(Debug)]
pub struct Redactor {
    header_names: HashSet<String>,
    query_params: HashSet<String>,
    patterns: Vec<Regex>,
    style: MaskStyle,
}

impl Redactor {
    /// Compiles the redaction configuration.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidPattern`] when a configured pattern is not a valid regular
    /// expression.
    pub fn new(config: &LogConfig) -> Result<Self, InvalidPattern> {
        let patterns = config
            .redact_patterns()
            .iter()
            .map(|pattern| {
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(InvalidPattern::from)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            header_names: config
                .redact_headers()
                .iter()
                .map(|name| name.to_ascii_lowercase())
                .collect(),
            query_params: config
                .redact_query_params()
                .iter()
                .map(|name| name.to_ascii_lowercase())
                .collect(),
            patterns,
            style: config.mask_style(),
        })
    }

    /// Masks a single value with the configured style.
    #[must_use]
    pub fn mask_value(&self, value: &str) -> String {
        self.style.mask(value)
    }

    /// Redacts a header map into loggable name/value pairs.
    ///
    /// Headers on the redaction list are masked in full; every other value still passes
    /// through the pattern redaction, catching credentials smuggled into unexpected
    /// headers.
    #[must_use]
    pub fn redact_headers(&self, headers: &HeaderMap) -> Vec<(String, String)> {
        headers
            .iter()
            .map(|(name, value)| {
                let value = String::from_utf8_lossy(value.as_bytes());
                let redacted = if self.header_names.contains(name.as_str()) {
                    self.mask_value(&value)
                } else {
                    self.redact_text(&value)
                };
                (name.as_str().to_owned(), redacted)
            })
            .collect()
    }

    /// Applies the pattern redaction to free text such as bodies.
    ///
    /// For each pattern, the first capture group (or the entire match, when the pattern has
    /// no groups) is replaced with its mask.
    #[must_use]
    pub fn redact_text(&self, text: &str) -> String {
        let mut result = text.to_owned();

        for pattern in &self.patterns {
            result = pattern
                .replace_all(&result, |caps: &regex::Captures<'_>| {
                    let full = caps.get(0).map_or("", |m| m.as_str());
                    match caps.get(1) {
                        Some(group) => {
                            full.replace(group.as_str(), &self.mask_value(group.as_str()))
                        }
                        None => self.mask_value(full),
                    }
                })
                .into_owned();
        }

        result
    }

    /// Masks sensitive query parameters in a URL, reassembling the query string.
    ///
    /// A URL that does not parse is returned unchanged rather than dropped from the log.
    #[must_use]
    pub fn redact_url(&self, url: &str) -> String {
        let Ok(mut parsed) = url::Url::parse(url) else {
            return url.to_owned();
        };

        if parsed.query().is_none() {
            return url.to_owned();
        }

        let redacted: Vec<(String, String)> = parsed
            .query_pairs()
            .map(|(name, value)| {
                let masked = if self.query_params.contains(&name.to_ascii_lowercase()) {
                    self.mask_value(&value)
                } else {
                    value.into_owned()
                };
                (name.into_owned(), masked)
            })
            .collect();

        parsed
            .query_pairs_mut()
            .clear()
            .extend_pairs(redacted.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        parsed.into()
    }
}
