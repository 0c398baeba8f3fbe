// Copyright (c) The Armature Project Authors.
// Licensed under the MIT License.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// A single `Cache-Control` directive value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// A bare token such as `no-cache`.
    Flag,
    /// A directive with an integer value, such as `max-age=300`.
    Int(i64),
    /// A directive with a non-numeric value.
    Text(String),
}

impl Display for Directive {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Flag => Ok(()),
            Self::Int(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "{value}"),
        }
    }
}

/// Parses a `Cache-Control` header into a directive map.
///
/// Directives are comma-separated. `key=value` pairs parse the value as an integer where
/// possible (quotes stripped first); bare tokens become [`Directive::Flag`]. Keys are
/// lowercased. An empty or absent header yields an empty map.
///
/// ```
/// use stockpile::{Directive, parse_cache_control};
///
/// let directives = parse_cache_control("max-age=300, no-store, private=\"x\"");
/// assert_eq!(directives.get("max-age"), Some(&Directive::Int(300)));
/// assert_eq!(directives.get("no-store"), Some(&Directive::Flag));
/// assert_eq!(directives.get("private"), Some(&Directive::Text("x".to_owned())));
/// ```
#[must_use]
pub fn parse_cache_control(value: &str) -> BTreeMap<String, Directive> {
    let mut directives = BTreeMap::new();

    for part in value.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }

        match part.split_once('=') {
            Some((key, raw)) => {
                let key = key.trim().to_ascii_lowercase();
                let raw = raw.trim().trim_matches('"');
                let directive = raw
                    .parse::<i64>()
                    .map_or_else(|_| Directive::Text(raw.to_owned()), Directive::Int);
                directives.insert(key, directive);
            }
            None => {
                directives.insert(part.to_ascii_lowercase(), Directive::Flag);
            }
        }
    }

    directives
}

/// Renders a directive map back into a `Cache-Control` header value.
///
/// For every well-formed map `d`, `parse_cache_control(&render_cache_control(&d)) == d`.
#[must_use]
pub fn render_cache_control(directives: &BTreeMap<String, Directive>) -> String {
    directives
        .iter()
        .map(|(key, directive)| match directive {
            Directive::Flag => key.clone(),
            Directive::Int(_) | Directive::Text(_) => format!("{key}={directive}"),
        })
        .collect::<Vec<_>>()
        .join(", ")
}
