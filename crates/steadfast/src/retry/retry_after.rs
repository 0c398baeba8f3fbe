// Copyright (c) The Armature Project Authors.
// Licensed under the MIT License.

use std::time::{Duration, SystemTime};

/// Parses a `Retry-After` header value.
///
/// Accepts either a number of seconds (`"120"`) or an RFC 7231 HTTP-date
/// (`"Sun, 06 Nov 1994 08:49:37 GMT"`). A date in the past yields [`Duration::ZERO`];
/// anything unparseable yields `None`.
///
/// ```
/// use std::time::{Duration, SystemTime};
/// use steadfast::parse_retry_after;
///
/// let now = SystemTime::now();
/// assert_eq!(parse_retry_after("120", now), Some(Duration::from_secs(120)));
/// assert_eq!(parse_retry_after("not-a-delay", now), None);
/// ```
#[must_use]
pub fn parse_retry_after(value: &str, now: SystemTime) -> Option<Duration> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(seconds) = value.parse::<f64>() {
        if !seconds.is_finite() {
            return None;
        }
        return Some(Duration::try_from_secs_f64(seconds.max(0.0)).unwrap_or(Duration::MAX));
    }

    let date = jiff::fmt::rfc2822::parse(value).ok()?;
    let target = SystemTime::from(date.timestamp());
    Some(target.duration_since(now).unwrap_or(Duration::ZERO))
}
