// Copyright (c) The Armature Project Authors.
// Licensed under the MIT License.

use sha2::{Digest, Sha256};

/// Computes the canonical identity of a request for caching.
///
/// The fingerprint is the SHA-256 hex digest of the uppercased method, the URL, the sorted
/// query parameters, and the sorted subset of headers named in `include_headers`. Headers
/// outside that subset never affect the result, so responses that vary by header must opt
/// in explicitly. Parameter order does not matter:
///
/// ```
/// use stockpile::fingerprint;
///
/// let a = fingerprint(
///     "get",
///     "https://api.example.com/u",
///     &[("page".into(), "2".into()), ("id".into(), "1".into())],
///     &[],
///     &[],
/// );
/// let b = fingerprint(
///     "GET",
///     "https://api.example.com/u",
///     &[("id".into(), "1".into()), ("page".into(), "2".into())],
///     &[],
///     &[],
/// );
/// assert_eq!(a, b);
/// ```
#[must_use]
pub fn fingerprint(
    method: &str,
    url: &str,
    params: &[(String, String)],
    headers: &[(String, String)],
    include_headers: &[String],
) -> String {
    let mut parts: Vec<String> = vec![method.to_ascii_uppercase(), url.to_owned()];

    if !params.is_empty() {
        let mut sorted: Vec<(&str, &str)> = params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        sorted.sort_unstable();
        // Infallible: string pairs always serialize.
        parts.push(serde_json::to_string(&sorted).unwrap_or_default());
    }

    if !headers.is_empty() && !include_headers.is_empty() {
        let mut included: Vec<String> = include_headers
            .iter()
            .map(|name| name.to_ascii_lowercase())
            .collect();
        included.sort_unstable();
        included.dedup();

        let selected: Vec<(&str, &str)> = included
            .iter()
            .filter_map(|name| {
                headers
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(name))
                    .map(|(_, v)| (name.as_str(), v.as_str()))
            })
            .collect();

        if !selected.is_empty() {
            parts.push(serde_json::to_string(&selected).unwrap_or_default());
        }
    }

    let mut hasher = Sha256::new();
    hasher.update(parts.join("|").as_bytes());
    format!("{:x}", hasher.finalize())
}
