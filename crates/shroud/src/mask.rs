// Copyright (c) The Armature Project Authors.
// Licensed under the MIT License.

use sha2::{Digest, Sha256};

/// The fixed placeholder produced by [`MaskStyle::Full`].
pub const REDACTION_PLACEHOLDER: &str = "***REDACTED***";

/// How a sensitive value is rendered in log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskStyle {
    /// Replace the whole value with [`REDACTION_PLACEHOLDER`].
    Full,

    /// Keep the first and last `n` characters; values too short to mask safely become
    /// `****`.
    Partial(usize),

    /// Replace the value with a truncated SHA-256 digest, `[HASH:xxxxxxxx]`. Equal values
    /// keep equal masks, which preserves correlation across log lines.
    Hash,
}

impl MaskStyle {
    /// Masks `value` according to this style.
    ///
    /// The partial style operates on characters, not bytes, so multibyte input never
    /// produces torn output.
    #[must_use]
    pub fn mask(&self, value: &str) -> String {
        match self {
            Self::Full => REDACTION_PLACEHOLDER.to_owned(),
            Self::Partial(keep) => {
                let chars: Vec<char> = value.chars().collect();
                if chars.len() <= keep * 2 {
                    return "****".to_owned();
                }
                let head: String = chars[..*keep].iter().collect();
                let tail: String = chars[chars.len() - keep..].iter().collect();
                format!("{head}...{tail}")
            }
            Self::Hash => {
                let mut hasher = Sha256::new();
                hasher.update(value.as_bytes());
                let digest = format!("{:x}", hasher.finalize());
                format!("[HASH:{}]", &digest[..8])
            }
        }
    }
}

impl Default for MaskStyle {
    fn default() -> Self {
        Self::Partial(4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_mask_is_fixed_placeholder() {
        assert_eq!(MaskStyle::Full.mask("secret-token"), "***REDACTED***");
        assert_eq!(MaskStyle::Full.mask(""), "***REDACTED***");
    }

    #[test]
    fn partial_keeps_head_and_tail() {
        assert_eq!(
            MaskStyle::Partial(4).mask("secret-token-12345"),
            "secr...2345"
        );
    }

    #[test]
    fn partial_masks_short_values_entirely() {
        assert_eq!(MaskStyle::Partial(4).mask("12345678"), "****");
        assert_eq!(MaskStyle::Partial(4).mask("x"), "****");
        assert_eq!(MaskStyle::Partial(4).mask(""), "****");
    }

    #[test]
    fn partial_boundary_is_twice_the_width() {
        // Nine characters is the shortest value that keeps a head and tail at width 4.
        assert_eq!(MaskStyle::Partial(4).mask("123456789"), "1234...6789");
    }

    #[test]
    fn partial_handles_multibyte_characters() {
        let masked = MaskStyle::Partial(2).mask("ünïcödé-sécrét");
        assert_eq!(masked, "ün...ét");
    }

    #[test]
    fn hash_is_stable_and_truncated() {
        let a = MaskStyle::Hash.mask("secret");
        let b = MaskStyle::Hash.mask("secret");
        assert_eq!(a, b);
        assert!(a.starts_with("[HASH:"));
        assert_eq!(a.len(), "[HASH:]".len() + 8);
        assert!(!a.contains("secret"));
    }

    #[test]
    fn hash_differs_for_different_values() {
        assert_ne!(MaskStyle::Hash.mask("alpha"), MaskStyle::Hash.mask("beta"));
    }

    #[test]
    fn default_is_partial_four() {
        assert_eq!(MaskStyle::default(), MaskStyle::Partial(4));
    }
}
