// Copyright (c) The Armature Project Authors.
// Licensed under the MIT License.

use std::fmt::Debug;

/// Non-cryptographic randomness source used for jitter.
///
/// Jitter does not need cryptographic guarantees, only a cheap uniform draw. The test variant
/// substitutes a scripted generator so delay computations become deterministic.
#[derive(Clone, Default)]
pub(crate) enum Rnd {
    #[default]
    Real,

    #[cfg(test)]
    Scripted(std::sync::Arc<dyn Fn() -> f64 + Send + Sync>),
}

impl Debug for Rnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Real => write!(f, "Real"),
            #[cfg(test)]
            Self::Scripted(_) => write!(f, "Scripted"),
        }
    }
}

impl Rnd {
    /// Returns a uniform draw from `[0, 1)`.
    pub fn next_f64(&self) -> f64 {
        match self {
            Self::Real => fastrand::f64(),
            #[cfg(test)]
            Self::Scripted(generator) => generator(),
        }
    }

    #[cfg(test)]
    pub fn fixed(value: f64) -> Self {
        Self::Scripted(std::sync::Arc::new(move || value))
    }
}
