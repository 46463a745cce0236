//! Entropy threshold and the response to a miss.

use serde::{Deserialize, Serialize};

/// Default minimum entropy in bits per byte.
pub const DEFAULT_ENTROPY_THRESHOLD: f64 = 7.9;

/// What a pass does when a watched block scores below threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntropyPolicy {
    /// Log the miss and keep writing.
    #[default]
    Warn,
    /// Abort the pass with [`EntropyDegraded`].
    Abort,
}

impl EntropyPolicy {
    /// Returns true if a threshold miss aborts the pass.
    #[inline]
    pub fn aborts(&self) -> bool {
        matches!(self, EntropyPolicy::Abort)
    }
}

/// A buffer scored below the entropy threshold.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("entropy {observed:.4} below threshold {threshold:.4}")]
pub struct EntropyDegraded {
    /// Observed score in bits per byte.
    pub observed: f64,
    /// Threshold that was missed.
    pub threshold: f64,
}
