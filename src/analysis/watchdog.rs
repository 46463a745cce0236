//! Entropy watchdog.
//!
//! The safety interlock applied to live data: blocks on their way to
//! the device and samples read back from it. An engine or I/O bug that
//! silently degrades output would otherwise yield a wipe that looks
//! complete but is not.

use super::{
    statistics::shannon_entropy,
    threshold::{EntropyDegraded, DEFAULT_ENTROPY_THRESHOLD},
};

/// Stateless entropy validator.
///
/// The only field is configuration; scoring never mutates it, so one
/// watchdog can be shared by reference across a whole session.
#[derive(Debug, Clone, Copy)]
pub struct EntropyWatchdog {
    threshold: f64,
}

impl EntropyWatchdog {
    /// Creates a watchdog with the given threshold, clamped to `[0, 8]`.
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 8.0),
        }
    }

    /// Configured threshold in bits per byte.
    #[inline]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Shannon entropy of `buffer` in bits per byte.
    #[inline]
    pub fn score(buffer: &[u8]) -> f64 {
        shannon_entropy(buffer)
    }

    /// Returns true iff `buffer` scores at or above the configured threshold.
    ///
    /// A miss is logged as a warning.
    pub fn validate(&self, buffer: &[u8]) -> bool {
        self.validate_with(buffer, self.threshold)
    }

    /// Like [`validate`](Self::validate) with an explicit threshold.
    pub fn validate_with(&self, buffer: &[u8], threshold: f64) -> bool {
        match Self::check_against(buffer, threshold) {
            Ok(_) => true,
            Err(miss) => {
                tracing::warn!(
                    observed = miss.observed,
                    threshold = miss.threshold,
                    bytes = buffer.len(),
                    "Entropy watchdog triggered"
                );
                false
            }
        }
    }

    /// Scores `buffer`, returning the score or the threshold miss.
    ///
    /// Does not log; callers decide how a miss is reported.
    pub fn check(&self, buffer: &[u8]) -> Result<f64, EntropyDegraded> {
        Self::check_against(buffer, self.threshold)
    }

    fn check_against(buffer: &[u8], threshold: f64) -> Result<f64, EntropyDegraded> {
        let observed = Self::score(buffer);
        if observed >= threshold {
            Ok(observed)
        } else {
            Err(EntropyDegraded {
                observed,
                threshold,
            })
        }
    }
}

impl Default for EntropyWatchdog {
    fn default() -> Self {
        Self::new(DEFAULT_ENTROPY_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand_chacha::ChaCha20Rng;
    use rand_core::{RngCore, SeedableRng};

    #[test]
    fn test_empty_buffer_scores_zero() {
        assert_eq!(EntropyWatchdog::score(b""), 0.0);
        assert!(!EntropyWatchdog::default().validate(b""));
    }

    #[test]
    fn test_repeated_byte_fails() {
        let dog = EntropyWatchdog::default();
        let data = vec![0x00u8; 4096];

        assert_eq!(EntropyWatchdog::score(&data), 0.0);
        assert!(!dog.validate(&data));
    }

    #[test]
    fn test_random_buffer_passes() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let mut data = vec![0u8; 1 << 16];
        rng.fill_bytes(&mut data);

        let dog = EntropyWatchdog::default();
        assert!(EntropyWatchdog::score(&data) >= 7.9);
        assert!(dog.validate(&data));
    }

    #[test]
    fn test_os_random_buffer_passes() {
        let mut data = vec![0u8; 4096];
        rand_core::OsRng.fill_bytes(&mut data);

        assert!(EntropyWatchdog::score(&data) >= 7.9);
    }

    #[test]
    fn test_threshold_boundary_is_inclusive() {
        // Every value once: exactly 8.0 bits per byte.
        let data: Vec<u8> = (0..=255u8).collect();
        let dog = EntropyWatchdog::new(8.0);

        assert!(dog.validate(&data));
        assert!(dog.validate_with(&data, EntropyWatchdog::score(&data)));
    }

    #[test]
    fn test_exact_two_bit_boundary() {
        let data: Vec<u8> = [0u8, 1, 2, 3].repeat(256);
        let dog = EntropyWatchdog::default();

        assert!(dog.validate_with(&data, 2.0));
        assert!(!dog.validate_with(&data, 2.0001));
    }

    #[test]
    fn test_check_reports_miss() {
        let dog = EntropyWatchdog::default();
        let miss = dog.check(&[0xAB; 512]).unwrap_err();

        assert_eq!(miss.observed, 0.0);
        assert_eq!(miss.threshold, 7.9);
    }

    #[test]
    fn test_threshold_is_clamped() {
        assert_eq!(EntropyWatchdog::new(12.0).threshold(), 8.0);
        assert_eq!(EntropyWatchdog::new(-1.0).threshold(), 0.0);
    }

    proptest! {
        #[test]
        fn prop_score_within_bounds(data in proptest::collection::vec(any::<u8>(), 0..4096)) {
            let score = EntropyWatchdog::score(&data);
            prop_assert!((0.0..=8.0).contains(&score));
        }

        #[test]
        fn prop_validate_matches_score(
            data in proptest::collection::vec(any::<u8>(), 0..2048),
            threshold in 0.0f64..8.0,
        ) {
            let dog = EntropyWatchdog::new(threshold);
            prop_assert_eq!(dog.validate(&data), EntropyWatchdog::score(&data) >= threshold);
        }
    }
}
