//! Byte-frequency statistics.
//!
//! Shannon entropy over the byte-value distribution is a cheap signal
//! that generated or read-back content has not degenerated. It says
//! nothing about unpredictability: a counter pattern scores 8.0.

/// Occurrence counts of each byte value in a buffer.
#[derive(Clone)]
pub struct ByteHistogram {
    counts: [u64; 256],
    total: u64,
}

impl ByteHistogram {
    /// Counts every byte of `data`.
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut counts = [0u64; 256];
        for &b in data {
            counts[b as usize] += 1;
        }

        Self {
            counts,
            total: data.len() as u64,
        }
    }

    /// Number of bytes counted.
    #[inline]
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Occurrences of `value`.
    #[inline]
    pub fn count(&self, value: u8) -> u64 {
        self.counts[value as usize]
    }

    /// Number of distinct byte values observed.
    pub fn distinct(&self) -> usize {
        self.counts.iter().filter(|&&c| c > 0).count()
    }

    /// Shannon entropy in bits per byte, in `[0.0, 8.0]`.
    ///
    /// `H = -sum(p_i * log2(p_i))` over observed values. Empty input
    /// scores 0.0.
    pub fn shannon_entropy(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }

        let n = self.total as f64;
        let entropy: f64 = self
            .counts
            .iter()
            .filter(|&&c| c > 0)
            .map(|&c| {
                let p = c as f64 / n;
                -p * p.log2()
            })
            .sum();

        // Summation error can leave a constant buffer at -0.0 or push a
        // uniform one a hair past 8.0.
        entropy.clamp(0.0, 8.0)
    }

    /// Pearson chi-square statistic against a uniform byte distribution.
    ///
    /// 255 degrees of freedom; values far above ~310 indicate structure.
    pub fn chi_square(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }

        let expected = self.total as f64 / 256.0;
        self.counts
            .iter()
            .map(|&c| {
                let d = c as f64 - expected;
                d * d / expected
            })
            .sum()
    }
}

impl std::fmt::Debug for ByteHistogram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteHistogram")
            .field("total", &self.total)
            .field("distinct", &self.distinct())
            .finish()
    }
}

/// Shannon entropy of `data` in bits per byte.
pub fn shannon_entropy(data: &[u8]) -> f64 {
    ByteHistogram::from_bytes(data).shannon_entropy()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_scores_zero() {
        assert_eq!(shannon_entropy(b""), 0.0);
    }

    #[test]
    fn test_constant_scores_zero() {
        for len in [1usize, 2, 1024, 4096] {
            assert_eq!(shannon_entropy(&vec![0x80u8; len]), 0.0);
        }
    }

    #[test]
    fn test_every_value_once_scores_eight() {
        let data: Vec<u8> = (0..=255u8).collect();
        assert!((shannon_entropy(&data) - 8.0).abs() < 1e-12);
    }

    #[test]
    fn test_two_symbols_score_one_bit() {
        let data: Vec<u8> = (0..1000).map(|i| if i % 2 == 0 { 0 } else { 0xFF }).collect();
        assert!((shannon_entropy(&data) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_periodic_pattern_scores_low() {
        let data: Vec<u8> = [0u8, 1, 2, 3].repeat(1024);
        assert!((shannon_entropy(&data) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_histogram_counts() {
        let hist = ByteHistogram::from_bytes(&[1, 1, 2, 3, 3, 3]);
        assert_eq!(hist.total(), 6);
        assert_eq!(hist.count(3), 3);
        assert_eq!(hist.count(9), 0);
        assert_eq!(hist.distinct(), 3);
    }

    #[test]
    fn test_chi_square_uniform_is_zero() {
        let data: Vec<u8> = (0..=255u8).cycle().take(256 * 4).collect();
        assert!(ByteHistogram::from_bytes(&data).chi_square().abs() < 1e-9);
    }

    #[test]
    fn test_chi_square_constant_is_large() {
        let hist = ByteHistogram::from_bytes(&[0u8; 4096]);
        assert!(hist.chi_square() > 100_000.0);
    }
}
