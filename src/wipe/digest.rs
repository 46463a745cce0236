//! Full-surface checkpoint hashing.
//!
//! A checkpoint folds every whole block of the device, read
//! sequentially, through one hash instance. Both supported
//! algorithms produce 32-byte digests.

use super::{Stage, WipeError};
use crate::config::WipeConfig;
use crate::device::BlockDevice;
use crate::progress::{ProgressSink, ProgressUpdate};
use blake3::Hasher as Blake3Hasher;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::Read;

/// Supported checkpoint hash algorithms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// SHA-256 - widely deployed, conservative default.
    #[default]
    Sha256,
    /// BLAKE3 - faster on large surfaces.
    Blake3,
}

impl HashAlgorithm {
    /// Display name.
    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "SHA-256",
            HashAlgorithm::Blake3 => "BLAKE3",
        }
    }
}

/// A 32-byte checkpoint digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct HashDigest([u8; 32]);

impl HashDigest {
    /// Wraps raw digest bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw digest bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lower-case hex rendering.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for HashDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for HashDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HashDigest({})", self.to_hex())
    }
}

/// Incremental hasher over device blocks.
pub enum SurfaceHasher {
    /// SHA-256 state.
    Sha256(Sha256),
    /// BLAKE3 state, boxed for its size.
    Blake3(Box<Blake3Hasher>),
}

impl SurfaceHasher {
    /// Creates a hasher for `algorithm`.
    pub fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Sha256 => SurfaceHasher::Sha256(Sha256::new()),
            HashAlgorithm::Blake3 => SurfaceHasher::Blake3(Box::new(Blake3Hasher::new())),
        }
    }

    /// Folds `block` into the running digest.
    pub fn update(&mut self, block: &[u8]) {
        match self {
            SurfaceHasher::Sha256(h) => h.update(block),
            SurfaceHasher::Blake3(h) => {
                h.update(block);
            }
        }
    }

    /// Finishes and returns the digest.
    pub fn finalize(self) -> HashDigest {
        match self {
            SurfaceHasher::Sha256(h) => {
                let mut data = [0u8; 32];
                data.copy_from_slice(&h.finalize());
                HashDigest(data)
            }
            SurfaceHasher::Blake3(h) => HashDigest(*h.finalize().as_bytes()),
        }
    }
}

/// Hashes `blocks` in order without any device I/O.
pub fn hash_blocks<'a>(
    algorithm: HashAlgorithm,
    blocks: impl IntoIterator<Item = &'a [u8]>,
) -> HashDigest {
    let mut hasher = SurfaceHasher::new(algorithm);
    for block in blocks {
        hasher.update(block);
    }
    hasher.finalize()
}

/// Reads every whole block of `device` and returns the surface digest.
///
/// The trailing partial block, if any, is not read. Fails with
/// [`WipeError::SizeUnknown`] if the device reports size 0 and with
/// [`WipeError::ReadError`] on any read failure.
pub fn surface_hash<D, S>(
    device: &D,
    config: &WipeConfig,
    stage: Stage,
    label: &str,
    sink: &mut S,
) -> Result<HashDigest, WipeError>
where
    D: BlockDevice,
    S: ProgressSink + ?Sized,
{
    let total_bytes = device.size_bytes();
    if total_bytes == 0 {
        return Err(WipeError::SizeUnknown {
            device: device.identity().to_string(),
        });
    }

    let total_blocks = total_bytes / config.block_size as u64;
    if total_blocks == 0 {
        return Err(WipeError::DeviceTooSmall {
            device: device.identity().to_string(),
            size: total_bytes,
            needed: config.block_size as u64,
        });
    }

    let read_error = |source| WipeError::ReadError {
        label: label.to_string(),
        source,
    };

    let mut reader = device.open_read().map_err(read_error)?;
    let mut hasher = SurfaceHasher::new(config.hash_algorithm);
    let mut block = vec![0u8; config.block_size];

    for n in 1..=total_blocks {
        reader.read_exact(&mut block).map_err(read_error)?;
        hasher.update(&block);

        if n % config.hash_report_interval == 0 || n == total_blocks {
            sink.progress(&ProgressUpdate {
                stage,
                label: label.to_string(),
                blocks_done: n,
                blocks_total: total_blocks,
                throughput_mib_s: None,
            });
        }
    }

    let digest = hasher.finalize();
    tracing::debug!(
        device = device.identity(),
        blocks = total_blocks,
        algorithm = config.hash_algorithm.name(),
        digest = %digest,
        "Surface hash complete"
    );
    Ok(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MemoryDevice;
    use crate::progress::RecordingSink;

    fn config(block_size: usize) -> WipeConfig {
        WipeConfig {
            block_size,
            ..Default::default()
        }
    }

    #[test]
    fn test_sha256_known_vector() {
        let digest = hash_blocks(HashAlgorithm::Sha256, [b"abc".as_slice()]);
        assert_eq!(
            digest.to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_block_split_does_not_matter() {
        let data = vec![0x5Au8; 4096];
        for algorithm in [HashAlgorithm::Sha256, HashAlgorithm::Blake3] {
            let whole = hash_blocks(algorithm, [data.as_slice()]);
            let split = hash_blocks(algorithm, data.chunks(512));
            assert_eq!(whole, split);
        }
    }

    #[test]
    fn test_algorithms_differ() {
        let data = [0u8; 64];
        assert_ne!(
            hash_blocks(HashAlgorithm::Sha256, [data.as_slice()]),
            hash_blocks(HashAlgorithm::Blake3, [data.as_slice()])
        );
    }

    #[test]
    fn test_surface_hash_matches_contents() {
        let data: Vec<u8> = (0..4 * 512).map(|i| (i % 251) as u8).collect();
        let device = MemoryDevice::with_data(data.clone());
        let mut sink = RecordingSink::default();

        let digest =
            surface_hash(&device, &config(512), Stage::PreAudit, "PRE", &mut sink).unwrap();

        assert_eq!(digest, hash_blocks(HashAlgorithm::Sha256, data.chunks(512)));
    }

    #[test]
    fn test_surface_hash_ignores_partial_tail() {
        let mut data = vec![0x11u8; 2 * 512];
        let device_a = MemoryDevice::with_data(data.clone());
        data.extend_from_slice(&[0xEE; 100]);
        let device_b = MemoryDevice::with_data(data);

        let mut sink = RecordingSink::default();
        let a = surface_hash(&device_a, &config(512), Stage::PreAudit, "A", &mut sink).unwrap();
        let b = surface_hash(&device_b, &config(512), Stage::PreAudit, "B", &mut sink).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_surface_hash_progress_cadence() {
        let device = MemoryDevice::new(120 * 512);
        let mut sink = RecordingSink::default();

        surface_hash(&device, &config(512), Stage::PreAudit, "PRE", &mut sink).unwrap();

        let reported: Vec<u64> = sink.progress.iter().map(|p| p.blocks_done).collect();
        assert_eq!(reported, vec![50, 100, 120]);
        assert_eq!(sink.progress.last().unwrap().percent(), 100.0);
    }

    #[test]
    fn test_zero_size_is_size_unknown() {
        let device = MemoryDevice::new(0);
        let mut sink = RecordingSink::default();

        let err = surface_hash(&device, &config(512), Stage::PreAudit, "PRE", &mut sink).unwrap_err();
        assert!(matches!(err, WipeError::SizeUnknown { .. }));
    }

    #[test]
    fn test_unreadable_surface_is_read_error() {
        let device = MemoryDevice::new(8 * 512);
        device.lock_region(3000..3001);
        let mut sink = RecordingSink::default();

        let err = surface_hash(&device, &config(512), Stage::Pass1Verify, "VERIFY", &mut sink)
            .unwrap_err();
        assert!(matches!(err, WipeError::ReadError { .. }));
    }
}
