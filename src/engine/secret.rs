//! Root secret ownership.
//!
//! The root secret is the only input that must never outlive a wipe
//! session. It cannot be cloned, its `Debug` output is redacted, and
//! its bytes are overwritten with zeros when it is dropped.

use super::EngineError;
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of a root secret in bytes.
pub const ROOT_SECRET_LEN: usize = 32;

/// High-entropy seed from which all pass content is derived.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct RootSecret {
    bytes: [u8; ROOT_SECRET_LEN],
}

impl RootSecret {
    /// Creates a root secret from exactly [`ROOT_SECRET_LEN`] bytes.
    ///
    /// Empty or wrongly sized input is rejected with
    /// [`EngineError::InvalidSecret`].
    pub fn from_slice(bytes: &[u8]) -> Result<Self, EngineError> {
        if bytes.len() != ROOT_SECRET_LEN {
            return Err(EngineError::InvalidSecret {
                expected: ROOT_SECRET_LEN,
                actual: bytes.len(),
            });
        }

        let mut secret = Self {
            bytes: [0u8; ROOT_SECRET_LEN],
        };
        secret.bytes.copy_from_slice(bytes);
        Ok(secret)
    }

    /// Creates a root secret from a fixed array passed by value.
    ///
    /// Arrays are `Copy`: only the moved-in copy is wiped here. A caller
    /// that still owns the source must clear it, or use [`RootSecret::take`].
    pub fn from_array(mut bytes: [u8; ROOT_SECRET_LEN]) -> Self {
        let secret = Self { bytes };
        bytes.zeroize();
        secret
    }

    /// Moves the secret out of `bytes`, zeroing the caller's buffer.
    pub fn take(bytes: &mut [u8; ROOT_SECRET_LEN]) -> Self {
        let secret = Self { bytes: *bytes };
        bytes.zeroize();
        secret
    }

    /// Returns the secret bytes.
    #[inline]
    pub(crate) fn expose(&self) -> &[u8; ROOT_SECRET_LEN] {
        &self.bytes
    }

    /// Short non-reversible fingerprint for logs and certificates.
    ///
    /// First 8 bytes of SHA-256 over the secret, hex encoded.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::new()
            .chain_update(b"forensic-wipe-fingerprint")
            .chain_update(&self.bytes)
            .finalize();
        hex::encode(&digest[..8])
    }

    /// Returns true if every byte is zero.
    ///
    /// A zeroed secret is never accepted by the orchestrator.
    pub fn is_all_zero(&self) -> bool {
        self.bytes.iter().all(|&b| b == 0)
    }
}

impl std::fmt::Debug for RootSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RootSecret")
            .field("len", &ROOT_SECRET_LEN)
            .finish_non_exhaustive()
    }
}
