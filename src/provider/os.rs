//! Operating system CSPRNG provider.

use super::{checked, SecretError, SecretProvider};
use crate::engine::{RootSecret, ROOT_SECRET_LEN};
use rand_core::{OsRng, RngCore};
use zeroize::Zeroizing;

/// Draws the root secret from the OS random source.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsEntropyProvider;

impl OsEntropyProvider {
    /// Creates the provider.
    pub fn new() -> Self {
        Self
    }
}

impl SecretProvider for OsEntropyProvider {
    fn name(&self) -> &str {
        "os-entropy"
    }

    fn fetch(&mut self) -> Result<RootSecret, SecretError> {
        let mut bytes = Zeroizing::new([0u8; ROOT_SECRET_LEN]);
        OsRng
            .try_fill_bytes(&mut bytes[..])
            .map_err(|e| SecretError::Unavailable(e.to_string()))?;
        checked(RootSecret::take(&mut bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_os_secrets_differ() {
        let mut provider = OsEntropyProvider::new();
        let a = provider.fetch().unwrap();
        let b = provider.fetch().unwrap();

        assert!(!a.is_all_zero());
        assert_ne!(a.fingerprint(), b.fingerprint());
    }
}
