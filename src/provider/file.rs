//! Secret loaded from a file.

use super::{checked, SecretError, SecretProvider};
use crate::engine::{RootSecret, ROOT_SECRET_LEN};
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

/// Reads the root secret from a file.
///
/// The file is parsed as hex text first, ignoring whitespace anywhere
/// in it. Only content that is not hex is taken as a raw secret, and
/// then it must be exactly 32 bytes. Hex text that decodes to the wrong
/// length is rejected rather than reinterpreted as raw bytes.
#[derive(Debug, Clone)]
pub struct HexFileProvider {
    path: PathBuf,
}

impl HexFileProvider {
    /// Creates a provider reading `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Secret file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SecretProvider for HexFileProvider {
    fn name(&self) -> &str {
        "hex-file"
    }

    fn fetch(&mut self) -> Result<RootSecret, SecretError> {
        let raw = Zeroizing::new(std::fs::read(&self.path).map_err(|source| SecretError::Io {
            path: self.path.clone(),
            source,
        })?);

        let digits: Zeroizing<Vec<u8>> = Zeroizing::new(
            raw.iter()
                .copied()
                .filter(|b| !b.is_ascii_whitespace())
                .collect(),
        );

        match hex::decode(digits.as_slice()) {
            Ok(decoded) => {
                let decoded = Zeroizing::new(decoded);
                checked(RootSecret::from_slice(&decoded)?)
            }
            Err(_) if raw.len() == ROOT_SECRET_LEN => checked(RootSecret::from_slice(&raw)?),
            Err(_) => Err(SecretError::Malformed(self.path.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineError;

    fn temp_file(name: &str, contents: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "forensic-wipe-secret-{}-{}",
            name,
            std::process::id()
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_hex_text_with_whitespace() {
        let text = format!("{}\n{}\n", "ab".repeat(16), "cd".repeat(16));
        let path = temp_file("hex", text.as_bytes());

        let secret = HexFileProvider::new(&path).fetch().unwrap();
        let mut expected = [0xABu8; 32];
        expected[16..].fill(0xCD);
        assert_eq!(secret.fingerprint(), RootSecret::from_array(expected).fingerprint());

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_raw_bytes() {
        let mut raw = [0u8; 32];
        for (i, b) in raw.iter_mut().enumerate() {
            *b = 0x80 + i as u8;
        }
        let path = temp_file("raw", &raw);

        let secret = HexFileProvider::new(&path).fetch().unwrap();
        assert_eq!(secret.fingerprint(), RootSecret::from_array(raw).fingerprint());

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_32_hex_digits_are_a_short_secret() {
        // 32 bytes on disk, but it is hex text for a 16-byte secret.
        let path = temp_file("hex16", b"00112233445566778899aabbccddeeff");

        let err = HexFileProvider::new(&path).fetch().unwrap_err();
        assert!(matches!(
            err,
            SecretError::Invalid(EngineError::InvalidSecret {
                expected: 32,
                actual: 16
            })
        ));

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_non_hex_wrong_length_is_malformed() {
        let path = temp_file("raw31", &[0x80; 31]);

        let err = HexFileProvider::new(&path).fetch().unwrap_err();
        assert!(matches!(err, SecretError::Malformed(_)));

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_wrong_length_rejected() {
        let path = temp_file("short", "ab".repeat(8).as_bytes());

        let err = HexFileProvider::new(&path).fetch().unwrap_err();
        assert!(matches!(
            err,
            SecretError::Invalid(EngineError::InvalidSecret {
                expected: 32,
                actual: 8
            })
        ));

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_non_hex_rejected() {
        let path = temp_file("garbage", b"not a secret at all");

        let err = HexFileProvider::new(&path).fetch().unwrap_err();
        assert!(matches!(err, SecretError::Malformed(_)));

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_zero_secret_rejected() {
        let path = temp_file("zero", "00".repeat(32).as_bytes());

        let err = HexFileProvider::new(&path).fetch().unwrap_err();
        assert!(matches!(err, SecretError::Invalid(EngineError::ZeroSecret)));

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_missing_file() {
        let err = HexFileProvider::new("/nonexistent/secret.hex")
            .fetch()
            .unwrap_err();
        assert!(matches!(err, SecretError::Io { .. }));
    }
}
