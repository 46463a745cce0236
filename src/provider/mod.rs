//! Root secret acquisition.
//!
//! The orchestrator never fetches its own secret. A [`SecretProvider`]
//! supplies exactly [`ROOT_SECRET_LEN`](crate::engine::ROOT_SECRET_LEN)
//! bytes or an error; there is no fallback to a default value. Failure
//! of a provider, including exhaustion of a retry budget, is fatal to
//! the run.

mod file;
mod os;
mod retry;

pub use file::HexFileProvider;
pub use os::OsEntropyProvider;
pub use retry::RetryingProvider;

use crate::engine::{EngineError, RootSecret};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while obtaining a root secret.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum SecretError {
    #[error("entropy source unavailable: {0}")]
    Unavailable(String),

    #[error("failed to read secret file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("secret file {0} is neither 32 raw bytes nor hex text")]
    Malformed(PathBuf),

    #[error(transparent)]
    Invalid(#[from] EngineError),

    #[error("secret provider exhausted after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: Box<SecretError>,
    },
}

/// Source of root secrets.
pub trait SecretProvider {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Fetches a fresh secret.
    ///
    /// Implementations must never return an all-zero secret.
    fn fetch(&mut self) -> Result<RootSecret, SecretError>;
}

impl<P: SecretProvider + ?Sized> SecretProvider for Box<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch(&mut self) -> Result<RootSecret, SecretError> {
        (**self).fetch()
    }
}

/// Rejects secrets a provider must never hand out.
fn checked(secret: RootSecret) -> Result<RootSecret, SecretError> {
    if secret.is_all_zero() {
        return Err(EngineError::ZeroSecret.into());
    }
    Ok(secret)
}
