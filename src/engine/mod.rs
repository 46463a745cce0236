//! Deterministic keystream and keyed-cipher generation.
//!
//! A single [`RootSecret`] drives everything written to the device.
//! The [`StreamEngine`] expands it into an unbounded, reproducible
//! keystream (SHAKE-256) and applies a keyed AES-256-CTR transform
//! for the second overwrite pass.

mod secret;
mod stream;

pub use secret::{RootSecret, ROOT_SECRET_LEN};
pub use stream::StreamEngine;

use thiserror::Error;

/// Errors raised while constructing engine inputs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Secret material had the wrong length.
    #[error("invalid root secret: expected {expected} bytes, got {actual}")]
    InvalidSecret {
        /// Required length.
        expected: usize,
        /// Length supplied.
        actual: usize,
    },

    /// Secret material was all zeros.
    #[error("root secret is all zero bytes")]
    ZeroSecret,
}
