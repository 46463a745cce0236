//! Orchestrator error taxonomy.

use super::Stage;
use crate::analysis::EntropyDegraded;
use crate::config::ConfigError;
use crate::engine::EngineError;
use std::io;
use thiserror::Error;

/// Errors that can occur while sanitizing a device.
///
/// All I/O-class errors originate in the orchestrator and are never
/// retried; a pass attempt is one-shot.
#[allow(missing_docs)]
#[derive(Debug, Error)]
pub enum WipeError {
    #[error("invalid root secret: {0}")]
    InvalidSecret(#[from] EngineError),

    #[error("size of {device} unknown or inaccessible")]
    SizeUnknown { device: String },

    #[error("access denied opening {device} for writing: {source}")]
    AccessDenied {
        device: String,
        #[source]
        source: io::Error,
    },

    #[error("read failed during {label}: {source}")]
    ReadError {
        label: String,
        #[source]
        source: io::Error,
    },

    #[error("{stage} failed at block {block}: {source}")]
    EngineFailure {
        stage: Stage,
        block: u64,
        #[source]
        source: io::Error,
    },

    #[error("{stage} aborted at block {block}: {source}")]
    EntropyDegraded {
        stage: Stage,
        block: u64,
        #[source]
        source: EntropyDegraded,
    },

    #[error("{stage} readback {actual} does not match written stream {expected}")]
    VerificationMismatch {
        stage: Stage,
        expected: String,
        actual: String,
    },

    #[error("device {device} has {size} bytes, need at least {needed}")]
    DeviceTooSmall { device: String, size: u64, needed: u64 },

    #[error("{operation} not allowed at stage {stage}: {reason}")]
    ProtocolViolation {
        operation: &'static str,
        stage: Stage,
        reason: &'static str,
    },

    #[error("interrupted before {stage}")]
    Interrupted { stage: Stage },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl WipeError {
    /// Short failure class for user-facing reports.
    pub fn class(&self) -> &'static str {
        match self {
            WipeError::InvalidSecret(_) => "secret",
            WipeError::SizeUnknown { .. } | WipeError::DeviceTooSmall { .. } => "size",
            WipeError::AccessDenied { .. } => "access",
            WipeError::ReadError { .. } => "read",
            WipeError::EngineFailure { .. } => "engine",
            WipeError::EntropyDegraded { .. } => "entropy",
            WipeError::VerificationMismatch { .. } => "verify",
            WipeError::ProtocolViolation { .. } => "protocol",
            WipeError::Interrupted { .. } => "interrupted",
            WipeError::Config(_) => "config",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classes_distinguish_fatal_kinds() {
        let access = WipeError::AccessDenied {
            device: "/dev/sdz".into(),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        let size = WipeError::SizeUnknown {
            device: "/dev/sdz".into(),
        };
        let secret = WipeError::from(EngineError::InvalidSecret {
            expected: 32,
            actual: 0,
        });

        assert_eq!(access.class(), "access");
        assert_eq!(size.class(), "size");
        assert_eq!(secret.class(), "secret");
    }

    #[test]
    fn test_engine_failure_message() {
        let err = WipeError::EngineFailure {
            stage: Stage::Pass2Write,
            block: 7,
            source: io::Error::new(io::ErrorKind::Other, "device gone"),
        };
        assert_eq!(err.to_string(), "PASS2_WRITE failed at block 7: device gone");
    }
}
