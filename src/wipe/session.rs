//! Wipe session state.
//!
//! One [`WipeSession`] exists per run. It owns the root secret and
//! records the stage machine and checkpoint digests as the protocol
//! advances:
//!
//! ```text
//! IDLE → PRE_AUDIT → PASS1_WRITE → PASS1_VERIFY → PASS2_WRITE
//!      → PASS2_VERIFY → RANDOM_AUDIT → DONE
//! ```
//!
//! Any failure moves the session to `FAILED` without discarding
//! digests captured earlier.

use super::{AuditSummary, HashDigest, WipeError};
use crate::engine::RootSecret;
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

/// Protocol stage.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Idle,
    PreAudit,
    Pass1Write,
    Pass1Verify,
    Pass2Write,
    Pass2Verify,
    RandomAudit,
    Done,
    Failed,
}

impl Stage {
    /// Upper-case stage name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Idle => "IDLE",
            Stage::PreAudit => "PRE_AUDIT",
            Stage::Pass1Write => "PASS1_WRITE",
            Stage::Pass1Verify => "PASS1_VERIFY",
            Stage::Pass2Write => "PASS2_WRITE",
            Stage::Pass2Verify => "PASS2_VERIFY",
            Stage::RandomAudit => "RANDOM_AUDIT",
            Stage::Done => "DONE",
            Stage::Failed => "FAILED",
        }
    }

    /// Position in the protocol; `FAILED` sorts last.
    pub fn ordinal(&self) -> i64 {
        *self as i64
    }

    /// Returns true for `DONE` and `FAILED`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the two overwrite passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pass {
    /// Raw keystream fill.
    First,
    /// Keystream encrypted with the keyed transform.
    Second,
}

impl Pass {
    /// Converts a 1-based pass number.
    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            1 => Some(Pass::First),
            2 => Some(Pass::Second),
            _ => None,
        }
    }

    /// 1-based pass number.
    pub fn number(&self) -> u8 {
        match self {
            Pass::First => 1,
            Pass::Second => 2,
        }
    }

    /// Whether blocks go through the keyed transform.
    pub fn applies_transform(&self) -> bool {
        matches!(self, Pass::Second)
    }

    /// Progress label.
    pub fn label(&self) -> &'static str {
        match self {
            Pass::First => "PASS 1: KEYSTREAM FILL",
            Pass::Second => "PASS 2: AES-256-CTR OVERWRITE",
        }
    }

    /// Stage while writing.
    pub fn write_stage(&self) -> Stage {
        match self {
            Pass::First => Stage::Pass1Write,
            Pass::Second => Stage::Pass2Write,
        }
    }

    /// Stage while verifying.
    pub fn verify_stage(&self) -> Stage {
        match self {
            Pass::First => Stage::Pass1Verify,
            Pass::Second => Stage::Pass2Verify,
        }
    }
}

/// A checkpoint digest slot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Checkpoint {
    /// Stage not reached yet.
    #[default]
    Pending,
    /// Digest captured.
    Captured(HashDigest),
    /// Stage ran but produced no verifiable digest.
    Unavailable(String),
}

impl Checkpoint {
    /// The digest, if captured.
    pub fn digest(&self) -> Option<&HashDigest> {
        match self {
            Checkpoint::Captured(d) => Some(d),
            _ => None,
        }
    }

    /// Returns true once the stage producing this checkpoint has run.
    pub fn is_settled(&self) -> bool {
        !matches!(self, Checkpoint::Pending)
    }

    /// Hex digest, or `N/A`.
    pub fn display(&self) -> String {
        match self {
            Checkpoint::Captured(d) => d.to_hex(),
            _ => "N/A".to_string(),
        }
    }
}

/// Outcome of one write pass.
#[derive(Debug, Clone, PartialEq)]
pub struct PassReport {
    /// Which pass.
    pub pass: Pass,
    /// Whole blocks addressed by the pass.
    pub blocks_total: u64,
    /// Blocks written before the pass ended.
    pub blocks_written: u64,
    /// Bytes written.
    pub bytes_written: u64,
    /// Wall time of the write loop.
    pub duration: Duration,
    /// Average write throughput in MiB/s.
    pub throughput_mib_s: f64,
    /// Blocks scored by the watchdog.
    pub watchdog_checks: u64,
    /// Watched blocks below threshold.
    pub watchdog_failures: u64,
    /// Whether every block was written.
    pub completed: bool,
}

/// Why and where a session failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    /// Stage in progress when the failure happened.
    pub stage: Stage,
    /// Failure class, see [`WipeError::class`].
    pub class: &'static str,
    /// Error message.
    pub reason: String,
}

/// Aggregate state of one sanitization run.
pub struct WipeSession {
    id: String,
    started_at: DateTime<Utc>,
    device: String,
    device_bytes: u64,
    block_size: usize,
    secret: Option<RootSecret>,
    stage: Stage,
    pub(crate) pre_wipe: Checkpoint,
    pub(crate) pass1: Checkpoint,
    pub(crate) final_hash: Checkpoint,
    pub(crate) reports: Vec<PassReport>,
    pub(crate) audit: Option<AuditSummary>,
    failure: Option<FailureRecord>,
}

impl WipeSession {
    /// Starts a session that takes ownership of `secret`.
    pub fn new(
        device: impl Into<String>,
        device_bytes: u64,
        block_size: usize,
        secret: RootSecret,
    ) -> Self {
        let started_at = Utc::now();
        Self {
            id: started_at.format("%Y%m%d_%H%M%S").to_string(),
            started_at,
            device: device.into(),
            device_bytes,
            block_size,
            secret: Some(secret),
            stage: Stage::Idle,
            pre_wipe: Checkpoint::Pending,
            pass1: Checkpoint::Pending,
            final_hash: Checkpoint::Pending,
            reports: Vec::new(),
            audit: None,
            failure: None,
        }
    }

    /// Session identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// When the session started.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Device identity.
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Device capacity in bytes.
    pub fn device_bytes(&self) -> u64 {
        self.device_bytes
    }

    /// Bytes per block.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Whole blocks per pass at the recorded device size.
    pub fn blocks_per_pass(&self) -> u64 {
        self.device_bytes / self.block_size as u64
    }

    /// Current stage.
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Pre-wipe baseline digest.
    pub fn pre_wipe(&self) -> &Checkpoint {
        &self.pre_wipe
    }

    /// Post-pass-1 digest.
    pub fn pass1(&self) -> &Checkpoint {
        &self.pass1
    }

    /// Post-pass-2 (final) digest.
    pub fn final_hash(&self) -> &Checkpoint {
        &self.final_hash
    }

    /// Pass reports in execution order, including a failed pass.
    pub fn reports(&self) -> &[PassReport] {
        &self.reports
    }

    /// Random audit result, once run.
    pub fn audit(&self) -> Option<&AuditSummary> {
        self.audit.as_ref()
    }

    /// Failure record, if the session failed.
    pub fn failure(&self) -> Option<&FailureRecord> {
        self.failure.as_ref()
    }

    /// The root secret while the session holds it.
    pub(crate) fn secret(&self) -> Option<&RootSecret> {
        self.secret.as_ref()
    }

    /// Returns true while the root secret has not been released.
    ///
    /// The secret itself stays inside the crate:
    ///
    /// ```compile_fail
    /// use forensic_wipe::{wipe::WipeSession, RootSecret};
    ///
    /// let session = WipeSession::new("memory", 4096, 4096, RootSecret::from_array([1; 32]));
    /// let _ = session.secret();
    /// ```
    pub fn holds_secret(&self) -> bool {
        self.secret.is_some()
    }

    pub(crate) fn set_device_bytes(&mut self, device_bytes: u64) {
        self.device_bytes = device_bytes;
    }

    pub(crate) fn enter(&mut self, stage: Stage) {
        tracing::debug!(session = %self.id, from = %self.stage, to = %stage, "Stage transition");
        self.stage = stage;
    }

    pub(crate) fn fail(&mut self, err: &WipeError) {
        if self.failure.is_none() {
            self.failure = Some(FailureRecord {
                stage: self.stage,
                class: err.class(),
                reason: err.to_string(),
            });
        }
        self.enter(Stage::Failed);
    }

    /// Drops the root secret, zeroizing its bytes.
    pub fn release_secret(&mut self) {
        if self.secret.take().is_some() {
            tracing::info!(session = %self.id, "Root secret zeroized");
        }
    }
}

impl fmt::Debug for WipeSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WipeSession")
            .field("id", &self.id)
            .field("device", &self.device)
            .field("device_bytes", &self.device_bytes)
            .field("block_size", &self.block_size)
            .field("stage", &self.stage)
            .field("holds_secret", &self.holds_secret())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn session() -> WipeSession {
        WipeSession::new("memory", 3 * 4096 + 100, 4096, RootSecret::from_array([9; 32]))
    }

    #[test]
    fn test_new_session_is_idle() {
        let s = session();
        assert_eq!(s.stage(), Stage::Idle);
        assert_eq!(s.id().len(), "20260101_000000".len());
        assert!(s.holds_secret());
        assert!(!s.pre_wipe().is_settled());
    }

    #[test]
    fn test_blocks_per_pass_drops_remainder() {
        assert_eq!(session().blocks_per_pass(), 3);
    }

    #[test]
    fn test_fail_keeps_checkpoints() {
        let mut s = session();
        s.pre_wipe = Checkpoint::Captured(HashDigest::from_bytes([1; 32]));
        s.enter(Stage::Pass1Write);

        s.fail(&WipeError::EngineFailure {
            stage: Stage::Pass1Write,
            block: 2,
            source: io::Error::new(io::ErrorKind::Other, "gone"),
        });

        assert_eq!(s.stage(), Stage::Failed);
        assert!(s.pre_wipe().digest().is_some());
        let failure = s.failure().unwrap();
        assert_eq!(failure.stage, Stage::Pass1Write);
        assert_eq!(failure.class, "engine");
    }

    #[test]
    fn test_first_failure_wins() {
        let mut s = session();
        s.enter(Stage::PreAudit);
        s.fail(&WipeError::SizeUnknown {
            device: "memory".into(),
        });
        s.fail(&WipeError::Interrupted {
            stage: Stage::Pass1Write,
        });

        assert_eq!(s.failure().unwrap().class, "size");
    }

    #[test]
    fn test_release_secret() {
        let mut s = session();
        s.release_secret();
        assert!(!s.holds_secret());
        assert!(s.secret().is_none());

        // Idempotent
        s.release_secret();
    }

    #[test]
    fn test_checkpoint_display() {
        assert_eq!(Checkpoint::Pending.display(), "N/A");
        assert_eq!(Checkpoint::Unavailable("read".into()).display(), "N/A");
        assert_eq!(
            Checkpoint::Captured(HashDigest::from_bytes([0xAB; 32])).display(),
            "ab".repeat(32)
        );
    }

    #[test]
    fn test_pass_mapping() {
        assert_eq!(Pass::from_number(1), Some(Pass::First));
        assert_eq!(Pass::from_number(3), None);
        assert!(!Pass::First.applies_transform());
        assert!(Pass::Second.applies_transform());
        assert_eq!(Pass::Second.verify_stage(), Stage::Pass2Verify);
    }

    #[test]
    fn test_stage_order() {
        assert!(Stage::PreAudit.ordinal() < Stage::Pass1Write.ordinal());
        assert!(Stage::Pass2Verify.ordinal() < Stage::RandomAudit.ordinal());
        assert!(Stage::Done.is_terminal());
        assert!(!Stage::RandomAudit.is_terminal());
    }
}
