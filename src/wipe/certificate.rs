//! Destruction certificate.

use super::{HashAlgorithm, PassReport, Stage, WipeSession};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Write as _;

/// Per-pass line of the certificate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PassLine {
    /// 1-based pass number.
    pub pass: u8,
    /// Blocks written.
    pub blocks_written: u64,
    /// Blocks the pass addressed.
    pub blocks_total: u64,
    /// Write loop wall time.
    pub duration_secs: f64,
    /// Average write throughput.
    pub throughput_mib_s: f64,
    /// Watched blocks below threshold.
    pub watchdog_failures: u64,
    /// Whether every block was written.
    pub completed: bool,
}

impl From<&PassReport> for PassLine {
    fn from(report: &PassReport) -> Self {
        Self {
            pass: report.pass.number(),
            blocks_written: report.blocks_written,
            blocks_total: report.blocks_total,
            duration_secs: report.duration.as_secs_f64(),
            throughput_mib_s: report.throughput_mib_s,
            watchdog_failures: report.watchdog_failures,
            completed: report.completed,
        }
    }
}

/// Record of one session, suitable for persisting.
///
/// Digests that were never captured are reported as `N/A`. The record
/// never carries the root secret or anything derived from it beyond
/// what is already on the device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Certificate {
    /// Session identifier (UTC start time, `YYYYmmdd_HHMMSS`).
    pub session_id: String,
    /// When the session started.
    pub started_at: DateTime<Utc>,
    /// When this certificate was produced.
    pub issued_at: DateTime<Utc>,
    /// Device identity.
    pub device: String,
    /// Device capacity in bytes.
    pub device_bytes: u64,
    /// Bytes per block.
    pub block_size: usize,
    /// Whole blocks per pass.
    pub blocks_per_pass: u64,
    /// Checkpoint digest name.
    pub hash_algorithm: String,
    /// Pre-wipe baseline digest.
    pub pre_wipe_hash: String,
    /// Digest after pass 1.
    pub pass1_hash: String,
    /// Digest after pass 2.
    pub final_hash: String,
    /// Pass summaries in execution order.
    pub passes: Vec<PassLine>,
    /// Mean random-audit entropy.
    pub average_entropy: Option<f64>,
    /// Audit samples scored.
    pub audit_samples: u32,
    /// Audit samples below threshold.
    pub audit_failures: u32,
    /// Audit samples that could not be read.
    pub audit_locked: u32,
    /// Whether the full protocol finished.
    pub completed: bool,
    /// `COMPLETE`, or where and why the session stopped.
    pub outcome: String,
}

impl Certificate {
    /// Builds the certificate from the session as it stands now.
    pub fn from_session(session: &WipeSession, algorithm: HashAlgorithm) -> Self {
        let completed = session.stage() == Stage::Done;
        let outcome = match session.failure() {
            Some(failure) => format!("FAILED at {}: {}", failure.stage, failure.reason),
            None if completed => "COMPLETE".to_string(),
            None => format!("INCOMPLETE at {}", session.stage()),
        };
        let audit = session.audit();

        Self {
            session_id: session.id().to_string(),
            started_at: session.started_at(),
            issued_at: Utc::now(),
            device: session.device().to_string(),
            device_bytes: session.device_bytes(),
            block_size: session.block_size(),
            blocks_per_pass: session.blocks_per_pass(),
            hash_algorithm: algorithm.name().to_string(),
            pre_wipe_hash: session.pre_wipe().display(),
            pass1_hash: session.pass1().display(),
            final_hash: session.final_hash().display(),
            passes: session.reports().iter().map(PassLine::from).collect(),
            average_entropy: audit.and_then(|a| a.average_entropy),
            audit_samples: audit.map_or(0, |a| a.scored),
            audit_failures: audit.map_or(0, |a| a.failed),
            audit_locked: audit.map_or(0, |a| a.locked),
            completed,
            outcome,
        }
    }

    /// Average entropy as text, or `N/A`.
    pub fn entropy_display(&self) -> String {
        self.average_entropy
            .map_or_else(|| "N/A".to_string(), |e| format!("{e:.4} bits/byte"))
    }

    /// Plain-text certificate.
    pub fn render(&self) -> String {
        let rule = "=".repeat(72);
        let mut out = String::new();

        // Writing to a String cannot fail.
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "  CERTIFICATE OF DATA DESTRUCTION");
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "Session ID       : {}", self.session_id);
        let _ = writeln!(out, "Started          : {}", self.started_at.to_rfc3339());
        let _ = writeln!(out, "Issued           : {}", self.issued_at.to_rfc3339());
        let _ = writeln!(out, "Device           : {}", self.device);
        let _ = writeln!(out, "Capacity         : {} bytes", self.device_bytes);
        let _ = writeln!(
            out,
            "Geometry         : {} blocks x {} bytes",
            self.blocks_per_pass, self.block_size
        );
        let _ = writeln!(out, "Method           : 2-pass (keystream fill, AES-256-CTR overwrite)");
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "Checkpoints ({})", self.hash_algorithm);
        let _ = writeln!(out, "  Pre-wipe       : {}", self.pre_wipe_hash);
        let _ = writeln!(out, "  Pass 1         : {}", self.pass1_hash);
        let _ = writeln!(out, "  Final          : {}", self.final_hash);
        for line in &self.passes {
            let _ = writeln!(
                out,
                "Pass {}           : {}/{} blocks in {:.1}s ({:.1} MiB/s){}",
                line.pass,
                line.blocks_written,
                line.blocks_total,
                line.duration_secs,
                line.throughput_mib_s,
                if line.completed { "" } else { " INCOMPLETE" }
            );
        }
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "Average entropy  : {}", self.entropy_display());
        let _ = writeln!(
            out,
            "Audit samples    : {} scored, {} below threshold, {} unreadable",
            self.audit_samples, self.audit_failures, self.audit_locked
        );
        let _ = writeln!(out, "Outcome          : {}", self.outcome);
        let _ = writeln!(out, "{rule}");
        out
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::RootSecret;
    use crate::wipe::{AuditSummary, Checkpoint, HashDigest, Pass, WipeError};
    use std::time::Duration;

    fn session() -> WipeSession {
        WipeSession::new("/dev/sdz", 8 * 4096, 4096, RootSecret::from_array([3; 32]))
    }

    #[test]
    fn test_fresh_session_reports_na() {
        let cert = Certificate::from_session(&session(), HashAlgorithm::Sha256);

        assert_eq!(cert.pre_wipe_hash, "N/A");
        assert_eq!(cert.pass1_hash, "N/A");
        assert_eq!(cert.final_hash, "N/A");
        assert_eq!(cert.entropy_display(), "N/A");
        assert!(!cert.completed);
        assert_eq!(cert.outcome, "INCOMPLETE at IDLE");
        assert_eq!(cert.blocks_per_pass, 8);
    }

    #[test]
    fn test_failed_session_keeps_digests() {
        let mut s = session();
        s.pre_wipe = Checkpoint::Captured(HashDigest::from_bytes([0x11; 32]));
        s.enter(Stage::Pass1Write);
        s.fail(&WipeError::AccessDenied {
            device: "/dev/sdz".into(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        });

        let cert = Certificate::from_session(&s, HashAlgorithm::Sha256);
        assert_eq!(cert.pre_wipe_hash, "11".repeat(32));
        assert_eq!(cert.final_hash, "N/A");
        assert!(cert.outcome.starts_with("FAILED at PASS1_WRITE: access denied"));
    }

    #[test]
    fn test_render_and_json() {
        let mut s = session();
        s.pre_wipe = Checkpoint::Captured(HashDigest::from_bytes([1; 32]));
        s.pass1 = Checkpoint::Captured(HashDigest::from_bytes([2; 32]));
        s.final_hash = Checkpoint::Captured(HashDigest::from_bytes([3; 32]));
        s.reports.push(PassReport {
            pass: Pass::First,
            blocks_total: 8,
            blocks_written: 8,
            bytes_written: 8 * 4096,
            duration: Duration::from_millis(500),
            throughput_mib_s: 0.0625,
            watchdog_checks: 0,
            watchdog_failures: 0,
            completed: true,
        });
        s.audit = Some(AuditSummary {
            attempts: 20,
            scored: 19,
            failed: 0,
            locked: 1,
            average_entropy: Some(7.9551),
        });
        s.enter(Stage::Done);

        let cert = Certificate::from_session(&s, HashAlgorithm::Blake3);
        assert!(cert.completed);
        assert_eq!(cert.outcome, "COMPLETE");

        let text = cert.render();
        assert!(text.contains("CERTIFICATE OF DATA DESTRUCTION"));
        assert!(text.contains(&"03".repeat(32)));
        assert!(text.contains("7.9551 bits/byte"));
        assert!(text.contains("Checkpoints (BLAKE3)"));

        let json: serde_json::Value = serde_json::from_str(&cert.to_json().unwrap()).unwrap();
        assert_eq!(json["outcome"], "COMPLETE");
        assert_eq!(json["audit_locked"], 1);
        assert_eq!(json["passes"][0]["pass"], 1);
    }
}
