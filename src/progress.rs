//! Progress reporting and structured events.
//!
//! The orchestrator never renders anything itself. It reports to a
//! [`ProgressSink`]: progress updates during passes and hashing, one
//! record per random-audit sample, and structured [`WipeEvent`]s for
//! milestones and warnings.

use crate::wipe::Stage;
use std::fmt;

/// Event severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Routine milestone.
    Info,
    /// Stage completed.
    Success,
    /// Non-fatal problem; the run continues.
    Warn,
    /// Operation failed.
    Error,
    /// Protocol aborted.
    Critical,
}

impl Severity {
    /// Upper-case label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Success => "SUCCESS",
            Severity::Warn => "WARN",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Subsystem tag attached to each event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subsystem {
    /// Root secret acquisition.
    Seed,
    /// Checkpoint digests.
    Forensic,
    /// Pass start.
    WipeEngine,
    /// Watchdog threshold miss.
    EntropyDrop,
    /// Device permission problems.
    Access,
    /// Write loop failures.
    Engine,
    /// Pass completion with timing.
    Performance,
    /// Random sector audit.
    Audit,
    /// Unreadable audit sample.
    SectorLocked,
    /// Certificate issuance.
    Certificate,
}

impl Subsystem {
    /// Upper-case tag as written to logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Subsystem::Seed => "SEED",
            Subsystem::Forensic => "FORENSIC",
            Subsystem::WipeEngine => "WIPE_ENGINE",
            Subsystem::EntropyDrop => "ENTROPY_DROP",
            Subsystem::Access => "ACCESS",
            Subsystem::Engine => "ENGINE",
            Subsystem::Performance => "PERF_DATA",
            Subsystem::Audit => "AUDIT",
            Subsystem::SectorLocked => "SECTOR_LOCKED",
            Subsystem::Certificate => "CERTIFICATE",
        }
    }
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured event.
#[derive(Debug, Clone, PartialEq)]
pub struct WipeEvent {
    /// How serious the event is.
    pub severity: Severity,
    /// Where it came from.
    pub subsystem: Subsystem,
    /// One-line summary.
    pub message: String,
    /// Optional extra detail.
    pub detail: Option<String>,
}

impl WipeEvent {
    /// Creates an event without detail.
    pub fn new(severity: Severity, subsystem: Subsystem, message: impl Into<String>) -> Self {
        Self {
            severity,
            subsystem,
            message: message.into(),
            detail: None,
        }
    }

    /// Attaches detail text.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Progress of a pass or a surface hash.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    /// Stage being reported.
    pub stage: Stage,
    /// Human-readable label.
    pub label: String,
    /// Blocks processed so far.
    pub blocks_done: u64,
    /// Blocks in the whole operation.
    pub blocks_total: u64,
    /// Rolling write throughput in MiB/s; `None` while hashing.
    pub throughput_mib_s: Option<f64>,
}

impl ProgressUpdate {
    /// Completion percentage.
    pub fn percent(&self) -> f64 {
        if self.blocks_total == 0 {
            return 100.0;
        }
        self.blocks_done as f64 / self.blocks_total as f64 * 100.0
    }
}

/// One random-audit sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AuditSample {
    /// Sector-aligned device offset.
    pub offset: u64,
    /// Shannon entropy of the sample.
    pub entropy: f64,
    /// Whether the sample met the threshold.
    pub passed: bool,
}

/// Receiver for orchestrator status.
pub trait ProgressSink {
    /// Called at the reporting cadence of a pass or hash.
    fn progress(&mut self, update: &ProgressUpdate);

    /// Called once per successfully read audit sample.
    fn audit_sample(&mut self, sample: &AuditSample);

    /// Called for each structured event.
    fn event(&mut self, event: &WipeEvent);
}

impl<S: ProgressSink + ?Sized> ProgressSink for &mut S {
    fn progress(&mut self, update: &ProgressUpdate) {
        (**self).progress(update)
    }

    fn audit_sample(&mut self, sample: &AuditSample) {
        (**self).audit_sample(sample)
    }

    fn event(&mut self, event: &WipeEvent) {
        (**self).event(event)
    }
}

/// Fans out to two sinks.
impl<A: ProgressSink, B: ProgressSink> ProgressSink for (A, B) {
    fn progress(&mut self, update: &ProgressUpdate) {
        self.0.progress(update);
        self.1.progress(update);
    }

    fn audit_sample(&mut self, sample: &AuditSample) {
        self.0.audit_sample(sample);
        self.1.audit_sample(sample);
    }

    fn event(&mut self, event: &WipeEvent) {
        self.0.event(event);
        self.1.event(event);
    }
}

/// Sink that writes everything through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn progress(&mut self, update: &ProgressUpdate) {
        match update.throughput_mib_s {
            Some(rate) => tracing::debug!(
                stage = %update.stage,
                blocks = update.blocks_done,
                total = update.blocks_total,
                "{} | {:.0}% | {:.1} MiB/s",
                update.label,
                update.percent(),
                rate
            ),
            None => tracing::debug!(
                stage = %update.stage,
                blocks = update.blocks_done,
                total = update.blocks_total,
                "{} | {:.0}%",
                update.label,
                update.percent()
            ),
        }
    }

    fn audit_sample(&mut self, sample: &AuditSample) {
        if sample.passed {
            tracing::info!(
                entropy = sample.entropy,
                "Audit sample {:#x} VALID",
                sample.offset
            );
        } else {
            tracing::warn!(
                entropy = sample.entropy,
                "Audit sample {:#x} FAIL",
                sample.offset
            );
        }
    }

    fn event(&mut self, event: &WipeEvent) {
        let subsystem = event.subsystem.as_str();
        let detail = event.detail.as_deref().unwrap_or("");
        match event.severity {
            Severity::Info | Severity::Success => {
                tracing::info!(subsystem, detail, severity = %event.severity, "{}", event.message)
            }
            Severity::Warn => tracing::warn!(subsystem, detail, "{}", event.message),
            Severity::Error | Severity::Critical => {
                tracing::error!(subsystem, detail, severity = %event.severity, "{}", event.message)
            }
        }
    }
}

/// Sink that keeps everything in memory, for assertions in tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingSink {
    pub progress: Vec<ProgressUpdate>,
    pub samples: Vec<AuditSample>,
    pub events: Vec<WipeEvent>,
}

#[cfg(test)]
impl RecordingSink {
    pub fn events_from(&self, subsystem: Subsystem) -> Vec<&WipeEvent> {
        self.events
            .iter()
            .filter(|e| e.subsystem == subsystem)
            .collect()
    }
}

#[cfg(test)]
impl ProgressSink for RecordingSink {
    fn progress(&mut self, update: &ProgressUpdate) {
        self.progress.push(update.clone());
    }

    fn audit_sample(&mut self, sample: &AuditSample) {
        self.samples.push(*sample);
    }

    fn event(&mut self, event: &WipeEvent) {
        self.events.push(event.clone());
    }
}
