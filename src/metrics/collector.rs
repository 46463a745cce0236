//! Prometheus collector fed by orchestrator progress.

use crate::progress::{AuditSample, ProgressSink, ProgressUpdate, Severity, Subsystem, WipeEvent};
use crate::wipe::Stage;
use prometheus::{Encoder, Gauge, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Registration or encoding failed.
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// Prometheus registry tracking one wipe session.
///
/// Implements [`ProgressSink`], so it can be paired with another sink
/// and handed to the orchestrator directly.
pub struct WipeMetrics {
    registry: Registry,

    // Protocol position
    stage: IntGauge,
    progress_percent: Gauge,
    throughput_mib_s: Gauge,
    blocks_processed: IntCounter,

    // Safety signals
    watchdog_failures: IntCounter,
    audit_samples: IntCounter,
    audit_failures: IntCounter,
    last_audit_entropy: Gauge,

    events: IntCounterVec,

    last_stage: Option<Stage>,
    last_blocks: u64,
}

impl WipeMetrics {
    /// Creates a registry with all wipe metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let stage = IntGauge::new(
            "forensic_wipe_stage",
            "Current protocol stage (0=IDLE .. 7=DONE, 8=FAILED)",
        )?;
        let progress_percent = Gauge::new(
            "forensic_wipe_progress_percent",
            "Completion of the current pass or hash",
        )?;
        let throughput_mib_s = Gauge::new(
            "forensic_wipe_throughput_mib_s",
            "Rolling write throughput of the current pass",
        )?;
        let blocks_processed = IntCounter::new(
            "forensic_wipe_blocks_processed_total",
            "Blocks written or hashed",
        )?;

        let watchdog_failures = IntCounter::new(
            "forensic_wipe_watchdog_failures_total",
            "Written blocks that scored below the entropy threshold",
        )?;
        let audit_samples = IntCounter::new(
            "forensic_wipe_audit_samples_total",
            "Random audit samples scored",
        )?;
        let audit_failures = IntCounter::new(
            "forensic_wipe_audit_failures_total",
            "Random audit samples below threshold",
        )?;
        let last_audit_entropy = Gauge::new(
            "forensic_wipe_last_audit_entropy",
            "Entropy of the most recent audit sample in bits per byte",
        )?;

        let events = IntCounterVec::new(
            Opts::new("forensic_wipe_events_total", "Structured events emitted"),
            &["severity", "subsystem"],
        )?;

        registry.register(Box::new(stage.clone()))?;
        registry.register(Box::new(progress_percent.clone()))?;
        registry.register(Box::new(throughput_mib_s.clone()))?;
        registry.register(Box::new(blocks_processed.clone()))?;
        registry.register(Box::new(watchdog_failures.clone()))?;
        registry.register(Box::new(audit_samples.clone()))?;
        registry.register(Box::new(audit_failures.clone()))?;
        registry.register(Box::new(last_audit_entropy.clone()))?;
        registry.register(Box::new(events.clone()))?;

        Ok(Self {
            registry,
            stage,
            progress_percent,
            throughput_mib_s,
            blocks_processed,
            watchdog_failures,
            audit_samples,
            audit_failures,
            last_audit_entropy,
            events,
            last_stage: None,
            last_blocks: 0,
        })
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

impl ProgressSink for WipeMetrics {
    fn progress(&mut self, update: &ProgressUpdate) {
        if self.last_stage != Some(update.stage) {
            self.last_stage = Some(update.stage);
            self.last_blocks = 0;
        }
        self.stage.set(update.stage.ordinal());
        self.progress_percent.set(update.percent());
        if let Some(rate) = update.throughput_mib_s {
            self.throughput_mib_s.set(rate);
        }

        // Updates carry cumulative counts; add the difference.
        if update.blocks_done > self.last_blocks {
            self.blocks_processed
                .inc_by(update.blocks_done - self.last_blocks);
            self.last_blocks = update.blocks_done;
        }
    }

    fn audit_sample(&mut self, sample: &AuditSample) {
        self.stage.set(Stage::RandomAudit.ordinal());
        self.audit_samples.inc();
        if !sample.passed {
            self.audit_failures.inc();
        }
        self.last_audit_entropy.set(sample.entropy);
    }

    fn event(&mut self, event: &WipeEvent) {
        self.events
            .with_label_values(&[event.severity.as_str(), event.subsystem.as_str()])
            .inc();

        match (event.subsystem, event.severity) {
            (Subsystem::EntropyDrop, Severity::Warn) => self.watchdog_failures.inc(),
            (_, Severity::Critical) => self.stage.set(Stage::Failed.ordinal()),
            (Subsystem::Certificate, Severity::Success) => self.stage.set(Stage::Done.ordinal()),
            _ => {}
        }
    }
}

impl std::fmt::Debug for WipeMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WipeMetrics")
            .field("stage", &self.stage.get())
            .field("blocks_processed", &self.blocks_processed.get())
            .finish_non_exhaustive()
    }
}
