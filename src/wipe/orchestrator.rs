//! Multi-pass wipe orchestrator.
//!
//! Drives one [`WipeSession`] through the fixed protocol:
//!
//! 1. baseline surface hash
//! 2. pass 1: raw keystream fill, then readback hash
//! 3. pass 2: keystream through the keyed transform, then readback hash
//! 4. random sector audit
//!
//! Each write pass runs the stream engine on a producer thread and the
//! device writer on the calling thread, joined by the bounded
//! [`pipeline`](super::pipeline). Hashing and auditing are sequential
//! and never overlap a pass.

use super::audit::{self, audit_rng};
use super::digest::{surface_hash, SurfaceHasher};
use super::pipeline::run_pipeline;
use super::{
    AuditSummary, Certificate, Checkpoint, HashDigest, Pass, PassReport, Stage, WipeError,
    WipeSession,
};
use crate::analysis::EntropyWatchdog;
use crate::config::{Config, MIB};
use crate::device::{BlockDevice, DeviceWriter};
use crate::engine::{EngineError, RootSecret, StreamEngine};
use crate::progress::{ProgressSink, ProgressUpdate, Severity, Subsystem, WipeEvent};
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Result of [`WipeOrchestrator::run`].
#[derive(Debug)]
pub struct WipeOutcome {
    /// Certificate built from whatever was captured.
    pub certificate: Certificate,
    /// The fatal error, if the protocol did not complete.
    pub error: Option<WipeError>,
}

impl WipeOutcome {
    /// Returns true if every stage completed.
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.certificate.completed
    }
}

#[derive(Debug, Default)]
struct WriteTally {
    written: u64,
    checks: u64,
    misses: u64,
}

/// Runs the sanitization protocol against one device.
pub struct WipeOrchestrator<D: BlockDevice, S: ProgressSink> {
    device: D,
    config: Config,
    watchdog: EntropyWatchdog,
    session: WipeSession,
    sink: S,
    interrupt: Option<Arc<AtomicBool>>,
}

impl<D: BlockDevice, S: ProgressSink> WipeOrchestrator<D, S> {
    /// Creates an orchestrator that owns `secret` for the session.
    ///
    /// Fails before any device I/O if the configuration is invalid or
    /// the secret is all zero bytes.
    pub fn new(device: D, secret: RootSecret, config: Config, mut sink: S) -> Result<Self, WipeError> {
        config.validate()?;
        if secret.is_all_zero() {
            return Err(EngineError::ZeroSecret.into());
        }

        sink.event(
            &WipeEvent::new(Severity::Info, Subsystem::Seed, "Root secret acquired")
                .with_detail(format!("fingerprint {}", secret.fingerprint())),
        );

        let session = WipeSession::new(
            device.identity(),
            device.size_bytes(),
            config.wipe.block_size,
            secret,
        );
        tracing::info!(
            session = session.id(),
            device = session.device(),
            bytes = session.device_bytes(),
            block_size = session.block_size(),
            "Wipe session created"
        );

        Ok(Self {
            watchdog: EntropyWatchdog::new(config.watchdog.threshold),
            device,
            config,
            session,
            sink,
            interrupt: None,
        })
    }

    /// Checks `flag` at every stage boundary and stops the session once
    /// it is set.
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(flag);
        self
    }

    /// Session state.
    pub fn session(&self) -> &WipeSession {
        &self.session
    }

    /// Active configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Target device.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Progress sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Hashes the whole device surface without touching the session.
    pub fn compute_surface_hash(&mut self, label: &str) -> Result<HashDigest, WipeError> {
        surface_hash(
            &self.device,
            &self.config.wipe,
            self.session.stage(),
            label,
            &mut self.sink,
        )
    }

    /// Captures the pre-wipe baseline digest.
    pub fn capture_baseline(&mut self) -> Result<&Checkpoint, WipeError> {
        self.begin("capture_baseline", Stage::PreAudit)?;
        let checkpoint = self.checkpoint(Stage::PreAudit, "PRE-WIPE BASELINE")?;
        self.session.pre_wipe = checkpoint;
        Ok(&self.session.pre_wipe)
    }

    /// Writes one full pass, then records its readback checkpoint.
    pub fn execute_pass(&mut self, pass: Pass) -> Result<PassReport, WipeError> {
        let write_stage = pass.write_stage();
        self.begin("execute_pass", write_stage)?;

        let total_bytes = self.device.size_bytes();
        if total_bytes == 0 {
            let device = self.session.device().to_string();
            return Err(self.fail(WipeError::SizeUnknown { device }));
        }
        self.session.set_device_bytes(total_bytes);

        let block_size = self.config.wipe.block_size;
        let total_blocks = self.session.blocks_per_pass();
        if total_blocks == 0 {
            return Err(self.fail(WipeError::DeviceTooSmall {
                device: self.session.device().to_string(),
                size: total_bytes,
                needed: block_size as u64,
            }));
        }

        self.sink.event(
            &WipeEvent::new(Severity::Info, Subsystem::WipeEngine, pass.label())
                .with_detail(format!("{total_blocks} blocks of {block_size} bytes")),
        );

        let mut writer = match self.device.open_write() {
            Ok(writer) => writer,
            Err(source) => {
                let device = self.session.device().to_string();
                return Err(self.fail(WipeError::AccessDenied { device, source }));
            }
        };

        let started = Instant::now();
        let mut tally = WriteTally::default();
        let mut stream_hash = self
            .config
            .wipe
            .verify_against_stream
            .then(|| SurfaceHasher::new(self.config.wipe.hash_algorithm));

        let result = match self.session.secret() {
            Some(secret) => {
                let mut engine = StreamEngine::new(secret);
                let transform = pass.applies_transform();
                let produce = move |_: u64| {
                    let block = engine.next_block(block_size);
                    if transform {
                        engine.transform(block)
                    } else {
                        block
                    }
                };

                let sink = &mut self.sink;
                let watchdog = &self.watchdog;
                let wipe_cfg = &self.config.wipe;
                let watch_cfg = &self.config.watchdog;
                let tally = &mut tally;
                let stream_hash = &mut stream_hash;
                let writer = &mut writer;

                let consume = |index: u64, block: Vec<u8>| -> Result<(), WipeError> {
                    let n = index + 1;

                    if n % watch_cfg.interval == 0 {
                        tally.checks += 1;
                        if let Err(miss) = watchdog.check(&block) {
                            tally.misses += 1;
                            sink.event(
                                &WipeEvent::new(
                                    Severity::Warn,
                                    Subsystem::EntropyDrop,
                                    format!("Block {n} entropy below threshold"),
                                )
                                .with_detail(miss.to_string()),
                            );
                            if watch_cfg.policy.aborts() {
                                return Err(WipeError::EntropyDegraded {
                                    stage: write_stage,
                                    block: index,
                                    source: miss,
                                });
                            }
                        }
                    }

                    writer
                        .write_all(&block)
                        .map_err(|source| WipeError::EngineFailure {
                            stage: write_stage,
                            block: index,
                            source,
                        })?;
                    if let Some(hasher) = stream_hash.as_mut() {
                        hasher.update(&block);
                    }
                    tally.written = n;

                    if n % wipe_cfg.write_report_interval == 0 || n == total_blocks {
                        sink.progress(&ProgressUpdate {
                            stage: write_stage,
                            label: pass.label().to_string(),
                            blocks_done: n,
                            blocks_total: total_blocks,
                            throughput_mib_s: Some(mib_per_sec(
                                n * block_size as u64,
                                started.elapsed(),
                            )),
                        });
                    }
                    Ok(())
                };

                run_pipeline(total_blocks, wipe_cfg.queue_depth, produce, consume).map(|_| ())
            }
            None => Err(WipeError::ProtocolViolation {
                operation: "execute_pass",
                stage: write_stage,
                reason: "root secret already released",
            }),
        };

        let result = result.and_then(|()| {
            if self.config.wipe.sync_after_pass {
                writer
                    .sync_to_media()
                    .map_err(|source| WipeError::EngineFailure {
                        stage: write_stage,
                        block: tally.written,
                        source,
                    })?;
            }
            Ok(())
        });
        drop(writer);

        let duration = started.elapsed();
        let bytes_written = tally.written * block_size as u64;
        let report = PassReport {
            pass,
            blocks_total: total_blocks,
            blocks_written: tally.written,
            bytes_written,
            duration,
            throughput_mib_s: mib_per_sec(bytes_written, duration),
            watchdog_checks: tally.checks,
            watchdog_failures: tally.misses,
            completed: result.is_ok(),
        };
        self.session.reports.push(report.clone());

        if let Err(e) = result {
            return Err(self.fail(e));
        }

        // Synced pages can be dropped; the readback hash must come from media.
        if self.config.wipe.sync_after_pass {
            if let Err(e) = self.device.evict_cache() {
                self.sink.event(
                    &WipeEvent::new(
                        Severity::Warn,
                        Subsystem::Forensic,
                        format!("PASS {} cache eviction failed", pass.number()),
                    )
                    .with_detail(format!("readback may be served from cache: {e}")),
                );
            }
        }

        self.sink.event(
            &WipeEvent::new(
                Severity::Success,
                Subsystem::Performance,
                format!(
                    "PASS {} complete in {:.1}s",
                    pass.number(),
                    duration.as_secs_f64()
                ),
            )
            .with_detail(format!(
                "{:.1} MiB/s, {} blocks, {} watchdog misses",
                report.throughput_mib_s, report.blocks_written, report.watchdog_failures
            )),
        );

        let verify_stage = pass.verify_stage();
        self.session.enter(verify_stage);
        let label = match pass {
            Pass::First => "PASS 1 VERIFY",
            Pass::Second => "PASS 2 VERIFY (FINAL)",
        };
        let checkpoint = self.checkpoint(verify_stage, label)?;
        match pass {
            Pass::First => self.session.pass1 = checkpoint.clone(),
            Pass::Second => self.session.final_hash = checkpoint.clone(),
        }

        if let (Some(hasher), Checkpoint::Captured(actual)) = (stream_hash, &checkpoint) {
            let expected = hasher.finalize();
            if expected != *actual {
                return Err(self.fail(WipeError::VerificationMismatch {
                    stage: verify_stage,
                    expected: expected.to_hex(),
                    actual: actual.to_hex(),
                }));
            }
            self.sink.event(&WipeEvent::new(
                Severity::Success,
                Subsystem::Forensic,
                format!("PASS {} readback matches written stream", pass.number()),
            ));
        }

        Ok(report)
    }

    /// Samples `sample_count` random sectors and records the average entropy.
    ///
    /// Completes the protocol.
    pub fn random_sector_audit(&mut self, sample_count: u32) -> Result<AuditSummary, WipeError> {
        self.begin("random_sector_audit", Stage::RandomAudit)?;

        let mut rng = audit_rng(self.config.audit.rng_seed);
        let result = audit::random_sector_audit(
            &self.device,
            &self.config.audit,
            sample_count,
            &self.watchdog,
            &mut rng,
            &mut self.sink,
        );

        match result {
            Ok(summary) => {
                self.session.audit = Some(summary.clone());
                self.session.enter(Stage::Done);
                Ok(summary)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Runs every stage in order and returns the certificate.
    ///
    /// The root secret is zeroized before this returns, whatever the
    /// outcome.
    pub fn run(mut self) -> WipeOutcome {
        let result = self.run_protocol();
        let certificate = self.finish();
        WipeOutcome {
            certificate,
            error: result.err(),
        }
    }

    fn run_protocol(&mut self) -> Result<(), WipeError> {
        self.capture_baseline()?;
        self.execute_pass(Pass::First)?;
        self.execute_pass(Pass::Second)?;
        self.random_sector_audit(self.config.audit.samples)?;
        Ok(())
    }

    /// Certificate for the session as it stands.
    pub fn certificate(&self) -> Certificate {
        Certificate::from_session(&self.session, self.config.wipe.hash_algorithm)
    }

    /// Ends the session: issues the certificate, then zeroizes the secret.
    pub fn finish(mut self) -> Certificate {
        let certificate = self.certificate();
        self.sink.event(
            &WipeEvent::new(
                if certificate.completed {
                    Severity::Success
                } else {
                    Severity::Error
                },
                Subsystem::Certificate,
                format!("Certificate {} issued", certificate.session_id),
            )
            .with_detail(certificate.outcome.clone()),
        );

        self.session.release_secret();
        self.sink.event(&WipeEvent::new(
            Severity::Info,
            Subsystem::Seed,
            "Root secret zeroized",
        ));
        certificate
    }

    /// Checks interrupt and ordering, then enters `stage`.
    fn begin(&mut self, operation: &'static str, stage: Stage) -> Result<(), WipeError> {
        let current = self.session.stage();
        let violation = |reason| WipeError::ProtocolViolation {
            operation,
            stage: current,
            reason,
        };

        if current.is_terminal() {
            return Err(violation("session already finished"));
        }
        if !self.session.holds_secret() {
            return Err(violation("root secret already released"));
        }

        let ready = match stage {
            Stage::PreAudit => current == Stage::Idle,
            Stage::Pass1Write => current == Stage::PreAudit && self.session.pre_wipe.is_settled(),
            Stage::Pass2Write => current == Stage::Pass1Verify && self.session.pass1.is_settled(),
            Stage::RandomAudit => {
                current == Stage::Pass2Verify && self.session.final_hash.is_settled()
            }
            _ => false,
        };
        if !ready {
            return Err(violation(match stage {
                Stage::PreAudit => "baseline already captured",
                Stage::Pass1Write => "pre-wipe baseline required",
                Stage::Pass2Write => "pass 1 must be written and verified",
                Stage::RandomAudit => "both passes must be written and verified",
                _ => "not a startable stage",
            }));
        }

        if self
            .interrupt
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
        {
            return Err(self.fail(WipeError::Interrupted { stage }));
        }

        self.session.enter(stage);
        Ok(())
    }

    /// Hashes the surface into a checkpoint.
    ///
    /// A read failure yields [`Checkpoint::Unavailable`] and the session
    /// continues; any other error fails it.
    fn checkpoint(&mut self, stage: Stage, label: &str) -> Result<Checkpoint, WipeError> {
        match surface_hash(&self.device, &self.config.wipe, stage, label, &mut self.sink) {
            Ok(digest) => {
                self.sink.event(
                    &WipeEvent::new(Severity::Success, Subsystem::Forensic, format!("{label} hash"))
                        .with_detail(digest.to_hex()),
                );
                Ok(Checkpoint::Captured(digest))
            }
            Err(e @ WipeError::ReadError { .. }) => {
                self.sink.event(
                    &WipeEvent::new(
                        Severity::Warn,
                        Subsystem::Forensic,
                        format!("{label} hash unavailable"),
                    )
                    .with_detail(e.to_string()),
                );
                Ok(Checkpoint::Unavailable(e.to_string()))
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Moves the session to `FAILED` and reports the error.
    fn fail(&mut self, err: WipeError) -> WipeError {
        self.session.fail(&err);
        let subsystem = match &err {
            WipeError::AccessDenied { .. } => Subsystem::Access,
            WipeError::EntropyDegraded { .. } => Subsystem::EntropyDrop,
            WipeError::ReadError { .. } | WipeError::VerificationMismatch { .. } => {
                Subsystem::Forensic
            }
            WipeError::InvalidSecret(_) => Subsystem::Seed,
            _ => Subsystem::Engine,
        };
        self.sink.event(
            &WipeEvent::new(Severity::Critical, subsystem, err.to_string())
                .with_detail(format!("class: {}", err.class())),
        );
        err
    }
}

impl<D: BlockDevice, S: ProgressSink> std::fmt::Debug for WipeOrchestrator<D, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WipeOrchestrator")
            .field("device", &self.device.identity())
            .field("session", &self.session)
            .field("watchdog", &self.watchdog)
            .finish_non_exhaustive()
    }
}

fn mib_per_sec(bytes: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        bytes as f64 / MIB as f64 / secs
    } else {
        0.0
    }
}
