//! Random sector audit.
//!
//! After both passes, short sector-aligned samples are read from
//! uniformly random offsets and scored by the watchdog. Unreadable
//! samples are skipped. The mean score over the samples that could be
//! read is the headline entropy figure of the certificate.

use super::WipeError;
use crate::analysis::EntropyWatchdog;
use crate::config::AuditConfig;
use crate::device::BlockDevice;
use crate::progress::{AuditSample, ProgressSink, Severity, Subsystem, WipeEvent};
use rand_chacha::ChaCha20Rng;
use rand_core::{RngCore, SeedableRng};
use std::io::{self, Read, Seek, SeekFrom};

/// Result of one random sector audit.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditSummary {
    /// Samples attempted.
    pub attempts: u32,
    /// Samples read and scored.
    pub scored: u32,
    /// Scored samples below the threshold.
    pub failed: u32,
    /// Samples skipped because the sector could not be read.
    pub locked: u32,
    /// Mean entropy over scored samples; `None` if nothing could be read.
    pub average_entropy: Option<f64>,
}

impl AuditSummary {
    /// Returns true if at least one sample was scored and none failed.
    pub fn passed(&self) -> bool {
        self.scored > 0 && self.failed == 0
    }
}

/// Creates the audit RNG, seeded from `seed` or from the OS.
pub fn audit_rng(seed: Option<u64>) -> ChaCha20Rng {
    match seed {
        Some(seed) => ChaCha20Rng::seed_from_u64(seed),
        None => {
            let mut material = [0u8; 32];
            rand_core::OsRng.fill_bytes(&mut material);
            ChaCha20Rng::from_seed(material)
        }
    }
}

/// Uniform integer in `[0, bound)` without modulo bias.
///
/// `bound` must be non-zero.
pub fn uniform_below<R: RngCore + ?Sized>(rng: &mut R, bound: u64) -> u64 {
    debug_assert!(bound > 0);
    let mut wide = u128::from(rng.next_u64()) * u128::from(bound);
    if (wide as u64) < bound {
        let floor = bound.wrapping_neg() % bound;
        while (wide as u64) < floor {
            wide = u128::from(rng.next_u64()) * u128::from(bound);
        }
    }
    (wide >> 64) as u64
}

/// Samples `samples` random sectors of `device` and scores each one.
///
/// Offsets are multiples of `config.sector_size` and always leave room
/// for a full `config.sample_size` read. Every attempt opens its own
/// short-lived read handle.
pub fn random_sector_audit<D, R, S>(
    device: &D,
    config: &AuditConfig,
    samples: u32,
    watchdog: &EntropyWatchdog,
    rng: &mut R,
    sink: &mut S,
) -> Result<AuditSummary, WipeError>
where
    D: BlockDevice,
    R: RngCore + ?Sized,
    S: ProgressSink + ?Sized,
{
    let total_bytes = device.size_bytes();
    if total_bytes == 0 {
        return Err(WipeError::SizeUnknown {
            device: device.identity().to_string(),
        });
    }

    let max_sectors = total_bytes / config.sector_size;
    let span = config.sample_size as u64 / config.sector_size;
    if max_sectors < span {
        return Err(WipeError::DeviceTooSmall {
            device: device.identity().to_string(),
            size: total_bytes,
            needed: config.sample_size as u64,
        });
    }
    let choices = max_sectors - span + 1;

    sink.event(&WipeEvent::new(
        Severity::Info,
        Subsystem::Audit,
        format!("Random sector audit: {samples} samples of {} bytes", config.sample_size),
    ));

    let mut summary = AuditSummary {
        attempts: samples,
        scored: 0,
        failed: 0,
        locked: 0,
        average_entropy: None,
    };
    let mut entropy_sum = 0.0;
    let mut buf = vec![0u8; config.sample_size];

    for _ in 0..samples {
        let offset = uniform_below(rng, choices) * config.sector_size;

        if let Err(e) = read_sample(device, offset, &mut buf) {
            summary.locked += 1;
            sink.event(
                &WipeEvent::new(
                    Severity::Warn,
                    Subsystem::SectorLocked,
                    format!("Sector {offset:#x} unreadable, skipped"),
                )
                .with_detail(e.to_string()),
            );
            continue;
        }

        let (entropy, passed) = match watchdog.check(&buf) {
            Ok(score) => (score, true),
            Err(miss) => (miss.observed, false),
        };
        summary.scored += 1;
        if !passed {
            summary.failed += 1;
        }
        entropy_sum += entropy;

        sink.audit_sample(&AuditSample {
            offset,
            entropy,
            passed,
        });
    }

    if summary.scored > 0 {
        summary.average_entropy = Some(entropy_sum / f64::from(summary.scored));
    }

    let (severity, verdict) = if summary.passed() {
        (Severity::Success, "passed")
    } else {
        (Severity::Warn, "below threshold")
    };
    sink.event(
        &WipeEvent::new(
            severity,
            Subsystem::Audit,
            format!(
                "Average entropy {} bits/byte ({verdict})",
                summary
                    .average_entropy
                    .map_or_else(|| "N/A".to_string(), |e| format!("{e:.4}"))
            ),
        )
        .with_detail(format!(
            "scored {}, failed {}, locked {}",
            summary.scored, summary.failed, summary.locked
        )),
    );

    Ok(summary)
}

fn read_sample<D: BlockDevice>(device: &D, offset: u64, buf: &mut [u8]) -> io::Result<()> {
    let mut reader = device.open_read()?;
    reader.seek(SeekFrom::Start(offset))?;
    reader.read_exact(buf)
}
