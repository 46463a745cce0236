//! Prometheus metrics for wipe sessions.
//!
//! [`WipeMetrics`] is a [`ProgressSink`](crate::progress::ProgressSink)
//! that turns orchestrator progress and events into Prometheus series.
//!
//! # Metrics Exposed
//!
//! - `forensic_wipe_stage` - Current protocol stage ordinal
//! - `forensic_wipe_progress_percent` - Completion of the current pass or hash
//! - `forensic_wipe_throughput_mib_s` - Rolling write throughput
//! - `forensic_wipe_blocks_processed_total` - Blocks written or hashed
//! - `forensic_wipe_watchdog_failures_total` - Watchdog threshold misses
//! - `forensic_wipe_audit_samples_total` - Random audit samples scored
//! - `forensic_wipe_audit_failures_total` - Audit samples below threshold
//! - `forensic_wipe_last_audit_entropy` - Most recent audit sample score
//! - `forensic_wipe_events_total{severity,subsystem}` - Structured events
//!
//! # Example
//!
//! ```no_run
//! use forensic_wipe::metrics::WipeMetrics;
//! use forensic_wipe::progress::TracingSink;
//!
//! let metrics = WipeMetrics::new().expect("Failed to create registry");
//! let sink = (TracingSink, metrics);
//! // hand `sink` to the orchestrator, then:
//! println!("{}", sink.1.encode().unwrap());
//! ```

mod collector;

pub use collector::{MetricsError, WipeMetrics};
