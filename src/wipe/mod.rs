//! Multi-pass wipe orchestration.
//!
//! This module owns everything that touches the device: surface
//! hashing, the pipelined write passes, the random sector audit and
//! the session state machine that ties them together.
//!
//! # Example
//!
//! ```no_run
//! use forensic_wipe::{
//!     config::Config,
//!     device::FileDevice,
//!     engine::RootSecret,
//!     progress::TracingSink,
//!     wipe::WipeOrchestrator,
//! };
//!
//! let secret = RootSecret::from_array([0x5A; 32]);
//! let device = FileDevice::new("/tmp/disk.img");
//!
//! let orchestrator =
//!     WipeOrchestrator::new(device, secret, Config::default(), TracingSink).unwrap();
//! let outcome = orchestrator.run();
//! println!("{}", outcome.certificate.render());
//! ```

mod audit;
mod certificate;
mod digest;
mod error;
mod orchestrator;
mod pipeline;
mod session;

pub use audit::{audit_rng, random_sector_audit, uniform_below, AuditSummary};
pub use certificate::{Certificate, PassLine};
pub use digest::{hash_blocks, surface_hash, HashAlgorithm, HashDigest, SurfaceHasher};
pub use error::WipeError;
pub use orchestrator::{WipeOrchestrator, WipeOutcome};
pub use pipeline::run_pipeline;
pub use session::{Checkpoint, FailureRecord, Pass, PassReport, Stage, WipeSession};
