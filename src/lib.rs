//! Forensic Wipe Library
//!
//! Forensically verifiable multi-pass sanitization of block devices.
//! Every byte written is derived deterministically from one root
//! secret, so what was written can be regenerated and checked against
//! what is read back.
//!
//! # Architecture
//!
//! ```text
//! provider → engine → wipe (pipeline → device) → certificate
//!                        ↓
//!             analysis (entropy watchdog)
//! ```
//!
//! # Design Principles
//!
//! - **Regenerable output**: pass content is a pure function of the root secret
//! - **Live interlock**: written blocks and audit samples are entropy-scored
//! - **Evidence survives failure**: captured digests are kept when a stage fails
//! - **Secret hygiene**: the root secret is zeroized when the session ends
//!
//! # Example
//!
//! ```no_run
//! use forensic_wipe::{
//!     config::Config,
//!     device::FileDevice,
//!     progress::TracingSink,
//!     provider::{OsEntropyProvider, SecretProvider},
//!     wipe::WipeOrchestrator,
//! };
//!
//! let secret = OsEntropyProvider::new().fetch().unwrap();
//! let device = FileDevice::new("/dev/sdX");
//!
//! let outcome = WipeOrchestrator::new(device, secret, Config::default(), TracingSink)
//!     .unwrap()
//!     .run();
//!
//! println!("{}", outcome.certificate.render());
//! if let Some(err) = outcome.error {
//!     eprintln!("wipe failed ({}): {}", err.class(), err);
//! }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod analysis;
pub mod config;
pub mod device;
pub mod engine;
pub mod metrics;
pub mod progress;
pub mod provider;
pub mod wipe;

// Re-export commonly used types at crate root
pub use analysis::{EntropyPolicy, EntropyWatchdog};
pub use config::Config;
pub use device::{BlockDevice, FileDevice, MemoryDevice};
pub use engine::{RootSecret, StreamEngine};
pub use progress::{ProgressSink, TracingSink};
pub use wipe::{Certificate, WipeError, WipeOrchestrator, WipeOutcome};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
