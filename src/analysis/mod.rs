//! Entropy scoring and the safety watchdog.
//!
//! This module scores byte buffers by Shannon entropy and flags
//! buffers that fall below a threshold. These are sanity checks on
//! live data, not proofs of unpredictability.

mod statistics;
mod threshold;
mod watchdog;

pub use statistics::{shannon_entropy, ByteHistogram};
pub use threshold::{EntropyDegraded, EntropyPolicy, DEFAULT_ENTROPY_THRESHOLD};
pub use watchdog::EntropyWatchdog;
