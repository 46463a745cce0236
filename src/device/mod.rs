//! Raw block device access.
//!
//! This module provides a trait-based abstraction over the target
//! device so the orchestrator can run against a real disk, an image
//! file, or an in-memory double. It does no partitioning or
//! filesystem work; callers are expected to have seized the device.

mod file;
mod memory;

pub use file::FileDevice;
pub use memory::{MemoryDevice, MemoryReader, MemoryWriter, WriteRecord};

use std::io::{self, Read, Seek, Write};

/// Writable device handle that can be flushed to stable storage.
pub trait DeviceWriter: Write + Seek {
    /// Forces written data down to the medium.
    fn sync_to_media(&mut self) -> io::Result<()>;
}

/// Trait for wipe targets.
///
/// Handles are opened per operation and dropped at its end; no
/// handle is ever shared between a read pass and a write pass.
pub trait BlockDevice {
    /// Sequential/seekable read handle.
    type Reader: Read + Seek;
    /// Read/write/seek handle.
    type Writer: DeviceWriter;

    /// Stable identifier of the device (path, serial, ...).
    fn identity(&self) -> &str;

    /// Total addressable bytes, or `0` if unknown or inaccessible.
    fn size_bytes(&self) -> u64;

    /// Opens the device for reading.
    fn open_read(&self) -> io::Result<Self::Reader>;

    /// Opens the device for reading and writing.
    fn open_write(&self) -> io::Result<Self::Writer>;

    /// Drops cached pages of the device so the next read is served by
    /// the medium rather than by memory filled during the write.
    ///
    /// Only meaningful once written data has been synced. Devices with
    /// no cache between the caller and the medium keep the default.
    fn evict_cache(&self) -> io::Result<()> {
        Ok(())
    }
}
