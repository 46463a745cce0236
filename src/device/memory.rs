//! In-memory device for testing.
//!
//! Behaves like a fixed-size disk and records every write. Faults can
//! be injected: unreadable regions, a write budget after which writes
//! fail, a read-only mode that refuses write handles, and silent
//! corruption of written data. Cache evictions are counted.

use super::{BlockDevice, DeviceWriter};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::ops::Range;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// One successful write call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    /// Device offset of the first byte written.
    pub offset: u64,
    /// Bytes written.
    pub bytes: Vec<u8>,
}

#[derive(Debug, Default)]
struct MemoryState {
    data: Vec<u8>,
    writes: Vec<WriteRecord>,
    locked: Vec<Range<u64>>,
    write_budget: Option<usize>,
    read_only: bool,
    corrupt_writes: bool,
    evictions: usize,
}

impl MemoryState {
    fn is_locked(&self, span: Range<u64>) -> bool {
        self.locked
            .iter()
            .any(|r| r.start < span.end && span.start < r.end)
    }
}

/// Mock device backed by a shared byte vector.
///
/// Clones share the same storage, so a test can keep one handle for
/// inspection while the orchestrator owns another.
#[derive(Debug, Clone)]
pub struct MemoryDevice {
    state: Arc<Mutex<MemoryState>>,
    identity: String,
}

impl MemoryDevice {
    /// Creates a zero-filled device of `size` bytes.
    pub fn new(size: usize) -> Self {
        Self::with_data(vec![0u8; size])
    }

    /// Creates a device of `size` bytes filled with `byte`.
    pub fn filled(size: usize, byte: u8) -> Self {
        Self::with_data(vec![byte; size])
    }

    /// Creates a device holding `data`.
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                data,
                ..Default::default()
            })),
            identity: "memory".to_string(),
        }
    }

    /// Sets the reported identity.
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }

    /// Makes reads touching `region` fail.
    pub fn lock_region(&self, region: Range<u64>) {
        self.state().locked.push(region);
    }

    /// Allows `writes` more successful write calls, then fails.
    pub fn fail_writes_after(&self, writes: usize) {
        self.state().write_budget = Some(writes);
    }

    /// Refuses write handles when `read_only` is set.
    pub fn set_read_only(&self, read_only: bool) {
        self.state().read_only = read_only;
    }

    /// Makes every write store its first byte inverted while still
    /// reporting success.
    pub fn set_corrupt_writes(&self, corrupt: bool) {
        self.state().corrupt_writes = corrupt;
    }

    /// Copy of the current device contents.
    pub fn snapshot(&self) -> Vec<u8> {
        self.state().data.clone()
    }

    /// All successful writes so far, in order.
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.state().writes.clone()
    }

    /// Number of cache evictions requested.
    pub fn evictions(&self) -> usize {
        self.state().evictions
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        lock(&self.state)
    }
}

fn lock(state: &Mutex<MemoryState>) -> MutexGuard<'_, MemoryState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn seek_to(pos: &mut u64, len: u64, target: SeekFrom) -> io::Result<u64> {
    let next = match target {
        SeekFrom::Start(offset) => Some(offset),
        SeekFrom::End(delta) => len.checked_add_signed(delta),
        SeekFrom::Current(delta) => pos.checked_add_signed(delta),
    };

    match next {
        Some(next) => {
            *pos = next;
            Ok(next)
        }
        None => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "seek before start of device",
        )),
    }
}

impl BlockDevice for MemoryDevice {
    type Reader = MemoryReader;
    type Writer = MemoryWriter;

    fn identity(&self) -> &str {
        &self.identity
    }

    fn size_bytes(&self) -> u64 {
        self.state().data.len() as u64
    }

    fn open_read(&self) -> io::Result<MemoryReader> {
        Ok(MemoryReader {
            state: Arc::clone(&self.state),
            pos: 0,
        })
    }

    fn open_write(&self) -> io::Result<MemoryWriter> {
        if self.state().read_only {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "device is read-only",
            ));
        }

        Ok(MemoryWriter {
            state: Arc::clone(&self.state),
            pos: 0,
        })
    }

    fn evict_cache(&self) -> io::Result<()> {
        self.state().evictions += 1;
        Ok(())
    }
}

/// Read handle for [`MemoryDevice`].
#[derive(Debug)]
pub struct MemoryReader {
    state: Arc<Mutex<MemoryState>>,
    pos: u64,
}

impl Read for MemoryReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let state = lock(&self.state);
        let len = state.data.len() as u64;
        if self.pos >= len || buf.is_empty() {
            return Ok(0);
        }

        let n = (buf.len() as u64).min(len - self.pos);
        if state.is_locked(self.pos..self.pos + n) {
            return Err(io::Error::new(io::ErrorKind::Other, "sector locked"));
        }

        let start = self.pos as usize;
        buf[..n as usize].copy_from_slice(&state.data[start..start + n as usize]);
        self.pos += n;
        Ok(n as usize)
    }
}

impl Seek for MemoryReader {
    fn seek(&mut self, target: SeekFrom) -> io::Result<u64> {
        let len = lock(&self.state).data.len() as u64;
        seek_to(&mut self.pos, len, target)
    }
}

/// Write handle for [`MemoryDevice`].
#[derive(Debug)]
pub struct MemoryWriter {
    state: Arc<Mutex<MemoryState>>,
    pos: u64,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = lock(&self.state);

        if let Some(budget) = state.write_budget.as_mut() {
            if *budget == 0 {
                return Err(io::Error::new(io::ErrorKind::Other, "injected write fault"));
            }
            *budget -= 1;
        }

        let len = state.data.len() as u64;
        if self.pos >= len {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "write past end of device",
            ));
        }

        let n = (buf.len() as u64).min(len - self.pos) as usize;
        let start = self.pos as usize;
        state.data[start..start + n].copy_from_slice(&buf[..n]);
        if state.corrupt_writes && n > 0 {
            state.data[start] ^= 0xFF;
        }
        let stored = state.data[start..start + n].to_vec();
        state.writes.push(WriteRecord {
            offset: self.pos,
            bytes: stored,
        });
        self.pos += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for MemoryWriter {
    fn seek(&mut self, target: SeekFrom) -> io::Result<u64> {
        let len = lock(&self.state).data.len() as u64;
        seek_to(&mut self.pos, len, target)
    }
}

impl DeviceWriter for MemoryWriter {
    fn sync_to_media(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_device_lifecycle() {
        let device = MemoryDevice::filled(64, 0x11);
        assert_eq!(device.size_bytes(), 64);

        let mut writer = device.open_write().unwrap();
        writer.seek(SeekFrom::Start(8)).unwrap();
        writer.write_all(&[0xAA; 8]).unwrap();

        let mut reader = device.open_read().unwrap();
        let mut buf = [0u8; 16];
        reader.read_exact(&mut buf).unwrap();

        assert_eq!(&buf[..8], &[0x11; 8]);
        assert_eq!(&buf[8..], &[0xAA; 8]);
        assert_eq!(
            device.writes(),
            vec![WriteRecord {
                offset: 8,
                bytes: vec![0xAA; 8]
            }]
        );
    }

    #[test]
    fn test_locked_region_fails_reads() {
        let device = MemoryDevice::new(4096);
        device.lock_region(1024..1536);

        let mut reader = device.open_read().unwrap();
        let mut buf = [0u8; 512];

        reader.seek(SeekFrom::Start(0)).unwrap();
        assert!(reader.read_exact(&mut buf).is_ok());

        reader.seek(SeekFrom::Start(1024)).unwrap();
        assert!(reader.read_exact(&mut buf).is_err());

        reader.seek(SeekFrom::Start(1536)).unwrap();
        assert!(reader.read_exact(&mut buf).is_ok());
    }

    #[test]
    fn test_write_budget() {
        let device = MemoryDevice::new(64);
        device.fail_writes_after(2);

        let mut writer = device.open_write().unwrap();
        assert!(writer.write_all(&[1; 8]).is_ok());
        assert!(writer.write_all(&[2; 8]).is_ok());
        assert!(writer.write_all(&[3; 8]).is_err());
        assert_eq!(device.writes().len(), 2);
    }

    #[test]
    fn test_read_only_refuses_writer() {
        let device = MemoryDevice::new(64);
        device.set_read_only(true);

        let err = device.open_write().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
        assert!(device.open_read().is_ok());
    }

    #[test]
    fn test_write_past_end_fails() {
        let device = MemoryDevice::new(10);
        let mut writer = device.open_write().unwrap();

        assert!(writer.write_all(&[0xFF; 16]).is_err());
        assert_eq!(device.snapshot(), vec![0xFF; 10]);
    }

    #[test]
    fn test_corrupt_writes_flip_first_byte() {
        let device = MemoryDevice::new(8);
        device.set_corrupt_writes(true);

        let mut writer = device.open_write().unwrap();
        assert_eq!(writer.write(&[0x0F; 4]).unwrap(), 4);
        assert_eq!(&device.snapshot()[..4], &[0xF0, 0x0F, 0x0F, 0x0F]);
    }

    #[test]
    fn test_clones_share_storage() {
        let device = MemoryDevice::new(4);
        let other = device.clone();

        other.open_write().unwrap().write_all(&[9; 4]).unwrap();
        assert_eq!(device.snapshot(), vec![9; 4]);
    }
}
