//! Path-backed device: a raw disk node or a disk image file.
//!
//! Reads and writes go through the OS page cache. On Linux the cache is
//! dropped with `posix_fadvise(POSIX_FADV_DONTNEED)` after a pass has
//! been synced, so verification reads come from the medium. Other
//! platforms have no equivalent here and verification may read cached
//! pages.

use super::{BlockDevice, DeviceWriter};
use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// A device addressed by filesystem path.
///
/// Works for block device nodes (`/dev/sdX`) as well as regular image
/// files. The device is never created or truncated.
#[derive(Debug, Clone)]
pub struct FileDevice {
    path: PathBuf,
    identity: String,
}

impl FileDevice {
    /// Creates a device handle factory for `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let identity = path.display().to_string();
        Self { path, identity }
    }

    /// Returns the device path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BlockDevice for FileDevice {
    type Reader = File;
    type Writer = File;

    fn identity(&self) -> &str {
        &self.identity
    }

    fn size_bytes(&self) -> u64 {
        // Seeking to the end works for both block nodes and regular
        // files, where metadata().len() reports 0 for the former.
        match File::open(&self.path).and_then(|mut f| f.seek(SeekFrom::End(0))) {
            Ok(size) => size,
            Err(e) => {
                tracing::debug!(device = %self.identity, error = %e, "Device size query failed");
                0
            }
        }
    }

    fn open_read(&self) -> io::Result<File> {
        File::open(&self.path)
    }

    fn open_write(&self) -> io::Result<File> {
        OpenOptions::new().read(true).write(true).open(&self.path)
    }

    fn evict_cache(&self) -> io::Result<()> {
        let file = File::open(&self.path)?;
        drop_page_cache(&file)
    }
}

#[cfg(target_os = "linux")]
#[allow(unsafe_code)]
fn drop_page_cache(file: &File) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    // Offset 0 with length 0 covers the whole file. Returns an errno
    // value directly instead of setting errno.
    let rc = unsafe { libc::posix_fadvise(file.as_raw_fd(), 0, 0, libc::POSIX_FADV_DONTNEED) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::from_raw_os_error(rc))
    }
}

#[cfg(not(target_os = "linux"))]
fn drop_page_cache(_file: &File) -> io::Result<()> {
    Ok(())
}

impl DeviceWriter for File {
    fn sync_to_media(&mut self) -> io::Result<()> {
        self.sync_data()
    }
}
