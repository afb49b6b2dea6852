//! Queue-file data path.
//!
//! The queue backend reaches the accelerator through a device file: operands
//! are written at fixed byte offsets with `pwrite`, the result is read back
//! with `pread`, and `fsync` is the ordering barrier that guarantees a write
//! sequence reached the consuming logic before a dependent read. Omitting
//! the flush leaves read freshness undefined.

use crate::backend::{BackendType, DataPath};
use crate::error::{Mac8Error, Result};
use rustix::fs::fsync;
use rustix::io::{pread, pwrite};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Open queue device file, owned for the duration of one operation.
#[derive(Debug)]
pub struct QueueChannel {
    file: File,
    path: PathBuf,
}

impl QueueChannel {
    /// Open the queue device file read/write.
    ///
    /// # Errors
    ///
    /// Returns [`Mac8Error::AttachFailed`] if the file cannot be opened.
    /// No handle exists on failure.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| {
                Mac8Error::attach_failed(format!("cannot open {}: {e}", path.display()))
            })?;

        tracing::info!(path = %path.display(), "opened queue");
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Release the queue handle. Equivalent to dropping, but announces the
    /// release at info level for operation logs.
    pub fn release(self) {
        tracing::info!(path = %self.path.display(), "releasing queue");
        // Drop closes the descriptor.
    }

    /// Path this channel was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DataPath for QueueChannel {
    fn write_word(&mut self, offset: u64, value: u32) -> Result<()> {
        self.write_burst(offset, &value.to_le_bytes())
    }

    fn read_word(&mut self, offset: u64) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_burst(offset, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn write_burst(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        let mut written = 0;
        while written < data.len() {
            let n = pwrite(&self.file, &data[written..], offset + written as u64)
                .map_err(|e| {
                    Mac8Error::transfer_failed(format!(
                        "write at {offset:#x} failed: {e}"
                    ))
                })?;
            if n == 0 {
                return Err(Mac8Error::transfer_failed(format!(
                    "write at {offset:#x} made no progress"
                )));
            }
            written += n;
        }
        tracing::trace!("wrote {} byte(s) at {offset:#x}", data.len());
        Ok(())
    }

    fn read_burst(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = pread(&self.file, &mut buf[filled..], offset + filled as u64)
                .map_err(|e| {
                    Mac8Error::transfer_failed(format!(
                        "read at {offset:#x} failed: {e}"
                    ))
                })?;
            if n == 0 {
                return Err(Mac8Error::transfer_failed(format!(
                    "short read at {offset:#x}: got {filled} of {}",
                    buf.len()
                )));
            }
            filled += n;
        }
        tracing::trace!("read {} byte(s) at {offset:#x}", buf.len());
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        fsync(&self.file).map_err(|e| {
            Mac8Error::transfer_failed(format!(
                "flush of {} failed: {e}",
                self.path.display()
            ))
        })
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Queue
    }
}

impl Drop for QueueChannel {
    fn drop(&mut self) {
        tracing::debug!(path = %self.path.display(), "closed queue");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn scratch_file(tag: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "mac8-queue-{tag}-{}",
            std::process::id()
        ));
        fs::write(&path, vec![0u8; 0x3000]).unwrap();
        path
    }

    #[test]
    fn offset_write_flush_read_round_trip() {
        let path = scratch_file("roundtrip");
        let mut q = QueueChannel::open(&path).unwrap();

        q.write_burst(0x1000, &0x1234u16.to_le_bytes()).unwrap();
        q.write_word(0x2000, 0xDEAD_BEEF).unwrap();
        q.flush().unwrap();

        let mut two = [0u8; 2];
        q.read_burst(0x1000, &mut two).unwrap();
        assert_eq!(i16::from_le_bytes(two), 0x1234);
        assert_eq!(q.read_word(0x2000).unwrap(), 0xDEAD_BEEF);

        let _ = fs::remove_file(path);
    }

    #[test]
    fn open_missing_queue_is_attach_failure() {
        let err = QueueChannel::open(Path::new("/nonexistent/mac8-queue")).unwrap_err();
        assert!(matches!(err, Mac8Error::AttachFailed { .. }));
    }

    #[test]
    fn short_read_at_end_of_file_is_transfer_failure() {
        let path = scratch_file("short");
        let mut q = QueueChannel::open(&path).unwrap();
        let mut buf = [0u8; 8];
        let err = q.read_burst(0x2FFC, &mut buf).unwrap_err();
        assert!(matches!(err, Mac8Error::TransferFailed { .. }));
        let _ = fs::remove_file(path);
    }
}
