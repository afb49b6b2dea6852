//! Memory-mapped BAR attachment.
//!
//! A [`BarRegion`] is the attached handle for register-style access: it owns
//! an mmap of `/sys/bus/pci/devices/{addr}/resource{bar}` and exists only
//! between a successful attach and its release. Release happens exactly once
//! — on [`BarRegion::release`] or on drop — and a release failure is logged,
//! never raised.

use crate::backend::{BackendType, DataPath};
use crate::error::{Mac8Error, Result};
use rustix::mm::{mmap, munmap, MapFlags, ProtFlags};
use std::fs::{File, OpenOptions};
use std::os::unix::io::AsFd;
use std::ptr::NonNull;

/// Attached memory-mapped BAR of one physical function.
///
/// Provides bounds-checked volatile word access and byte bursts. Write-to-
/// read visibility on this path is a platform assumption (see
/// [`DataPath::flush`]).
pub struct BarRegion {
    ptr: NonNull<u8>,
    size: usize,
    _file: File,
    pcie_address: String,
    bar: u32,
}

impl std::fmt::Debug for BarRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BarRegion")
            .field("pcie_address", &self.pcie_address)
            .field("bar", &self.bar)
            .field("size", &self.size)
            .finish()
    }
}

// SAFETY: BarRegion owns the mapping exclusively; moving it between threads
// does not invalidate the mmap (process-wide) and all access goes through
// &mut self.
unsafe impl Send for BarRegion {}

impl BarRegion {
    /// Attach to `bar` of the function at `pcie_address`.
    ///
    /// # Errors
    ///
    /// Returns [`Mac8Error::AttachFailed`] if the resource file cannot be
    /// opened, reports zero size (device not enabled), or cannot be mapped.
    /// No handle exists on failure, so no release will follow.
    pub fn attach(pcie_address: &str, bar: u32) -> Result<Self> {
        let path = format!("/sys/bus/pci/devices/{pcie_address}/resource{bar}");
        tracing::debug!("attaching to {path}");

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| {
                Mac8Error::attach_failed(format!("cannot open {path}: {e}"))
            })?;

        // BAR sizes fit usize on 64-bit, our only target.
        #[allow(clippy::cast_possible_truncation)]
        let size = file
            .metadata()
            .map_err(|e| Mac8Error::attach_failed(format!("cannot stat {path}: {e}")))?
            .len() as usize;

        if size == 0 {
            return Err(Mac8Error::attach_failed(format!(
                "{path} has size 0 (device not enabled?)"
            )));
        }

        // SAFETY: fd was just opened and size is non-zero; READ|WRITE +
        // SHARED is the required mapping for device memory. rustix returns
        // Result, and the file is kept alive in the struct for the lifetime
        // of the mapping. Unmapped exactly once in Drop.
        let ptr = unsafe {
            let addr = mmap(
                std::ptr::null_mut(),
                size,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
                file.as_fd(),
                0,
            )
            .map_err(|e| Mac8Error::attach_failed(format!("mmap {path}: {e}")))?;
            NonNull::new(addr.cast::<u8>())
                .expect("rustix mmap returns non-null pointer on success")
        };

        tracing::info!(pcie_address, bar, size, "attached BAR");
        Ok(Self {
            ptr,
            size,
            _file: file,
            pcie_address: pcie_address.to_string(),
            bar,
        })
    }

    /// Release the attachment. Equivalent to dropping, but announces the
    /// release at info level for operation logs.
    pub fn release(self) {
        tracing::info!(
            pcie_address = %self.pcie_address,
            bar = self.bar,
            "releasing BAR"
        );
        // Drop unmaps.
    }

    /// Mapped size in bytes.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Validate `[offset, offset + len)` against the mapping, returning the
    /// start as usize.
    fn span(&self, offset: u64, len: usize) -> Result<usize> {
        let start = usize::try_from(offset).map_err(|_| {
            Mac8Error::transfer_failed(format!("offset {offset:#x} exceeds address width"))
        })?;
        let end = start.checked_add(len).ok_or_else(|| {
            Mac8Error::transfer_failed(format!("offset {offset:#x} + {len} overflows"))
        })?;
        if end > self.size {
            return Err(Mac8Error::transfer_failed(format!(
                "out of bounds access: offset={offset:#x} len={len} limit={:#x}",
                self.size
            )));
        }
        Ok(start)
    }
}

impl DataPath for BarRegion {
    fn write_word(&mut self, offset: u64, value: u32) -> Result<()> {
        let start = self.span(offset, 4)?;
        tracing::trace!("poke {offset:#x} = {value:#x}");
        // SAFETY: bounds validated above; BAR registers are 4-byte aligned;
        // write_volatile is required because register writes have hardware
        // side effects the compiler must not elide or reorder.
        #[allow(clippy::cast_ptr_alignment)]
        unsafe {
            self.ptr.as_ptr().add(start).cast::<u32>().write_volatile(value);
        }
        Ok(())
    }

    fn read_word(&mut self, offset: u64) -> Result<u32> {
        let start = self.span(offset, 4)?;
        // SAFETY: bounds validated above; BAR registers are 4-byte aligned;
        // read_volatile is required because the hardware can change the value
        // between reads.
        #[allow(clippy::cast_ptr_alignment)]
        let value = unsafe {
            self.ptr.as_ptr().add(start).cast::<u32>().read_volatile()
        };
        tracing::trace!("peek {offset:#x} = {value:#x}");
        Ok(value)
    }

    fn write_burst(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        let start = self.span(offset, data.len())?;
        // SAFETY: bounds validated above; src is a valid slice, dst is within
        // the mapping, and the two cannot overlap (device memory vs. host
        // buffer); u8 has alignment 1.
        unsafe {
            std::ptr::copy_nonoverlapping(
                data.as_ptr(),
                self.ptr.as_ptr().add(start),
                data.len(),
            );
        }
        Ok(())
    }

    fn read_burst(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let start = self.span(offset, buf.len())?;
        // SAFETY: bounds validated above; src is within the mapping, dst is a
        // valid slice, no overlap; u8 has alignment 1.
        unsafe {
            std::ptr::copy_nonoverlapping(
                self.ptr.as_ptr().add(start),
                buf.as_mut_ptr(),
                buf.len(),
            );
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        // No fence primitive exists on this path. A posted write is assumed
        // visible to the next read; that assumption is platform-defined.
        Ok(())
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Register
    }
}

impl Drop for BarRegion {
    fn drop(&mut self) {
        // SAFETY: ptr/size come from the successful mmap in attach() and
        // Drop runs at most once.
        unsafe {
            if let Err(e) = munmap(self.ptr.as_ptr().cast(), self.size) {
                // Best-effort: a failed release never aborts the operation.
                tracing::error!(
                    pcie_address = %self.pcie_address,
                    bar = self.bar,
                    "munmap failed during release: {e}"
                );
            }
        }
        tracing::debug!(
            pcie_address = %self.pcie_address,
            bar = self.bar,
            "detached BAR"
        );
    }
}
