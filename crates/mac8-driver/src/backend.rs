//! Transfer backend abstraction.
//!
//! Two data paths reach the accelerator's address space: memory-mapped
//! register access to an attached BAR, and offset-addressed I/O on a queue
//! device file. [`DataPath`] is the seam between them and the transfer
//! orchestration — the orchestration never knows which one it is driving.

use crate::error::Result;
use std::fmt::Debug;

/// Word, burst and ordering operations against the accelerator's address
/// space.
///
/// All operations are synchronous and block until the underlying I/O
/// completes or fails. No operation retries internally; failures surface to
/// the caller unchanged.
pub trait DataPath: Debug + Send {
    /// Write one 32-bit word at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying register/queue write fails.
    fn write_word(&mut self, offset: u64, value: u32) -> Result<()>;

    /// Read one 32-bit word at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying register/queue read fails.
    fn read_word(&mut self, offset: u64) -> Result<u32>;

    /// Write `data.len()` bytes starting at `offset` in one block transfer.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying transfer fails.
    fn write_burst(&mut self, offset: u64, data: &[u8]) -> Result<()>;

    /// Read `buf.len()` bytes starting at `offset` in one block transfer.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying transfer fails.
    fn read_burst(&mut self, offset: u64, buf: &mut [u8]) -> Result<()>;

    /// Ordering barrier: after this returns, every preceding write is
    /// visible to subsequent reads through the consuming logic.
    ///
    /// On the queue backend this is mandatory between a write sequence and a
    /// dependent read — a read issued before the flush must not be relied
    /// upon to observe the write. On the register backend this is a no-op:
    /// write-to-read visibility there is a platform assumption, not a
    /// guarantee this layer can provide.
    ///
    /// # Errors
    ///
    /// Returns an error if the barrier cannot be issued.
    fn flush(&mut self) -> Result<()>;

    /// Which backend this is, for logging.
    fn backend_type(&self) -> BackendType;
}

/// Backend identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// Memory-mapped BAR register access.
    Register,
    /// Offset-addressed queue device file.
    Queue,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Register => write!(f, "register"),
            Self::Queue => write!(f, "queue"),
        }
    }
}
