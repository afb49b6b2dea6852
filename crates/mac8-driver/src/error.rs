//! Error types for mac8 driver operations.

use mac8_chip::map::LaneWidth;
use mac8_chip::pcie::ImageIdentity;
use thiserror::Error;

/// Result type alias for mac8 operations.
pub type Result<T> = std::result::Result<T, Mac8Error>;

/// Errors that can occur while driving the accelerator.
///
/// Every variant except [`Mac8Error::Io`] maps to one fatal condition of the
/// host/accelerator protocol; all of them abort the current operation.
/// A failed *release* is not here on purpose — release is best-effort and
/// only ever logged.
#[derive(Debug, Error)]
pub enum Mac8Error {
    /// The hardware access layer could not be initialized at all.
    #[error("Hardware access unavailable: {reason}")]
    DeviceUnavailable {
        /// Reason for failure.
        reason: String,
    },

    /// Slot index out of range of the discovered slots.
    #[error("Slot {slot} out of range (have {count} slots)")]
    InvalidSlot {
        /// Requested slot.
        slot: u32,
        /// Number of known slots.
        count: usize,
    },

    /// The slot has no loaded image. Not recoverable by rescanning.
    #[error("Slot {slot} has no loaded image")]
    ImageNotReady {
        /// Slot that was checked.
        slot: u32,
    },

    /// The loaded image does not match the expected identity, even after the
    /// single permitted rescan.
    #[error("Slot {slot} carries image {found}, expected {expected} ({rescans} rescan(s))")]
    ImageIdentityMismatch {
        /// Slot that was checked.
        slot: u32,
        /// Identity the caller required.
        expected: ImageIdentity,
        /// Identity the slot reported.
        found: ImageIdentity,
        /// Rescans issued before giving up (always 1).
        rescans: u32,
    },

    /// The register/queue handle could not be acquired.
    #[error("Attach failed: {reason}")]
    AttachFailed {
        /// Reason for failure.
        reason: String,
    },

    /// A register, burst or queue read/write failed.
    #[error("Transfer failed: {reason}")]
    TransferFailed {
        /// Reason for failure.
        reason: String,
    },

    /// The completion poll expired before the accelerator signalled done.
    #[error("Operation timeout after {duration_ms}ms")]
    Timeout {
        /// Timeout duration in milliseconds.
        duration_ms: u64,
    },

    /// An operand lane value exceeds the configured lane width.
    #[error("Operand lane {lane} value {value} exceeds {width} signed range")]
    InvalidOperand {
        /// Lane index.
        lane: usize,
        /// Offending value.
        value: i32,
        /// Width the layout requires.
        width: LaneWidth,
    },

    /// I/O error during device communication.
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}

impl Mac8Error {
    /// Create a device unavailable error.
    pub fn device_unavailable(reason: impl Into<String>) -> Self {
        Self::DeviceUnavailable {
            reason: reason.into(),
        }
    }

    /// Create an attach failed error.
    pub fn attach_failed(reason: impl Into<String>) -> Self {
        Self::AttachFailed {
            reason: reason.into(),
        }
    }

    /// Create a transfer failed error.
    pub fn transfer_failed(reason: impl Into<String>) -> Self {
        Self::TransferFailed {
            reason: reason.into(),
        }
    }
}
