//! Host driver for the mac8 FPGA multiply/MAC accelerator.
//!
//! The accelerator is a PCIe-attached FPGA image that multiplies two
//! operands or computes an 8-lane integer dot product. This crate drives
//! one operation end to end:
//!
//! 1. **Verify** the slot carries the expected image (bounded to a single
//!    rescan on identity mismatch).
//! 2. **Attach** a register (mmap'd BAR) or queue (device file) channel.
//! 3. **Transfer** operands through the configured address map, wait for
//!    completion, read the result.
//! 4. **Release** the channel — exactly once, on every path.
//!
//! # Quick start
//!
//! ```no_run
//! use mac8_driver::{run_registers, Request, SlotTarget, SysfsMgmt, TransferConfig};
//!
//! # fn main() -> mac8_driver::Result<()> {
//! let mut mgmt = SysfsMgmt::discover()?;
//! let outcome = run_registers(
//!     &mut mgmt,
//!     &SlotTarget::new(0),
//!     &TransferConfig::registers(),
//!     &Request::Vector8 {
//!         a: [1, 2, 3, 4, 5, 6, 7, 8],
//!         b: [8, 7, 6, 5, 4, 3, 2, 1],
//!     },
//! )?;
//! println!("expected {} read {}", outcome.expected, outcome.actual);
//! # Ok(())
//! # }
//! ```
//!
//! Execution is single-threaded and synchronous throughout; a channel is
//! owned by one operation and never shared.

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

mod backend;
pub mod backends;
mod compute;
mod error;
mod image;
mod mgmt;
mod session;

/// Hardware identity constants (re-exported from mac8-chip).
pub mod pcie_ids {
    pub use mac8_chip::pcie::{
        lspci_filter, ImageIdentity, APP_BAR, APP_PF, MAC8_DEVICE_ID, MAC8_VENDOR_ID, MGMT_PF,
    };
}

pub use backend::{BackendType, DataPath};
pub use backends::{BarRegion, QueueChannel};
pub use compute::{
    compute, expected_dot, expected_product, Completion, Outcome, Request, TransferConfig,
};
pub use error::{Mac8Error, Result};
pub use image::{verify_image, ImageDescriptor, Readiness, SlotMgmt, SlotStatus};
pub use mgmt::SysfsMgmt;
pub use session::{run_queue, run_registers, run_with, SlotTarget};

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        compute, run_queue, run_registers, verify_image, Completion, DataPath, Mac8Error,
        Outcome, Request, Result, SlotMgmt, SlotTarget, SysfsMgmt, TransferConfig,
    };
}
