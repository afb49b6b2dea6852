//! Data-path backend implementations.
//!
//! - **Bar**: mmap of a PCIe resource file, volatile register access.
//! - **Queue**: `pread`/`pwrite` on a queue device file, `fsync` as the
//!   ordering barrier.

pub mod bar;
pub mod queue;

pub use bar::BarRegion;
pub use queue::QueueChannel;
