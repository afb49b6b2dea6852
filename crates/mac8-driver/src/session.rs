//! One-shot operation pipeline.
//!
//! Ties the components together in the order the protocol requires:
//! verify the image, attach, transfer operands and retrieve the result,
//! release. The handle is created only after verification succeeds and is
//! released exactly once on every path out of the transfer — success or
//! failure — by construction (the channel is dropped when this scope ends).
//! A failed attach never produces a handle, so nothing is released.

use crate::backend::DataPath;
use crate::backends::{BarRegion, QueueChannel};
use crate::compute::{compute, Outcome, Request, TransferConfig};
use crate::error::Result;
use crate::image::{verify_image, SlotMgmt};
use crate::mgmt::SysfsMgmt;
use mac8_chip::pcie::{ImageIdentity, APP_BAR, APP_PF};
use std::path::Path;

/// Which slot to drive and what image it must carry.
#[derive(Debug, Clone, Copy)]
pub struct SlotTarget {
    /// Slot index.
    pub slot: u32,
    /// Physical function carrying the operand address space.
    pub pf: u32,
    /// BAR exposing the operand registers (register backend only).
    pub bar: u32,
    /// Required image identity.
    pub expected: ImageIdentity,
}

impl SlotTarget {
    /// Target `slot` with the shipped image on the default application
    /// PF/BAR.
    #[must_use]
    pub const fn new(slot: u32) -> Self {
        Self {
            slot,
            pf: APP_PF,
            bar: APP_BAR,
            expected: ImageIdentity::shipped(),
        }
    }
}

/// Run one operation with an injected attach step.
///
/// The generic seams exist so the verify → attach → compute → release
/// ordering is testable without hardware: any [`SlotMgmt`] and any
/// channel-producing closure will do.
///
/// # Errors
///
/// Propagates the first fatal error from verification, attachment or the
/// transfer. An already-acquired channel is released (dropped) before the
/// error is returned.
pub fn run_with<C, A>(
    mgmt: &mut dyn SlotMgmt,
    target: &SlotTarget,
    attach: A,
    cfg: &TransferConfig,
    req: &Request,
) -> Result<Outcome>
where
    C: DataPath,
    A: FnOnce() -> Result<C>,
{
    let readiness = verify_image(mgmt, target.slot, target.pf, target.expected)?;
    tracing::info!(
        slot = target.slot,
        rescans = readiness.rescans,
        "image verified"
    );

    let mut chan = attach()?;
    tracing::debug!(backend = %chan.backend_type(), "attached");

    // The channel drops — and therefore releases — whether or not this
    // returns an error.
    compute(&mut chan, cfg, req)
}

/// Run one operation over the register backend: sysfs-managed slot, mmap'd
/// BAR.
///
/// # Errors
///
/// See [`run_with`].
pub fn run_registers(
    mgmt: &mut SysfsMgmt,
    target: &SlotTarget,
    cfg: &TransferConfig,
    req: &Request,
) -> Result<Outcome> {
    let addr = mgmt.pf_address(target.slot, target.pf)?;
    let bar = target.bar;
    run_with(mgmt, target, move || BarRegion::attach(&addr, bar), cfg, req)
}

/// Run one operation over the queue backend.
///
/// # Errors
///
/// See [`run_with`].
pub fn run_queue(
    mgmt: &mut dyn SlotMgmt,
    target: &SlotTarget,
    queue: &Path,
    cfg: &TransferConfig,
    req: &Request,
) -> Result<Outcome> {
    run_with(mgmt, target, || QueueChannel::open(queue), cfg, req)
}
