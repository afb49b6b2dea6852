//! Accelerator image readiness verification.
//!
//! Before touching a slot's address space the host confirms the slot carries
//! the image it expects, identified by its PCIe (vendor, device) pair on the
//! target physical function. One implementation serves every deployment
//! variant: the describe/rescan plumbing is injected through [`SlotMgmt`] and
//! the expected identity is a parameter.
//!
//! On an identity mismatch the verifier issues exactly one rescan of the
//! physical function and re-checks. The retry budget is hard-capped at one:
//! a second mismatch is a fatal [`Mac8Error::ImageIdentityMismatch`], and a
//! slot with no loaded image fails immediately without any rescan — a load
//! failure is not something re-enumeration can repair.

use crate::error::{Mac8Error, Result};
use mac8_chip::pcie::ImageIdentity;

/// Load state of a slot, as reported by a describe query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStatus {
    /// An image is loaded and its functions are enumerable.
    Loaded,
    /// No image (cleared, load in progress, or load failed).
    NotLoaded,
}

/// Snapshot of a slot: load state plus the identity reported by each
/// physical function. Immutable; re-fetched on every check.
#[derive(Debug, Clone)]
pub struct ImageDescriptor {
    /// Load state of the slot.
    pub status: SlotStatus,
    /// Per-physical-function identities, indexed by PF number.
    pub pfs: Vec<ImageIdentity>,
}

/// Describe/rescan capability of the management plane.
///
/// Describe queries are idempotent and side-effect free; a rescan
/// re-enumerates one physical function's address mapping.
pub trait SlotMgmt {
    /// Query the current [`ImageDescriptor`] for `slot`.
    ///
    /// # Errors
    ///
    /// Returns an error if the management plane cannot be reached.
    fn describe(&mut self, slot: u32) -> Result<ImageDescriptor>;

    /// Request re-enumeration of `pf` on `slot`.
    ///
    /// # Errors
    ///
    /// Returns an error if the rescan request cannot be issued.
    fn rescan(&mut self, slot: u32, pf: u32) -> Result<()>;
}

/// Outcome of a successful verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    /// Rescans issued before the identity matched (0 or 1).
    pub rescans: u32,
}

fn pf_identity(desc: &ImageDescriptor, slot: u32, pf: u32) -> Result<ImageIdentity> {
    desc.pfs.get(pf as usize).copied().ok_or_else(|| {
        Mac8Error::device_unavailable(format!(
            "slot {slot} reports no physical function {pf}"
        ))
    })
}

/// Verify that `slot` carries the image identified by `expected` on
/// physical function `pf`.
///
/// # Errors
///
/// - [`Mac8Error::ImageNotReady`] if the slot has no loaded image
///   (no rescan is attempted).
/// - [`Mac8Error::ImageIdentityMismatch`] if the identity still differs
///   after the single permitted rescan.
/// - Any describe/rescan failure from the management plane.
pub fn verify_image(
    mgmt: &mut dyn SlotMgmt,
    slot: u32,
    pf: u32,
    expected: ImageIdentity,
) -> Result<Readiness> {
    let desc = mgmt.describe(slot)?;

    if desc.status != SlotStatus::Loaded {
        tracing::error!(slot, "no image loaded");
        return Err(Mac8Error::ImageNotReady { slot });
    }

    let found = pf_identity(&desc, slot, pf)?;
    if found == expected {
        tracing::debug!(slot, pf, %expected, "image identity matched");
        return Ok(Readiness { rescans: 0 });
    }

    tracing::warn!(slot, pf, %expected, %found, "image identity mismatch, rescanning");
    mgmt.rescan(slot, pf)?;

    let desc = mgmt.describe(slot)?;
    let found = pf_identity(&desc, slot, pf)?;
    if found == expected {
        tracing::info!(slot, pf, %expected, "image identity matched after rescan");
        return Ok(Readiness { rescans: 1 });
    }

    tracing::error!(slot, pf, %expected, %found, "image identity mismatch after rescan");
    Err(Mac8Error::ImageIdentityMismatch {
        slot,
        expected,
        found,
        rescans: 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Management mock that replays a fixed sequence of descriptors and
    /// counts rescan requests.
    struct ScriptedMgmt {
        descriptors: VecDeque<ImageDescriptor>,
        rescans: u32,
    }

    impl ScriptedMgmt {
        fn new(descriptors: Vec<ImageDescriptor>) -> Self {
            Self {
                descriptors: descriptors.into(),
                rescans: 0,
            }
        }
    }

    impl SlotMgmt for ScriptedMgmt {
        fn describe(&mut self, _slot: u32) -> Result<ImageDescriptor> {
            self.descriptors
                .pop_front()
                .ok_or_else(|| Mac8Error::device_unavailable("script exhausted"))
        }

        fn rescan(&mut self, _slot: u32, _pf: u32) -> Result<()> {
            self.rescans += 1;
            Ok(())
        }
    }

    fn loaded(pf0: ImageIdentity) -> ImageDescriptor {
        ImageDescriptor {
            status: SlotStatus::Loaded,
            pfs: vec![pf0],
        }
    }

    const EXPECTED: ImageIdentity = ImageIdentity {
        vendor_id: 0x1D0F,
        device_id: 0xF000,
    };
    const WRONG: ImageIdentity = ImageIdentity {
        vendor_id: 0x1D0F,
        device_id: 0x1042,
    };

    #[test]
    fn match_on_first_query_no_rescan() {
        let mut mgmt = ScriptedMgmt::new(vec![loaded(EXPECTED)]);
        let readiness = verify_image(&mut mgmt, 0, 0, EXPECTED).unwrap();
        assert_eq!(readiness.rescans, 0);
        assert_eq!(mgmt.rescans, 0);
    }

    #[test]
    fn mismatch_then_match_after_one_rescan() {
        let mut mgmt = ScriptedMgmt::new(vec![loaded(WRONG), loaded(EXPECTED)]);
        let readiness = verify_image(&mut mgmt, 0, 0, EXPECTED).unwrap();
        assert_eq!(readiness.rescans, 1);
        assert_eq!(mgmt.rescans, 1);
    }

    #[test]
    fn double_mismatch_is_fatal_with_single_rescan() {
        let mut mgmt = ScriptedMgmt::new(vec![loaded(WRONG), loaded(WRONG)]);
        let err = verify_image(&mut mgmt, 2, 0, EXPECTED).unwrap_err();
        match err {
            Mac8Error::ImageIdentityMismatch {
                slot,
                expected,
                found,
                rescans,
            } => {
                assert_eq!(slot, 2);
                assert_eq!(expected, EXPECTED);
                assert_eq!(found, WRONG);
                assert_eq!(rescans, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
        // Never more than one rescan, whatever the outcome.
        assert_eq!(mgmt.rescans, 1);
    }

    #[test]
    fn not_loaded_fails_immediately_without_rescan() {
        let mut mgmt = ScriptedMgmt::new(vec![ImageDescriptor {
            status: SlotStatus::NotLoaded,
            pfs: Vec::new(),
        }]);
        let err = verify_image(&mut mgmt, 1, 0, EXPECTED).unwrap_err();
        assert!(matches!(err, Mac8Error::ImageNotReady { slot: 1 }));
        assert_eq!(mgmt.rescans, 0);
    }

    #[test]
    fn missing_physical_function_is_unavailable() {
        let mut mgmt = ScriptedMgmt::new(vec![loaded(EXPECTED)]);
        let err = verify_image(&mut mgmt, 0, 3, EXPECTED).unwrap_err();
        assert!(matches!(err, Mac8Error::DeviceUnavailable { .. }));
    }
}
