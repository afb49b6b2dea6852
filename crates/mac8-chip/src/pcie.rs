//! PCIe identity of the mac8 accelerator image.
//!
//! A slot that carries the shipped multiply/MAC image enumerates with the
//! vendor/device pair below on its application physical function. A slot
//! showing anything else either has no image loaded or carries a different
//! (or corrupted) one.

/// Vendor ID reported by a slot carrying the mac8 image.
pub const MAC8_VENDOR_ID: u16 = 0x1D0F;

/// Device ID of the shipped multiply/MAC image.
pub const MAC8_DEVICE_ID: u16 = 0xF000;

/// Application physical function — operand/result address space.
pub const APP_PF: u32 = 0;

/// Management physical function — describe/rescan plumbing.
pub const MGMT_PF: u32 = 1;

/// Default BAR exposing the operand register file on the application PF.
pub const APP_BAR: u32 = 0;

/// A (vendor, device) identity pair as reported for one physical function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageIdentity {
    /// PCI vendor ID.
    pub vendor_id: u16,
    /// PCI device ID.
    pub device_id: u16,
}

impl ImageIdentity {
    /// Identity of the shipped mac8 image.
    #[must_use]
    pub const fn shipped() -> Self {
        Self {
            vendor_id: MAC8_VENDOR_ID,
            device_id: MAC8_DEVICE_ID,
        }
    }
}

impl std::fmt::Display for ImageIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor_id, self.device_id)
    }
}

/// Format a `vendor:device` string for use with `lspci -d`.
#[must_use]
pub fn lspci_filter() -> String {
    format!("{MAC8_VENDOR_ID:04x}:{MAC8_DEVICE_ID:04x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shipped_identity_matches_constants() {
        let id = ImageIdentity::shipped();
        assert_eq!(id.vendor_id, 0x1D0F);
        assert_eq!(id.device_id, 0xF000);
        assert_eq!(id.to_string(), "1d0f:f000");
    }

    #[test]
    fn lspci_filter_format() {
        assert_eq!(lspci_filter(), "1d0f:f000");
    }
}
