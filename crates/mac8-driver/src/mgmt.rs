//! Sysfs-backed slot management.
//!
//! Implements [`SlotMgmt`] on top of the Linux PCI sysfs tree: describe reads
//! each physical function's `vendor`/`device` files, rescan removes the
//! function and re-enumerates the bus. Slots are indices into a sorted list
//! of PCIe base addresses, discovered at construction or supplied directly.

use crate::error::{Mac8Error, Result};
use crate::image::{ImageDescriptor, SlotMgmt, SlotStatus};
use mac8_chip::pcie::{ImageIdentity, MAC8_VENDOR_ID};
use std::path::{Path, PathBuf};

/// Functions scanned per slot before giving up.
const MAX_PFS: u32 = 8;

/// Slot management over `/sys/bus/pci`.
#[derive(Debug)]
pub struct SysfsMgmt {
    pci_root: PathBuf,
    /// Per-slot PCIe base address without the function suffix
    /// (e.g. `0000:1d:00`).
    slots: Vec<String>,
}

impl SysfsMgmt {
    /// Discover slots by scanning for functions with the mac8 vendor ID.
    ///
    /// Addresses are sorted so slot numbering is stable across runs.
    ///
    /// # Errors
    ///
    /// Returns an error if the PCI sysfs tree cannot be read or no matching
    /// function exists.
    pub fn discover() -> Result<Self> {
        Self::discover_at(Path::new("/sys/bus/pci"))
    }

    /// Discovery against an alternate sysfs root.
    ///
    /// # Errors
    ///
    /// See [`SysfsMgmt::discover`].
    pub fn discover_at(pci_root: &Path) -> Result<Self> {
        let devices = pci_root.join("devices");
        let entries = std::fs::read_dir(&devices).map_err(|e| {
            Mac8Error::device_unavailable(format!(
                "cannot read {}: {e}",
                devices.display()
            ))
        })?;

        let mut bases = Vec::new();
        for entry in entries.flatten() {
            let addr = entry.file_name().to_string_lossy().to_string();
            let Ok(vendor) = read_hex_sysfs(&entry.path().join("vendor")) else {
                continue;
            };
            if vendor != MAC8_VENDOR_ID {
                continue;
            }
            if let Some((base, _fn)) = addr.rsplit_once('.') {
                let base = base.to_string();
                if !bases.contains(&base) {
                    bases.push(base);
                }
            }
        }
        bases.sort();

        if bases.is_empty() {
            return Err(Mac8Error::device_unavailable(format!(
                "no PCIe function with vendor {MAC8_VENDOR_ID:#06x} under {}",
                devices.display()
            )));
        }

        tracing::info!(slots = bases.len(), "discovered accelerator slot(s)");
        Ok(Self {
            pci_root: pci_root.to_path_buf(),
            slots: bases,
        })
    }

    /// Construct with fixed slot base addresses (no discovery).
    #[must_use]
    pub fn with_slots(slots: Vec<String>) -> Self {
        Self {
            pci_root: PathBuf::from("/sys/bus/pci"),
            slots,
        }
    }

    /// Construct with fixed slots against an alternate sysfs root.
    #[must_use]
    pub fn with_slots_at(pci_root: PathBuf, slots: Vec<String>) -> Self {
        Self { pci_root, slots }
    }

    /// Number of known slots.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Full PCIe address of `pf` on `slot` (e.g. `0000:1d:00.0`).
    ///
    /// # Errors
    ///
    /// Returns [`Mac8Error::InvalidSlot`] if the slot index is out of range.
    pub fn pf_address(&self, slot: u32, pf: u32) -> Result<String> {
        let base = self
            .slots
            .get(slot as usize)
            .ok_or(Mac8Error::InvalidSlot {
                slot,
                count: self.slots.len(),
            })?;
        Ok(format!("{base}.{pf}"))
    }

    fn device_dir(&self, slot: u32, pf: u32) -> Result<PathBuf> {
        Ok(self
            .pci_root
            .join("devices")
            .join(self.pf_address(slot, pf)?))
    }
}

impl SlotMgmt for SysfsMgmt {
    fn describe(&mut self, slot: u32) -> Result<ImageDescriptor> {
        let mut pfs = Vec::new();

        for pf in 0..MAX_PFS {
            let dir = self.device_dir(slot, pf)?;
            if !dir.exists() {
                break;
            }
            let vendor_id = read_hex_sysfs(&dir.join("vendor"))?;
            let device_id = read_hex_sysfs(&dir.join("device"))?;
            pfs.push(ImageIdentity {
                vendor_id,
                device_id,
            });
        }

        let status = if pfs.is_empty() {
            SlotStatus::NotLoaded
        } else {
            SlotStatus::Loaded
        };

        tracing::debug!(slot, ?status, pfs = pfs.len(), "described slot");
        Ok(ImageDescriptor { status, pfs })
    }

    fn rescan(&mut self, slot: u32, pf: u32) -> Result<()> {
        let dir = self.device_dir(slot, pf)?;
        tracing::info!(slot, pf, "removing function and rescanning bus");

        std::fs::write(dir.join("remove"), "1").map_err(|e| {
            Mac8Error::device_unavailable(format!(
                "cannot remove {}: {e}",
                dir.display()
            ))
        })?;

        let rescan = self.pci_root.join("rescan");
        std::fs::write(&rescan, "1").map_err(|e| {
            Mac8Error::device_unavailable(format!(
                "cannot rescan via {}: {e}",
                rescan.display()
            ))
        })?;

        Ok(())
    }
}

/// Read a hexadecimal value from a sysfs attribute file.
fn read_hex_sysfs(path: &Path) -> Result<u16> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Mac8Error::device_unavailable(format!("cannot read {}: {e}", path.display()))
    })?;

    let trimmed = content.trim().trim_start_matches("0x");
    u16::from_str_radix(trimmed, 16).map_err(|e| {
        Mac8Error::device_unavailable(format!(
            "invalid hex in {}: {e}",
            path.display()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn scratch_root(tag: &str) -> PathBuf {
        let root = std::env::temp_dir().join(format!(
            "mac8-mgmt-{tag}-{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(root.join("devices")).unwrap();
        root
    }

    fn fake_function(root: &Path, addr: &str, vendor: u16, device: u16) {
        let dir = root.join("devices").join(addr);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("vendor"), format!("0x{vendor:04x}\n")).unwrap();
        fs::write(dir.join("device"), format!("0x{device:04x}\n")).unwrap();
    }

    #[test]
    fn describe_reads_per_function_identity() {
        let root = scratch_root("describe");
        fake_function(&root, "0000:1d:00.0", 0x1D0F, 0xF000);
        fake_function(&root, "0000:1d:00.1", 0x1D0F, 0x1041);

        let mut mgmt =
            SysfsMgmt::with_slots_at(root.clone(), vec!["0000:1d:00".into()]);
        let desc = mgmt.describe(0).unwrap();

        assert_eq!(desc.status, SlotStatus::Loaded);
        assert_eq!(desc.pfs.len(), 2);
        assert_eq!(desc.pfs[0].device_id, 0xF000);
        assert_eq!(desc.pfs[1].device_id, 0x1041);

        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn describe_empty_slot_is_not_loaded() {
        let root = scratch_root("empty");
        let mut mgmt =
            SysfsMgmt::with_slots_at(root.clone(), vec!["0000:1d:00".into()]);
        let desc = mgmt.describe(0).unwrap();
        assert_eq!(desc.status, SlotStatus::NotLoaded);
        assert!(desc.pfs.is_empty());
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn rescan_writes_remove_then_bus_rescan() {
        let root = scratch_root("rescan");
        fake_function(&root, "0000:1d:00.0", 0x1D0F, 0x1041);

        let mut mgmt =
            SysfsMgmt::with_slots_at(root.clone(), vec!["0000:1d:00".into()]);
        mgmt.rescan(0, 0).unwrap();

        let removed =
            fs::read_to_string(root.join("devices/0000:1d:00.0/remove")).unwrap();
        assert_eq!(removed, "1");
        assert_eq!(fs::read_to_string(root.join("rescan")).unwrap(), "1");

        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn discover_sorts_and_dedupes_bases() {
        let root = scratch_root("discover");
        fake_function(&root, "0000:1e:00.0", 0x1D0F, 0xF000);
        fake_function(&root, "0000:1d:00.0", 0x1D0F, 0xF000);
        fake_function(&root, "0000:1d:00.1", 0x1D0F, 0x1041);
        // Unrelated vendor is skipped.
        fake_function(&root, "0000:00:1f.0", 0x8086, 0x1234);

        let mgmt = SysfsMgmt::discover_at(&root).unwrap();
        assert_eq!(mgmt.slot_count(), 2);
        assert_eq!(mgmt.pf_address(0, 0).unwrap(), "0000:1d:00.0");
        assert_eq!(mgmt.pf_address(1, 0).unwrap(), "0000:1e:00.0");

        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn pf_address_out_of_range() {
        let mgmt = SysfsMgmt::with_slots(vec!["0000:1d:00".into()]);
        assert!(matches!(
            mgmt.pf_address(5, 0),
            Err(Mac8Error::InvalidSlot { slot: 5, count: 1 })
        ));
    }
}
