//! Raw offsets for the three shipped accelerator layouts.
//!
//! Three images of the same arithmetic core exist, differing only in how the
//! host reaches the operand slots:
//!
//! ```text
//! Layout     Access          Operand A        Operand B        Output
//! ────────── ─────────────── ──────────────── ──────────────── ──────────
//! registers  BAR0 peek/poke  0x0500 + 0x10·i  0x0600 + 0x10·i  0x0700
//! ddr        BAR burst       0x0000 + i       0x0008 + i       0x0040
//! queue      queue file      0x0001_0000      0x0000_1000      0x0000_2000
//! ```
//!
//! Only the `registers` layout exposes a status word; the other two have no
//! completion signal the host can observe.

/// Register-file layout: sparse per-lane words in BAR0.
pub mod registers {
    /// First lane of operand A.
    pub const OPERAND_A_BASE: u64 = 0x0500;
    /// First lane of operand B.
    pub const OPERAND_B_BASE: u64 = 0x0600;
    /// Byte stride between consecutive lanes.
    pub const LANE_STRIDE: u64 = 0x10;
    /// Accumulated dot-product result.
    pub const OUTPUT: u64 = 0x0700;
    /// Completion/status word.
    pub const STATUS: u64 = 0x0704;
}

/// Burst layout: contiguous byte lanes in a DDR-backed window.
pub mod ddr {
    /// Operand A base (lanes are consecutive bytes).
    pub const OPERAND_A_BASE: u64 = 0x0000;
    /// Operand B base.
    pub const OPERAND_B_BASE: u64 = 0x0008;
    /// Result word.
    pub const OUTPUT: u64 = 0x0040;
}

/// Queue layout: byte offsets within the queue device file.
pub mod queue {
    /// Operand A.
    pub const OPERAND_A: u64 = 0x0001_0000;
    /// Operand B.
    pub const OPERAND_B: u64 = 0x0000_1000;
    /// Result word.
    pub const OUTPUT: u64 = 0x0000_2000;
}

/// Status register bit definitions (registers layout only).
pub mod status {
    /// Set by the accelerator when the result at OUTPUT is valid.
    pub const DONE: u32 = 1 << 0;
    /// Set on an internal arithmetic-core fault.
    pub const ERROR: u32 = 1 << 31;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_bits_distinct() {
        assert_ne!(status::DONE, status::ERROR);
        assert_ne!(status::DONE & status::ERROR, status::DONE);
    }

    #[test]
    fn register_banks_do_not_overlap() {
        // 8 lanes at 0x10 stride: A occupies 0x500..0x580, B 0x600..0x680.
        assert!(registers::OPERAND_A_BASE + 8 * registers::LANE_STRIDE <= registers::OPERAND_B_BASE);
        assert!(registers::OPERAND_B_BASE + 8 * registers::LANE_STRIDE <= registers::OUTPUT);
    }
}
