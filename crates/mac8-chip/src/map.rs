//! Operand/result address maps.
//!
//! The shipped images differ only in where the operand lanes and the result
//! live (see [`crate::regs`]). An [`AddressMap`] turns each layout into a
//! configuration value the transfer code is parameterized by, so the driver
//! contains no per-layout literals.
//!
//! One quirk is modelled deliberately: in the `ddr` layout the shipped image's
//! readback path for operand B resolves to operand A's base. The map carries
//! that as a separate *readback* table — the write table stays injective, and
//! the aliasing is visible to anyone inspecting the map instead of being
//! silently corrected.

use crate::regs;

/// Number of operand lanes in vector mode.
pub const LANES: usize = 8;

/// Which operand bank an offset belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandSet {
    /// Left-hand operand vector.
    A,
    /// Right-hand operand vector.
    B,
}

/// Width of one operand lane as the hardware sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneWidth {
    /// 8-bit signed lanes (ddr layout).
    W8,
    /// 16-bit signed lanes (queue layout).
    W16,
    /// 32-bit signed lanes (registers layout).
    W32,
}

impl LaneWidth {
    /// Lane size in bytes.
    #[must_use]
    pub const fn bytes(self) -> usize {
        match self {
            Self::W8 => 1,
            Self::W16 => 2,
            Self::W32 => 4,
        }
    }

    /// Whether `value` fits the signed range of this lane width.
    #[must_use]
    pub const fn in_range(self, value: i32) -> bool {
        match self {
            Self::W8 => value >= i8::MIN as i32 && value <= i8::MAX as i32,
            Self::W16 => value >= i16::MIN as i32 && value <= i16::MAX as i32,
            Self::W32 => true,
        }
    }
}

impl std::fmt::Display for LaneWidth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::W8 => write!(f, "8-bit"),
            Self::W16 => write!(f, "16-bit"),
            Self::W32 => write!(f, "32-bit"),
        }
    }
}

/// Mapping from `(operand set, lane)` to a physical offset, plus the OUTPUT
/// offset and, where the layout has one, a STATUS offset.
///
/// Fixed at construction; the transfer code never computes offsets itself.
#[derive(Debug, Clone)]
pub struct AddressMap {
    a: [u64; LANES],
    b: [u64; LANES],
    output: u64,
    status: Option<u64>,
    /// Offsets the echo check reads B back from. Equal to `b` except in the
    /// ddr layout (see module docs). Diagnostic-only: exempt from the
    /// injectivity invariant.
    readback_b: [u64; LANES],
    lane_width: LaneWidth,
}

fn lanes_from(base: u64, stride: u64) -> [u64; LANES] {
    std::array::from_fn(|i| base + stride * i as u64)
}

impl AddressMap {
    /// Sparse register-file layout: one 32-bit word per lane in BAR0,
    /// 0x10 apart, with a status word for completion polling.
    #[must_use]
    pub fn registers() -> Self {
        let b = lanes_from(regs::registers::OPERAND_B_BASE, regs::registers::LANE_STRIDE);
        Self {
            a: lanes_from(regs::registers::OPERAND_A_BASE, regs::registers::LANE_STRIDE),
            b,
            output: regs::registers::OUTPUT,
            status: Some(regs::registers::STATUS),
            readback_b: b,
            lane_width: LaneWidth::W32,
        }
    }

    /// Compact contiguous layout for the burst/DDR image: 8-bit lanes at
    /// consecutive bytes, no status word.
    ///
    /// The shipped image's readback path for B resolves to A's base; the
    /// readback table reproduces that rather than correcting it.
    #[must_use]
    pub fn ddr() -> Self {
        let a = lanes_from(regs::ddr::OPERAND_A_BASE, 1);
        Self {
            a,
            b: lanes_from(regs::ddr::OPERAND_B_BASE, 1),
            output: regs::ddr::OUTPUT,
            status: None,
            readback_b: a,
            lane_width: LaneWidth::W8,
        }
    }

    /// Queue-file layout used by the scalar multiply image: 16-bit lanes at
    /// the fixed queue byte offsets, no status word. Scalar mode uses lane 0
    /// only; the map is total over all lanes regardless.
    #[must_use]
    pub fn queue() -> Self {
        let b = lanes_from(regs::queue::OPERAND_B, 2);
        Self {
            a: lanes_from(regs::queue::OPERAND_A, 2),
            b,
            output: regs::queue::OUTPUT,
            status: None,
            readback_b: b,
            lane_width: LaneWidth::W16,
        }
    }

    /// Offset operand `set`, lane `lane` is written to.
    ///
    /// # Panics
    ///
    /// Panics if `lane >= LANES`.
    #[must_use]
    pub fn offset(&self, set: OperandSet, lane: usize) -> u64 {
        assert!(lane < LANES, "lane {lane} out of range");
        match set {
            OperandSet::A => self.a[lane],
            OperandSet::B => self.b[lane],
        }
    }

    /// Offset the echo check reads operand `set`, lane `lane` back from.
    ///
    /// # Panics
    ///
    /// Panics if `lane >= LANES`.
    #[must_use]
    pub fn readback(&self, set: OperandSet, lane: usize) -> u64 {
        assert!(lane < LANES, "lane {lane} out of range");
        match set {
            OperandSet::A => self.a[lane],
            OperandSet::B => self.readback_b[lane],
        }
    }

    /// Offset the result is read from.
    #[must_use]
    pub const fn output(&self) -> u64 {
        self.output
    }

    /// Status-word offset, if this layout exposes one.
    #[must_use]
    pub const fn status(&self) -> Option<u64> {
        self.status
    }

    /// Lane width of this layout.
    #[must_use]
    pub const fn lane_width(&self) -> LaneWidth {
        self.lane_width
    }

    /// Base offset for a single burst covering all lanes of `set`, if the
    /// lanes are contiguous at the lane width. `None` means the layout needs
    /// per-lane word writes.
    #[must_use]
    pub fn burst_base(&self, set: OperandSet) -> Option<u64> {
        let lanes = match set {
            OperandSet::A => &self.a,
            OperandSet::B => &self.b,
        };
        let stride = self.lane_width.bytes() as u64;
        let contiguous = lanes
            .iter()
            .enumerate()
            .all(|(i, &off)| off == lanes[0] + stride * i as u64);
        contiguous.then_some(lanes[0])
    }

    /// Whether every write target (all lanes of A and B, the output, and the
    /// status word if present) occupies a distinct, non-overlapping byte
    /// range. The readback table is excluded — see the module docs.
    #[must_use]
    pub fn is_injective(&self) -> bool {
        let width = self.lane_width.bytes() as u64;
        let mut ranges: Vec<(u64, u64)> = Vec::with_capacity(2 * LANES + 2);
        ranges.extend(self.a.iter().map(|&off| (off, off + width)));
        ranges.extend(self.b.iter().map(|&off| (off, off + width)));
        ranges.push((self.output, self.output + 4));
        if let Some(status) = self.status {
            ranges.push((status, status + 4));
        }
        ranges.sort_unstable();
        ranges.windows(2).all(|w| w[0].1 <= w[1].0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_layouts_injective_over_write_domain() {
        assert!(AddressMap::registers().is_injective());
        assert!(AddressMap::ddr().is_injective());
        assert!(AddressMap::queue().is_injective());
    }

    #[test]
    fn overlapping_ranges_detected() {
        let mut map = AddressMap::ddr();
        // Collapse B onto A in the write table.
        map.b = map.a;
        assert!(!map.is_injective());
    }

    #[test]
    fn registers_layout_needs_word_writes() {
        // 0x10 stride at 4-byte lanes: not burstable.
        let map = AddressMap::registers();
        assert_eq!(map.burst_base(OperandSet::A), None);
        assert_eq!(map.burst_base(OperandSet::B), None);
        assert_eq!(map.offset(OperandSet::A, 0), 0x0500);
        assert_eq!(map.offset(OperandSet::A, 7), 0x0570);
        assert_eq!(map.offset(OperandSet::B, 3), 0x0630);
    }

    #[test]
    fn ddr_layout_bursts_both_sets() {
        let map = AddressMap::ddr();
        assert_eq!(map.burst_base(OperandSet::A), Some(0x0000));
        assert_eq!(map.burst_base(OperandSet::B), Some(0x0008));
    }

    #[test]
    fn ddr_readback_of_b_aliases_a() {
        // Shipped-image quirk, reproduced on purpose: the readback table for
        // B points at A's lanes. Anything comparing a B echo against what was
        // written to B will observe A's data instead.
        let map = AddressMap::ddr();
        for lane in 0..LANES {
            assert_eq!(map.readback(OperandSet::B, lane), map.offset(OperandSet::A, lane));
            assert_ne!(map.readback(OperandSet::B, lane), map.offset(OperandSet::B, lane));
        }
        // The write table itself is still injective.
        assert!(map.is_injective());
    }

    #[test]
    fn queue_layout_offsets() {
        let map = AddressMap::queue();
        assert_eq!(map.offset(OperandSet::A, 0), 0x0001_0000);
        assert_eq!(map.offset(OperandSet::B, 0), 0x0000_1000);
        assert_eq!(map.output(), 0x0000_2000);
        assert_eq!(map.status(), None);
        assert_eq!(map.lane_width(), LaneWidth::W16);
    }

    #[test]
    fn lane_width_ranges() {
        assert!(LaneWidth::W8.in_range(127));
        assert!(!LaneWidth::W8.in_range(128));
        assert!(LaneWidth::W8.in_range(-128));
        assert!(!LaneWidth::W8.in_range(-129));
        assert!(LaneWidth::W16.in_range(-32768));
        assert!(!LaneWidth::W16.in_range(40000));
        assert!(LaneWidth::W32.in_range(i32::MIN));
    }
}
