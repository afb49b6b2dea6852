//! Operand transfer and result retrieval.
//!
//! Orchestrates one accelerator operation over any [`DataPath`]: write the
//! operands through the configured [`AddressMap`], flush, optionally echo the
//! lanes back to self-verify the transfer, wait for completion, read OUTPUT.
//!
//! The host also computes the expected product (scalar) or dot product
//! (vector) in ordinary wrapping signed arithmetic. That value is diagnostic
//! only — it is reported next to the hardware result and never gates the
//! outcome of the operation.

use crate::backend::DataPath;
use crate::error::{Mac8Error, Result};
use mac8_chip::map::{AddressMap, LaneWidth, OperandSet, LANES};
use mac8_chip::regs::status;
use std::time::{Duration, Instant};

/// One accelerator operation: operands plus the mode that selects between
/// the scalar multiplier and the 8-lane fused multiply-add.
#[derive(Debug, Clone, Copy)]
pub enum Request {
    /// Scalar multiply of two operands.
    Scalar {
        /// Left operand.
        a: i32,
        /// Right operand.
        b: i32,
    },
    /// 8-lane fused multiply-add (dot product) of two operand vectors.
    Vector8 {
        /// Left operand vector.
        a: [i32; LANES],
        /// Right operand vector.
        b: [i32; LANES],
    },
}

/// How the host decides the accelerator has finished before reading OUTPUT.
#[derive(Debug, Clone, Copy)]
pub enum Completion {
    /// Poll the layout's status word until `mask` is set, with a bounded
    /// deadline. Fails with [`Mac8Error::Timeout`] on expiry.
    PollStatus {
        /// Status bit(s) indicating completion.
        mask: u32,
        /// Poll deadline.
        timeout: Duration,
    },
    /// Sleep a fixed interval before reading. Matches one deployed variant;
    /// the interval is a guess, not a guarantee.
    FixedDelay(Duration),
    /// Read immediately. Assumes synchronous, single-cycle-visible
    /// completion — an assumption the interface does not guarantee.
    Immediate,
}

/// Per-deployment transfer configuration.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Operand/result address map.
    pub map: AddressMap,
    /// Read each written lane back and fail on disagreement.
    pub echo_check: bool,
    /// Completion strategy applied before the OUTPUT read.
    pub completion: Completion,
}

impl TransferConfig {
    /// Register-file layout with a bounded status poll.
    #[must_use]
    pub fn registers() -> Self {
        Self {
            map: AddressMap::registers(),
            echo_check: false,
            completion: Completion::PollStatus {
                mask: status::DONE,
                timeout: Duration::from_secs(1),
            },
        }
    }

    /// Burst/DDR layout. No status word exists, so completion falls back to
    /// the fixed settle interval that variant shipped with.
    #[must_use]
    pub fn ddr() -> Self {
        Self {
            map: AddressMap::ddr(),
            echo_check: false,
            completion: Completion::FixedDelay(Duration::from_millis(100)),
        }
    }

    /// Queue layout. The flush is the only barrier; the result is read
    /// immediately after it.
    #[must_use]
    pub fn queue() -> Self {
        Self {
            map: AddressMap::queue(),
            echo_check: false,
            completion: Completion::Immediate,
        }
    }
}

/// Result of one completed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    /// Value read from OUTPUT.
    pub actual: u32,
    /// Host-computed expected value (diagnostic only).
    pub expected: i32,
}

impl Outcome {
    /// Whether the hardware result agrees with the host computation,
    /// comparing the raw 32-bit patterns.
    #[must_use]
    #[allow(clippy::cast_sign_loss)]
    pub const fn matches(&self) -> bool {
        self.actual == self.expected as u32
    }
}

/// Expected dot product in wrapping signed arithmetic.
#[must_use]
pub fn expected_dot(a: &[i32; LANES], b: &[i32; LANES]) -> i32 {
    a.iter()
        .zip(b.iter())
        .fold(0i32, |acc, (&x, &y)| acc.wrapping_add(x.wrapping_mul(y)))
}

/// Expected scalar product in wrapping signed arithmetic.
#[must_use]
pub fn expected_product(a: i32, b: i32) -> i32 {
    a.wrapping_mul(b)
}

/// Run one operation to completion.
///
/// # Errors
///
/// - [`Mac8Error::InvalidOperand`] if a lane exceeds the layout's width.
/// - [`Mac8Error::TransferFailed`] on any failed write/read, a failed echo
///   check, or an accelerator fault reported through the status word.
/// - [`Mac8Error::Timeout`] if the completion poll expires.
pub fn compute(
    chan: &mut dyn DataPath,
    cfg: &TransferConfig,
    req: &Request,
) -> Result<Outcome> {
    let width = cfg.map.lane_width();

    match *req {
        Request::Scalar { a, b } => {
            check_lane(width, 0, a)?;
            check_lane(width, 0, b)?;
            tracing::info!(a, b, backend = %chan.backend_type(), "scalar multiply");

            write_lane(chan, cfg.map.offset(OperandSet::A, 0), width, a)?;
            write_lane(chan, cfg.map.offset(OperandSet::B, 0), width, b)?;
            chan.flush()?;
            wait_complete(chan, cfg)?;

            let actual = chan.read_word(cfg.map.output())?;
            Ok(Outcome {
                actual,
                expected: expected_product(a, b),
            })
        }

        Request::Vector8 { a, b } => {
            for lane in 0..LANES {
                check_lane(width, lane, a[lane])?;
                check_lane(width, lane, b[lane])?;
            }
            tracing::info!(backend = %chan.backend_type(), "vector8 multiply-add");

            write_set(chan, &cfg.map, OperandSet::A, &a)?;
            write_set(chan, &cfg.map, OperandSet::B, &b)?;
            chan.flush()?;

            if cfg.echo_check {
                echo_set(chan, &cfg.map, OperandSet::A, &a)?;
                echo_set(chan, &cfg.map, OperandSet::B, &b)?;
            }

            wait_complete(chan, cfg)?;

            let actual = chan.read_word(cfg.map.output())?;
            Ok(Outcome {
                actual,
                expected: expected_dot(&a, &b),
            })
        }
    }
}

fn check_lane(width: LaneWidth, lane: usize, value: i32) -> Result<()> {
    if width.in_range(value) {
        Ok(())
    } else {
        Err(Mac8Error::InvalidOperand { lane, value, width })
    }
}

/// Encode one lane at the layout's width, little-endian.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn encode_lane(width: LaneWidth, value: i32, out: &mut Vec<u8>) {
    match width {
        LaneWidth::W8 => out.push(value as i8 as u8),
        LaneWidth::W16 => out.extend_from_slice(&(value as i16).to_le_bytes()),
        LaneWidth::W32 => out.extend_from_slice(&(value as u32).to_le_bytes()),
    }
}

#[allow(clippy::cast_sign_loss)]
fn write_lane(
    chan: &mut dyn DataPath,
    offset: u64,
    width: LaneWidth,
    value: i32,
) -> Result<()> {
    match width {
        LaneWidth::W32 => chan.write_word(offset, value as u32),
        _ => {
            let mut bytes = Vec::with_capacity(width.bytes());
            encode_lane(width, value, &mut bytes);
            chan.write_burst(offset, &bytes)
        }
    }
}

#[allow(clippy::cast_possible_wrap)]
fn read_lane(chan: &mut dyn DataPath, offset: u64, width: LaneWidth) -> Result<i32> {
    match width {
        LaneWidth::W8 => {
            let mut buf = [0u8; 1];
            chan.read_burst(offset, &mut buf)?;
            Ok(i32::from(buf[0] as i8))
        }
        LaneWidth::W16 => {
            let mut buf = [0u8; 2];
            chan.read_burst(offset, &mut buf)?;
            Ok(i32::from(i16::from_le_bytes(buf)))
        }
        LaneWidth::W32 => Ok(chan.read_word(offset)? as i32),
    }
}

/// Write all 8 lanes of one operand set: a single burst where the layout is
/// contiguous at the lane width, per-lane writes otherwise.
#[allow(clippy::cast_sign_loss)]
fn write_set(
    chan: &mut dyn DataPath,
    map: &AddressMap,
    set: OperandSet,
    lanes: &[i32; LANES],
) -> Result<()> {
    let width = map.lane_width();
    if let Some(base) = map.burst_base(set) {
        let bytes = match width {
            LaneWidth::W32 => {
                let words: [u32; LANES] = lanes.map(|v| v as u32);
                bytemuck::cast_slice(&words).to_vec()
            }
            _ => {
                let mut buf = Vec::with_capacity(LANES * width.bytes());
                for &v in lanes {
                    encode_lane(width, v, &mut buf);
                }
                buf
            }
        };
        tracing::debug!(?set, base, len = bytes.len(), "burst write");
        chan.write_burst(base, &bytes)
    } else {
        for (lane, &v) in lanes.iter().enumerate() {
            write_lane(chan, map.offset(set, lane), width, v)?;
        }
        Ok(())
    }
}

/// Read each written lane back through the map's readback table and fail on
/// the first disagreement.
fn echo_set(
    chan: &mut dyn DataPath,
    map: &AddressMap,
    set: OperandSet,
    lanes: &[i32; LANES],
) -> Result<()> {
    let width = map.lane_width();
    for (lane, &wrote) in lanes.iter().enumerate() {
        let read = read_lane(chan, map.readback(set, lane), width)?;
        if read != wrote {
            return Err(Mac8Error::transfer_failed(format!(
                "echo check: {set:?} lane {lane} wrote {wrote}, read back {read}"
            )));
        }
    }
    tracing::debug!(?set, "echo check passed");
    Ok(())
}

fn wait_complete(chan: &mut dyn DataPath, cfg: &TransferConfig) -> Result<()> {
    match cfg.completion {
        Completion::PollStatus { mask, timeout } => {
            let Some(status_off) = cfg.map.status() else {
                return Err(Mac8Error::transfer_failed(
                    "completion poll requested but layout has no status word",
                ));
            };
            let start = Instant::now();
            loop {
                let st = chan.read_word(status_off)?;
                if st & status::ERROR != 0 {
                    return Err(Mac8Error::transfer_failed(format!(
                        "accelerator fault: status={st:#x}"
                    )));
                }
                if st & mask != 0 {
                    return Ok(());
                }
                if start.elapsed() > timeout {
                    #[allow(clippy::cast_possible_truncation)]
                    return Err(Mac8Error::Timeout {
                        duration_ms: timeout.as_millis() as u64,
                    });
                }
                std::thread::sleep(Duration::from_micros(100));
            }
        }
        Completion::FixedDelay(delay) => {
            std::thread::sleep(delay);
            Ok(())
        }
        Completion::Immediate => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dot_product_reference_vectors() {
        let a = [1, 2, 3, 4, 5, 6, 7, 8];
        let b = [8, 7, 6, 5, 4, 3, 2, 1];
        assert_eq!(expected_dot(&a, &b), 120);
    }

    #[test]
    fn dot_product_signed_lanes() {
        let a = [-1, 2, -3, 4, -5, 6, -7, 8];
        let b = [1, 1, 1, 1, 1, 1, 1, 1];
        assert_eq!(expected_dot(&a, &b), 4);
    }

    #[test]
    fn dot_product_wraps_without_saturation() {
        let a = [i32::MAX, 0, 0, 0, 0, 0, 0, 0];
        let b = [2, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(expected_dot(&a, &b), i32::MAX.wrapping_mul(2));
    }

    #[test]
    fn scalar_product_wraps() {
        assert_eq!(expected_product(7, -6), -42);
        assert_eq!(expected_product(i32::MIN, -1), i32::MIN);
    }

    #[test]
    fn lane_check_respects_width() {
        assert!(check_lane(LaneWidth::W8, 0, 127).is_ok());
        let err = check_lane(LaneWidth::W8, 3, 200).unwrap_err();
        assert!(matches!(
            err,
            Mac8Error::InvalidOperand {
                lane: 3,
                value: 200,
                width: LaneWidth::W8
            }
        ));
    }

    #[test]
    fn outcome_match_compares_bit_patterns() {
        let hit = Outcome {
            actual: 120,
            expected: 120,
        };
        assert!(hit.matches());

        // Negative expected values compare against the two's-complement
        // pattern the hardware would produce.
        let neg = Outcome {
            actual: (-42i32) as u32,
            expected: -42,
        };
        assert!(neg.matches());

        let miss = Outcome {
            actual: 0,
            expected: 120,
        };
        assert!(!miss.matches());
    }
}
