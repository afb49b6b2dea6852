//! End-to-end tests against real hardware.
//!
//! All ignored by default; run with `cargo test -- --ignored` on a machine
//! with a programmed slot.

use mac8_driver::pcie_ids::ImageIdentity;
use mac8_driver::{
    run_registers, verify_image, Request, SlotTarget, SysfsMgmt, TransferConfig,
};

#[test]
#[ignore] // Requires hardware
fn verify_shipped_image_on_slot_0() {
    let mut mgmt = SysfsMgmt::discover().expect("slot discovery");
    let readiness =
        verify_image(&mut mgmt, 0, 0, ImageIdentity::shipped()).expect("verification");
    println!("slot 0 ready after {} rescan(s)", readiness.rescans);
}

#[test]
#[ignore] // Requires hardware
fn vector8_dot_product_on_slot_0() {
    let mut mgmt = SysfsMgmt::discover().expect("slot discovery");

    let outcome = run_registers(
        &mut mgmt,
        &SlotTarget::new(0),
        &TransferConfig::registers(),
        &Request::Vector8 {
            a: [1, 2, 3, 4, 5, 6, 7, 8],
            b: [8, 7, 6, 5, 4, 3, 2, 1],
        },
    )
    .expect("vector8 run");

    println!("expected {} read {}", outcome.expected, outcome.actual);
    assert!(outcome.matches(), "hardware result disagrees with host");
}
