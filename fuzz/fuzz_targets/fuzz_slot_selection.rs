//! Fuzzes active slot lookup over arbitrary flash contents.
//!
//! Run with:
//!   cargo +nightly fuzz run fuzz_slot_selection

#![deny(static_mut_refs)]
#![no_main]

use activeset::{ActiveSetSelector, LayoutConfig, MemFlash};
use libfuzzer_sys::fuzz_target;

const SLOT_LEN: usize = 64;
const SLOTS: usize = 3;

fuzz_target!(|data: &[u8]| {
    let flash = MemFlash::new(SLOT_LEN * SLOTS);
    let image: Vec<u8> = data.iter().copied().take(SLOT_LEN * SLOTS).collect();
    if flash.load_image(0, &image).is_err() {
        return;
    }
    let Ok(mut selector) =
        ActiveSetSelector::open(flash, &LayoutConfig::contiguous(SLOTS, SLOT_LEN))
    else {
        return;
    };

    // Lookup must agree with the scan and never panic.
    let scanned = selector
        .scan()
        .iter()
        .position(|r| r.state == activeset::SlotState::Active);
    assert_eq!(selector.get_active_index().ok(), scanned);
});
