//! Fuzzes the config block parser.
//!
//! Run with:
//!   cargo +nightly fuzz run fuzz_config_block

#![deny(static_mut_refs)]
#![no_main]

use activeset::ConfigCodec;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(codec) = ConfigCodec::new(data.len()) else {
        return;
    };
    // Must never panic on arbitrary bytes; anything that verifies must
    // re-encode to a block that verifies to the same mapping.
    if let Ok(mapping) = codec.parse(data) {
        if let Ok(block) = codec.serialize(&mapping) {
            assert_eq!(codec.parse(&block).ok(), Some(mapping));
        }
    }
});
