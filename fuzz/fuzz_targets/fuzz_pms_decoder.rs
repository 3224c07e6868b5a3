//! Fuzz target: `PmsDecoder::push`
//!
//! Drives arbitrary byte sequences into the particulate-sensor decoder and
//! asserts that it never panics and that every accepted frame re-encodes
//! to a checksum-valid frame.
//!
//! cargo fuzz run fuzz_pms_decoder

#![no_main]

use airnode::sensors::pms::{encode_frame, PmsDecoder};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut decoder = PmsDecoder::new();

    for byte in data {
        if let Ok(Some(frame)) = decoder.push(*byte) {
            let mut check = PmsDecoder::new();
            let echoed = encode_frame(&frame, false)
                .iter()
                .find_map(|b| check.push(*b).ok().flatten());
            assert_eq!(echoed, Some(frame), "accepted frame does not re-encode");
        }
    }

    decoder.reset();
    assert!(decoder.is_idle());
});
