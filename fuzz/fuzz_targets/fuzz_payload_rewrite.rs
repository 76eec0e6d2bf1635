//! Fuzz target: SetData payload preprocessing.
//!
//! Drives arbitrary byte sequences through the AD-structure walk and the
//! flags prepend, asserting the walk never panics, never resizes the
//! buffer, and the prepended flags stay well-formed.
//!
//! cargo fuzz run fuzz_payload_rewrite

#![no_main]

use libfuzzer_sys::fuzz_target;
use multiadv::adv::data::{is_legacy_connectable, prepare, rewrite_tx_power};

fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }
    let props = u16::from_le_bytes([data[0], data[1]]);
    let tx = data[2] as i8;
    let timeout = u32::from(data[3]);
    let payload = &data[4..];

    let mut copy = payload.to_vec();
    rewrite_tx_power(&mut copy, tx);
    assert_eq!(copy.len(), payload.len(), "rewrite must not resize");

    if let Ok(out) = prepare(payload, props, timeout, tx, false) {
        if is_legacy_connectable(props) {
            assert_eq!(out.len(), payload.len() + 3);
            assert_eq!(&out[..2], &[0x02, 0x01]);
        } else {
            assert_eq!(out.len(), payload.len());
        }
    }
});
