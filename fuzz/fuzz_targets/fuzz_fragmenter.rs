//! Fuzz target: advertising-data fragmenter.
//!
//! Asserts the chunk stream always terminates, stays within the per-command
//! size limit, and concatenates back to the input.
//!
//! cargo fuzz run fuzz_fragmenter

#![no_main]

use libfuzzer_sys::fuzz_target;
use multiadv::adv::fragment::FragmentJob;
use multiadv::adv::Payload;
use multiadv::config::{ADV_DATA_LEN_MAX, ADV_PAYLOAD_CAP};

fuzz_target!(|data: &[u8]| {
    let data = &data[..data.len().min(ADV_PAYLOAD_CAP)];
    let mut job = FragmentJob::new(Payload::from_slice(data).unwrap());

    let mut rebuilt = Vec::new();
    let mut chunks = 0usize;
    while let Some((_, chunk)) = job.next_chunk() {
        assert!(chunk.len() <= ADV_DATA_LEN_MAX);
        rebuilt.extend_from_slice(chunk);
        chunks += 1;
        assert!(chunks <= ADV_PAYLOAD_CAP / ADV_DATA_LEN_MAX + 1, "must terminate");
    }

    assert_eq!(rebuilt, data);
});
