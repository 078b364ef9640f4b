//! Fuzz target for `.git/index` decoding.

#![no_main]

use libfuzzer_sys::fuzz_target;
use rewind_storage::index::{encode_index, parse_index};

fuzz_target!(|data: &[u8]| {
    if let Ok(entries) = parse_index(data) {
        // Names longer than the flag mask are not re-encoded faithfully.
        if entries.iter().all(|e| e.path.len() < 0x0fff) {
            let reparsed = parse_index(&encode_index(&entries)).expect("parsing an encoded index");
            assert_eq!(reparsed, entries);
        }
    }
});
