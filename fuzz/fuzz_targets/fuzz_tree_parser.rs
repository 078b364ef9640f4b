//! Fuzz target for tree object parsing.

#![no_main]

use libfuzzer_sys::fuzz_target;
use rewind_storage::tree::{encode_tree, parse_tree};

fuzz_target!(|data: &[u8]| {
    if let Ok(entries) = parse_tree(data) {
        let reparsed = parse_tree(&encode_tree(&entries)).expect("parsing an encoded tree");
        assert_eq!(reparsed.len(), entries.len());
    }
});
