//! Fuzz target for zlib loose object decoding.
//!
//! Anything that decodes must re-encode to an object with the same id.

#![no_main]

use libfuzzer_sys::fuzz_target;
use rewind_storage::store::{compress, decompress};
use rewind_storage::{Commit, ObjectType, TagObject};

fuzz_target!(|data: &[u8]| {
    let Ok(object) = decompress(data) else {
        return;
    };
    match object.object_type {
        ObjectType::Commit => {
            let _ = Commit::from_object(&object);
        }
        ObjectType::Tag => {
            let _ = TagObject::from_object(&object);
        }
        _ => {}
    }
    let recompressed = compress(&object).expect("re-encoding a decoded object");
    let again = decompress(&recompressed).expect("decoding a re-encoded object");
    assert_eq!(again.id, object.id);
});
