//! Fuzz target for stored resource documents.

#![no_main]

use libfuzzer_sys::fuzz_target;
use rewind_audit::Resource;

fuzz_target!(|data: &[u8]| {
    if let Ok((_, resource)) = Resource::from_yaml(data) {
        let _ = resource.sanitized().to_yaml();
    }
});
