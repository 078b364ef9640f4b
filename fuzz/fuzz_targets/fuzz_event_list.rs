//! Fuzz target for the audit webhook body decoder.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(list) = rewind_audit::event::decode_event_list(data) {
        for event in &list.items {
            let _ = event.skip_reason("system:serviceaccount:kube-system:antrea-audit");
            let _ = event.author_email();
        }
    }
});
