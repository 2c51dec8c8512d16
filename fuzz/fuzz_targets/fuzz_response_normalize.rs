#![no_main]

use ledgerprop_client::{normalize, AllocationResult};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((&first, rest)) = data.split_first() else {
        return;
    };
    let status = 100 + u16::from(first) * 2;
    let body = String::from_utf8_lossy(rest);
    if let Ok(result) = normalize("parties/allocate", status, &body) {
        if let Ok(shape) = AllocationResult::from_value(result) {
            let _ = shape.into_party();
        }
    }
});
