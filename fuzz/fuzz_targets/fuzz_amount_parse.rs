#![no_main]

use ledgerprop_core::Amount;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(amount) = Amount::parse(s) {
            let rendered = amount.to_string();
            assert_eq!(Amount::parse(&rendered).ok(), Some(amount));
        }
    }
});
