#![no_main]

use ledgerprop_auth::decode_claims;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(token) = std::str::from_utf8(data) {
        let _ = decode_claims(token, None);
        let _ = decode_claims(token, Some(b"fuzz-secret"));
    }
});
