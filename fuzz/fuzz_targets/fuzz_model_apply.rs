#![no_main]

use ledgerprop_templates::catalog;
use libfuzzer_sys::fuzz_target;
use serde_json::Value;

// Arbitrary payloads and arguments must be refused, never panic.
fuzz_target!(|data: &[u8]| {
    let Ok(models) = catalog() else {
        return;
    };
    let Ok(Value::Array(parts)) = serde_json::from_slice::<Value>(data) else {
        return;
    };
    let [Value::Object(payload), Value::String(choice), Value::String(actor), Value::Object(args)] =
        parts.as_slice()
    else {
        return;
    };
    for model in &models {
        let _ = model.validate_payload(payload);
        let _ = model.apply(payload, choice, actor, args);
        let _ = model.stakeholders(payload);
    }
});
