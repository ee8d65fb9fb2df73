#![no_main]
use libfuzzer_sys::fuzz_target;
use xmlcore::verifier::{check_absolute_uri, check_absolute_uri_reference, check_uri_reference};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let reference = check_uri_reference(s).is_ok();
        let absolute_reference = check_absolute_uri_reference(s).is_ok();
        let absolute = check_absolute_uri(s).is_ok();
        assert!(!absolute || absolute_reference);
        assert!(!absolute_reference || reference);
    }
});
