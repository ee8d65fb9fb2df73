#![no_main]
use libfuzzer_sys::fuzz_target;
use xmlcore::serial::c14n::{canonicalize, Algorithm, C14nOptions};
use xmlcore::Document;

fuzz_target!(|data: &[u8]| {
    // Canonical output must itself parse and be a fixed point.
    if let Ok(doc) = Document::parse_bytes(data) {
        for algorithm in [Algorithm::Canonical, Algorithm::ExclusiveCanonical] {
            let opts = C14nOptions::default().algorithm(algorithm);
            let once = canonicalize(&doc, &opts);
            if let Ok(reparsed) = Document::parse_str(&once) {
                assert_eq!(canonicalize(&reparsed, &opts), once);
            }
        }
    }
});
