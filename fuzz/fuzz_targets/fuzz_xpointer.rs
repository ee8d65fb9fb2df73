#![no_main]
use libfuzzer_sys::fuzz_target;
use xmlcore::xpointer;
use xmlcore::Document;

fuzz_target!(|data: &[u8]| {
    if let Ok(pointer) = std::str::from_utf8(data) {
        let doc = Document::parse_str(
            r#"<!DOCTYPE a [<!ATTLIST b id ID #IMPLIED>]><a><b id="x"><c/></b><b id="y"/></a>"#,
        );
        if let Ok(doc) = doc {
            let _ = xpointer::query(&doc, pointer);
        }
    }
});
