//! XInclude resolution against an in-memory set of resources.
//!
//! Run with: `cargo run --example xinclude`
#![allow(clippy::expect_used)]

use xmlcore::builder::Builder;
use xmlcore::serial::serialize;
use xmlcore::xinclude::{MemoryFetcher, XIncluder};

fn main() {
    let main_xml = r#"<?xml version="1.0"?>
<manual xmlns:xi="http://www.w3.org/2001/XInclude">
  <title>User Guide</title>
  <xi:include href="chapter1.xml"/>
  <xi:include href="chapters.xml" xpointer="element(/1/2)"/>
  <xi:include href="LICENSE.txt" parse="text"/>
  <xi:include href="missing.xml">
    <xi:fallback><section><title>Coming Soon</title></section></xi:fallback>
  </xi:include>
</manual>"#;

    let mut fetcher = MemoryFetcher::new();
    fetcher.insert(
        "mem:/docs/chapter1.xml",
        "<chapter><title>Getting Started</title><p>Welcome.</p></chapter>",
    );
    fetcher.insert(
        "mem:/docs/chapters.xml",
        "<all><chapter>skipped</chapter><chapter><title>Advanced Usage</title></chapter></all>",
    );
    fetcher.insert("mem:/docs/LICENSE.txt", "MIT & friends");

    let doc = Builder::new()
        .build_str(main_xml, Some("mem:/docs/manual.xml"))
        .expect("parse failed");
    let includer = XIncluder::with_fetcher(fetcher);
    let resolved = includer.resolve(&doc).expect("XInclude failed");

    println!("Requested: {:?}", includer.fetcher().requests());
    println!("\nResult:\n{}", serialize(&resolved));
}
