//! Canonical XML in all four flavours, plus a subtree as used by enveloped
//! XML signatures.
//!
//! Run with: `cargo run --example canonicalize`
#![allow(clippy::expect_used)]

use xmlcore::serial::c14n::{canonicalize, canonicalize_node, Algorithm, C14nOptions};
use xmlcore::Document;

fn main() {
    let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<!-- dropped unless the algorithm keeps comments -->
<doc xmlns:b="http://example.com/b" xmlns:a="http://example.com/a">
  <item   z="3"   a="1"   m="2" >
    <![CDATA[Some <text>]]>
  </item>
  <empty/>
  <b:signed b:attr="val"><payload/></b:signed>
</doc>"#;

    let doc = Document::parse_str(xml).expect("parse failed");

    for algorithm in Algorithm::ALL {
        let out = canonicalize(&doc, &C14nOptions::default().algorithm(algorithm));
        println!("=== {algorithm} ===\n{out}\n");
    }

    // The signed element alone: inclusive C14N drags in every ancestor
    // namespace, exclusive C14N only the prefixes the subtree uses.
    let signed = doc
        .descendants(doc.root())
        .find(|&n| doc.local_name(n) == Some("signed"))
        .expect("no signed element");
    for algorithm in [Algorithm::Canonical, Algorithm::ExclusiveCanonical] {
        let out = canonicalize_node(&doc, signed, &C14nOptions::default().algorithm(algorithm))
            .expect("canonicalization failed");
        println!("=== subtree, {algorithm} ===\n{out}\n");
    }
}
