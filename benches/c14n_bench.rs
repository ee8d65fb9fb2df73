#![allow(clippy::expect_used)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::fmt::Write;
use xmlcore::serial::c14n::{canonicalize, canonicalize_node, canonicalize_subset, Algorithm, C14nOptions};
use xmlcore::xinclude::{MemoryFetcher, XIncluder};
use xmlcore::{Document, NodeSet};

// ---------------------------------------------------------------------------
// Document generators
// ---------------------------------------------------------------------------

/// Generates a document with 1000 records, unsorted attributes and comments.
fn make_large_xml() -> String {
    let mut xml = String::from("<?xml version=\"1.0\"?>\n<database>\n");
    for i in 0..1000 {
        let _ = writeln!(
            xml,
            "  <record status=\"active\" id=\"{i}\"><!-- r{i} --><name>Record {i} &amp; co</name>\
             <value>{}</value></record>",
            i * 42
        );
    }
    xml.push_str("</database>\n");
    xml
}

/// Generates a document where 20 namespaces are declared at the root and
/// used throughout, so inclusive and exclusive output differ.
fn make_namespace_heavy_xml() -> String {
    let mut xml = String::from("<?xml version=\"1.0\"?>\n<root");
    for i in 0..20 {
        let _ = write!(xml, " xmlns:ns{i}=\"http://example.com/ns{i}\"");
    }
    xml.push_str(">\n");
    for i in 0..500 {
        let ns = i % 20;
        let _ = writeln!(
            xml,
            "  <ns{ns}:item ns{ns}:id=\"{i}\" b=\"2\" a=\"1\"><ns{}:leaf/></ns{ns}:item>",
            (ns + 1) % 20
        );
    }
    xml.push_str("</root>\n");
    xml
}

// ---------------------------------------------------------------------------
// Canonicalization benchmarks
// ---------------------------------------------------------------------------

fn bench_c14n_algorithms(c: &mut Criterion) {
    let doc = Document::parse_str(&make_large_xml()).expect("failed to parse large XML");
    let mut group = c.benchmark_group("c14n_large");
    for algorithm in Algorithm::ALL {
        let opts = C14nOptions::default().algorithm(algorithm);
        group.bench_function(format!("{algorithm:?}"), |b| {
            b.iter(|| canonicalize(black_box(&doc), &opts));
        });
    }
    group.finish();
}

fn bench_c14n_namespace_heavy(c: &mut Criterion) {
    let doc = Document::parse_str(&make_namespace_heavy_xml()).expect("failed to parse namespaced XML");
    let inclusive = C14nOptions::default().algorithm(Algorithm::Canonical);
    let exclusive = C14nOptions::default().algorithm(Algorithm::ExclusiveCanonical);
    c.bench_function("c14n_namespace_heavy_inclusive", |b| {
        b.iter(|| canonicalize(black_box(&doc), &inclusive));
    });
    c.bench_function("c14n_namespace_heavy_exclusive", |b| {
        b.iter(|| canonicalize(black_box(&doc), &exclusive));
    });
}

fn bench_c14n_subtree_and_subset(c: &mut Criterion) {
    let doc = Document::parse_str(&make_namespace_heavy_xml()).expect("failed to parse namespaced XML");
    let item = doc
        .descendants(doc.root())
        .filter(|&n| doc.is_element(n))
        .nth(250)
        .expect("document too small");
    let opts = C14nOptions::default().algorithm(Algorithm::Canonical);
    c.bench_function("c14n_subtree", |b| {
        b.iter(|| canonicalize_node(black_box(&doc), item, &opts));
    });

    let set = NodeSet::subtree(&doc, doc.root());
    c.bench_function("c14n_full_subset", |b| {
        b.iter(|| canonicalize_subset(black_box(&doc), &set, &opts));
    });
}

// ---------------------------------------------------------------------------
// XInclude benchmark
// ---------------------------------------------------------------------------

fn bench_xinclude_many(c: &mut Criterion) {
    let mut main = String::from("<book xmlns:xi=\"http://www.w3.org/2001/XInclude\">");
    let mut fetcher = MemoryFetcher::new();
    for i in 0..100 {
        let _ = write!(main, "<xi:include href=\"ch{i}.xml\"/>");
        fetcher.insert(
            &format!("mem:/ch{i}.xml"),
            format!("<chapter n=\"{i}\"><p>text {i}</p></chapter>"),
        );
    }
    main.push_str("</book>");
    let mut doc = Document::parse_str(&main).expect("failed to parse main document");
    doc.base_uri = Some("mem:/book.xml".to_string());
    let includer = XIncluder::with_fetcher(fetcher);
    c.bench_function("xinclude_100_chapters", |b| {
        b.iter(|| includer.resolve(black_box(&doc)));
    });
}

criterion_group!(
    canonicalization,
    bench_c14n_algorithms,
    bench_c14n_namespace_heavy,
    bench_c14n_subtree_and_subset,
);

criterion_group!(xinclude, bench_xinclude_many);

criterion_main!(canonicalization, xinclude);
