#![allow(clippy::expect_used)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use xmlcore::verifier::{
    check_absolute_uri_reference, check_character_data, check_character_data_utf16, check_name,
    check_ncname, check_uri_reference,
};

// ---------------------------------------------------------------------------
// Input generators
// ---------------------------------------------------------------------------

/// Names mixing ASCII, Latin-1 and CJK characters.
fn make_names() -> Vec<String> {
    (0..200)
        .map(|i| match i % 4 {
            0 => format!("element{i}"),
            1 => format!("ns{i}:local-name.{i}"),
            2 => format!("\u{e9}l\u{e9}ment_{i}"),
            _ => format!("\u{4e00}\u{4e8c}{i}"),
        })
        .collect()
}

/// A long run of character data with supplementary characters sprinkled in.
fn make_text() -> String {
    let mut text = String::with_capacity(64 * 1024);
    for i in 0..2000 {
        text.push_str("Lorem ipsum dolor sit amet, ");
        if i % 10 == 0 {
            text.push('\u{1d11e}');
        }
    }
    text
}

fn make_uris() -> Vec<String> {
    (0..200)
        .map(|i| match i % 4 {
            0 => format!("http://example.com/path/{i}/doc.xml?q={i}#frag"),
            1 => format!("../relative/{i}/file%20name.xml"),
            2 => format!("urn:example:ns:{i}"),
            _ => format!("http://[2001:db8::{i:x}]:8080/a/b"),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Name benchmarks
// ---------------------------------------------------------------------------

fn bench_check_name(c: &mut Criterion) {
    let names = make_names();
    c.bench_function("check_name", |b| {
        b.iter(|| {
            for name in &names {
                let _ = check_name(black_box(name));
            }
        });
    });
}

fn bench_check_ncname(c: &mut Criterion) {
    let names = make_names();
    c.bench_function("check_ncname", |b| {
        b.iter(|| {
            for name in &names {
                let _ = check_ncname(black_box(name));
            }
        });
    });
}

// ---------------------------------------------------------------------------
// Character data benchmarks
// ---------------------------------------------------------------------------

fn bench_check_character_data(c: &mut Criterion) {
    let text = make_text();
    c.bench_function("check_character_data", |b| {
        b.iter(|| check_character_data(black_box(&text)));
    });
}

fn bench_check_character_data_utf16(c: &mut Criterion) {
    let units: Vec<u16> = make_text().encode_utf16().collect();
    c.bench_function("check_character_data_utf16", |b| {
        b.iter(|| check_character_data_utf16(black_box(&units)));
    });
}

// ---------------------------------------------------------------------------
// URI benchmarks
// ---------------------------------------------------------------------------

fn bench_check_uri_reference(c: &mut Criterion) {
    let uris = make_uris();
    c.bench_function("check_uri_reference", |b| {
        b.iter(|| {
            for uri in &uris {
                let _ = check_uri_reference(black_box(uri));
            }
        });
    });
}

fn bench_check_absolute_uri_reference_repeated(c: &mut Criterion) {
    let uri = "http://www.w3.org/2001/XInclude";
    assert!(check_absolute_uri_reference(uri).is_ok(), "benchmark URI must be valid");
    c.bench_function("check_absolute_uri_reference_repeated", |b| {
        b.iter(|| check_absolute_uri_reference(black_box(uri)));
    });
}

criterion_group!(names, bench_check_name, bench_check_ncname);

criterion_group!(
    character_data,
    bench_check_character_data,
    bench_check_character_data_utf16
);

criterion_group!(
    uris,
    bench_check_uri_reference,
    bench_check_absolute_uri_reference_repeated
);

criterion_main!(names, character_data, uris);
