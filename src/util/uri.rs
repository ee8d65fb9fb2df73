//! IRI to URI conversion and reference resolution.
//!
//! Resolution goes through the `url` crate. References that cannot be
//! resolved (no absolute base, or a base `url` rejects) are returned as
//! they are, so relative documents stay usable without a base URI.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use url::Url;

/// ASCII an IRI may hold but a URI may not.
const IRI_ESCAPES: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'<')
    .add(b'>')
    .add(b'"')
    .add(b'{')
    .add(b'}')
    .add(b'|')
    .add(b'\\')
    .add(b'^')
    .add(b'`');

/// Percent-encodes the characters an IRI may hold but a URI may not:
/// controls, space, `<>"{}|\^` and backtick, and every non-ASCII character
/// (as the UTF-8 bytes that encode it).
///
/// # Examples
///
/// ```
/// use xmlcore::util::uri::iri_to_uri;
///
/// assert_eq!(iri_to_uri("a b/caf\u{e9}.xml"), "a%20b/caf%C3%A9.xml");
/// assert_eq!(iri_to_uri("plain.xml"), "plain.xml");
/// ```
#[must_use]
pub fn iri_to_uri(iri: &str) -> String {
    utf8_percent_encode(iri, IRI_ESCAPES).to_string()
}

/// Returns `true` if the reference starts with a scheme.
#[must_use]
pub fn is_absolute(reference: &str) -> bool {
    let Some(colon) = reference.find(':') else {
        return false;
    };
    let scheme = &reference[..colon];
    scheme.starts_with(|c: char| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Resolves `reference` against `base`.
///
/// # Examples
///
/// ```
/// use xmlcore::util::uri::resolve_uri;
///
/// assert_eq!(
///     resolve_uri(Some("http://example.com/a/b.xml"), "c.xml"),
///     "http://example.com/a/c.xml"
/// );
/// assert_eq!(resolve_uri(None, "c.xml"), "c.xml");
/// ```
#[must_use]
pub fn resolve_uri(base: Option<&str>, reference: &str) -> String {
    if is_absolute(reference) {
        return reference.to_string();
    }
    let Some(base) = base else {
        return reference.to_string();
    };
    match Url::parse(base).and_then(|base| base.join(reference)) {
        Ok(resolved) => resolved.to_string(),
        Err(err) => {
            if is_absolute(base) {
                tracing::debug!(base, reference, %err, "unresolvable URI reference");
                return reference.to_string();
            }
            resolve_relative_path(base, reference)
        }
    }
}

/// Merges a relative reference with a relative base, path-wise.
fn resolve_relative_path(base: &str, reference: &str) -> String {
    if reference.is_empty() {
        return strip_fragment(base).to_string();
    }
    if reference.starts_with('/') || reference.starts_with('#') {
        return if reference.starts_with('#') {
            format!("{}{reference}", strip_fragment(base))
        } else {
            reference.to_string()
        };
    }
    let base = strip_fragment(base);
    match base.rfind('/') {
        Some(slash) => format!("{}{reference}", &base[..=slash]),
        None => reference.to_string(),
    }
}

/// Splits a URI reference at its first `#`.
#[must_use]
pub fn split_fragment(uri: &str) -> (&str, Option<&str>) {
    match uri.split_once('#') {
        Some((resource, fragment)) => (resource, Some(fragment)),
        None => (uri, None),
    }
}

/// Returns the reference without its fragment identifier.
#[must_use]
pub fn strip_fragment(uri: &str) -> &str {
    split_fragment(uri).0
}
