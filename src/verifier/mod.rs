//! Well-formedness checks for names, character data and URIs.
//!
//! Every constructor in [`crate::tree`] and every event the
//! [`crate::builder`] turns into a node passes through these functions, so a
//! document built by this crate can only contain legal XML. The checks are
//! pure functions over their input; the only shared state is the lazily
//! built character table in [`chars`] and the small cache of validated
//! absolute URIs in [`uri`].
//!
//! # Examples
//!
//! ```
//! use xmlcore::verifier;
//!
//! assert!(verifier::check_name("svg:rect").is_ok());
//! assert!(verifier::check_ncname("svg:rect").is_err());
//! assert!(verifier::check_uri_reference("http://example.com/a%2Fb").is_ok());
//! ```

pub mod chars;
pub mod uri;

pub use uri::{check_absolute_uri, check_absolute_uri_reference, check_uri_reference, ParsedUri};

use crate::error::VerifyError;

use chars::{
    combine_surrogates, is_high_surrogate, is_low_surrogate, is_name_character,
    is_name_start_character, is_ncname_character, is_ncname_start_character, is_xml_character,
    is_xml_code_unit,
};

/// The namespace bound to the `xml` prefix.
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// The namespace of `xmlns` attributes, which no prefix may be bound to.
pub const XMLNS_NAMESPACE: &str = "http://www.w3.org/2000/xmlns/";

/// Checks that `name` matches the XML `Name` production.
///
/// # Errors
///
/// Returns [`VerifyError::IllegalName`] if `name` is empty, starts with a
/// character that cannot start a name, or contains a non-name character.
pub fn check_name(name: &str) -> Result<(), VerifyError> {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err(VerifyError::name(name, "XML names cannot be empty"));
    };
    if !is_name_start_character(first) {
        return Err(VerifyError::name(
            name,
            format!("XML names cannot start with the character {:#x}", u32::from(first)),
        ));
    }
    if let Some(bad) = chars.find(|&c| !is_name_character(c)) {
        return Err(VerifyError::name(
            name,
            format!("{:#x} is not a legal XML name character", u32::from(bad)),
        ));
    }
    Ok(())
}

/// Checks that `name` matches the Namespaces in XML `NCName` production.
///
/// # Errors
///
/// Returns [`VerifyError::IllegalName`] under the same conditions as
/// [`check_name`], and additionally for any colon, with a message that
/// says so.
pub fn check_ncname(name: &str) -> Result<(), VerifyError> {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err(VerifyError::name(name, "NCNames cannot be empty"));
    };
    if first == ':' {
        return Err(VerifyError::name(name, "NCNames cannot start with a colon"));
    }
    if !is_ncname_start_character(first) {
        return Err(VerifyError::name(
            name,
            format!("NCNames cannot start with the character {:#x}", u32::from(first)),
        ));
    }
    for c in chars {
        if c == ':' {
            return Err(VerifyError::name(name, "NCNames cannot contain colons"));
        }
        if !is_ncname_character(c) {
            return Err(VerifyError::name(
                name,
                format!("{:#x} is not a legal NCName character", u32::from(c)),
            ));
        }
    }
    Ok(())
}

/// Checks that every character of `text` is allowed in XML content.
///
/// # Errors
///
/// Returns [`VerifyError::IllegalCharacterData`] naming the first offending
/// code point in hex.
pub fn check_character_data(text: &str) -> Result<(), VerifyError> {
    match text.chars().find(|&c| !is_xml_character(c)) {
        Some(bad) => Err(VerifyError::IllegalCharacterData {
            data: text.to_string(),
            message: format!("{:#x} is not allowed in XML content", u32::from(bad)),
        }),
        None => Ok(()),
    }
}

/// Checks raw UTF-16 code units for XML legality, pairing surrogates.
///
/// A high surrogate must be immediately followed by a low surrogate; the
/// pair then always denotes a legal supplementary character. A lone or
/// reversed surrogate is rejected.
///
/// # Errors
///
/// Returns [`VerifyError::IllegalCharacterData`] for a bad surrogate pair
/// or an illegal code unit.
///
/// # Examples
///
/// ```
/// use xmlcore::verifier::check_character_data_utf16;
///
/// assert!(check_character_data_utf16(&[0xD834, 0xDD1E]).is_ok());
/// assert!(check_character_data_utf16(&[0xDD1E, 0xD834]).is_err());
/// assert!(check_character_data_utf16(&[0xD834]).is_err());
/// ```
pub fn check_character_data_utf16(units: &[u16]) -> Result<(), VerifyError> {
    let fail = |message: String| VerifyError::IllegalCharacterData {
        data: String::from_utf16_lossy(units),
        message,
    };
    let mut i = 0;
    while i < units.len() {
        let unit = units[i];
        if is_high_surrogate(unit) {
            match units.get(i + 1) {
                Some(&low) if is_low_surrogate(low) => {
                    tracing::trace!(code_point = combine_surrogates(unit, low), "surrogate pair");
                    i += 2;
                    continue;
                }
                _ => return Err(fail("bad surrogate pair".to_string())),
            }
        }
        if is_low_surrogate(unit) {
            return Err(fail("bad surrogate pair".to_string()));
        }
        if !is_xml_code_unit(unit) {
            return Err(fail(format!("{unit:#x} is not allowed in XML content")));
        }
        i += 1;
    }
    Ok(())
}

/// Checks a processing-instruction target: an `NCName` other than `xml`
/// in any combination of case.
///
/// # Errors
///
/// Returns [`VerifyError::IllegalTarget`].
pub fn check_pi_target(target: &str) -> Result<(), VerifyError> {
    check_ncname(target).map_err(|err| VerifyError::IllegalTarget {
        target: target.to_string(),
        message: err.to_string(),
    })?;
    if target.eq_ignore_ascii_case("xml") {
        return Err(VerifyError::IllegalTarget {
            target: target.to_string(),
            message: "processing instruction targets cannot be xml in any case".to_string(),
        });
    }
    Ok(())
}

/// Checks processing-instruction data.
///
/// # Errors
///
/// Returns [`VerifyError::IllegalCharacterData`] or
/// [`VerifyError::IllegalData`] when the data contains `?>` or starts with
/// whitespace.
pub fn check_pi_data(data: &str) -> Result<(), VerifyError> {
    check_character_data(data)?;
    if data.contains("?>") {
        return Err(VerifyError::data(data, "processing instruction data cannot contain \"?>\""));
    }
    if data.starts_with(chars::is_xml_space) {
        return Err(VerifyError::data(
            data,
            "processing instruction data cannot start with white space",
        ));
    }
    Ok(())
}

/// Checks comment content.
///
/// # Errors
///
/// Returns an error if the content contains `--`, ends with `-`, or holds
/// an illegal character.
pub fn check_comment_data(data: &str) -> Result<(), VerifyError> {
    check_character_data(data)?;
    if data.contains("--") {
        return Err(VerifyError::data(data, "comments cannot contain \"--\""));
    }
    if data.ends_with('-') {
        return Err(VerifyError::data(data, "comment data cannot end with a hyphen"));
    }
    Ok(())
}

/// Checks a namespace prefix (the empty string means no prefix).
///
/// # Errors
///
/// Returns [`VerifyError::IllegalName`] for a non-`NCName` or for `xmlns`.
pub fn check_namespace_prefix(prefix: &str) -> Result<(), VerifyError> {
    if prefix.is_empty() {
        return Ok(());
    }
    check_ncname(prefix)?;
    if prefix == "xmlns" {
        return Err(VerifyError::name(prefix, "the xmlns prefix cannot be bound"));
    }
    Ok(())
}

/// Checks that `uri` may be bound to `prefix`.
///
/// An empty URI is only allowed for the empty prefix; otherwise the URI must
/// be an absolute URI reference. The `xml` prefix and the XML namespace go
/// together, and nothing may be bound to the xmlns namespace.
///
/// # Errors
///
/// Returns [`VerifyError::MalformedUri`] or [`VerifyError::IllegalName`].
pub fn check_namespace_uri(prefix: &str, uri: &str) -> Result<(), VerifyError> {
    if uri.is_empty() {
        return if prefix.is_empty() {
            Ok(())
        } else {
            Err(VerifyError::name(
                prefix,
                format!("prefix {prefix} must be bound to a non-empty namespace URI"),
            ))
        };
    }
    if uri == XMLNS_NAMESPACE {
        return Err(VerifyError::uri(uri, uri, "the xmlns namespace cannot be bound"));
    }
    if prefix == "xml" && uri != XML_NAMESPACE {
        return Err(VerifyError::name(prefix, "the xml prefix can only be bound to the XML namespace"));
    }
    if prefix != "xml" && uri == XML_NAMESPACE {
        return Err(VerifyError::uri(
            uri,
            uri,
            "the XML namespace can only be bound to the xml prefix",
        ));
    }
    check_absolute_uri_reference(uri)
}

/// Checks a public identifier against the `PubidChar` production.
///
/// # Errors
///
/// Returns [`VerifyError::IllegalData`] naming the offending character.
pub fn check_public_id(id: &str) -> Result<(), VerifyError> {
    let is_pubid = |c: char| {
        c.is_ascii_alphanumeric()
            || matches!(
                c,
                ' ' | '\r' | '\n' | '-' | '\'' | '(' | ')' | '+' | ',' | '.' | '/' | ':' | '='
                    | '?' | ';' | '!' | '*' | '#' | '@' | '$' | '_' | '%'
            )
    };
    match id.chars().find(|&c| !is_pubid(c)) {
        Some(bad) => Err(VerifyError::data(
            id,
            format!("{bad:?} is not allowed in a public identifier"),
        )),
        None => Ok(()),
    }
}

/// Checks a system literal: legal characters, not both quote kinds, no
/// fragment identifier.
///
/// # Errors
///
/// Returns [`VerifyError::IllegalData`] or
/// [`VerifyError::IllegalCharacterData`].
pub fn check_system_literal(id: &str) -> Result<(), VerifyError> {
    check_character_data(id)?;
    if id.contains('"') && id.contains('\'') {
        return Err(VerifyError::data(id, "system literals cannot contain both quote kinds"));
    }
    if id.contains('#') {
        return Err(VerifyError::data(id, "system literals cannot contain fragment identifiers"));
    }
    Ok(())
}
