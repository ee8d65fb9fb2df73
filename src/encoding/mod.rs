//! Encoding detection and transcoding.
//!
//! Implements BOM sniffing and XML declaration encoding detection per
//! XML 1.0 Section 4.3.3 and Appendix F, bridging to `encoding_rs` for
//! character encoding conversion. The same machinery decodes XML resources
//! for the builder and text resources included with `parse="text"`.
//!
//! # Encoding Detection Strategy
//!
//! 1. A Byte Order Mark (BOM) wins and is stripped.
//! 2. Without a BOM, the `encoding=` pseudo-attribute of the XML declaration
//!    is read from the raw bytes (it is always ASCII-compatible, or UTF-16
//!    with a recognizable `<?` pattern).
//! 3. Otherwise the input is UTF-8.

use std::borrow::Cow;

use encoding_rs::Encoding;
use thiserror::Error;

/// An error that occurs during encoding detection or transcoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    /// The encoding label is not known to `encoding_rs`.
    #[error("unsupported encoding: {label}")]
    Unsupported {
        /// The label as it was given.
        label: String,
    },
    /// The bytes are not valid in the encoding.
    #[error("malformed byte sequence for encoding {encoding}")]
    Malformed {
        /// The canonical name of the encoding.
        encoding: &'static str,
    },
}

/// Detects a Byte Order Mark.
///
/// Returns the encoding it indicates and the number of bytes to skip, or
/// `None` when the input does not start with a BOM.
///
/// # Examples
///
/// ```
/// use xmlcore::encoding::detect_bom;
///
/// let (enc, skip) = detect_bom(b"\xEF\xBB\xBFhello").unwrap();
/// assert_eq!(enc.name(), "UTF-8");
/// assert_eq!(skip, 3);
/// assert!(detect_bom(b"<root/>").is_none());
/// ```
#[must_use]
pub fn detect_bom(bytes: &[u8]) -> Option<(&'static Encoding, usize)> {
    Encoding::for_bom(bytes)
}

/// Looks up an encoding by its IANA label (case-insensitive).
///
/// # Errors
///
/// Returns `EncodingError::Unsupported` for unknown labels.
pub fn lookup(label: &str) -> Result<&'static Encoding, EncodingError> {
    Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| EncodingError::Unsupported {
        label: label.to_string(),
    })
}

/// Decodes `bytes` with the named encoding. A BOM at the start of the
/// input overrides the label.
///
/// # Errors
///
/// Returns `EncodingError` if the label is unknown or the bytes are
/// malformed for the encoding.
///
/// # Examples
///
/// ```
/// use xmlcore::encoding::decode;
///
/// assert_eq!(decode(b"caf\xE9", "ISO-8859-1").unwrap(), "caf\u{e9}");
/// assert!(decode(b"hello", "no-such-encoding").is_err());
/// ```
pub fn decode(bytes: &[u8], label: &str) -> Result<String, EncodingError> {
    let (encoding, skip) = match detect_bom(bytes) {
        Some(found) => found,
        None => (lookup(label)?, 0),
    };
    decode_with(encoding, &bytes[skip..]).map(Cow::into_owned)
}

fn decode_with<'a>(encoding: &'static Encoding, bytes: &'a [u8]) -> Result<Cow<'a, str>, EncodingError> {
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .ok_or(EncodingError::Malformed {
            encoding: encoding.name(),
        })
}

/// Decodes raw XML bytes into a UTF-8 string, detecting the encoding from
/// the BOM or the XML declaration. The BOM is not part of the result.
///
/// # Errors
///
/// Returns `EncodingError` if the declared encoding is unsupported or the
/// bytes are malformed.
///
/// # Examples
///
/// ```
/// use xmlcore::encoding::decode_xml;
///
/// let text = decode_xml(b"<?xml version='1.0' encoding='ISO-8859-1'?><r>\xE9</r>").unwrap();
/// assert!(text.ends_with("<r>\u{e9}</r>"));
/// ```
pub fn decode_xml(bytes: &[u8]) -> Result<String, EncodingError> {
    if let Some((encoding, skip)) = detect_bom(bytes) {
        return decode_with(encoding, &bytes[skip..]).map(Cow::into_owned);
    }
    let encoding = match sniff_declared_encoding(bytes) {
        Some(label) => {
            let declared = lookup(&label)?;
            // A declaration read from ASCII bytes cannot describe UTF-16.
            if declared == encoding_rs::UTF_16LE || declared == encoding_rs::UTF_16BE {
                sniff_utf16(bytes).unwrap_or(encoding_rs::UTF_8)
            } else {
                declared
            }
        }
        None => sniff_utf16(bytes).unwrap_or(encoding_rs::UTF_8),
    };
    tracing::trace!(encoding = encoding.name(), "decoding XML resource");
    decode_with(encoding, bytes).map(Cow::into_owned)
}

/// Recognizes BOM-less UTF-16 from the `<?` pattern of Appendix F.
fn sniff_utf16(bytes: &[u8]) -> Option<&'static Encoding> {
    match bytes.get(..4)? {
        [0x3C, 0x00, 0x3F, 0x00] => Some(encoding_rs::UTF_16LE),
        [0x00, 0x3C, 0x00, 0x3F] => Some(encoding_rs::UTF_16BE),
        _ => None,
    }
}

/// Reads the `encoding` pseudo-attribute of an XML declaration directly
/// from raw bytes.
///
/// Only an ASCII-compatible declaration at the very start of the input is
/// recognized; UTF-16 input without a BOM yields `None` here.
///
/// # Examples
///
/// ```
/// use xmlcore::encoding::sniff_declared_encoding;
///
/// let label = sniff_declared_encoding(b"<?xml version=\"1.0\" encoding=\"Shift_JIS\"?><r/>");
/// assert_eq!(label.as_deref(), Some("Shift_JIS"));
/// assert_eq!(sniff_declared_encoding(b"<r/>"), None);
/// ```
#[must_use]
pub fn sniff_declared_encoding(bytes: &[u8]) -> Option<String> {
    let scan = &bytes[..bytes.len().min(256)];
    if !scan.starts_with(b"<?xml") {
        return None;
    }
    let end = scan.windows(2).position(|w| w == b"?>")?;
    let decl = &scan[5..end];

    let needle = b"encoding";
    let pos = decl.windows(needle.len()).position(|w| w == needle)?;
    let rest = skip_ascii_whitespace(&decl[pos + needle.len()..]);
    let rest = skip_ascii_whitespace(rest.strip_prefix(b"=")?);

    let (&quote, rest) = rest.split_first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let close = rest.iter().position(|&b| b == quote)?;
    let label = &rest[..close];
    if label.is_empty() || !label.iter().all(u8::is_ascii_graphic) {
        return None;
    }
    Some(String::from_utf8_lossy(label).into_owned())
}

fn skip_ascii_whitespace(bytes: &[u8]) -> &[u8] {
    let skip = bytes
        .iter()
        .take_while(|&&b| matches!(b, b' ' | b'\t' | b'\r' | b'\n'))
        .count();
    &bytes[skip..]
}

/// Extracts the `charset` parameter from a MIME content type such as
/// `text/plain; charset="ISO-8859-1"`.
#[must_use]
pub fn charset_parameter(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("charset") {
            return None;
        }
        let value = value.trim().trim_matches('"').trim();
        (!value.is_empty()).then(|| value.to_string())
    })
}

/// Returns `true` for `text/xml`, `application/xml` and any `+xml` type.
#[must_use]
pub fn is_xml_media_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "text/xml"
        || essence == "application/xml"
        || essence.ends_with("+xml")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_utf16le_bom() {
        let (encoding, skip) = detect_bom(b"\xFF\xFE<\x00r\x00").unwrap();
        assert_eq!(encoding, encoding_rs::UTF_16LE);
        assert_eq!(skip, 2);
    }

    #[test]
    fn test_detect_single_byte() {
        assert!(detect_bom(b"\xEF").is_none());
        assert!(detect_bom(b"").is_none());
    }

    #[test]
    fn test_decode_utf8_with_bom() {
        let result = decode_xml(b"\xEF\xBB\xBF<?xml version=\"1.0\"?><root/>").unwrap();
        assert_eq!(result, "<?xml version=\"1.0\"?><root/>");
    }

    #[test]
    fn test_decode_utf16_without_bom() {
        let bytes: Vec<u8> = "<?xml version='1.0'?><r/>"
            .encode_utf16()
            .flat_map(u16::to_le_bytes)
            .collect();
        assert_eq!(decode_xml(&bytes).unwrap(), "<?xml version='1.0'?><r/>");
    }

    #[test]
    fn test_decode_latin1_declared() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>");
        bytes.extend_from_slice(b"<root>caf\xE9</root>");
        let result = decode_xml(&bytes).unwrap();
        assert!(result.contains("caf\u{00E9}"));
    }

    #[test]
    fn test_decode_invalid_utf8() {
        assert_eq!(
            decode_xml(&[0x80, 0x81, 0x82]),
            Err(EncodingError::Malformed { encoding: "UTF-8" })
        );
    }

    #[test]
    fn test_unknown_label() {
        let err = decode(b"hello", "UNKNOWN-ENCODING-42").unwrap_err();
        assert_eq!(err.to_string(), "unsupported encoding: UNKNOWN-ENCODING-42");
    }

    #[test]
    fn test_sniff_single_quotes() {
        let label = sniff_declared_encoding(b"<?xml version='1.0' encoding='UTF-8'?><root/>");
        assert_eq!(label.as_deref(), Some("UTF-8"));
        assert_eq!(sniff_declared_encoding(b"<?xml version=\"1.0\"?><root/>"), None);
    }

    #[test]
    fn test_charset_parameter() {
        assert_eq!(
            charset_parameter("text/plain; charset=\"ISO-8859-1\"").as_deref(),
            Some("ISO-8859-1")
        );
        assert_eq!(charset_parameter("text/plain; format=flowed"), None);
        assert_eq!(charset_parameter("text/plain"), None);
    }

    #[test]
    fn test_xml_media_types() {
        assert!(is_xml_media_type("application/xml"));
        assert!(is_xml_media_type("Text/XML; charset=utf-8"));
        assert!(is_xml_media_type("image/svg+xml"));
        assert!(!is_xml_media_type("text/plain"));
    }
}
