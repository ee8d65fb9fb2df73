//! XPointer fragment identifiers.
//!
//! Supports the two pointer forms XInclude processors must understand:
//!
//! - **Shorthand pointers**: a bare NCName naming an element by ID, found
//!   through an ID-typed attribute (declared in the DTD) or `xml:id`.
//! - **Scheme-based pointers**: one or more `scheme(data)` parts. The
//!   `element()` scheme is evaluated; `xmlns()` and unknown schemes are
//!   parsed and skipped. Parts are tried left to right and the first one
//!   that selects something wins.
//!
//! `element()` data is an NCName, an NCName followed by a child sequence
//! (`id/2/1`), or a child sequence from the document node (`/1/3`). Each
//! step is a 1-based position among element children.
//!
//! # Examples
//!
//! ```
//! use xmlcore::Document;
//! use xmlcore::xpointer;
//!
//! let doc = Document::parse_str("<r><a/><b><c xml:id=\"c1\"/></b></r>").unwrap();
//! let by_id = xpointer::query(&doc, "c1").unwrap();
//! let by_path = xpointer::query(&doc, "element(/1/2/1)").unwrap();
//! assert_eq!(by_id, by_path);
//! ```

use thiserror::Error;

use crate::tree::{Document, NodeId};
use crate::verifier;

/// An error raised while parsing or evaluating a pointer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum XPointerError {
    /// The pointer is not syntactically valid.
    #[error("XPointer syntax error in {pointer:?}: {message}")]
    Syntax {
        /// The pointer text.
        pointer: String,
        /// What is wrong with it.
        message: String,
    },
    /// The pointer is valid but selects nothing.
    #[error("XPointer {pointer:?} does not identify any element")]
    Resource {
        /// The pointer text.
        pointer: String,
    },
}

impl XPointerError {
    fn syntax(pointer: &str, message: impl Into<String>) -> Self {
        Self::Syntax {
            pointer: pointer.to_string(),
            message: message.into(),
        }
    }
}

/// A parsed pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pointer {
    /// A bare NCName.
    Shorthand(String),
    /// A sequence of scheme parts.
    Schemes(Vec<SchemePart>),
}

/// One `scheme(data)` part of a scheme-based pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemePart {
    /// `element(id)`, `element(id/1/2)` or `element(/1/2)`.
    Element {
        /// The starting element's ID, or `None` to start at the document.
        id: Option<String>,
        /// 1-based element-child positions.
        tumbler: Vec<usize>,
    },
    /// `xmlns(prefix=uri)`. Parsed and ignored, since no supported scheme
    /// uses prefixes.
    Xmlns {
        /// The declared prefix.
        prefix: String,
        /// The namespace URI.
        uri: String,
    },
    /// A scheme this implementation does not evaluate.
    Unknown {
        /// The scheme name.
        scheme: String,
        /// The unescaped scheme data.
        data: String,
    },
}

/// Parses a pointer.
///
/// # Errors
///
/// Returns `XPointerError::Syntax` for an empty pointer, unbalanced
/// parentheses, a bad `^` escape, an illegal scheme name or malformed
/// `element()` data.
///
/// # Examples
///
/// ```
/// use xmlcore::xpointer::{parse, Pointer, SchemePart};
///
/// assert_eq!(parse("intro").unwrap(), Pointer::Shorthand("intro".into()));
/// assert_eq!(
///     parse("element(intro/2)").unwrap(),
///     Pointer::Schemes(vec![SchemePart::Element { id: Some("intro".into()), tumbler: vec![2] }])
/// );
/// assert!(parse("element(/0)").is_err());
/// ```
pub fn parse(pointer: &str) -> Result<Pointer, XPointerError> {
    if pointer.is_empty() {
        return Err(XPointerError::syntax(pointer, "empty pointer"));
    }
    if !pointer.contains('(') {
        verifier::check_ncname(pointer)
            .map_err(|_| XPointerError::syntax(pointer, "shorthand pointer is not an NCName"))?;
        return Ok(Pointer::Shorthand(pointer.to_string()));
    }

    let mut parts = Vec::new();
    let mut rest = pointer;
    loop {
        rest = rest.trim_start_matches(is_xml_whitespace);
        if rest.is_empty() {
            break;
        }
        let open = rest
            .find('(')
            .ok_or_else(|| XPointerError::syntax(pointer, "expected '(' after scheme name"))?;
        let scheme = &rest[..open];
        verifier::check_name(scheme)
            .map_err(|_| XPointerError::syntax(pointer, format!("illegal scheme name {scheme:?}")))?;
        let (data, consumed) = scheme_data(pointer, &rest[open + 1..])?;
        parts.push(scheme_part(pointer, scheme, data)?);
        rest = &rest[open + 1 + consumed..];
    }
    Ok(Pointer::Schemes(parts))
}

/// Reads escaped scheme data up to the matching `)`. Returns the unescaped
/// data and the number of bytes consumed, including the closing
/// parenthesis.
fn scheme_data(pointer: &str, input: &str) -> Result<(String, usize), XPointerError> {
    let mut data = String::new();
    let mut depth = 0usize;
    let mut chars = input.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '^' => match chars.next() {
                Some((_, escaped @ ('^' | '(' | ')'))) => data.push(escaped),
                _ => return Err(XPointerError::syntax(pointer, "'^' must escape '^', '(' or ')'")),
            },
            '(' => {
                depth += 1;
                data.push(c);
            }
            ')' if depth == 0 => return Ok((data, i + 1)),
            ')' => {
                depth -= 1;
                data.push(c);
            }
            _ => data.push(c),
        }
    }
    Err(XPointerError::syntax(pointer, "unbalanced parentheses"))
}

fn scheme_part(pointer: &str, scheme: &str, data: String) -> Result<SchemePart, XPointerError> {
    match scheme {
        "element" => parse_element_data(pointer, &data),
        "xmlns" => {
            let (prefix, uri) = data
                .split_once('=')
                .ok_or_else(|| XPointerError::syntax(pointer, "xmlns() data must be prefix=uri"))?;
            let prefix = prefix.trim_matches(is_xml_whitespace);
            verifier::check_ncname(prefix)
                .map_err(|_| XPointerError::syntax(pointer, "xmlns() prefix is not an NCName"))?;
            Ok(SchemePart::Xmlns {
                prefix: prefix.to_string(),
                uri: uri.trim_matches(is_xml_whitespace).to_string(),
            })
        }
        _ => Ok(SchemePart::Unknown {
            scheme: scheme.to_string(),
            data,
        }),
    }
}

fn parse_element_data(pointer: &str, data: &str) -> Result<SchemePart, XPointerError> {
    let (id, steps) = match data.find('/') {
        Some(0) => (None, &data[1..]),
        Some(slash) => (Some(&data[..slash]), &data[slash + 1..]),
        None => (Some(data), ""),
    };
    if let Some(id) = id {
        verifier::check_ncname(id)
            .map_err(|_| XPointerError::syntax(pointer, "element() ID is not an NCName"))?;
    }
    let tumbler = if !data.contains('/') {
        Vec::new()
    } else {
        steps
            .split('/')
            .map(|step| match step.parse::<usize>() {
                Ok(n) if n > 0 && step.bytes().all(|b| b.is_ascii_digit()) => Ok(n),
                _ => Err(XPointerError::syntax(
                    pointer,
                    format!("child sequence step {step:?} is not a positive integer"),
                )),
            })
            .collect::<Result<Vec<_>, _>>()?
    };
    Ok(SchemePart::Element {
        id: id.map(str::to_string),
        tumbler,
    })
}

fn is_xml_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

/// Evaluates a pointer against a document and returns the selected
/// nodes.
///
/// # Errors
///
/// Returns `XPointerError::Syntax` if the pointer does not parse and
/// `XPointerError::Resource` if no part selects anything.
pub fn query(doc: &Document, pointer: &str) -> Result<Vec<NodeId>, XPointerError> {
    let parsed = parse(pointer)?;
    let found = match &parsed {
        Pointer::Shorthand(id) => find_by_id(doc, id),
        Pointer::Schemes(parts) => parts.iter().find_map(|part| match part {
            SchemePart::Element { id, tumbler } => evaluate_element(doc, id.as_deref(), tumbler),
            SchemePart::Xmlns { .. } | SchemePart::Unknown { .. } => None,
        }),
    };
    tracing::trace!(pointer, found = ?found, "evaluated XPointer");
    found.map(|node| vec![node]).ok_or_else(|| XPointerError::Resource {
        pointer: pointer.to_string(),
    })
}

fn evaluate_element(doc: &Document, id: Option<&str>, tumbler: &[usize]) -> Option<NodeId> {
    let start = match id {
        Some(id) => find_by_id(doc, id)?,
        None => doc.root(),
    };
    tumbler.iter().try_fold(start, |current, &position| {
        doc.children(current)
            .filter(|&child| doc.is_element(child))
            .nth(position - 1)
    })
}

/// Finds the first element, in document order, carrying an ID attribute
/// (ID-typed or `xml:id`) with the given value.
#[must_use]
pub fn find_by_id(doc: &Document, id: &str) -> Option<NodeId> {
    doc.element_by_id(id)
}
