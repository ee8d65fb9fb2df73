//! Error types shared across the crate.
//!
//! Each subsystem owns a focused error enum (`VerifyError`, `TreeError`,
//! `ParseError`, and the canonicalization, `XPointer` and `XInclude` errors
//! defined next to their modules). [`Error`] aggregates all of them so that
//! callers who do not care which stage failed can use a single `?`.

use std::fmt;
use std::io;

use thiserror::Error;

use crate::encoding::EncodingError;
use crate::serial::c14n::C14nError;
use crate::xinclude::XIncludeError;
use crate::xpointer::XPointerError;

/// Source location within an XML document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number (in characters, not bytes).
    pub column: u32,
    /// 0-based byte offset from the start of the input.
    pub byte_offset: usize,
}

impl SourceLocation {
    /// Computes the line and column of `byte_offset` within `input`.
    #[must_use]
    pub fn locate(input: &str, byte_offset: usize) -> Self {
        let mut end = byte_offset.min(input.len());
        while !input.is_char_boundary(end) {
            end -= 1;
        }
        let before = &input[..end];
        let line = before.matches('\n').count() + 1;
        let column = match before.rfind('\n') {
            Some(pos) => before[pos + 1..].chars().count() + 1,
            None => before.chars().count() + 1,
        };
        Self {
            line: u32::try_from(line).unwrap_or(u32::MAX),
            column: u32::try_from(column).unwrap_or(u32::MAX),
            byte_offset,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A string failed one of the XML well-formedness checks in
/// [`crate::verifier`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    /// An element, attribute, target or prefix name is not a legal XML name
    /// or `NCName`.
    #[error("{message}")]
    IllegalName {
        /// The rejected name.
        name: String,
        /// What is wrong with it.
        message: String,
    },

    /// Text content contains a character that XML does not allow.
    #[error("{message}")]
    IllegalCharacterData {
        /// The rejected text.
        data: String,
        /// What is wrong with it.
        message: String,
    },

    /// Comment, processing-instruction or identifier data is malformed.
    #[error("{message}")]
    IllegalData {
        /// The rejected data.
        data: String,
        /// What is wrong with it.
        message: String,
    },

    /// A processing-instruction target is reserved or not an `NCName`.
    #[error("{message}")]
    IllegalTarget {
        /// The rejected target.
        target: String,
        /// What is wrong with it.
        message: String,
    },

    /// A URI reference does not match the RFC 3986 grammar.
    #[error("{reason} in \"{uri}\" (at \"{data}\")")]
    MalformedUri {
        /// The full URI being checked.
        uri: String,
        /// The component (or character) that failed.
        data: String,
        /// What is wrong with it.
        reason: String,
    },
}

impl VerifyError {
    pub(crate) fn name(name: &str, message: impl Into<String>) -> Self {
        Self::IllegalName {
            name: name.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn data(data: &str, message: impl Into<String>) -> Self {
        Self::IllegalData {
            data: data.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn uri(uri: &str, data: &str, reason: impl Into<String>) -> Self {
        Self::MalformedUri {
            uri: uri.to_string(),
            data: data.to_string(),
            reason: reason.into(),
        }
    }
}

/// A tree mutation was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    /// A name, text or URI handed to a constructor failed verification.
    #[error(transparent)]
    Verify(#[from] VerifyError),

    /// The node would become its own ancestor.
    #[error("cannot add a node to one of its own descendants")]
    Cycle,

    /// The node already has a parent; detach it first.
    #[error("node already has a parent")]
    AlreadyAttached,

    /// The document already has a root element.
    #[error("a document may contain only one root element")]
    MultipleRootElements,

    /// The child kind is not allowed under the parent kind.
    #[error("a {child} node cannot be a child of a {parent} node")]
    IllegalChild {
        /// Kind of the would-be parent.
        parent: &'static str,
        /// Kind of the rejected child.
        child: &'static str,
    },

    /// The operation requires an element node.
    #[error("node is not an element")]
    NotAnElement,

    /// The operation requires an attached node.
    #[error("node has no parent")]
    NoParent,

    /// A prefix is already bound to a different namespace on this element.
    #[error("prefix \"{prefix}\" is already bound to \"{existing}\", cannot rebind to \"{requested}\"")]
    NamespaceConflict {
        /// The contested prefix (empty for the default namespace).
        prefix: String,
        /// The binding already in force.
        existing: String,
        /// The binding that was requested.
        requested: String,
    },
}

/// The error type returned when building a document from XML text fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parse error at {location}: {message}")]
pub struct ParseError {
    /// The primary error message.
    pub message: String,
    /// Where in the source the error occurred.
    pub location: SourceLocation,
}

impl ParseError {
    /// Creates a parse error with an unknown location.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: SourceLocation::default(),
        }
    }
}

/// Any error produced by this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// See [`VerifyError`].
    #[error(transparent)]
    Verify(#[from] VerifyError),
    /// See [`TreeError`].
    #[error(transparent)]
    Tree(#[from] TreeError),
    /// See [`ParseError`].
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// See [`EncodingError`].
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    /// See [`C14nError`].
    #[error(transparent)]
    Canonicalization(#[from] C14nError),
    /// See [`XPointerError`].
    #[error(transparent)]
    XPointer(#[from] XPointerError),
    /// See [`XIncludeError`].
    #[error(transparent)]
    XInclude(#[from] XIncludeError),
    /// An I/O failure outside of `XInclude` fetching.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Convenience alias for results carrying [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
