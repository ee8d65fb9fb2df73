//! Node type definitions.
//!
//! The `NodeKind` enum carries the payload of each node type of the XML
//! infoset subset this crate models. Navigation links (parent, children,
//! siblings) are stored in `NodeData`, not here.

use std::fmt;

/// The kind of an XML node and its associated data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// The document node. There is exactly one per `Document`.
    Document,

    /// An element node, e.g., `<svg:rect width="1">`.
    Element {
        /// The local name (no prefix).
        local_name: String,
        /// Namespace prefix, if any.
        prefix: Option<String>,
        /// Namespace URI; the empty string means no namespace.
        namespace: String,
        /// Attribute nodes, in the order they were added.
        attributes: Vec<super::NodeId>,
        /// Namespace declarations beyond the ones implied by the element's
        /// own name and its attributes, as `(prefix, uri)` pairs. The empty
        /// prefix stands for the default namespace.
        namespace_declarations: Vec<(String, String)>,
    },

    /// An attribute node. Its `parent` link points to the owning element,
    /// but it never appears in that element's child list.
    Attribute {
        /// The local name (no prefix).
        local_name: String,
        /// Namespace prefix, if any.
        prefix: Option<String>,
        /// Namespace URI; the empty string means no namespace.
        namespace: String,
        /// The normalized attribute value.
        value: String,
        /// The declared type from the DTD, if any.
        attribute_type: AttributeType,
    },

    /// A text node containing character data. CDATA sections are merged
    /// into text when documents are built.
    Text {
        /// The text content, with character and entity references resolved.
        content: String,
    },

    /// A comment node (without the `<!--` and `-->` delimiters).
    Comment {
        /// The comment text.
        content: String,
    },

    /// A processing instruction, e.g., `<?xml-stylesheet href="a.css"?>`.
    ProcessingInstruction {
        /// The PI target.
        target: String,
        /// The PI data; empty when there is none.
        data: String,
    },

    /// A document type declaration, e.g., `<!DOCTYPE html>`.
    DocumentType {
        /// The root element name declared in the DOCTYPE.
        root_name: String,
        /// The PUBLIC identifier, if any.
        public_id: Option<String>,
        /// The SYSTEM identifier, if any.
        system_id: Option<String>,
        /// The raw internal subset, without the brackets.
        internal_subset: Option<String>,
    },
}

impl NodeKind {
    /// Returns a short lowercase name for this kind, used in error messages.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Element { .. } => "element",
            Self::Attribute { .. } => "attribute",
            Self::Text { .. } => "text",
            Self::Comment { .. } => "comment",
            Self::ProcessingInstruction { .. } => "processing instruction",
            Self::DocumentType { .. } => "document type",
        }
    }
}

/// The declared type of an attribute (XML 1.0 §3.3.1).
///
/// Attributes without a declaration are `Undeclared` and, like `Cdata`, are
/// never whitespace-collapsed. All other types are tokenized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AttributeType {
    /// No declaration was seen.
    #[default]
    Undeclared,
    /// `CDATA`.
    Cdata,
    /// `ID`.
    Id,
    /// `IDREF`.
    IdRef,
    /// `IDREFS`.
    IdRefs,
    /// `ENTITY`.
    Entity,
    /// `ENTITIES`.
    Entities,
    /// `NMTOKEN`.
    NmToken,
    /// `NMTOKENS`.
    NmTokens,
    /// `NOTATION (a|b)`.
    Notation,
    /// An enumeration such as `(yes|no)`.
    Enumeration,
}

impl AttributeType {
    /// Returns `true` for types whose values are whitespace-collapsed.
    #[must_use]
    pub fn is_tokenized(self) -> bool {
        !matches!(self, Self::Undeclared | Self::Cdata)
    }

    /// Parses a DTD attribute type keyword.
    #[must_use]
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Some(match keyword {
            "CDATA" => Self::Cdata,
            "ID" => Self::Id,
            "IDREF" => Self::IdRef,
            "IDREFS" => Self::IdRefs,
            "ENTITY" => Self::Entity,
            "ENTITIES" => Self::Entities,
            "NMTOKEN" => Self::NmToken,
            "NMTOKENS" => Self::NmTokens,
            "NOTATION" => Self::Notation,
            _ => return None,
        })
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Undeclared => "UNDECLARED",
            Self::Cdata => "CDATA",
            Self::Id => "ID",
            Self::IdRef => "IDREF",
            Self::IdRefs => "IDREFS",
            Self::Entity => "ENTITY",
            Self::Entities => "ENTITIES",
            Self::NmToken => "NMTOKEN",
            Self::NmTokens => "NMTOKENS",
            Self::Notation => "NOTATION",
            Self::Enumeration => "ENUMERATION",
        };
        f.write_str(name)
    }
}

/// Collapses runs of spaces to one and trims both ends, as XML 1.0 §3.3.3
/// requires for tokenized attribute types.
#[must_use]
pub fn collapse_whitespace(value: &str) -> String {
    value.split(' ').filter(|t| !t.is_empty()).collect::<Vec<_>>().join(" ")
}
