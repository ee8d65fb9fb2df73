//! # xmlcore
//!
//! The strict cores of an XML object model: verification of XML names,
//! character data and URI references; Canonical XML (inclusive and
//! exclusive, with and without comments) over documents, subtrees and node
//! subsets; and XInclude resolution with XPointer selection, loop detection
//! and fallback.
//!
//! Documents are arena trees built from XML text by [`builder::Builder`]
//! (tokenizing is delegated to `quick-xml`). Every node constructor runs the
//! [`verifier`], so a tree is namespace-well-formed however it was built.
//!
//! ## Quick Start
//!
//! ```
//! use xmlcore::Document;
//! use xmlcore::serial::c14n::{canonicalize, Algorithm, C14nOptions};
//!
//! let doc = Document::parse_str("<root b='2' a='1'><child/></root>").unwrap();
//! let root = doc.root_element().unwrap();
//! assert_eq!(doc.local_name(root), Some("root"));
//!
//! let opts = C14nOptions::default().algorithm(Algorithm::Canonical);
//! assert_eq!(canonicalize(&doc, &opts), r#"<root a="1" b="2"><child></child></root>"#);
//! ```

pub mod builder;
pub mod encoding;
pub mod error;
pub mod serial;
pub mod tree;
pub mod util;
pub mod verifier;
pub mod xinclude;
pub mod xpointer;

// Re-export primary types at the crate root for convenience.
pub use error::{Error, ParseError, Result, TreeError, VerifyError};
pub use tree::{AttributeType, Document, NodeId, NodeKind, NodeRef, NodeSet};
