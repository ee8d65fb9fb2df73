//! XML serialization.
//!
//! This module serializes a `Document` tree back to XML text. The plain
//! serializer handles escaping, the XML declaration and indentation; the
//! [`c14n`] submodule produces the deterministic byte sequences required
//! by XML digital signatures.

pub mod c14n;
pub mod xml;

pub use c14n::{canonicalize, Algorithm, C14nError, C14nOptions, Canonicalizer};
pub use xml::{serialize, serialize_node, serialize_with_options, SerializeOptions};
