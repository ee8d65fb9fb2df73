//! Small helpers shared by the tree, builder and XInclude layers.
//!
//! Contains `QName` splitting and IRI/URI reference handling.

pub mod qname;
pub mod uri;
