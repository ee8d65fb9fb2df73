//! Canonical XML (C14N) serialization.
//!
//! Implements Canonical XML 1.0 <https://www.w3.org/TR/xml-c14n/> and
//! Exclusive XML Canonicalization 1.0 <https://www.w3.org/TR/xml-exc-c14n/>,
//! each with and without comments, over a whole document, a node's subtree
//! or an explicit [`NodeSet`].
//!
//! Canonical XML produces a unique, deterministic byte sequence for logically
//! equivalent XML documents. This is critical for XML digital signatures, where
//! the canonical form must be identical regardless of insignificant variations
//! in the original serialization.
//!
//! # Key C14N rules
//!
//! - No XML declaration in output, DOCTYPE declarations removed
//! - Attributes sorted by namespace URI then local name
//! - Namespace declarations sorted by prefix, default first
//! - Empty elements always use start-end tag pairs (`<a></a>`, not `<a/>`)
//! - CDATA sections and entity references already resolved to text
//! - Specific character escaping rules for text content and attribute values
//!
//! # Document subsets
//!
//! A subset is rendered by walking the whole tree in document order and
//! emitting the selected nodes, so the order in which a [`NodeSet`] was
//! filled does not matter and nodes detached from the document are never
//! reached. Elements outside the subset are not rendered, but their
//! selected descendants and attributes are.
//!
//! # Examples
//!
//! ```
//! use xmlcore::Document;
//! use xmlcore::serial::c14n::{canonicalize, C14nOptions};
//!
//! let doc = Document::parse_str("<root><child/></root>").unwrap();
//! let c14n = canonicalize(&doc, &C14nOptions::default());
//! assert_eq!(c14n, "<root><child></child></root>");
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Write};

use thiserror::Error;

use crate::tree::{Document, NodeId, NodeKind, NodeSet};
use crate::verifier::XML_NAMESPACE;

/// A canonicalization algorithm, identified by its W3C URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Algorithm {
    /// Canonical XML 1.0, comments omitted.
    Canonical,
    /// Canonical XML 1.0 with comments.
    #[default]
    CanonicalWithComments,
    /// Exclusive XML Canonicalization 1.0, comments omitted.
    ExclusiveCanonical,
    /// Exclusive XML Canonicalization 1.0 with comments.
    ExclusiveCanonicalWithComments,
}

impl Algorithm {
    /// All algorithms, in declaration order.
    pub const ALL: [Self; 4] = [
        Self::Canonical,
        Self::CanonicalWithComments,
        Self::ExclusiveCanonical,
        Self::ExclusiveCanonicalWithComments,
    ];

    /// Returns the algorithm identifier URI.
    #[must_use]
    pub fn uri(self) -> &'static str {
        match self {
            Self::Canonical => "http://www.w3.org/TR/2001/REC-xml-c14n-20010315",
            Self::CanonicalWithComments => {
                "http://www.w3.org/TR/2001/REC-xml-c14n-20010315#WithComments"
            }
            Self::ExclusiveCanonical => "http://www.w3.org/2001/10/xml-exc-c14n#",
            Self::ExclusiveCanonicalWithComments => {
                "http://www.w3.org/2001/10/xml-exc-c14n#WithComments"
            }
        }
    }

    /// Looks an algorithm up by its identifier URI.
    ///
    /// # Errors
    ///
    /// Returns `C14nError::UnsupportedAlgorithm` for any other URI.
    ///
    /// # Examples
    ///
    /// ```
    /// use xmlcore::serial::c14n::Algorithm;
    ///
    /// let alg = Algorithm::from_uri("http://www.w3.org/2001/10/xml-exc-c14n#").unwrap();
    /// assert_eq!(alg, Algorithm::ExclusiveCanonical);
    /// assert!(Algorithm::from_uri("http://example.com/c14n").is_err());
    /// ```
    pub fn from_uri(uri: &str) -> Result<Self, C14nError> {
        Self::ALL
            .into_iter()
            .find(|alg| alg.uri() == uri)
            .ok_or_else(|| C14nError::UnsupportedAlgorithm(uri.to_string()))
    }

    /// Returns `true` for the variants that keep comments.
    #[must_use]
    pub fn with_comments(self) -> bool {
        matches!(
            self,
            Self::CanonicalWithComments | Self::ExclusiveCanonicalWithComments
        )
    }

    /// Returns `true` for the exclusive variants.
    #[must_use]
    pub fn is_exclusive(self) -> bool {
        matches!(
            self,
            Self::ExclusiveCanonical | Self::ExclusiveCanonicalWithComments
        )
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.uri())
    }
}

/// Options for canonical XML serialization.
///
/// # Examples
///
/// ```
/// use xmlcore::serial::c14n::{Algorithm, C14nOptions};
///
/// // Default: inclusive C14N with comments
/// let opts = C14nOptions::default();
/// assert_eq!(opts.algorithm, Algorithm::CanonicalWithComments);
///
/// let opts = C14nOptions::default()
///     .algorithm(Algorithm::ExclusiveCanonical)
///     .inclusive_prefixes("#default soap");
/// assert_eq!(opts.inclusive_prefixes, vec!["".to_string(), "soap".to_string()]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct C14nOptions {
    /// The canonicalization algorithm.
    pub algorithm: Algorithm,
    /// For exclusive C14N, the prefixes of the `InclusiveNamespaces
    /// PrefixList`, treated as if visibly utilized. The empty string stands
    /// for the default namespace. Ignored by inclusive C14N.
    pub inclusive_prefixes: Vec<String>,
}

impl C14nOptions {
    /// Sets the algorithm.
    #[must_use]
    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Sets the inclusive prefix list from its whitespace-separated form,
    /// where `#default` names the default namespace.
    #[must_use]
    pub fn inclusive_prefixes(mut self, list: &str) -> Self {
        self.inclusive_prefixes = list
            .split_ascii_whitespace()
            .map(|p| if p == "#default" { String::new() } else { p.to_string() })
            .collect();
        self
    }
}

/// An error raised while canonicalizing.
#[derive(Debug, Error)]
pub enum C14nError {
    /// The node to canonicalize is not attached to its document.
    #[error("cannot canonicalize a detached node")]
    DetachedNode,
    /// The node id was not allocated by the document.
    #[error("node {0:?} does not belong to the document")]
    ForeignNode(NodeId),
    /// The node set was built for a different document.
    #[error("node set belongs to a different document")]
    ForeignNodeSet,
    /// The algorithm URI is not one of the four supported ones.
    #[error("unsupported canonicalization algorithm: {0}")]
    UnsupportedAlgorithm(String),
    /// Writing the output failed.
    #[error("failed to write canonical output: {0}")]
    Io(#[from] io::Error),
}

/// Serializes a document to canonical form.
///
/// The output never includes an XML declaration, DOCTYPE declarations are
/// removed, and all other canonicalization rules are applied.
///
/// # Examples
///
/// ```
/// use xmlcore::Document;
/// use xmlcore::serial::c14n::{canonicalize, C14nOptions};
///
/// let doc = Document::parse_str("<root attr2=\"b\" attr1=\"a\"/>").unwrap();
/// let c14n = canonicalize(&doc, &C14nOptions::default());
/// // Attributes are sorted, empty element uses start-end tags
/// assert_eq!(c14n, "<root attr1=\"a\" attr2=\"b\"></root>");
/// ```
#[must_use]
pub fn canonicalize(doc: &Document, options: &C14nOptions) -> String {
    let mut ctx = C14nContext::new(doc, options, Selection::All);
    ctx.process_document();
    ctx.output
}

/// Serializes a node and its descendants to canonical form, as the
/// document subset of that subtree (attributes and namespace nodes
/// included).
///
/// # Errors
///
/// Returns `C14nError::ForeignNode` if the node id is not from `doc`, or
/// `C14nError::DetachedNode` if the node is not attached.
pub fn canonicalize_node(doc: &Document, node: NodeId, options: &C14nOptions) -> Result<String, C14nError> {
    let mut canonicalizer = Canonicalizer::with_options(Vec::new(), options.clone());
    canonicalizer.write_node(doc, node)?;
    Ok(String::from_utf8_lossy(&canonicalizer.into_inner()).into_owned())
}

/// Serializes an explicit document subset to canonical form.
///
/// # Errors
///
/// Returns `C14nError::ForeignNodeSet` if `set` was built for another
/// document.
pub fn canonicalize_subset(doc: &Document, set: &NodeSet, options: &C14nOptions) -> Result<String, C14nError> {
    if !set.belongs_to(doc) {
        return Err(C14nError::ForeignNodeSet);
    }
    let mut ctx = C14nContext::new(doc, options, Selection::Subset(set));
    ctx.process_document();
    Ok(ctx.output)
}

/// Writes canonical XML to any `io::Write`.
///
/// Each call renders into a fresh context, so a failed write leaves the
/// canonicalizer usable for the next call.
///
/// # Examples
///
/// ```
/// use xmlcore::Document;
/// use xmlcore::serial::c14n::{Algorithm, Canonicalizer};
///
/// let doc = Document::parse_str("<a><!--c--><b/></a>").unwrap();
/// let mut c14n = Canonicalizer::new(Vec::new(), Algorithm::Canonical);
/// c14n.write_document(&doc).unwrap();
/// assert_eq!(c14n.into_inner(), b"<a><b></b></a>");
/// ```
#[derive(Debug)]
pub struct Canonicalizer<W: Write> {
    out: W,
    options: C14nOptions,
}

impl<W: Write> Canonicalizer<W> {
    /// Creates a canonicalizer for `algorithm` with no inclusive prefixes.
    pub fn new(out: W, algorithm: Algorithm) -> Self {
        Self::with_options(out, C14nOptions::default().algorithm(algorithm))
    }

    /// Creates a canonicalizer with full options.
    pub fn with_options(out: W, options: C14nOptions) -> Self {
        Self { out, options }
    }

    /// Sets the exclusive inclusive-prefix list from its whitespace
    /// separated form (`#default` for the default namespace).
    #[must_use]
    pub fn with_inclusive_prefixes(mut self, list: &str) -> Self {
        self.options = self.options.inclusive_prefixes(list);
        self
    }

    /// Returns the options in use.
    pub fn options(&self) -> &C14nOptions {
        &self.options
    }

    /// Writes the canonical form of a whole document.
    ///
    /// # Errors
    ///
    /// Returns `C14nError::Io` if the writer fails.
    pub fn write_document(&mut self, doc: &Document) -> Result<(), C14nError> {
        tracing::debug!(algorithm = %self.options.algorithm, "canonicalizing document");
        let output = canonicalize(doc, &self.options);
        self.out.write_all(output.as_bytes())?;
        Ok(())
    }

    /// Writes the canonical form of `node` and its descendants. A document
    /// node writes the whole document; an attribute node writes
    /// ` name="value"`.
    ///
    /// # Errors
    ///
    /// Returns `C14nError::ForeignNode` if `node` was not allocated by the
    /// document, `C14nError::DetachedNode` if it is not attached, or
    /// `C14nError::Io` if the writer fails.
    pub fn write_node(&mut self, doc: &Document, node: NodeId) -> Result<(), C14nError> {
        if doc.get(node).is_none() {
            return Err(C14nError::ForeignNode(node));
        }
        if node == doc.root() {
            return self.write_document(doc);
        }
        if !doc.is_attached(node) {
            return Err(C14nError::DetachedNode);
        }
        tracing::debug!(algorithm = %self.options.algorithm, ?node, "canonicalizing node");
        let output = if matches!(doc.kind(node), NodeKind::Attribute { .. }) {
            let mut output = String::new();
            write_attribute(&mut output, &RenderedAttribute::of(doc, node));
            output
        } else {
            let set = NodeSet::subtree(doc, node);
            let mut ctx = C14nContext::new(doc, &self.options, Selection::Subset(&set));
            ctx.process_document();
            ctx.output
        };
        self.out.write_all(output.as_bytes())?;
        Ok(())
    }

    /// Writes the canonical form of an explicit document subset.
    ///
    /// # Errors
    ///
    /// Returns `C14nError::ForeignNodeSet` if the set was built for another
    /// document, or `C14nError::Io` if the writer fails.
    pub fn write_subset(&mut self, doc: &Document, set: &NodeSet) -> Result<(), C14nError> {
        tracing::debug!(algorithm = %self.options.algorithm, size = set.len(), "canonicalizing node set");
        let output = canonicalize_subset(doc, set, &self.options)?;
        self.out.write_all(output.as_bytes())?;
        Ok(())
    }

    /// Consumes the canonicalizer and returns the writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Which nodes are rendered.
#[derive(Clone, Copy)]
enum Selection<'s> {
    All,
    Subset(&'s NodeSet),
}

impl Selection<'_> {
    fn contains(self, id: NodeId) -> bool {
        match self {
            Self::All => true,
            Self::Subset(set) => set.contains(id),
        }
    }

    fn contains_namespace(self, element: NodeId, prefix: &str) -> bool {
        match self {
            Self::All => true,
            Self::Subset(set) => set.contains_namespace(element, prefix),
        }
    }
}

/// Namespace bindings rendered by output ancestors: prefix (empty string
/// for the default namespace) to URI.
type NsBinding = BTreeMap<String, String>;

/// An attribute as it will be written.
struct RenderedAttribute {
    namespace: String,
    local_name: String,
    qname: String,
    value: String,
}

impl RenderedAttribute {
    fn of(doc: &Document, attr: NodeId) -> Self {
        let (namespace, local_name, value, tokenized) = match doc.kind(attr) {
            NodeKind::Attribute {
                namespace,
                local_name,
                value,
                attribute_type,
                ..
            } => (
                namespace.clone(),
                local_name.clone(),
                value.as_str(),
                attribute_type.is_tokenized(),
            ),
            _ => (String::new(), String::new(), "", false),
        };
        Self {
            namespace,
            local_name,
            qname: doc.qualified_name(attr).unwrap_or_default(),
            value: if tokenized {
                crate::tree::collapse_whitespace(value)
            } else {
                value.to_string()
            },
        }
    }
}

/// Per-call rendering state.
struct C14nContext<'a> {
    doc: &'a Document,
    selection: Selection<'a>,
    with_comments: bool,
    exclusive: bool,
    inclusive_prefixes: &'a [String],
    output: String,
}

impl<'a> C14nContext<'a> {
    fn new(doc: &'a Document, options: &'a C14nOptions, selection: Selection<'a>) -> Self {
        Self {
            doc,
            selection,
            with_comments: options.algorithm.with_comments(),
            exclusive: options.algorithm.is_exclusive(),
            inclusive_prefixes: &options.inclusive_prefixes,
            output: String::new(),
        }
    }

    /// Walks the document node's children. Comments and PIs before the
    /// root element get a trailing newline, those after it a leading one.
    fn process_document(&mut self) {
        let root = self.doc.root();
        let mut seen_root_element = false;
        let rendered = NsBinding::new();

        for child in self.doc.children(root) {
            match self.doc.kind(child) {
                NodeKind::Element { .. } => {
                    seen_root_element = true;
                    self.process_element(child, &rendered);
                }
                NodeKind::Comment { .. } | NodeKind::ProcessingInstruction { .. } => {
                    if !self.is_rendered_leaf(child) {
                        continue;
                    }
                    if seen_root_element {
                        self.output.push('\n');
                    }
                    self.process_leaf(child);
                    if !seen_root_element {
                        self.output.push('\n');
                    }
                }
                // DOCTYPE and stray text at the document level are never output.
                _ => {}
            }
        }
    }

    fn is_rendered_leaf(&self, id: NodeId) -> bool {
        match self.doc.kind(id) {
            NodeKind::Comment { .. } => self.with_comments && self.selection.contains(id),
            NodeKind::Text { .. } | NodeKind::ProcessingInstruction { .. } => {
                self.selection.contains(id)
            }
            _ => false,
        }
    }

    fn process_leaf(&mut self, id: NodeId) {
        match self.doc.kind(id) {
            NodeKind::Text { content } => write_c14n_text(&mut self.output, content),
            NodeKind::Comment { content } => write_c14n_comment(&mut self.output, content),
            NodeKind::ProcessingInstruction { target, data } => {
                write_c14n_pi(&mut self.output, target, data);
            }
            _ => {}
        }
    }

    fn process_node(&mut self, id: NodeId, rendered: &NsBinding) {
        match self.doc.kind(id) {
            NodeKind::Element { .. } => self.process_element(id, rendered),
            _ => {
                if self.is_rendered_leaf(id) {
                    self.process_leaf(id);
                }
            }
        }
    }

    /// Renders an element, or only its selected attributes and descendants
    /// when the element itself is outside the selection.
    fn process_element(&mut self, id: NodeId, rendered: &NsBinding) {
        let doc = self.doc;
        let mut attributes: Vec<RenderedAttribute> = doc
            .attributes(id)
            .iter()
            .filter(|&&attr| self.selection.contains(attr))
            .map(|&attr| RenderedAttribute::of(doc, attr))
            .collect();

        if !self.selection.contains(id) {
            sort_attributes(&mut attributes);
            for attr in &attributes {
                write_attribute(&mut self.output, attr);
            }
            for child in doc.children(id) {
                self.process_node(child, rendered);
            }
            return;
        }

        let mut scope = rendered.clone();
        let namespaces = if self.exclusive {
            self.exclusive_namespaces(id, &attributes, &mut scope)
        } else {
            attributes.extend(self.inherited_xml_attributes(id));
            self.inclusive_namespaces(id, &mut scope)
        };
        sort_attributes(&mut attributes);

        let qname = doc.qualified_name(id).unwrap_or_default();
        self.output.push('<');
        self.output.push_str(&qname);
        for (prefix, uri) in &namespaces {
            if prefix.is_empty() {
                self.output.push_str(" xmlns=\"");
            } else {
                self.output.push_str(" xmlns:");
                self.output.push_str(prefix);
                self.output.push_str("=\"");
            }
            write_c14n_attr_value(&mut self.output, uri);
            self.output.push('"');
        }
        for attr in &attributes {
            write_attribute(&mut self.output, attr);
        }
        self.output.push('>');

        for child in doc.children(id) {
            self.process_node(child, &scope);
        }

        self.output.push_str("</");
        self.output.push_str(&qname);
        self.output.push('>');
    }

    /// Inclusive C14N: every selected namespace node whose binding differs
    /// from what the output ancestors rendered, plus `xmlns=""` when an
    /// output ancestor rendered a non-empty default the element lacks.
    fn inclusive_namespaces(&self, id: NodeId, scope: &mut NsBinding) -> Vec<(String, String)> {
        let mut to_render = Vec::new();
        let mut has_default = false;

        for (prefix, uri) in self.doc.in_scope_namespaces(id) {
            if !self.selection.contains_namespace(id, &prefix) {
                continue;
            }
            if prefix.is_empty() {
                has_default = true;
            }
            if scope.get(&prefix) != Some(&uri) {
                scope.insert(prefix.clone(), uri.clone());
                to_render.push((prefix, uri));
            }
        }

        if !has_default && scope.get("").is_some_and(|uri| !uri.is_empty()) {
            scope.insert(String::new(), String::new());
            to_render.push((String::new(), String::new()));
        }

        to_render.sort_by(|a, b| a.0.cmp(&b.0));
        to_render
    }

    /// Exclusive C14N: only visibly utilized prefixes and the inclusive
    /// prefix list, when their binding differs from what the output
    /// ancestors rendered.
    fn exclusive_namespaces(
        &self,
        id: NodeId,
        attributes: &[RenderedAttribute],
        scope: &mut NsBinding,
    ) -> Vec<(String, String)> {
        let doc = self.doc;
        let mut utilized = NsBinding::new();

        let element_prefix = doc.prefix(id).unwrap_or_default();
        if element_prefix != "xml" {
            utilized.insert(
                element_prefix.to_string(),
                doc.namespace_uri(id).unwrap_or_default().to_string(),
            );
        }
        for attr in attributes {
            if let Some((prefix, _)) = attr.qname.split_once(':') {
                if prefix != "xml" {
                    utilized.insert(prefix.to_string(), attr.namespace.clone());
                }
            }
        }
        if !self.inclusive_prefixes.is_empty() {
            let in_scope = doc.in_scope_namespaces(id);
            for prefix in self.inclusive_prefixes {
                if let Some(uri) = in_scope.get(prefix) {
                    if self.selection.contains_namespace(id, prefix) {
                        utilized.entry(prefix.clone()).or_insert_with(|| uri.clone());
                    }
                }
            }
        }

        let mut to_render = Vec::new();
        for (prefix, uri) in utilized {
            let current = scope.get(&prefix).map_or("", String::as_str);
            if current != uri {
                scope.insert(prefix.clone(), uri.clone());
                to_render.push((prefix, uri));
            }
        }
        to_render
    }

    /// `xml:*` attributes of ancestors between the element and its nearest
    /// output ancestor, nearest first, unless the element has its own.
    fn inherited_xml_attributes(&self, id: NodeId) -> Vec<RenderedAttribute> {
        let doc = self.doc;
        let own: Vec<&str> = doc
            .attributes(id)
            .iter()
            .filter(|&&a| doc.namespace_uri(a) == Some(XML_NAMESPACE))
            .filter_map(|&a| doc.local_name(a))
            .collect();

        let mut inherited: Vec<RenderedAttribute> = Vec::new();
        for ancestor in doc.ancestors(id).skip(1).filter(|&a| doc.is_element(a)) {
            if self.selection.contains(ancestor) {
                break;
            }
            for &attr in doc.attributes(ancestor) {
                if doc.namespace_uri(attr) != Some(XML_NAMESPACE) {
                    continue;
                }
                let Some(local) = doc.local_name(attr) else {
                    continue;
                };
                if own.contains(&local) || inherited.iter().any(|i| i.local_name == local) {
                    continue;
                }
                inherited.push(RenderedAttribute::of(doc, attr));
            }
        }
        inherited
    }
}

fn sort_attributes(attributes: &mut [RenderedAttribute]) {
    attributes.sort_by(|a, b| {
        a.namespace
            .cmp(&b.namespace)
            .then_with(|| a.local_name.cmp(&b.local_name))
    });
}

fn write_attribute(out: &mut String, attr: &RenderedAttribute) {
    out.push(' ');
    out.push_str(&attr.qname);
    out.push_str("=\"");
    write_c14n_attr_value(out, &attr.value);
    out.push('"');
}

/// Writes a processing instruction in C14N form.
fn write_c14n_pi(out: &mut String, target: &str, data: &str) {
    out.push_str("<?");
    out.push_str(target);
    if !data.is_empty() {
        out.push(' ');
        out.push_str(data);
    }
    out.push_str("?>");
}

/// Writes a comment in C14N form.
fn write_c14n_comment(out: &mut String, content: &str) {
    out.push_str("<!--");
    out.push_str(content);
    out.push_str("-->");
}

/// Escapes text content per C14N rules.
///
/// C14N text escaping: `&` -> `&amp;`, `<` -> `&lt;`, `>` -> `&gt;`,
/// `\r` -> `&#xD;`
fn write_c14n_text(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(ch),
        }
    }
}

/// Escapes an attribute value per C14N rules.
///
/// C14N attribute value escaping: `&` -> `&amp;`, `<` -> `&lt;`,
/// `"` -> `&quot;`, `\t` -> `&#x9;`, `\n` -> `&#xA;`, `\r` -> `&#xD;`
fn write_c14n_attr_value(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(ch),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::tree::{AttributeType, NodeRef};
    use pretty_assertions::assert_eq;

    fn c14n(xml: &str) -> String {
        let doc = Document::parse_str(xml).unwrap();
        canonicalize(&doc, &C14nOptions::default())
    }

    fn c14n_with(xml: &str, algorithm: Algorithm) -> String {
        let doc = Document::parse_str(xml).unwrap();
        canonicalize(&doc, &C14nOptions::default().algorithm(algorithm))
    }

    fn exclusive_node(doc: &Document, node: NodeId, prefixes: &str) -> String {
        let options = C14nOptions::default()
            .algorithm(Algorithm::ExclusiveCanonical)
            .inclusive_prefixes(prefixes);
        canonicalize_node(doc, node, &options).unwrap()
    }

    #[test]
    fn test_c14n_empty_element_uses_start_end_tags() {
        assert_eq!(c14n("<root/>"), "<root></root>");
        assert_eq!(c14n("<root><child/></root>"), "<root><child></child></root>");
    }

    #[test]
    fn test_c14n_attribute_sorting() {
        assert_eq!(
            c14n("<root z=\"1\" a=\"2\" m=\"3\"/>"),
            "<root a=\"2\" m=\"3\" z=\"1\"></root>"
        );
    }

    #[test]
    fn test_c14n_namespace_declaration_ordering() {
        let result = c14n("<root xmlns:z=\"http://z.example\" xmlns:a=\"http://a.example\"/>");
        assert_eq!(
            result,
            "<root xmlns:a=\"http://a.example\" xmlns:z=\"http://z.example\"></root>"
        );
    }

    #[test]
    fn test_c14n_text_content_escaping() {
        let mut doc = Document::new();
        let elem = doc.create_element("root", "").unwrap();
        let text = doc.create_text("a & b < c > d\re").unwrap();
        doc.append_child(doc.root(), elem).unwrap();
        doc.append_child(elem, text).unwrap();
        assert_eq!(
            canonicalize(&doc, &C14nOptions::default()),
            "<root>a &amp; b &lt; c &gt; d&#xD;e</root>"
        );
    }

    #[test]
    fn test_c14n_attribute_value_escaping() {
        let mut doc = Document::new();
        let elem = doc.create_element("root", "").unwrap();
        doc.set_attribute_value(elem, "val", "", "a&b<c\"d\te\nf\rg>").unwrap();
        doc.append_child(doc.root(), elem).unwrap();
        assert_eq!(
            canonicalize(&doc, &C14nOptions::default()),
            "<root val=\"a&amp;b&lt;c&quot;d&#x9;e&#xA;f&#xD;g>\"></root>"
        );
    }

    #[test]
    fn test_c14n_tokenized_attribute_collapsed() {
        let mut doc = Document::new();
        let elem = doc.create_element("root", "").unwrap();
        let attr = doc
            .create_attribute("tokens", "", "  a   b  ", AttributeType::NmTokens)
            .unwrap();
        doc.set_attribute(elem, attr).unwrap();
        doc.set_attribute_value(elem, "plain", "", "  a   b  ").unwrap();
        doc.append_child(doc.root(), elem).unwrap();
        assert_eq!(
            canonicalize(&doc, &C14nOptions::default()),
            "<root plain=\"  a   b  \" tokens=\"a b\"></root>"
        );
    }

    #[test]
    fn test_c14n_no_xml_declaration_or_doctype() {
        let result = c14n("<?xml version=\"1.0\"?><!DOCTYPE root [<!ENTITY e \"x\">]><root>&e;</root>");
        assert_eq!(result, "<root>x</root>");
    }

    #[test]
    fn test_c14n_cdata_replaced_with_escaped_text() {
        assert_eq!(c14n("<root><![CDATA[a<b & c]]></root>"), "<root>a&lt;b &amp; c</root>");
    }

    #[test]
    fn test_c14n_comments_by_algorithm() {
        let xml = "<!--pre--><root><!-- inner --></root><!--post-->";
        assert_eq!(
            c14n_with(xml, Algorithm::CanonicalWithComments),
            "<!--pre-->\n<root><!-- inner --></root>\n<!--post-->"
        );
        assert_eq!(c14n_with(xml, Algorithm::Canonical), "<root></root>");
        assert_eq!(c14n_with(xml, Algorithm::ExclusiveCanonical), "<root></root>");
    }

    #[test]
    fn test_c14n_document_comments_and_pis_spacing() {
        let result = c14n("<?before?><root><?inner data ?></root><?after x?>");
        assert_eq!(result, "<?before?>\n<root><?inner data ?></root>\n<?after x?>");
    }

    #[test]
    fn test_c14n_redundant_namespace_not_redeclared() {
        let result = c14n(
            "<root xmlns=\"http://example.com\">\
             <child xmlns=\"http://example.com\"/></root>",
        );
        assert_eq!(result, "<root xmlns=\"http://example.com\"><child></child></root>");
    }

    #[test]
    fn test_c14n_default_namespace_undeclared() {
        let result = c14n("<a xmlns=\"urn:a\"><b xmlns=\"\"><c/></b></a>");
        assert_eq!(result, "<a xmlns=\"urn:a\"><b xmlns=\"\"><c></c></b></a>");
        assert_eq!(c14n("<a xmlns=\"\"><b/></a>"), "<a><b></b></a>");
    }

    #[test]
    fn test_c14n_mixed_namespace_and_regular_attrs() {
        let result =
            c14n("<root xmlns:b=\"http://b\" xmlns:a=\"http://a\" b:y=\"1\" a:x=\"2\" c=\"3\"/>");
        assert_eq!(
            result,
            "<root xmlns:a=\"http://a\" xmlns:b=\"http://b\" c=\"3\" a:x=\"2\" b:y=\"1\"></root>"
        );
    }

    #[test]
    fn test_c14n_subtree_inherits_namespaces_and_xml_attributes() {
        let doc = Document::parse_str(
            "<root xmlns:p=\"urn:p\" xml:lang=\"en\" xml:space=\"preserve\">\
             <child xml:lang=\"fr\" attr=\"value\">text</child></root>",
        )
        .unwrap();
        let child = doc.first_child(doc.root_element().unwrap()).unwrap();
        let result = canonicalize_node(&doc, child, &C14nOptions::default()).unwrap();
        assert_eq!(
            result,
            "<child xmlns:p=\"urn:p\" attr=\"value\" xml:lang=\"fr\" xml:space=\"preserve\">text</child>"
        );
    }

    #[test]
    fn test_c14n_exclusive_namespace_scoping() {
        let doc = Document::parse_str(
            "<root xmlns:a=\"http://a.example\" xmlns:b=\"http://b.example\">\
             <a:child/></root>",
        )
        .unwrap();
        let child = doc.first_child(doc.root_element().unwrap()).unwrap();
        assert_eq!(
            exclusive_node(&doc, child, ""),
            "<a:child xmlns:a=\"http://a.example\"></a:child>"
        );
    }

    #[test]
    fn test_c14n_exclusive_with_inclusive_prefixes() {
        let doc = Document::parse_str(
            "<root xmlns:a=\"http://a\" xmlns:b=\"http://b\" xmlns=\"urn:d\">\
             <x:child xmlns:x=\"urn:x\"/></root>",
        )
        .unwrap();
        let child = doc.first_child(doc.root_element().unwrap()).unwrap();
        assert_eq!(
            exclusive_node(&doc, child, "b #default"),
            "<x:child xmlns=\"urn:d\" xmlns:b=\"http://b\" xmlns:x=\"urn:x\"></x:child>"
        );
    }

    #[test]
    fn test_c14n_exclusive_redeclares_only_changes() {
        let doc = Document::parse_str(
            "<p:a xmlns:p=\"urn:p\"><p:b><p:c xmlns:p=\"urn:q\"/></p:b></p:a>",
        )
        .unwrap();
        let result = canonicalize(&doc, &C14nOptions::default().algorithm(Algorithm::ExclusiveCanonical));
        assert_eq!(
            result,
            "<p:a xmlns:p=\"urn:p\"><p:b><p:c xmlns:p=\"urn:q\"></p:c></p:b></p:a>"
        );
    }

    #[test]
    fn test_c14n_exclusive_default_undeclared_for_unqualified_child() {
        let doc = Document::parse_str("<a xmlns=\"urn:a\"><b xmlns=\"\"/></a>").unwrap();
        let result = canonicalize(&doc, &C14nOptions::default().algorithm(Algorithm::ExclusiveCanonical));
        assert_eq!(result, "<a xmlns=\"urn:a\"><b xmlns=\"\"></b></a>");
    }

    #[test]
    fn test_c14n_attribute_only_subset() {
        let doc = Document::parse_str("<doc a2=\"v2\" a1=\"v1\"><e a3=\"v3\"/></doc>").unwrap();
        let root = doc.root_element().unwrap();
        let set = NodeSet::from_nodes(&doc, doc.attributes(root).iter().copied());
        let result = canonicalize_subset(&doc, &set, &C14nOptions::default()).unwrap();
        assert_eq!(result, " a1=\"v1\" a2=\"v2\"");
    }

    #[test]
    fn test_c14n_subset_skips_unselected_elements() {
        let doc = Document::parse_str("<a><b><c>t</c></b></a>").unwrap();
        let a = doc.root_element().unwrap();
        let b = doc.first_child(a).unwrap();
        let c = doc.first_child(b).unwrap();
        let t = doc.first_child(c).unwrap();
        // Scrambled insertion order does not matter.
        let set = NodeSet::from_nodes(&doc, [t, a, c]);
        let result = canonicalize_subset(&doc, &set, &C14nOptions::default()).unwrap();
        assert_eq!(result, "<a><c>t</c></a>");
    }

    #[test]
    fn test_c14n_subset_ignores_detached_nodes() {
        let mut doc = Document::parse_str("<a/>").unwrap();
        let a = doc.root_element().unwrap();
        let loose = doc.create_element("loose", "").unwrap();
        let set = NodeSet::from_nodes(&doc, [a, loose]);
        let result = canonicalize_subset(&doc, &set, &C14nOptions::default()).unwrap();
        assert_eq!(result, "<a></a>");
    }

    #[test]
    fn test_c14n_subset_namespace_nodes() {
        let doc = Document::parse_str("<a xmlns:p=\"urn:p\" xmlns:q=\"urn:q\"><b/></a>").unwrap();
        let a = doc.root_element().unwrap();
        let b = doc.first_child(a).unwrap();
        let mut set = NodeSet::from_nodes(&doc, [b]);
        set.insert(NodeRef::Namespace { element: b, prefix: "q".to_string() });
        let result = canonicalize_subset(&doc, &set, &C14nOptions::default()).unwrap();
        assert_eq!(result, "<b xmlns:q=\"urn:q\"></b>");
    }

    #[test]
    fn test_c14n_foreign_node_set_rejected() {
        let doc = Document::parse_str("<a/>").unwrap();
        let other = Document::parse_str("<a/>").unwrap();
        let set = NodeSet::new(&other);
        assert!(matches!(
            canonicalize_subset(&doc, &set, &C14nOptions::default()),
            Err(C14nError::ForeignNodeSet)
        ));
    }

    #[test]
    fn test_c14n_detached_node_rejected() {
        let mut doc = Document::parse_str("<a/>").unwrap();
        let loose = doc.create_element("loose", "").unwrap();
        let err = canonicalize_node(&doc, loose, &C14nOptions::default()).unwrap_err();
        assert_eq!(err.to_string(), "cannot canonicalize a detached node");
    }

    #[test]
    fn test_c14n_node_from_larger_document_rejected() {
        let big = Document::parse_str("<a><b/><c/><d/><e/></a>").unwrap();
        let far = big.descendants(big.root()).last().unwrap();
        let small = Document::parse_str("<a/>").unwrap();
        assert!(small.get(far).is_none());

        let err = canonicalize_node(&small, far, &C14nOptions::default()).unwrap_err();
        assert!(matches!(err, C14nError::ForeignNode(id) if id == far));

        let mut c14n = Canonicalizer::new(Vec::new(), Algorithm::Canonical);
        assert!(matches!(c14n.write_node(&small, far), Err(C14nError::ForeignNode(_))));
        c14n.write_node(&small, small.root_element().unwrap()).unwrap();
        assert_eq!(c14n.into_inner(), b"<a></a>");
    }

    #[test]
    fn test_c14n_attribute_node() {
        let doc = Document::parse_str("<a k=\"x&amp;y\"/>").unwrap();
        let attr = doc.attributes(doc.root_element().unwrap())[0];
        let result = canonicalize_node(&doc, attr, &C14nOptions::default()).unwrap();
        assert_eq!(result, " k=\"x&amp;y\"");
    }

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_c14n_write_failure_is_reported() {
        let doc = Document::parse_str("<a/>").unwrap();
        let mut canonicalizer = Canonicalizer::new(FailingWriter, Algorithm::Canonical);
        assert!(matches!(canonicalizer.write_document(&doc), Err(C14nError::Io(_))));
        assert!(matches!(canonicalizer.write_document(&doc), Err(C14nError::Io(_))));
    }

    #[test]
    fn test_algorithm_uris_round_trip() {
        for alg in Algorithm::ALL {
            assert_eq!(Algorithm::from_uri(alg.uri()).unwrap(), alg);
        }
        assert!(Algorithm::ExclusiveCanonicalWithComments.with_comments());
        assert!(!Algorithm::CanonicalWithComments.is_exclusive());
    }
}
