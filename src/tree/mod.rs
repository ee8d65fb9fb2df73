//! Arena-based XML document tree.
//!
//! All nodes live in a contiguous `Vec<NodeData>` owned by the `Document`
//! and are referenced by `NodeId`, a newtype over `NonZeroU32`. Navigation
//! links (parent, first\_child, last\_child, next\_sibling, prev\_sibling)
//! are arena indices, so there are no reference cycles and dropping the
//! `Document` frees everything at once.
//!
//! # Checked mutation
//!
//! Every public constructor runs the [`crate::verifier`] over the names,
//! text and URIs it receives, and every public linking operation rejects
//! changes that would break the tree: a node becoming its own ancestor, a
//! second root element, or a child kind its parent cannot hold. A tree
//! built through this API is therefore always namespace-well-formed.
//!
//! Attributes are nodes too. Their `parent` link points at the owning
//! element, but they are kept in the element's attribute list rather than
//! in its child list.

mod node;
mod nodeset;

pub use node::{collapse_whitespace, AttributeType, NodeKind};
pub use nodeset::{NodeRef, NodeSet};

use std::collections::BTreeMap;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{ParseError, TreeError, VerifyError};
use crate::util::qname::check_qname;
use crate::util::uri::resolve_uri;
use crate::verifier::{self, XML_NAMESPACE};

/// A typed index into the document's node arena.
///
/// `NodeId` is a newtype over `NonZeroU32`, meaning it can never be zero
/// and `Option<NodeId>` has the same size as `NodeId` (niche optimization).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NodeId(NonZeroU32);

impl NodeId {
    #[allow(clippy::cast_possible_truncation)]
    fn from_index(index: usize) -> Self {
        Self(NonZeroU32::MIN.saturating_add(index.saturating_sub(1) as u32))
    }

    fn as_index(self) -> usize {
        self.0.get() as usize
    }
}

/// Storage for a single node in the document arena.
#[derive(Debug, Clone)]
pub struct NodeData {
    /// What kind of node this is and its payload.
    pub kind: NodeKind,
    /// Parent node, if any. For attributes this is the owning element.
    pub parent: Option<NodeId>,
    /// First child node.
    pub first_child: Option<NodeId>,
    /// Last child node (for O(1) append).
    pub last_child: Option<NodeId>,
    /// Next sibling.
    pub next_sibling: Option<NodeId>,
    /// Previous sibling.
    pub prev_sibling: Option<NodeId>,
}

impl NodeData {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            first_child: None,
            last_child: None,
            next_sibling: None,
            prev_sibling: None,
        }
    }
}

static NEXT_DOCUMENT_IDENTITY: AtomicU64 = AtomicU64::new(1);

fn next_identity() -> u64 {
    NEXT_DOCUMENT_IDENTITY.fetch_add(1, Ordering::Relaxed)
}

/// An XML document.
///
/// The `Document` owns all nodes in an arena and provides methods for tree
/// navigation and mutation. Navigation goes through `&Document`, mutation
/// through `&mut Document`.
///
/// # Examples
///
/// ```
/// use xmlcore::Document;
///
/// let doc = Document::parse_str("<root/>").unwrap();
/// let root = doc.root_element().unwrap();
/// assert_eq!(doc.local_name(root), Some("root"));
/// ```
#[derive(Debug)]
pub struct Document {
    /// The node arena. Index 0 is unused (placeholder for `NonZeroU32`).
    nodes: Vec<NodeData>,
    /// The document node id (not the root element).
    root: NodeId,
    /// Distinguishes this arena from every other one in the process, so
    /// node sets cannot be applied to the wrong document.
    identity: u64,
    /// The URI the document was loaded from, if known.
    pub base_uri: Option<String>,
    /// XML version from the XML declaration (e.g., "1.0").
    pub version: Option<String>,
    /// Encoding from the XML declaration (e.g., "UTF-8").
    pub encoding: Option<String>,
    /// Standalone flag from the XML declaration.
    pub standalone: Option<bool>,
}

impl Clone for Document {
    fn clone(&self) -> Self {
        Self {
            nodes: self.nodes.clone(),
            root: self.root,
            identity: next_identity(),
            base_uri: self.base_uri.clone(),
            version: self.version.clone(),
            encoding: self.encoding.clone(),
            standalone: self.standalone,
        }
    }
}

impl Document {
    /// Creates a new empty document containing only the document node.
    #[must_use]
    pub fn new() -> Self {
        let mut nodes = Vec::with_capacity(64);
        nodes.push(NodeData::new(NodeKind::Document));
        nodes.push(NodeData::new(NodeKind::Document));
        Self {
            nodes,
            root: NodeId::from_index(1),
            identity: next_identity(),
            base_uri: None,
            version: None,
            encoding: None,
            standalone: None,
        }
    }

    /// Parses an XML string into a `Document`.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` if the input is not namespace-well-formed XML.
    ///
    /// # Examples
    ///
    /// ```
    /// use xmlcore::Document;
    ///
    /// let doc = Document::parse_str("<root><child/></root>").unwrap();
    /// assert!(doc.root_element().is_some());
    /// ```
    pub fn parse_str(input: &str) -> Result<Self, ParseError> {
        crate::builder::Builder::new().build_str(input, None)
    }

    /// Parses XML from raw bytes, detecting the encoding automatically.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` if the encoding cannot be determined or the
    /// decoded text is not well-formed.
    pub fn parse_bytes(input: &[u8]) -> Result<Self, ParseError> {
        crate::builder::Builder::new().build_bytes(input, None)
    }

    /// Returns the process-unique identity of this document.
    #[must_use]
    pub fn identity(&self) -> u64 {
        self.identity
    }

    /// Returns the document node id.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Returns the root element of the document, if it has one.
    #[must_use]
    pub fn root_element(&self) -> Option<NodeId> {
        self.children(self.root).find(|&id| self.is_element(id))
    }

    /// Returns the document type declaration node, if any.
    #[must_use]
    pub fn doctype(&self) -> Option<NodeId> {
        self.children(self.root)
            .find(|&id| matches!(self.node(id).kind, NodeKind::DocumentType { .. }))
    }

    /// Returns a reference to the `NodeData` for the given node.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not allocated by this document.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.as_index()]
    }

    /// Like [`node`](Self::node), but `None` for an id outside this
    /// document's arena. An id from another document that happens to be in
    /// range is not detected.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&NodeData> {
        self.nodes.get(id.as_index())
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.as_index()]
    }

    /// Returns the payload of a node.
    #[must_use]
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    /// Returns `true` if the node is an element.
    #[must_use]
    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.node(id).kind, NodeKind::Element { .. })
    }

    /// Returns the local name of an element or attribute, or the target of
    /// a processing instruction.
    #[must_use]
    pub fn local_name(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Element { local_name, .. } | NodeKind::Attribute { local_name, .. } => {
                Some(local_name)
            }
            NodeKind::ProcessingInstruction { target, .. } => Some(target),
            _ => None,
        }
    }

    /// Returns the prefix of an element or attribute.
    #[must_use]
    pub fn prefix(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Element { prefix, .. } | NodeKind::Attribute { prefix, .. } => {
                prefix.as_deref()
            }
            _ => None,
        }
    }

    /// Returns the namespace URI of an element or attribute (empty for no
    /// namespace), or `None` for other node kinds.
    #[must_use]
    pub fn namespace_uri(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Element { namespace, .. } | NodeKind::Attribute { namespace, .. } => {
                Some(namespace)
            }
            _ => None,
        }
    }

    /// Returns the `prefix:local` name of an element or attribute.
    #[must_use]
    pub fn qualified_name(&self, id: NodeId) -> Option<String> {
        let local = match &self.node(id).kind {
            NodeKind::Element { local_name, .. } | NodeKind::Attribute { local_name, .. } => {
                local_name
            }
            _ => return None,
        };
        Some(match self.prefix(id) {
            Some(prefix) => format!("{prefix}:{local}"),
            None => local.clone(),
        })
    }

    /// Returns the string value carried directly by an attribute, text,
    /// comment or processing-instruction node.
    #[must_use]
    pub fn value(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Attribute { value, .. } => Some(value),
            NodeKind::Text { content } | NodeKind::Comment { content } => Some(content),
            NodeKind::ProcessingInstruction { data, .. } => Some(data),
            _ => None,
        }
    }

    /// Returns the concatenated text content of a node and its descendants.
    #[must_use]
    pub fn text_content(&self, id: NodeId) -> String {
        let mut result = String::new();
        self.collect_text(id, &mut result);
        result
    }

    fn collect_text(&self, id: NodeId, buf: &mut String) {
        match &self.node(id).kind {
            NodeKind::Text { content } => buf.push_str(content),
            NodeKind::Attribute { value, .. } => buf.push_str(value),
            _ => {
                for child in self.children(id) {
                    self.collect_text(child, buf);
                }
            }
        }
    }

    // --- Attributes ---

    /// Returns the attribute nodes of an element (empty for other kinds).
    #[must_use]
    pub fn attributes(&self, id: NodeId) -> &[NodeId] {
        match &self.node(id).kind {
            NodeKind::Element { attributes, .. } => attributes,
            _ => &[],
        }
    }

    /// Finds an attribute by local name and namespace URI.
    #[must_use]
    pub fn attribute_node(&self, element: NodeId, local: &str, namespace: &str) -> Option<NodeId> {
        self.attributes(element).iter().copied().find(|&attr| {
            matches!(
                &self.node(attr).kind,
                NodeKind::Attribute { local_name, namespace: ns, .. }
                    if local_name == local && ns == namespace
            )
        })
    }

    /// Returns the value of an attribute by local name and namespace URI.
    #[must_use]
    pub fn attribute_ns(&self, element: NodeId, local: &str, namespace: &str) -> Option<&str> {
        self.attribute_node(element, local, namespace)
            .and_then(|attr| self.value(attr))
    }

    /// Returns the value of a no-namespace attribute.
    #[must_use]
    pub fn attribute(&self, element: NodeId, local: &str) -> Option<&str> {
        self.attribute_ns(element, local, "")
    }

    /// Returns the declared type of an attribute node.
    #[must_use]
    pub fn attribute_type(&self, attr: NodeId) -> Option<AttributeType> {
        match &self.node(attr).kind {
            NodeKind::Attribute { attribute_type, .. } => Some(*attribute_type),
            _ => None,
        }
    }

    /// Returns `true` if the attribute node is ID-typed or is `xml:id`.
    #[must_use]
    pub fn is_id_attribute(&self, attr: NodeId) -> bool {
        match &self.node(attr).kind {
            NodeKind::Attribute {
                local_name,
                namespace,
                attribute_type,
                ..
            } => {
                *attribute_type == AttributeType::Id
                    || (local_name == "id" && namespace == XML_NAMESPACE)
            }
            _ => false,
        }
    }

    /// Finds the first element, in document order, that carries an ID
    /// attribute with the given value.
    #[must_use]
    pub fn element_by_id(&self, value: &str) -> Option<NodeId> {
        self.element_by_id_from(self.root, value)
    }

    /// Like [`element_by_id`](Self::element_by_id), restricted to `start`
    /// and its descendants.
    #[must_use]
    pub fn element_by_id_from(&self, start: NodeId, value: &str) -> Option<NodeId> {
        std::iter::once(start)
            .chain(self.descendants(start))
            .filter(|&id| self.is_element(id))
            .find(|&element| {
                self.attributes(element).iter().any(|&attr| {
                    self.is_id_attribute(attr) && self.value(attr) == Some(value)
                })
            })
    }

    // --- Navigation ---

    /// Returns the parent of a node.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Returns the first child of a node.
    #[must_use]
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).first_child
    }

    /// Returns the last child of a node.
    #[must_use]
    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).last_child
    }

    /// Returns the next sibling of a node.
    #[must_use]
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).next_sibling
    }

    /// Returns the previous sibling of a node.
    #[must_use]
    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).prev_sibling
    }

    /// Returns an iterator over the children of a node.
    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            doc: self,
            next: self.node(id).first_child,
        }
    }

    /// Returns an iterator over a node and its ancestors (walking up to root).
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            doc: self,
            next: Some(id),
        }
    }

    /// Returns an iterator over all descendants of a node (depth-first).
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        Descendants {
            doc: self,
            root: id,
            next: self.first_child(id),
        }
    }

    /// Returns `true` if `ancestor` is `node` or one of its ancestors.
    #[must_use]
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.ancestors(node).any(|a| a == ancestor)
    }

    /// Returns `true` if the node is reachable from the document node.
    #[must_use]
    pub fn is_attached(&self, id: NodeId) -> bool {
        self.is_ancestor_or_self(self.root, id)
    }

    // --- Checked construction ---

    pub(crate) fn create_node(&mut self, kind: NodeKind) -> NodeId {
        let index = self.nodes.len();
        self.nodes.push(NodeData::new(kind));
        NodeId::from_index(index)
    }

    /// Creates a detached element from a qualified name and namespace URI.
    ///
    /// # Errors
    ///
    /// Returns `TreeError::Verify` if the name is not a legal `QName`, the
    /// prefix is reserved, or the namespace URI cannot be bound to it.
    ///
    /// # Examples
    ///
    /// ```
    /// use xmlcore::Document;
    ///
    /// let mut doc = Document::new();
    /// let rect = doc.create_element("svg:rect", "http://www.w3.org/2000/svg").unwrap();
    /// assert_eq!(doc.prefix(rect), Some("svg"));
    /// assert!(doc.create_element("svg:rect", "").is_err());
    /// ```
    pub fn create_element(&mut self, qname: &str, namespace: &str) -> Result<NodeId, TreeError> {
        let (prefix, local) = check_qname(qname)?;
        let prefix = prefix.unwrap_or("");
        verifier::check_namespace_uri(prefix, namespace)?;
        Ok(self.create_node(NodeKind::Element {
            local_name: local.to_string(),
            prefix: (!prefix.is_empty()).then(|| prefix.to_string()),
            namespace: namespace.to_string(),
            attributes: Vec::new(),
            namespace_declarations: Vec::new(),
        }))
    }

    /// Creates a detached attribute.
    ///
    /// # Errors
    ///
    /// Returns `TreeError::Verify` for an illegal name, an unprefixed name
    /// in a namespace, an `xmlns` name, an unbindable namespace, or a value
    /// containing characters XML does not allow.
    pub fn create_attribute(
        &mut self,
        qname: &str,
        namespace: &str,
        value: &str,
        attribute_type: AttributeType,
    ) -> Result<NodeId, TreeError> {
        let (prefix, local) = check_qname(qname)?;
        match prefix {
            None if qname == "xmlns" => {
                return Err(VerifyError::name(qname, "xmlns is a namespace declaration, not an attribute").into());
            }
            None if !namespace.is_empty() => {
                return Err(VerifyError::name(qname, "unprefixed attributes cannot be in a namespace").into());
            }
            None => {}
            Some(prefix) => {
                verifier::check_namespace_uri(prefix, namespace)?;
            }
        }
        verifier::check_character_data(value)?;
        Ok(self.create_node(NodeKind::Attribute {
            local_name: local.to_string(),
            prefix: prefix.map(str::to_string),
            namespace: namespace.to_string(),
            value: value.to_string(),
            attribute_type,
        }))
    }

    /// Creates a detached text node.
    ///
    /// # Errors
    ///
    /// Returns `TreeError::Verify` if the text holds an illegal character.
    pub fn create_text(&mut self, content: &str) -> Result<NodeId, TreeError> {
        verifier::check_character_data(content)?;
        Ok(self.create_node(NodeKind::Text {
            content: content.to_string(),
        }))
    }

    /// Creates a detached comment.
    ///
    /// # Errors
    ///
    /// Returns `TreeError::Verify` if the content contains `--`, ends in
    /// `-`, or holds an illegal character.
    pub fn create_comment(&mut self, content: &str) -> Result<NodeId, TreeError> {
        verifier::check_comment_data(content)?;
        Ok(self.create_node(NodeKind::Comment {
            content: content.to_string(),
        }))
    }

    /// Creates a detached processing instruction.
    ///
    /// # Errors
    ///
    /// Returns `TreeError::Verify` for a reserved or malformed target or
    /// data containing `?>`.
    pub fn create_processing_instruction(
        &mut self,
        target: &str,
        data: &str,
    ) -> Result<NodeId, TreeError> {
        verifier::check_pi_target(target)?;
        verifier::check_pi_data(data)?;
        Ok(self.create_node(NodeKind::ProcessingInstruction {
            target: target.to_string(),
            data: data.to_string(),
        }))
    }

    /// Creates a detached document type declaration.
    ///
    /// # Errors
    ///
    /// Returns `TreeError::Verify` for an illegal root name or identifier.
    pub fn create_doctype(
        &mut self,
        root_name: &str,
        public_id: Option<&str>,
        system_id: Option<&str>,
    ) -> Result<NodeId, TreeError> {
        verifier::check_name(root_name)?;
        if let Some(public_id) = public_id {
            verifier::check_public_id(public_id)?;
        }
        if let Some(system_id) = system_id {
            verifier::check_system_literal(system_id)?;
        }
        Ok(self.create_node(NodeKind::DocumentType {
            root_name: root_name.to_string(),
            public_id: public_id.map(str::to_string),
            system_id: system_id.map(str::to_string),
            internal_subset: None,
        }))
    }

    // --- Checked linking ---

    /// Appends `child` to the end of `parent`'s child list.
    ///
    /// # Errors
    ///
    /// Returns `TreeError` if `child` is attached, is `parent` or one of
    /// its ancestors, would be a second root element, or is not a kind
    /// `parent` may contain.
    ///
    /// # Examples
    ///
    /// ```
    /// use xmlcore::{Document, TreeError};
    ///
    /// let mut doc = Document::new();
    /// let outer = doc.create_element("outer", "").unwrap();
    /// let inner = doc.create_element("inner", "").unwrap();
    /// doc.append_child(doc.root(), outer).unwrap();
    /// doc.append_child(outer, inner).unwrap();
    /// doc.detach(outer);
    /// assert_eq!(doc.append_child(inner, outer), Err(TreeError::Cycle));
    /// ```
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        self.check_insertion(parent, child, None)?;
        self.link_append(parent, child);
        Ok(())
    }

    /// Inserts `new_child` immediately before `reference`.
    ///
    /// # Errors
    ///
    /// Returns `TreeError::NoParent` if `reference` is detached, plus the
    /// same errors as [`append_child`](Self::append_child).
    pub fn insert_before(&mut self, reference: NodeId, new_child: NodeId) -> Result<(), TreeError> {
        let parent = self.parent(reference).ok_or(TreeError::NoParent)?;
        if matches!(self.node(reference).kind, NodeKind::Attribute { .. }) {
            return Err(TreeError::NoParent);
        }
        self.check_insertion(parent, new_child, None)?;
        self.link_before(reference, new_child);
        Ok(())
    }

    /// Replaces `old` with `new` in `old`'s parent.
    ///
    /// # Errors
    ///
    /// Returns `TreeError::NoParent` if `old` is detached, plus the same
    /// errors as [`append_child`](Self::append_child).
    pub fn replace_child(&mut self, old: NodeId, new: NodeId) -> Result<(), TreeError> {
        let parent = self.parent(old).ok_or(TreeError::NoParent)?;
        if old == new {
            return Ok(());
        }
        self.check_insertion(parent, new, Some(old))?;
        self.link_before(old, new);
        self.detach(old);
        Ok(())
    }

    fn check_insertion(
        &self,
        parent: NodeId,
        child: NodeId,
        replacing: Option<NodeId>,
    ) -> Result<(), TreeError> {
        if self.parent(child).is_some() {
            return Err(TreeError::AlreadyAttached);
        }
        if self.is_ancestor_or_self(child, parent) {
            return Err(TreeError::Cycle);
        }
        let parent_kind = &self.node(parent).kind;
        let child_kind = &self.node(child).kind;
        let illegal = || TreeError::IllegalChild {
            parent: parent_kind.kind_name(),
            child: child_kind.kind_name(),
        };
        match (parent_kind, child_kind) {
            (_, NodeKind::Document | NodeKind::Attribute { .. })
            | (NodeKind::Document, NodeKind::Text { .. })
            | (NodeKind::Element { .. }, NodeKind::DocumentType { .. }) => Err(illegal()),
            (NodeKind::Document, NodeKind::Element { .. }) => match self.root_element() {
                Some(existing) if Some(existing) != replacing => {
                    Err(TreeError::MultipleRootElements)
                }
                _ => Ok(()),
            },
            (NodeKind::Document, NodeKind::DocumentType { .. }) => match self.doctype() {
                Some(existing) if Some(existing) != replacing => Err(illegal()),
                _ => Ok(()),
            },
            (NodeKind::Document | NodeKind::Element { .. }, _) => Ok(()),
            _ => Err(illegal()),
        }
    }

    pub(crate) fn link_append(&mut self, parent: NodeId, child: NodeId) {
        self.node_mut(child).parent = Some(parent);

        if let Some(last) = self.node(parent).last_child {
            self.node_mut(last).next_sibling = Some(child);
            self.node_mut(child).prev_sibling = Some(last);
            self.node_mut(parent).last_child = Some(child);
        } else {
            self.node_mut(parent).first_child = Some(child);
            self.node_mut(parent).last_child = Some(child);
        }
    }

    pub(crate) fn link_before(&mut self, reference: NodeId, new_child: NodeId) {
        let Some(parent) = self.node(reference).parent else {
            return;
        };
        self.node_mut(new_child).parent = Some(parent);

        if let Some(prev) = self.node(reference).prev_sibling {
            self.node_mut(prev).next_sibling = Some(new_child);
            self.node_mut(new_child).prev_sibling = Some(prev);
        } else {
            self.node_mut(parent).first_child = Some(new_child);
        }

        self.node_mut(new_child).next_sibling = Some(reference);
        self.node_mut(reference).prev_sibling = Some(new_child);
    }

    /// Detaches a node from its parent. The node stays allocated and can be
    /// re-attached. Detaching an attribute removes it from its element.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.node(id).parent else {
            return;
        };

        if matches!(self.node(id).kind, NodeKind::Attribute { .. }) {
            if let NodeKind::Element { attributes, .. } = &mut self.node_mut(parent).kind {
                attributes.retain(|&a| a != id);
            }
            self.node_mut(id).parent = None;
            return;
        }

        let prev = self.node(id).prev_sibling;
        let next = self.node(id).next_sibling;

        match prev {
            Some(p) => self.node_mut(p).next_sibling = next,
            None => self.node_mut(parent).first_child = next,
        }

        match next {
            Some(n) => self.node_mut(n).prev_sibling = prev,
            None => self.node_mut(parent).last_child = prev,
        }

        let data = self.node_mut(id);
        data.parent = None;
        data.prev_sibling = None;
        data.next_sibling = None;
    }

    // --- Attributes and namespace declarations ---

    /// Attaches a detached attribute node to `element`, replacing any
    /// attribute with the same local name and namespace URI. Returns the
    /// replaced attribute, now detached.
    ///
    /// # Errors
    ///
    /// Returns `TreeError::NotAnElement`, `TreeError::AlreadyAttached`, or
    /// `TreeError::NamespaceConflict` when the attribute's prefix is bound
    /// to a different namespace on this element.
    pub fn set_attribute(
        &mut self,
        element: NodeId,
        attr: NodeId,
    ) -> Result<Option<NodeId>, TreeError> {
        if !self.is_element(element) {
            return Err(TreeError::NotAnElement);
        }
        if self.parent(attr).is_some() {
            return Err(TreeError::AlreadyAttached);
        }
        let NodeKind::Attribute {
            local_name,
            prefix,
            namespace,
            ..
        } = &self.node(attr).kind
        else {
            return Err(TreeError::IllegalChild {
                parent: "element",
                child: self.node(attr).kind.kind_name(),
            });
        };
        let (local_name, namespace) = (local_name.clone(), namespace.clone());
        let existing = self.attribute_node(element, &local_name, &namespace);
        if let Some(prefix) = prefix.clone() {
            if prefix != "xml" {
                self.check_binding(element, &prefix, &namespace, existing)?;
            }
        }

        self.node_mut(attr).parent = Some(element);
        if let NodeKind::Element { attributes, .. } = &mut self.node_mut(element).kind {
            match existing.and_then(|old| attributes.iter().position(|&a| a == old)) {
                Some(pos) => attributes[pos] = attr,
                None => attributes.push(attr),
            }
        }
        if let Some(old) = existing {
            self.node_mut(old).parent = None;
        }
        Ok(existing)
    }

    /// Creates an attribute and attaches it in one step.
    ///
    /// # Errors
    ///
    /// Propagates the errors of [`create_attribute`](Self::create_attribute)
    /// and [`set_attribute`](Self::set_attribute).
    pub fn set_attribute_value(
        &mut self,
        element: NodeId,
        qname: &str,
        namespace: &str,
        value: &str,
    ) -> Result<NodeId, TreeError> {
        let attr = self.create_attribute(qname, namespace, value, AttributeType::Undeclared)?;
        self.set_attribute(element, attr)?;
        Ok(attr)
    }

    /// Declares an additional namespace binding on `element`.
    ///
    /// # Errors
    ///
    /// Returns `TreeError::Verify` for an illegal prefix or URI and
    /// `TreeError::NamespaceConflict` if the element's own name or one of
    /// its attributes binds the prefix differently.
    pub fn add_namespace_declaration(
        &mut self,
        element: NodeId,
        prefix: &str,
        uri: &str,
    ) -> Result<(), TreeError> {
        if !self.is_element(element) {
            return Err(TreeError::NotAnElement);
        }
        verifier::check_namespace_prefix(prefix)?;
        verifier::check_namespace_uri(prefix, uri)?;
        if prefix == "xml" {
            return Ok(());
        }
        if let Some(existing) = self.implied_binding(element, prefix, None) {
            if existing != uri {
                return Err(TreeError::NamespaceConflict {
                    prefix: prefix.to_string(),
                    existing,
                    requested: uri.to_string(),
                });
            }
        }
        if let NodeKind::Element {
            namespace_declarations,
            ..
        } = &mut self.node_mut(element).kind
        {
            match namespace_declarations.iter_mut().find(|(p, _)| p == prefix) {
                Some(slot) => slot.1 = uri.to_string(),
                None => namespace_declarations.push((prefix.to_string(), uri.to_string())),
            }
        }
        Ok(())
    }

    /// Binding of `prefix` implied by the element's name or attributes,
    /// ignoring the attribute `skip`.
    fn implied_binding(&self, element: NodeId, prefix: &str, skip: Option<NodeId>) -> Option<String> {
        let NodeKind::Element {
            prefix: own_prefix,
            namespace,
            attributes,
            ..
        } = &self.node(element).kind
        else {
            return None;
        };
        if own_prefix.as_deref().unwrap_or("") == prefix {
            return Some(namespace.clone());
        }
        attributes
            .iter()
            .filter(|&&a| Some(a) != skip)
            .find(|&&a| self.prefix(a) == Some(prefix))
            .and_then(|&a| self.namespace_uri(a).map(str::to_string))
    }

    fn check_binding(
        &self,
        element: NodeId,
        prefix: &str,
        uri: &str,
        skip: Option<NodeId>,
    ) -> Result<(), TreeError> {
        let declared = match &self.node(element).kind {
            NodeKind::Element {
                namespace_declarations,
                ..
            } => namespace_declarations
                .iter()
                .find(|(p, _)| p == prefix)
                .map(|(_, u)| u.clone()),
            _ => None,
        };
        match self.implied_binding(element, prefix, skip).or(declared) {
            Some(existing) if existing != uri => Err(TreeError::NamespaceConflict {
                prefix: prefix.to_string(),
                existing,
                requested: uri.to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Returns the namespace bindings declared on `element` itself: its own
    /// name's binding, its prefixed attributes' bindings and any additional
    /// declarations, as `(prefix, uri)` pairs with no duplicate prefixes.
    /// An unprefixed element always contributes a default binding, which is
    /// empty for elements in no namespace.
    #[must_use]
    pub fn declared_namespaces(&self, element: NodeId) -> Vec<(String, String)> {
        let NodeKind::Element {
            prefix,
            namespace,
            attributes,
            namespace_declarations,
            ..
        } = &self.node(element).kind
        else {
            return Vec::new();
        };
        let mut bindings: Vec<(String, String)> =
            vec![(prefix.clone().unwrap_or_default(), namespace.clone())];
        let attribute_bindings = attributes.iter().filter_map(|&a| {
            let prefix = self.prefix(a).filter(|&p| p != "xml")?;
            Some((prefix.to_string(), self.namespace_uri(a)?.to_string()))
        });
        for (p, u) in attribute_bindings.chain(namespace_declarations.iter().cloned()) {
            if !bindings.iter().any(|(existing, _)| *existing == p) {
                bindings.push((p, u));
            }
        }
        bindings.retain(|(p, _)| p != "xml");
        bindings
    }

    /// Returns every namespace binding in scope at `element`, keyed by
    /// prefix (empty for the default namespace). An undeclared default
    /// namespace and the implicit `xml` binding are omitted.
    ///
    /// # Examples
    ///
    /// ```
    /// use xmlcore::Document;
    ///
    /// let doc = Document::parse_str(r#"<a xmlns:p="urn:p"><b xmlns="urn:d"/></a>"#).unwrap();
    /// let a = doc.root_element().unwrap();
    /// let b = doc.first_child(a).unwrap();
    /// let scope = doc.in_scope_namespaces(b);
    /// assert_eq!(scope.get("p").map(String::as_str), Some("urn:p"));
    /// assert_eq!(scope.get("").map(String::as_str), Some("urn:d"));
    /// ```
    #[must_use]
    pub fn in_scope_namespaces(&self, element: NodeId) -> BTreeMap<String, String> {
        let mut scope = BTreeMap::new();
        for ancestor in self.ancestors(element).filter(|&a| self.is_element(a)) {
            for (prefix, uri) in self.declared_namespaces(ancestor) {
                scope.entry(prefix).or_insert(uri);
            }
        }
        if scope.get("").is_some_and(String::is_empty) {
            scope.remove("");
        }
        scope
    }

    /// Resolves `prefix` at `element`, including the implicit `xml` prefix.
    #[must_use]
    pub fn lookup_namespace(&self, element: NodeId, prefix: &str) -> Option<String> {
        if prefix == "xml" {
            return Some(XML_NAMESPACE.to_string());
        }
        self.in_scope_namespaces(element).remove(prefix)
    }

    // --- Base URIs ---

    /// Returns the base URI in effect at `id`: the document's base URI
    /// combined with every `xml:base` attribute on the way down.
    #[must_use]
    pub fn base_uri_of(&self, id: NodeId) -> Option<String> {
        let mut chain = Vec::new();
        for ancestor in self.ancestors(id).filter(|&a| self.is_element(a)) {
            if let Some(base) = self.attribute_ns(ancestor, "base", XML_NAMESPACE) {
                chain.push(base);
                if crate::util::uri::is_absolute(base) {
                    break;
                }
            }
        }
        let mut base = self.base_uri.clone();
        for reference in chain.iter().rev() {
            base = Some(resolve_uri(base.as_deref(), reference));
        }
        base
    }

    // --- Copying ---

    /// Deep-copies `id` within this document and returns the detached copy.
    pub fn copy_subtree(&mut self, id: NodeId) -> NodeId {
        let kind = self.node(id).kind.clone();
        let copy = self.create_node(kind);
        self.copy_attributes_from(None, id, copy);
        let children: Vec<NodeId> = self.children(id).collect();
        for child in children {
            let child_copy = self.copy_subtree(child);
            self.link_append(copy, child_copy);
        }
        copy
    }

    /// Deep-copies a node of another document into this one and returns the
    /// detached copy.
    pub fn import_node(&mut self, source: &Document, id: NodeId) -> NodeId {
        let kind = source.node(id).kind.clone();
        let copy = self.create_node(kind);
        self.copy_attributes_from(Some(source), id, copy);
        for child in source.children(id) {
            let child_copy = self.import_node(source, child);
            self.link_append(copy, child_copy);
        }
        copy
    }

    /// Gives `copy` fresh attribute nodes mirroring those of `original`.
    fn copy_attributes_from(&mut self, source: Option<&Document>, original: NodeId, copy: NodeId) {
        let originals: Vec<NodeKind> = {
            let doc = source.unwrap_or(&*self);
            doc.attributes(original)
                .iter()
                .map(|&a| doc.node(a).kind.clone())
                .collect()
        };
        if originals.is_empty() {
            return;
        }
        let fresh: Vec<NodeId> = originals
            .into_iter()
            .map(|kind| {
                let attr = self.create_node(kind);
                self.node_mut(attr).parent = Some(copy);
                attr
            })
            .collect();
        if let NodeKind::Element { attributes, .. } = &mut self.node_mut(copy).kind {
            *attributes = fresh;
        }
    }

    /// Returns the total number of nodes in the arena, including detached
    /// ones (but not the placeholder).
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len() - 1
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

// --- Iterators ---

/// Iterator over the children of a node.
pub struct Children<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.doc.node(current).next_sibling;
        Some(current)
    }
}

/// Iterator over a node and its ancestors.
pub struct Ancestors<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.doc.node(current).parent;
        Some(current)
    }
}

/// Depth-first iterator over all descendants of a node.
pub struct Descendants<'a> {
    doc: &'a Document,
    root: NodeId,
    next: Option<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;

        if let Some(child) = self.doc.first_child(current) {
            self.next = Some(child);
            return Some(current);
        }

        if let Some(sibling) = self.doc.next_sibling(current) {
            self.next = Some(sibling);
            return Some(current);
        }

        let mut ancestor = self.doc.parent(current);
        while let Some(anc) = ancestor {
            if anc == self.root {
                self.next = None;
                return Some(current);
            }
            if let Some(sibling) = self.doc.next_sibling(anc) {
                self.next = Some(sibling);
                return Some(current);
            }
            ancestor = self.doc.parent(anc);
        }

        self.next = None;
        Some(current)
    }
}
