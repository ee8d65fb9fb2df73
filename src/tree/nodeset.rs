//! Node sets: explicit selections of nodes from one document.
//!
//! A node set is what document-subset canonicalization consumes. Besides
//! ordinary nodes it can hold namespace nodes, which have no arena entry of
//! their own and are identified by their owning element and prefix.

use std::collections::{BTreeSet, HashMap, HashSet};

use super::{Document, NodeId};

/// One member of a [`NodeSet`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeRef {
    /// A node stored in the document arena (element, attribute, text, ...).
    Node(NodeId),
    /// The namespace node for `prefix` on `element`. The empty prefix is the
    /// default namespace.
    Namespace {
        /// The element the namespace node belongs to.
        element: NodeId,
        /// The bound prefix.
        prefix: String,
    },
}

/// An unordered selection of nodes belonging to a single document.
///
/// # Examples
///
/// ```
/// use xmlcore::{Document, NodeSet};
///
/// let doc = Document::parse_str("<a><b/></a>").unwrap();
/// let a = doc.root_element().unwrap();
/// let set = NodeSet::subtree(&doc, a);
/// assert!(set.contains(a));
/// assert!(set.contains(doc.first_child(a).unwrap()));
/// assert!(!set.contains(doc.root()));
/// ```
#[derive(Debug, Clone)]
pub struct NodeSet {
    document: u64,
    nodes: HashSet<NodeId>,
    namespaces: HashMap<NodeId, BTreeSet<String>>,
    order: Vec<NodeRef>,
}

impl NodeSet {
    /// Creates an empty node set bound to `doc`.
    #[must_use]
    pub fn new(doc: &Document) -> Self {
        Self {
            document: doc.identity(),
            nodes: HashSet::new(),
            namespaces: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Creates a set holding exactly the given arena nodes.
    #[must_use]
    pub fn from_nodes(doc: &Document, nodes: impl IntoIterator<Item = NodeId>) -> Self {
        let mut set = Self::new(doc);
        for node in nodes {
            set.insert(NodeRef::Node(node));
        }
        set
    }

    /// Creates the set of `node`, all its descendants, all their attributes
    /// and all their in-scope namespace nodes.
    #[must_use]
    pub fn subtree(doc: &Document, node: NodeId) -> Self {
        let mut set = Self::new(doc);
        for id in std::iter::once(node).chain(doc.descendants(node)) {
            set.insert(NodeRef::Node(id));
            if doc.is_element(id) {
                for &attr in doc.attributes(id) {
                    set.insert(NodeRef::Node(attr));
                }
                set.insert_namespaces_of(doc, id);
            }
        }
        set
    }

    /// Adds a namespace node for every binding in scope at `element`,
    /// including the implicit `xml` binding.
    pub fn insert_namespaces_of(&mut self, doc: &Document, element: NodeId) {
        let mut prefixes: Vec<String> = doc.in_scope_namespaces(element).into_keys().collect();
        prefixes.push("xml".to_string());
        for prefix in prefixes {
            self.insert(NodeRef::Namespace { element, prefix });
        }
    }

    /// Adds a member. Returns `false` if it was already present.
    pub fn insert(&mut self, node: NodeRef) -> bool {
        let added = match &node {
            NodeRef::Node(id) => self.nodes.insert(*id),
            NodeRef::Namespace { element, prefix } => self
                .namespaces
                .entry(*element)
                .or_default()
                .insert(prefix.clone()),
        };
        if added {
            self.order.push(node);
        }
        added
    }

    /// Returns `true` if the arena node is a member.
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains(&id)
    }

    /// Returns `true` if the namespace node for `prefix` on `element` is a
    /// member.
    #[must_use]
    pub fn contains_namespace(&self, element: NodeId, prefix: &str) -> bool {
        self.namespaces
            .get(&element)
            .is_some_and(|prefixes| prefixes.contains(prefix))
    }

    /// Returns the number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` if the set has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Iterates over the members in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &NodeRef> {
        self.order.iter()
    }

    /// Returns the identity of the document this set belongs to.
    #[must_use]
    pub fn document_identity(&self) -> u64 {
        self.document
    }

    /// Returns `true` if this set was built for `doc`.
    #[must_use]
    pub fn belongs_to(&self, doc: &Document) -> bool {
        self.document == doc.identity()
    }
}
