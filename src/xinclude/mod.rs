//! `XInclude` 1.0 processing.
//!
//! This module implements the [XML Inclusions (XInclude) 1.0](https://www.w3.org/TR/xinclude/)
//! specification. `XInclude` allows XML documents to reference and include content from
//! other XML or text resources using `xi:include` elements.
//!
//! # Overview
//!
//! `XInclude` processing replaces `<xi:include>` elements (in the
//! `http://www.w3.org/2001/XInclude` namespace) with the content they reference.
//! The `href` attribute specifies the URI of the resource to include, and the
//! `parse` attribute determines whether the content is included as parsed XML
//! (`parse="xml"`, the default) or as a text node (`parse="text"`). An
//! `xpointer` attribute selects part of an XML resource; without `href` it
//! selects from the including document itself.
//!
//! If a resource cannot be retrieved or the pointer selects nothing, the
//! processor uses the include's `<xi:fallback>` child instead. Without a
//! fallback, the error is returned. Structural mistakes (no location, a bad
//! `parse` value, misplaced or repeated fallbacks, inclusion loops) are
//! always fatal.
//!
//! # Design
//!
//! Resources come from a [`Fetcher`]. The default [`DefaultFetcher`] reads
//! local files and, with the `http` feature, web URLs; tests and embedders supply a [`MemoryFetcher`] or a closure.
//! Included XML is built with a [`Builder`] and has its own includes
//! resolved before it is copied in, with its URI pushed onto the stack of
//! documents being resolved so loops are caught before anything is fetched
//! twice.
//!
//! A failed [`XIncluder::resolve_in_place`] can leave the document
//! partially resolved. [`XIncluder::resolve`] works on a copy.

pub mod fetch;

use std::io;

use thiserror::Error;

use crate::builder::Builder;
use crate::encoding::{self, EncodingError};
use crate::error::{ParseError, TreeError};
use crate::tree::{Document, NodeId, NodeKind};
use crate::util::uri::{iri_to_uri, resolve_uri, strip_fragment};
use crate::verifier::XML_NAMESPACE;
use crate::xpointer::{self, XPointerError};

#[cfg(feature = "http")]
pub use fetch::HttpFetcher;
pub use fetch::{DefaultFetcher, FetchRequest, Fetcher, FileFetcher, MemoryFetcher, Resource};

/// The `XInclude` namespace URI.
///
/// All `xi:include` and `xi:fallback` elements must be in this namespace
/// for `XInclude` processing to recognize them.
pub const XINCLUDE_NS: &str = "http://www.w3.org/2001/XInclude";

/// The local name of the include element.
const INCLUDE_ELEMENT: &str = "include";

/// The local name of the fallback element.
const FALLBACK_ELEMENT: &str = "fallback";

/// Options for `XInclude` processing.
///
/// # Examples
///
/// ```
/// use xmlcore::xinclude::XIncludeOptions;
///
/// let opts = XIncludeOptions::default();
/// assert_eq!(opts.max_depth, 50);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XIncludeOptions {
    /// Maximum nesting depth for recursive includes.
    ///
    /// When an included document itself contains `xi:include` elements,
    /// processing recurses. Loop detection already stops cycles; this limit
    /// bounds long acyclic chains. The default is 50.
    pub max_depth: usize,
}

impl Default for XIncludeOptions {
    fn default() -> Self {
        Self { max_depth: 50 }
    }
}

impl XIncludeOptions {
    /// Sets the maximum nesting depth.
    #[must_use]
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

/// An error encountered during `XInclude` processing.
#[derive(Debug, Error)]
pub enum XIncludeError {
    /// The include element has neither `href` nor `xpointer`.
    #[error("xi:include must have an href or an xpointer attribute")]
    NoIncludeLocation,
    /// The `parse` attribute is neither `xml` nor `text`.
    #[error("parse attribute must be \"xml\" or \"text\", not {0:?}")]
    BadParseAttribute(String),
    /// An `xi:fallback` element is not a child of an `xi:include`.
    #[error("xi:fallback must be a child of xi:include")]
    MisplacedFallback,
    /// An include element has more than one `xi:fallback` child.
    #[error("xi:include has more than one xi:fallback child")]
    MultipleFallbacks,
    /// An include element has an XInclude child other than `xi:fallback`.
    #[error("xi:include cannot contain xi:{0}")]
    UnexpectedChild(String),
    /// The `href` carries a fragment identifier.
    #[error("href {0:?} must not contain a fragment identifier")]
    BadHref(String),
    /// `parse="text"` was combined with `xpointer`.
    #[error("xpointer cannot be used with parse=\"text\"")]
    TextWithXPointer,
    /// The resource is already being included further up the chain.
    #[error("inclusion loop: {uri} is already being included")]
    InclusionLoop {
        /// The resource that would be included again.
        uri: String,
    },
    /// `accept` or `accept-language` contains characters outside
    /// printable ASCII.
    #[error("illegal {header} value {value:?}")]
    BadHttpHeader {
        /// `accept` or `accept-language`.
        header: &'static str,
        /// The offending value.
        value: String,
    },
    /// An include that is the root element was replaced by something other
    /// than exactly one element.
    #[error("replacing the root element requires exactly one element, found {found}")]
    NotOneRootElement {
        /// How many elements the replacement held.
        found: usize,
    },
    /// Includes nest deeper than [`XIncludeOptions::max_depth`].
    #[error("includes nest deeper than {max_depth} levels")]
    DepthExceeded {
        /// The configured limit.
        max_depth: usize,
    },
    /// A text resource names an encoding that is not supported.
    #[error("unsupported encoding {label:?} for {uri}")]
    UnsupportedEncoding {
        /// The resource.
        uri: String,
        /// The encoding label.
        label: String,
    },
    /// The `xpointer` is malformed or selects nothing.
    #[error(transparent)]
    XPointer(#[from] XPointerError),
    /// The resource could not be retrieved or decoded.
    #[error("cannot read {uri}: {source}")]
    Io {
        /// The resource.
        uri: String,
        /// The underlying error.
        #[source]
        source: io::Error,
    },
    /// The included XML resource is not well-formed.
    #[error("cannot parse {uri}: {source}")]
    Parse {
        /// The resource.
        uri: String,
        /// The underlying error.
        #[source]
        source: ParseError,
    },
    /// Substituting the included content into the tree failed.
    #[error(transparent)]
    Tree(#[from] TreeError),
}

impl XIncludeError {
    /// Returns `true` for the resource errors an `xi:fallback` recovers
    /// from.
    #[must_use]
    pub fn is_resource_error(&self) -> bool {
        matches!(
            self,
            Self::Io { .. }
                | Self::UnsupportedEncoding { .. }
                | Self::BadHttpHeader { .. }
                | Self::XPointer(_)
        )
    }
}

/// How the included resource is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseMode {
    Xml,
    Text,
}

/// The attributes and fallback of one include element.
struct IncludeSite {
    href: Option<String>,
    parse: ParseMode,
    xpointer: Option<String>,
    encoding: Option<String>,
    accept: Option<String>,
    accept_language: Option<String>,
    fallback: Option<NodeId>,
}

impl IncludeSite {
    /// Reads and checks an include element. Every error here is fatal.
    fn read(doc: &Document, include: NodeId) -> Result<Self, XIncludeError> {
        let attr = |name: &str| doc.attribute_ns(include, name, "").map(str::to_string);
        let href = attr("href").filter(|h| !h.is_empty());
        let xpointer = attr("xpointer");
        if href.is_none() && xpointer.is_none() {
            return Err(XIncludeError::NoIncludeLocation);
        }
        let parse = match attr("parse").as_deref() {
            None | Some("xml") => ParseMode::Xml,
            Some("text") => ParseMode::Text,
            Some(other) => return Err(XIncludeError::BadParseAttribute(other.to_string())),
        };
        if parse == ParseMode::Text && xpointer.is_some() {
            return Err(XIncludeError::TextWithXPointer);
        }
        if let Some(href) = href.as_deref().filter(|h| h.contains('#')) {
            return Err(XIncludeError::BadHref(href.to_string()));
        }

        let mut fallback = None;
        for child in doc.children(include) {
            if doc.namespace_uri(child) != Some(XINCLUDE_NS) {
                continue;
            }
            match doc.local_name(child) {
                Some(FALLBACK_ELEMENT) if fallback.is_none() => fallback = Some(child),
                Some(FALLBACK_ELEMENT) => return Err(XIncludeError::MultipleFallbacks),
                other => {
                    return Err(XIncludeError::UnexpectedChild(
                        other.unwrap_or_default().to_string(),
                    ))
                }
            }
        }

        Ok(Self {
            href,
            parse,
            xpointer,
            encoding: attr("encoding"),
            accept: attr("accept"),
            accept_language: attr("accept-language"),
            fallback,
        })
    }

    fn check_headers(&self) -> Result<(), XIncludeError> {
        let headers = [
            ("accept", self.accept.as_deref()),
            ("accept-language", self.accept_language.as_deref()),
        ];
        for (header, value) in headers {
            if let Some(value) = value {
                if !value.bytes().all(|b| (0x20..=0x7E).contains(&b)) {
                    return Err(XIncludeError::BadHttpHeader {
                        header,
                        value: value.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Content ready to be substituted for an include element: detached nodes
/// of the including document, and whether they still hold unresolved
/// includes (same-document pointers copy unresolved content).
struct Loaded {
    nodes: Vec<NodeId>,
    unresolved: bool,
}

/// Resolves `xi:include` elements.
///
/// # Examples
///
/// ```
/// use xmlcore::Document;
/// use xmlcore::serial::serialize_node;
/// use xmlcore::xinclude::{MemoryFetcher, XIncluder};
///
/// let mut fetcher = MemoryFetcher::new();
/// fetcher.insert("mem:/greeting.xml", "<hello>world</hello>");
///
/// let mut doc = Document::parse_str(
///     r#"<doc xmlns:xi="http://www.w3.org/2001/XInclude"><xi:include href="greeting.xml"/></doc>"#,
/// )
/// .unwrap();
/// doc.base_uri = Some("mem:/main.xml".to_string());
///
/// let resolved = XIncluder::with_fetcher(fetcher).resolve(&doc).unwrap();
/// let root = resolved.root_element().unwrap();
/// assert_eq!(
///     serialize_node(&resolved, root),
///     r#"<doc xmlns:xi="http://www.w3.org/2001/XInclude"><hello xml:base="mem:/greeting.xml">world</hello></doc>"#
/// );
/// ```
#[derive(Debug, Clone)]
pub struct XIncluder<F: Fetcher = DefaultFetcher> {
    fetcher: F,
    builder: Builder,
    options: XIncludeOptions,
}

impl XIncluder<DefaultFetcher> {
    /// Creates an includer that reads local files and web URLs.
    #[must_use]
    pub fn new() -> Self {
        Self::with_fetcher(DefaultFetcher::new())
    }
}

impl Default for XIncluder<DefaultFetcher> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Fetcher> XIncluder<F> {
    /// Creates an includer that retrieves resources through `fetcher`.
    pub fn with_fetcher(fetcher: F) -> Self {
        Self {
            fetcher,
            builder: Builder::new(),
            options: XIncludeOptions::default(),
        }
    }

    /// Sets the builder used for included XML resources.
    #[must_use]
    pub fn builder(mut self, builder: Builder) -> Self {
        self.builder = builder;
        self
    }

    /// Sets the processing options.
    #[must_use]
    pub fn options(mut self, options: XIncludeOptions) -> Self {
        self.options = options;
        self
    }

    /// Returns the fetcher.
    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Returns a copy of `doc` with every include resolved. `doc` itself is
    /// never modified.
    ///
    /// # Errors
    ///
    /// Returns the first fatal `XIncludeError`, or a resource error from an
    /// include without a fallback.
    pub fn resolve(&self, doc: &Document) -> Result<Document, XIncludeError> {
        let mut copy = doc.clone();
        self.resolve_in_place(&mut copy)?;
        Ok(copy)
    }

    /// Resolves every include of `doc` in place.
    ///
    /// # Errors
    ///
    /// As [`resolve`](Self::resolve). On error the document may be
    /// partially resolved.
    pub fn resolve_in_place(&self, doc: &mut Document) -> Result<(), XIncludeError> {
        let mut stack: Vec<String> = doc
            .base_uri
            .as_deref()
            .map(|base| strip_fragment(base).to_string())
            .into_iter()
            .collect();
        tracing::debug!(base = ?doc.base_uri, "resolving XIncludes");
        let root = doc.root();
        self.resolve_within(doc, root, &mut stack, 0)
    }

    /// Resolves the includes at or below `scope`, in document order. The
    /// content of include elements is only examined when it is used.
    fn resolve_within(
        &self,
        doc: &mut Document,
        scope: NodeId,
        stack: &mut Vec<String>,
        depth: usize,
    ) -> Result<(), XIncludeError> {
        let mut includes = Vec::new();
        collect_includes(doc, scope, &mut includes)?;
        for include in includes {
            self.process_include(doc, include, stack, depth)?;
        }
        Ok(())
    }

    fn process_include(
        &self,
        doc: &mut Document,
        include: NodeId,
        stack: &mut Vec<String>,
        depth: usize,
    ) -> Result<(), XIncludeError> {
        let site = IncludeSite::read(doc, include)?;
        match self.load(doc, include, &site, stack, depth) {
            Ok(loaded) => {
                substitute(doc, include, &loaded.nodes)?;
                if loaded.unresolved {
                    for node in loaded.nodes {
                        self.resolve_within(doc, node, stack, depth + 1)?;
                    }
                }
                Ok(())
            }
            Err(err) if err.is_resource_error() => {
                let Some(fallback) = site.fallback else {
                    return Err(err);
                };
                tracing::debug!(error = %err, "using xi:fallback");
                self.resolve_within(doc, fallback, stack, depth)?;
                let children: Vec<NodeId> = doc.children(fallback).collect();
                for &child in &children {
                    doc.detach(child);
                }
                substitute(doc, include, &children)
            }
            Err(err) => Err(err),
        }
    }

    fn load(
        &self,
        doc: &mut Document,
        include: NodeId,
        site: &IncludeSite,
        stack: &mut Vec<String>,
        depth: usize,
    ) -> Result<Loaded, XIncludeError> {
        site.check_headers()?;

        let Some(href) = site.href.as_deref() else {
            if depth >= self.options.max_depth {
                return Err(XIncludeError::DepthExceeded {
                    max_depth: self.options.max_depth,
                });
            }
            return self.load_same_document(doc, include, site);
        };
        let uri = resolve_uri(doc.base_uri_of(include).as_deref(), &iri_to_uri(href));

        if site.parse == ParseMode::Xml {
            if stack.iter().any(|active| *active == uri) {
                return Err(XIncludeError::InclusionLoop { uri });
            }
            if depth >= self.options.max_depth {
                return Err(XIncludeError::DepthExceeded {
                    max_depth: self.options.max_depth,
                });
            }
        }

        let request = FetchRequest {
            uri: uri.clone(),
            accept: site.accept.clone(),
            accept_language: site.accept_language.clone(),
        };
        tracing::debug!(uri = %uri, parse = ?site.parse, "fetching included resource");
        let resource = self
            .fetcher
            .fetch(&request)
            .and_then(|resource| resource.validate().map(|()| resource))
            .map_err(|source| XIncludeError::Io {
                uri: uri.clone(),
                source,
            })?;

        match site.parse {
            ParseMode::Text => {
                let text = decode_text(&resource, site.encoding.as_deref())?;
                let node = doc.create_text(&text)?;
                Ok(Loaded {
                    nodes: vec![node],
                    unresolved: false,
                })
            }
            ParseMode::Xml => {
                let mut included = self
                    .builder
                    .build_bytes(&resource.content, Some(&uri))
                    .map_err(|source| XIncludeError::Parse {
                        uri: uri.clone(),
                        source,
                    })?;
                stack.push(uri);
                let root = included.root();
                let resolved = self.resolve_within(&mut included, root, stack, depth + 1);
                stack.pop();
                resolved?;

                let selected = match &site.xpointer {
                    Some(pointer) => xpointer::query(&included, pointer)?,
                    None => included
                        .children(root)
                        .filter(|&n| !matches!(included.kind(n), NodeKind::DocumentType { .. }))
                        .collect(),
                };
                let mut nodes = Vec::with_capacity(selected.len());
                for node in selected {
                    let copy = doc.import_node(&included, node);
                    if included.is_element(node) {
                        if let Some(base) = included.base_uri_of(node) {
                            doc.set_attribute_value(copy, "xml:base", XML_NAMESPACE, &base)?;
                        }
                    }
                    nodes.push(copy);
                }
                Ok(Loaded {
                    nodes,
                    unresolved: false,
                })
            }
        }
    }

    /// Copies the nodes an `xpointer` selects from the including document
    /// itself.
    fn load_same_document(
        &self,
        doc: &mut Document,
        include: NodeId,
        site: &IncludeSite,
    ) -> Result<Loaded, XIncludeError> {
        let pointer = site.xpointer.as_deref().unwrap_or_default();
        let selected = xpointer::query(doc, pointer)?;
        if let Some(&node) = selected.iter().find(|&&n| doc.is_ancestor_or_self(n, include)) {
            return Err(XIncludeError::InclusionLoop {
                uri: format!(
                    "{}#{}",
                    doc.base_uri.as_deref().unwrap_or_default(),
                    doc.qualified_name(node).unwrap_or_default()
                ),
            });
        }
        let nodes = selected.into_iter().map(|n| doc.copy_subtree(n)).collect();
        Ok(Loaded {
            nodes,
            unresolved: true,
        })
    }
}

/// Collects the include elements at or below `node` that are not inside
/// another include, in document order.
fn collect_includes(doc: &Document, node: NodeId, out: &mut Vec<NodeId>) -> Result<(), XIncludeError> {
    if doc.namespace_uri(node) == Some(XINCLUDE_NS) {
        match doc.local_name(node) {
            Some(INCLUDE_ELEMENT) => {
                out.push(node);
                return Ok(());
            }
            Some(FALLBACK_ELEMENT) => {
                let in_include = doc
                    .parent(node)
                    .is_some_and(|p| is_xinclude_element(doc, p, INCLUDE_ELEMENT));
                if !in_include {
                    return Err(XIncludeError::MisplacedFallback);
                }
            }
            _ => {}
        }
    }
    for child in doc.children(node) {
        collect_includes(doc, child, out)?;
    }
    Ok(())
}

fn is_xinclude_element(doc: &Document, node: NodeId, local: &str) -> bool {
    doc.namespace_uri(node) == Some(XINCLUDE_NS) && doc.local_name(node) == Some(local)
}

/// Decodes a text resource: the `encoding` attribute wins, then the
/// transport charset, then the XML declaration for XML media types, then
/// UTF-8.
fn decode_text(resource: &Resource, declared: Option<&str>) -> Result<String, XIncludeError> {
    let content_type = resource.content_type.as_deref().unwrap_or_default();
    let label = declared
        .map(str::to_string)
        .or_else(|| encoding::charset_parameter(content_type));
    let decoded = match label {
        Some(label) => encoding::decode(&resource.content, &label),
        None if encoding::is_xml_media_type(content_type) => encoding::decode_xml(&resource.content),
        None => encoding::decode(&resource.content, "UTF-8"),
    };
    decoded.map_err(|err| match err {
        EncodingError::Unsupported { label } => XIncludeError::UnsupportedEncoding {
            uri: resource.uri.clone(),
            label,
        },
        malformed @ EncodingError::Malformed { .. } => XIncludeError::Io {
            uri: resource.uri.clone(),
            source: io::Error::new(io::ErrorKind::InvalidData, malformed),
        },
    })
}

/// Puts `nodes` where `include` is and detaches `include`. An include that
/// is the root element must be replaced by exactly one element, plus any
/// comments and processing instructions; whitespace text is dropped.
fn substitute(doc: &mut Document, include: NodeId, nodes: &[NodeId]) -> Result<(), XIncludeError> {
    let parent = doc.parent(include).ok_or(TreeError::NoParent)?;
    if parent != doc.root() {
        for &node in nodes {
            doc.insert_before(include, node)?;
        }
        doc.detach(include);
        return Ok(());
    }

    let mut kept = Vec::with_capacity(nodes.len());
    for &node in nodes {
        match doc.kind(node) {
            NodeKind::Text { content } if content.chars().all(crate::verifier::chars::is_xml_space) => {
                tracing::warn!("dropping whitespace included at document level");
            }
            _ => kept.push(node),
        }
    }
    let elements: Vec<NodeId> = kept.iter().copied().filter(|&n| doc.is_element(n)).collect();
    let has_text = kept
        .iter()
        .any(|&n| matches!(doc.kind(n), NodeKind::Text { .. }));
    let [root_element] = elements.as_slice() else {
        return Err(XIncludeError::NotOneRootElement {
            found: elements.len(),
        });
    };
    if has_text {
        return Err(TreeError::IllegalChild {
            parent: "document",
            child: "text",
        }
        .into());
    }

    let split = kept.iter().position(|n| n == root_element).unwrap_or_default();
    for &node in &kept[..split] {
        doc.insert_before(include, node)?;
    }
    doc.replace_child(include, *root_element)?;
    let mut anchor = *root_element;
    for &node in &kept[split + 1..] {
        match doc.next_sibling(anchor) {
            Some(next) => doc.insert_before(next, node)?,
            None => doc.append_child(parent, node)?,
        }
        anchor = node;
    }
    Ok(())
}
