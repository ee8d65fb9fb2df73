//! Document building on top of `quick-xml`.
//!
//! `quick-xml` tokenizes; this module turns its events into a namespace
//! aware [`Document`], applying the checks the tokenizer leaves out: a
//! single root element, no character data outside it, bound prefixes,
//! unique expanded attribute names, and verified names, text and comments
//! (every node is created through the checked tree constructors).
//!
//! The internal DTD subset is read for attribute types, attribute defaults
//! and internal general entities; see [`dtd`].
//!
//! A [`NodeFactory`] lets callers filter or rewrite nodes as they are
//! built, without a second pass over the tree.

pub mod dtd;

use std::borrow::Cow;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::{ParseError, SourceLocation};
use crate::tree::{collapse_whitespace, AttributeType, Document, NodeId, NodeKind};
use crate::util::qname::split_qname;
use crate::verifier::{self, chars::is_xml_space, XML_NAMESPACE};

use dtd::DoctypeDecl;

/// Decides whether an element is kept. Receives the qualified name and the
/// namespace URI; returning `false` drops the element but keeps its
/// children, which are attached to the element's parent instead.
pub type ElementCallback = Arc<dyn Fn(&str, &str) -> bool + Send + Sync>;

/// Rewrites or drops an attribute. Receives the qualified name and the
/// normalized value.
pub type AttributeCallback = Arc<dyn Fn(&str, &str) -> Option<String> + Send + Sync>;

/// Rewrites or drops a text or comment node.
pub type ContentCallback = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Rewrites or drops a processing instruction. Receives the target and the
/// data and returns the new data.
pub type ProcessingInstructionCallback = Arc<dyn Fn(&str, &str) -> Option<String> + Send + Sync>;

/// Decides whether a document type declaration is kept. Receives the root
/// element name. The internal subset is honored either way.
pub type DoctypeCallback = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Per-node-kind hooks applied while a document is built.
///
/// Every hook is optional; a missing hook keeps the node unchanged.
///
/// ```
/// use xmlcore::builder::{Builder, NodeFactory};
///
/// let factory = NodeFactory::default()
///     .on_comment(|_| None)
///     .on_text(|text| Some(text.to_uppercase()));
/// let doc = Builder::with_factory(factory)
///     .build_str("<a><!--gone-->shout</a>", None)
///     .unwrap();
/// let a = doc.root_element().unwrap();
/// assert_eq!(doc.children(a).count(), 1);
/// assert_eq!(doc.text_content(a), "SHOUT");
/// ```
#[derive(Clone, Default)]
pub struct NodeFactory {
    /// Element hook.
    pub element: Option<ElementCallback>,
    /// Attribute hook.
    pub attribute: Option<AttributeCallback>,
    /// Text hook.
    pub text: Option<ContentCallback>,
    /// Comment hook.
    pub comment: Option<ContentCallback>,
    /// Processing-instruction hook.
    pub processing_instruction: Option<ProcessingInstructionCallback>,
    /// Document type hook.
    pub doctype: Option<DoctypeCallback>,
}

impl NodeFactory {
    /// Sets the element hook.
    #[must_use]
    pub fn on_element(mut self, hook: impl Fn(&str, &str) -> bool + Send + Sync + 'static) -> Self {
        self.element = Some(Arc::new(hook));
        self
    }

    /// Sets the attribute hook.
    #[must_use]
    pub fn on_attribute(
        mut self,
        hook: impl Fn(&str, &str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.attribute = Some(Arc::new(hook));
        self
    }

    /// Sets the text hook.
    #[must_use]
    pub fn on_text(mut self, hook: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        self.text = Some(Arc::new(hook));
        self
    }

    /// Sets the comment hook.
    #[must_use]
    pub fn on_comment(mut self, hook: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        self.comment = Some(Arc::new(hook));
        self
    }

    /// Sets the processing-instruction hook.
    #[must_use]
    pub fn on_processing_instruction(
        mut self,
        hook: impl Fn(&str, &str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.processing_instruction = Some(Arc::new(hook));
        self
    }

    /// Sets the document type hook.
    #[must_use]
    pub fn on_doctype(mut self, hook: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.doctype = Some(Arc::new(hook));
        self
    }

    fn keep_element(&self, qname: &str, namespace: &str) -> bool {
        self.element.as_ref().map_or(true, |hook| hook(qname, namespace))
    }

    fn attribute(&self, qname: &str, value: String) -> Option<String> {
        match &self.attribute {
            Some(hook) => hook(qname, &value),
            None => Some(value),
        }
    }

    fn text(&self, content: String) -> Option<String> {
        match &self.text {
            Some(hook) => hook(&content),
            None => Some(content),
        }
    }

    fn comment(&self, content: String) -> Option<String> {
        match &self.comment {
            Some(hook) => hook(&content),
            None => Some(content),
        }
    }

    fn processing_instruction(&self, target: &str, data: String) -> Option<String> {
        match &self.processing_instruction {
            Some(hook) => hook(target, &data),
            None => Some(data),
        }
    }

    fn keep_doctype(&self, root_name: &str) -> bool {
        self.doctype.as_ref().map_or(true, |hook| hook(root_name))
    }
}

impl fmt::Debug for NodeFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hook = |set: bool| if set { "..." } else { "None" };
        f.debug_struct("NodeFactory")
            .field("element", &hook(self.element.is_some()))
            .field("attribute", &hook(self.attribute.is_some()))
            .field("text", &hook(self.text.is_some()))
            .field("comment", &hook(self.comment.is_some()))
            .field(
                "processing_instruction",
                &hook(self.processing_instruction.is_some()),
            )
            .field("doctype", &hook(self.doctype.is_some()))
            .finish()
    }
}

/// Builds documents from XML text.
#[derive(Debug, Clone, Default)]
pub struct Builder {
    factory: NodeFactory,
}

impl Builder {
    /// Creates a builder that keeps every node.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder that routes nodes through `factory`.
    #[must_use]
    pub fn with_factory(factory: NodeFactory) -> Self {
        Self { factory }
    }

    /// Builds a document from a string. `base_uri` becomes the document's
    /// base URI.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` if the input is not namespace-well-formed.
    pub fn build_str(&self, input: &str, base_uri: Option<&str>) -> Result<Document, ParseError> {
        let mut doc = TreeBuilder::new(input, &self.factory).run()?;
        doc.base_uri = base_uri.map(str::to_string);
        Ok(doc)
    }

    /// Builds a document from bytes in any encoding `encoding_rs` knows,
    /// detected from the BOM or the XML declaration.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` if decoding fails or the decoded text is not
    /// namespace-well-formed.
    pub fn build_bytes(&self, input: &[u8], base_uri: Option<&str>) -> Result<Document, ParseError> {
        let text = crate::encoding::decode_xml(input).map_err(|e| ParseError::new(e.to_string()))?;
        self.build_str(&text, base_uri)
    }

    /// Reads and builds a file. The document's base URI is the file's
    /// `file:` URL when the path can be made absolute, else the path.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file cannot be read and `Error::Parse`
    /// if it is not well-formed.
    pub fn build_file(&self, path: impl AsRef<Path>) -> crate::error::Result<Document> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let base = std::fs::canonicalize(path)
            .ok()
            .and_then(|absolute| url::Url::from_file_path(absolute).ok())
            .map_or_else(|| path.to_string_lossy().into_owned(), |u| u.to_string());
        tracing::debug!(path = %path.display(), base = %base, "building document from file");
        Ok(self.build_bytes(&bytes, Some(&base))?)
    }
}

/// An element whose end tag has not been seen yet.
struct OpenElement {
    qname: String,
    /// Where this element's children go: the element itself, or the
    /// parent it was dropped from.
    container: NodeId,
}

struct TreeBuilder<'a> {
    input: &'a str,
    factory: &'a NodeFactory,
    doc: Document,
    dtd: Option<DoctypeDecl>,
    /// One frame of `(prefix, uri)` declarations per open element.
    scopes: Vec<Vec<(String, String)>>,
    open: Vec<OpenElement>,
    text: String,
    position: usize,
}

impl<'a> TreeBuilder<'a> {
    fn new(input: &'a str, factory: &'a NodeFactory) -> Self {
        Self {
            input,
            factory,
            doc: Document::new(),
            dtd: None,
            scopes: Vec::new(),
            open: Vec::new(),
            text: String::new(),
            position: 0,
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            location: SourceLocation::locate(self.input, self.position),
        }
    }

    fn container(&self) -> NodeId {
        self.open.last().map_or(self.doc.root(), |open| open.container)
    }

    fn run(mut self) -> Result<Document, ParseError> {
        let mut reader = Reader::from_str(self.input);
        reader.trim_text(false);
        reader.check_end_names(true);
        reader.expand_empty_elements(false);

        loop {
            self.position = reader.buffer_position();
            let event = match reader.read_event() {
                Ok(event) => event,
                Err(err) => {
                    self.position = reader.buffer_position();
                    return Err(self.error(err.to_string()));
                }
            };
            match event {
                Event::Decl(decl) => {
                    let version = decl.version().map_err(|e| self.error(e.to_string()))?;
                    self.doc.version = Some(String::from_utf8_lossy(&version).into_owned());
                    if let Some(encoding) = decl.encoding() {
                        let encoding = encoding.map_err(|e| self.error(e.to_string()))?;
                        self.doc.encoding = Some(String::from_utf8_lossy(&encoding).into_owned());
                    }
                    if let Some(standalone) = decl.standalone() {
                        let standalone = standalone.map_err(|e| self.error(e.to_string()))?;
                        self.doc.standalone = Some(standalone.as_ref() == b"yes");
                    }
                }
                Event::DocType(body) => {
                    let body = self.utf8(&body)?;
                    self.doctype(body)?;
                }
                Event::Start(start) => {
                    self.flush_text()?;
                    self.start_element(&start, false)?;
                }
                Event::Empty(start) => {
                    self.flush_text()?;
                    self.start_element(&start, true)?;
                }
                Event::End(_) => {
                    self.flush_text()?;
                    self.open.pop();
                    self.scopes.pop();
                }
                Event::Text(raw) => {
                    let normalized = normalize_newlines(self.utf8(&raw)?);
                    let text = self.unescape(&normalized)?;
                    self.text.push_str(&text);
                }
                Event::CData(raw) => {
                    let raw = self.utf8(&raw)?;
                    self.text.push_str(&normalize_newlines(raw));
                }
                Event::Comment(raw) => {
                    self.flush_text()?;
                    let content = normalize_newlines(self.utf8(&raw)?).into_owned();
                    if let Some(content) = self.factory.comment(content) {
                        let node = self.doc.create_comment(&content).map_err(|e| self.error(e.to_string()))?;
                        self.attach(node)?;
                    }
                }
                Event::PI(raw) => {
                    self.flush_text()?;
                    let raw = normalize_newlines(self.utf8(&raw)?).into_owned();
                    self.processing_instruction(&raw)?;
                }
                Event::Eof => break,
            }
        }

        self.flush_text()?;
        if let Some(open) = self.open.last() {
            return Err(self.error(format!("element <{}> is never closed", open.qname)));
        }
        if self.doc.root_element().is_none() {
            return Err(self.error("document has no root element"));
        }
        tracing::trace!(nodes = self.doc.node_count(), "document built");
        Ok(self.doc)
    }

    fn utf8<'b>(&self, bytes: &'b [u8]) -> Result<&'b str, ParseError> {
        std::str::from_utf8(bytes).map_err(|e| self.error(e.to_string()))
    }

    fn unescape<'b>(&self, raw: &'b str) -> Result<Cow<'b, str>, ParseError> {
        let dtd = self.dtd.as_ref();
        quick_xml::escape::unescape_with(raw, |name| match dtd {
            Some(dtd) => dtd.entity(name),
            None => dtd::predefined_entity(name),
        })
        .map_err(|e| self.error(e.to_string()))
    }

    fn attach(&mut self, node: NodeId) -> Result<(), ParseError> {
        let parent = self.container();
        self.doc
            .append_child(parent, node)
            .map_err(|e| self.error(e.to_string()))
    }

    fn flush_text(&mut self) -> Result<(), ParseError> {
        if self.text.is_empty() {
            return Ok(());
        }
        let content = std::mem::take(&mut self.text);
        if self.open.is_empty() {
            if content.chars().all(is_xml_space) {
                return Ok(());
            }
            return Err(self.error("character data is not allowed outside the root element"));
        }
        if let Some(content) = self.factory.text(content) {
            let node = self.doc.create_text(&content).map_err(|e| self.error(e.to_string()))?;
            self.attach(node)?;
        }
        Ok(())
    }

    fn processing_instruction(&mut self, raw: &str) -> Result<(), ParseError> {
        let (target, data) = match raw.find(is_xml_space) {
            Some(i) => (&raw[..i], raw[i..].trim_start_matches(is_xml_space)),
            None => (raw, ""),
        };
        if let Some(data) = self.factory.processing_instruction(target, data.to_string()) {
            let node = self
                .doc
                .create_processing_instruction(target, &data)
                .map_err(|e| self.error(e.to_string()))?;
            self.attach(node)?;
        }
        Ok(())
    }

    fn doctype(&mut self, body: &str) -> Result<(), ParseError> {
        if self.doc.doctype().is_some() || self.doc.root_element().is_some() {
            return Err(self.error("misplaced DOCTYPE declaration"));
        }
        let decl = dtd::parse_doctype(body).map_err(|e| self.error(e.message))?;
        if self.factory.keep_doctype(&decl.root_name) {
            let node = self
                .doc
                .create_doctype(&decl.root_name, decl.public_id.as_deref(), decl.system_id.as_deref())
                .map_err(|e| self.error(e.to_string()))?;
            if let NodeKind::DocumentType { internal_subset, .. } = &mut self.doc.node_mut(node).kind {
                internal_subset.clone_from(&decl.internal_subset);
            }
            self.attach(node)?;
        }
        self.dtd = Some(decl);
        Ok(())
    }

    fn lookup(&self, prefix: &str) -> Option<&str> {
        if prefix == "xml" {
            return Some(XML_NAMESPACE);
        }
        self.scopes
            .iter()
            .rev()
            .flat_map(|frame| frame.iter().rev())
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.as_str())
    }

    /// Normalizes an attribute value: newlines and tabs become spaces,
    /// references are expanded, and tokenized types are collapsed.
    fn attribute_value(&self, raw: &str, attribute_type: AttributeType) -> Result<String, ParseError> {
        if raw.contains('<') {
            return Err(self.error("'<' is not allowed in attribute values"));
        }
        let spaced = normalize_newlines(raw).replace(['\t', '\n'], " ");
        let value = self.unescape(&spaced)?;
        Ok(if attribute_type.is_tokenized() {
            collapse_whitespace(&value)
        } else {
            value.into_owned()
        })
    }

    fn declared_type(&self, element: &str, attribute: &str) -> AttributeType {
        self.dtd
            .as_ref()
            .and_then(|dtd| dtd.attribute(element, attribute))
            .map_or(AttributeType::Undeclared, |decl| decl.attribute_type)
    }

    fn start_element(&mut self, start: &BytesStart<'_>, empty: bool) -> Result<(), ParseError> {
        let qname = self.utf8(start.name().as_ref())?.to_string();
        if self.open.is_empty() && self.doc.root_element().is_some() {
            return Err(self.error(format!("extra content after the root element: <{qname}>")));
        }

        let mut declarations = Vec::new();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| self.error(e.to_string()))?;
            let key = self.utf8(attr.key.as_ref())?.to_string();
            let raw = self.utf8(&attr.value)?;
            if key == "xmlns" || key.starts_with("xmlns:") {
                let prefix = key.strip_prefix("xmlns:").unwrap_or_default().to_string();
                let uri = self.attribute_value(raw, AttributeType::Cdata)?;
                verifier::check_namespace_prefix(&prefix)
                    .and_then(|()| verifier::check_namespace_uri(&prefix, &uri))
                    .map_err(|e| self.error(e.to_string()))?;
                declarations.push((prefix, uri));
            } else {
                let attribute_type = self.declared_type(&qname, &key);
                let value = self.attribute_value(raw, attribute_type)?;
                attributes.push((key, value, attribute_type));
            }
        }

        if let Some(dtd) = &self.dtd {
            for decl in dtd.defaults_for(&qname) {
                if attributes.iter().any(|(name, _, _)| *name == decl.name)
                    || declarations.iter().any(|(p, _)| {
                        (decl.name == "xmlns" && p.is_empty())
                            || decl.name.strip_prefix("xmlns:") == Some(p.as_str())
                    })
                {
                    continue;
                }
                if let Some(default) = decl.default.value() {
                    let value = self.attribute_value(default, decl.attribute_type)?;
                    if decl.name == "xmlns" || decl.name.starts_with("xmlns:") {
                        let prefix = decl.name.strip_prefix("xmlns:").unwrap_or_default();
                        declarations.push((prefix.to_string(), value));
                    } else {
                        attributes.push((decl.name.clone(), value, decl.attribute_type));
                    }
                }
            }
        }

        self.scopes.push(declarations);
        let container = self.element(&qname, attributes)?;
        if empty {
            self.scopes.pop();
        } else {
            self.open.push(OpenElement { qname, container });
        }
        Ok(())
    }

    /// Creates and attaches the element, returning where its children go.
    fn element(
        &mut self,
        qname: &str,
        attributes: Vec<(String, String, AttributeType)>,
    ) -> Result<NodeId, ParseError> {
        let (prefix, _) = split_qname(qname);
        let namespace = match prefix {
            Some(prefix) => self
                .lookup(prefix)
                .ok_or_else(|| self.error(format!("namespace prefix {prefix} is not bound")))?,
            None => self.lookup("").unwrap_or(""),
        }
        .to_string();

        if !self.factory.keep_element(qname, &namespace) {
            return Ok(self.container());
        }

        let element = self
            .doc
            .create_element(qname, &namespace)
            .map_err(|e| self.error(e.to_string()))?;
        let declarations = self.scopes.last().cloned().unwrap_or_default();
        for (prefix, uri) in &declarations {
            self.doc
                .add_namespace_declaration(element, prefix, uri)
                .map_err(|e| self.error(e.to_string()))?;
        }

        let mut seen: Vec<(String, String)> = Vec::with_capacity(attributes.len());
        for (name, value, attribute_type) in attributes {
            let (prefix, local) = split_qname(&name);
            let attr_namespace = match prefix {
                Some(prefix) => self
                    .lookup(prefix)
                    .ok_or_else(|| self.error(format!("namespace prefix {prefix} is not bound")))?
                    .to_string(),
                None => String::new(),
            };
            let expanded = (local.to_string(), attr_namespace.clone());
            if seen.contains(&expanded) {
                return Err(self.error(format!("duplicate attribute {name}")));
            }
            seen.push(expanded);

            let Some(value) = self.factory.attribute(&name, value) else {
                continue;
            };
            let attr = self
                .doc
                .create_attribute(&name, &attr_namespace, &value, attribute_type)
                .map_err(|e| self.error(e.to_string()))?;
            self.doc
                .set_attribute(element, attr)
                .map_err(|e| self.error(e.to_string()))?;
        }

        self.attach(element)?;
        Ok(element)
    }
}

/// Replaces `\r\n` and lone `\r` with `\n`.
fn normalize_newlines(text: &str) -> Cow<'_, str> {
    if text.contains('\r') {
        Cow::Owned(text.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(text)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn build(input: &str) -> Document {
        Builder::new().build_str(input, None).unwrap()
    }

    fn build_err(input: &str) -> ParseError {
        let Err(err) = Builder::new().build_str(input, None) else {
            panic!("expected a parse error for {input:?}");
        };
        err
    }

    #[test]
    fn test_namespaces_resolved() {
        let doc = build(r#"<a xmlns="urn:d" xmlns:p="urn:p"><p:b p:x="1" y="2"/><c/></a>"#);
        let a = doc.root_element().unwrap();
        assert_eq!(doc.namespace_uri(a), Some("urn:d"));
        let b = doc.first_child(a).unwrap();
        assert_eq!(doc.namespace_uri(b), Some("urn:p"));
        assert_eq!(doc.attribute_ns(b, "x", "urn:p"), Some("1"));
        assert_eq!(doc.attribute(b, "y"), Some("2"));
        let c = doc.last_child(a).unwrap();
        assert_eq!(doc.namespace_uri(c), Some("urn:d"));
    }

    #[test]
    fn test_unused_declaration_is_kept() {
        let doc = build(r#"<a xmlns:unused="urn:u"/>"#);
        let a = doc.root_element().unwrap();
        assert_eq!(
            doc.in_scope_namespaces(a).get("unused").map(String::as_str),
            Some("urn:u")
        );
    }

    #[test]
    fn test_unbound_prefix_rejected() {
        let err = build_err("<p:a/>");
        assert!(err.message.contains("not bound"), "{}", err.message);
        assert!(build_err(r#"<a q:x="1"/>"#).message.contains("not bound"));
    }

    #[test]
    fn test_duplicate_expanded_attribute_rejected() {
        let err = build_err(r#"<a xmlns:p="urn:x" xmlns:q="urn:x" p:k="1" q:k="2"/>"#);
        assert!(err.message.contains("duplicate"), "{}", err.message);
    }

    #[test]
    fn test_newlines_and_attribute_normalization() {
        let doc = build("<a v=\"x\ty\r\nz&#10;\">l1\r\nl2\rl3</a>");
        let a = doc.root_element().unwrap();
        assert_eq!(doc.attribute(a, "v"), Some("x y z\n"));
        assert_eq!(doc.text_content(a), "l1\nl2\nl3");
    }

    #[test]
    fn test_cdata_merges_with_text() {
        let doc = build("<a>x<![CDATA[<y>]]>z</a>");
        let a = doc.root_element().unwrap();
        assert_eq!(doc.children(a).count(), 1);
        assert_eq!(doc.text_content(a), "x<y>z");
    }

    #[test]
    fn test_internal_subset_applied() {
        let doc = build(
            r#"<!DOCTYPE doc [
                <!ATTLIST e id ID #IMPLIED tokens NMTOKENS #IMPLIED kind CDATA "plain">
                <!ENTITY who "world">
            ]>
            <doc><e id="E1" tokens="  a   b "/>hello &who;</doc>"#,
        );
        let root = doc.root_element().unwrap();
        let e = doc.first_child(root).unwrap();
        assert_eq!(doc.attribute(e, "tokens"), Some("a b"));
        assert_eq!(doc.attribute(e, "kind"), Some("plain"));
        assert_eq!(doc.element_by_id("E1"), Some(e));
        assert_eq!(doc.text_content(root), "hello world");
        assert!(doc.doctype().is_some());
    }

    #[test]
    fn test_undefined_entity_rejected() {
        build_err("<a>&nope;</a>");
    }

    #[test]
    fn test_text_outside_root() {
        let doc = build("  <a/>\n  ");
        assert_eq!(doc.children(doc.root()).count(), 1);
        build_err("<a/>stray");
    }

    #[test]
    fn test_second_root_rejected() {
        let err = build_err("<a/><b/>");
        assert!(err.message.contains("root element"), "{}", err.message);
    }

    #[test]
    fn test_missing_root_and_unclosed() {
        build_err("<!-- only a comment -->");
        let err = build_err("<a><b></b>");
        assert!(err.message.contains("never closed"), "{}", err.message);
    }

    #[test]
    fn test_bad_comment_rejected() {
        build_err("<a><!-- a -- b --></a>");
    }

    #[test]
    fn test_error_location() {
        let err = build_err("<a>\n  <b>&bad;</b>\n</a>");
        assert_eq!(err.location.line, 2);
    }

    #[test]
    fn test_processing_instruction_split() {
        let doc = build("<?style   href='a.css'?><a/>");
        let pi = doc.first_child(doc.root()).unwrap();
        assert_eq!(doc.local_name(pi), Some("style"));
        assert_eq!(doc.value(pi), Some("href='a.css'"));
    }

    #[test]
    fn test_xml_declaration() {
        let doc = build("<?xml version='1.0' encoding='UTF-8' standalone='yes'?><a/>");
        assert_eq!(doc.version.as_deref(), Some("1.0"));
        assert_eq!(doc.encoding.as_deref(), Some("UTF-8"));
        assert_eq!(doc.standalone, Some(true));
    }

    #[test]
    fn test_dropped_element_promotes_children() {
        let factory = NodeFactory::default().on_element(|qname, _| qname != "wrapper");
        let doc = Builder::with_factory(factory)
            .build_str("<a><wrapper><b/>t</wrapper></a>", None)
            .unwrap();
        let a = doc.root_element().unwrap();
        let names: Vec<Option<&str>> = doc.children(a).map(|c| doc.local_name(c)).collect();
        assert_eq!(names, vec![Some("b"), None]);
    }

    #[test]
    fn test_attribute_hook_rewrites() {
        let factory = NodeFactory::default()
            .on_attribute(|name, value| (name != "drop").then(|| value.to_uppercase()));
        let doc = Builder::with_factory(factory)
            .build_str(r#"<a keep="x" drop="y"/>"#, None)
            .unwrap();
        let a = doc.root_element().unwrap();
        assert_eq!(doc.attribute(a, "keep"), Some("X"));
        assert_eq!(doc.attribute(a, "drop"), None);
    }

    #[test]
    fn test_build_file_sets_base_uri() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.xml");
        std::fs::write(&path, "<a/>").unwrap();
        let doc = Builder::new().build_file(&path).unwrap();
        let base = doc.base_uri.unwrap();
        assert!(base.starts_with("file:///"), "{base}");
        assert!(base.ends_with("/doc.xml"), "{base}");
    }
}
