//! XML serializer.
//!
//! Serializes a `Document` tree into a well-formed XML string. Namespace
//! declarations are derived from the tree: an element declares each
//! binding it uses or carries that its parent does not already have in
//! scope.

use std::collections::BTreeMap;

use crate::tree::{Document, NodeId, NodeKind};

/// Options controlling XML serialization output.
///
/// # Examples
///
/// ```
/// use xmlcore::Document;
/// use xmlcore::serial::{serialize_with_options, SerializeOptions};
///
/// let doc = Document::parse_str("<root><child>Hello</child></root>").unwrap();
/// let xml = serialize_with_options(&doc, &SerializeOptions::default().indent(true));
/// assert!(xml.contains("  <child>"));
/// ```
#[derive(Debug, Clone)]
pub struct SerializeOptions {
    /// Whether to produce indented (pretty-printed) output.
    /// Defaults to `false`.
    pub indent: bool,
    /// The indentation string used for each level when `indent` is `true`.
    /// Defaults to two spaces.
    pub indent_str: String,
    /// Whether to write the XML declaration. Defaults to `true`.
    pub declaration: bool,
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            indent: false,
            indent_str: "  ".to_string(),
            declaration: true,
        }
    }
}

impl SerializeOptions {
    /// Enables or disables indented output. Elements with non-whitespace
    /// text content are never indented inside.
    #[must_use]
    pub fn indent(mut self, indent: bool) -> Self {
        self.indent = indent;
        self
    }

    /// Sets the indentation string used for each nesting level.
    #[must_use]
    pub fn indent_str(mut self, s: &str) -> Self {
        self.indent_str = s.to_string();
        self
    }

    /// Enables or disables the XML declaration.
    #[must_use]
    pub fn declaration(mut self, declaration: bool) -> Self {
        self.declaration = declaration;
        self
    }
}

/// Serializes a document to an XML string.
///
/// # Examples
///
/// ```
/// use xmlcore::Document;
/// use xmlcore::serial::serialize;
///
/// let doc = Document::parse_str("<root><child>Hello</child></root>").unwrap();
/// assert_eq!(
///     serialize(&doc),
///     "<?xml version=\"1.0\"?>\n<root><child>Hello</child></root>\n"
/// );
/// ```
#[must_use]
pub fn serialize(doc: &Document) -> String {
    serialize_with_options(doc, &SerializeOptions::default())
}

/// Serializes a document to an XML string with the given options.
#[must_use]
pub fn serialize_with_options(doc: &Document, options: &SerializeOptions) -> String {
    let mut writer = XmlWriter {
        doc,
        options,
        out: String::new(),
    };

    if options.declaration {
        let version = doc.version.as_deref().unwrap_or("1.0");
        writer.out.push_str("<?xml version=\"");
        writer.out.push_str(version);
        writer.out.push('"');
        if let Some(ref encoding) = doc.encoding {
            writer.out.push_str(" encoding=\"");
            writer.out.push_str(encoding);
            writer.out.push('"');
        }
        if let Some(standalone) = doc.standalone {
            writer.out.push_str(" standalone=\"");
            writer.out.push_str(if standalone { "yes" } else { "no" });
            writer.out.push('"');
        }
        writer.out.push_str("?>\n");
    }

    let scope = BTreeMap::new();
    for child in doc.children(doc.root()) {
        writer.write_node(child, &scope, 0, false);
        writer.out.push('\n');
    }
    writer.out
}

/// Serializes a single node (and its subtree) without a declaration.
///
/// Namespace declarations inherited from ancestors are written on the
/// node itself so the fragment stands alone.
#[must_use]
pub fn serialize_node(doc: &Document, id: NodeId) -> String {
    let options = SerializeOptions::default().declaration(false);
    let mut writer = XmlWriter {
        doc,
        options: &options,
        out: String::new(),
    };
    let scope = BTreeMap::new();
    if doc.is_element(id) {
        writer.write_element(id, &scope, 0, true);
    } else {
        writer.write_node(id, &scope, 0, false);
    }
    writer.out
}

struct XmlWriter<'a> {
    doc: &'a Document,
    options: &'a SerializeOptions,
    out: String,
}

impl XmlWriter<'_> {
    fn write_indent(&mut self, depth: usize) {
        for _ in 0..depth {
            self.out.push_str(&self.options.indent_str);
        }
    }

    fn write_node(&mut self, id: NodeId, scope: &BTreeMap<String, String>, depth: usize, indented: bool) {
        if indented {
            self.write_indent(depth);
        }
        match self.doc.kind(id) {
            NodeKind::Element { .. } => self.write_element(id, scope, depth, false),
            NodeKind::Text { content } => write_escaped_text(&mut self.out, content),
            NodeKind::Comment { content } => {
                self.out.push_str("<!--");
                self.out.push_str(content);
                self.out.push_str("-->");
            }
            NodeKind::ProcessingInstruction { target, data } => {
                self.out.push_str("<?");
                self.out.push_str(target);
                if !data.is_empty() {
                    self.out.push(' ');
                    self.out.push_str(data);
                }
                self.out.push_str("?>");
            }
            NodeKind::DocumentType {
                root_name,
                public_id,
                system_id,
                internal_subset,
            } => {
                self.out.push_str("<!DOCTYPE ");
                self.out.push_str(root_name);
                match (public_id, system_id) {
                    (Some(public), Some(system)) => {
                        self.out.push_str(&format!(" PUBLIC \"{public}\" {}", quote_literal(system)));
                    }
                    (None, Some(system)) => {
                        self.out.push_str(" SYSTEM ");
                        self.out.push_str(&quote_literal(system));
                    }
                    _ => {}
                }
                if let Some(subset) = internal_subset {
                    self.out.push_str(" [");
                    self.out.push_str(subset);
                    self.out.push(']');
                }
                self.out.push('>');
            }
            NodeKind::Attribute { value, .. } => write_escaped_attr(&mut self.out, value),
            NodeKind::Document => {}
        }
    }

    /// Writes an element. With `standalone`, every in-scope binding is
    /// declared rather than only those new relative to `scope`.
    fn write_element(&mut self, id: NodeId, scope: &BTreeMap<String, String>, depth: usize, standalone: bool) {
        let doc = self.doc;
        let qname = doc.qualified_name(id).unwrap_or_default();
        let bindings: Vec<(String, String)> = if standalone {
            let mut all: Vec<(String, String)> = doc.in_scope_namespaces(id).into_iter().collect();
            if !all.iter().any(|(p, _)| p.is_empty()) {
                all.push((String::new(), String::new()));
            }
            all
        } else {
            doc.declared_namespaces(id)
        };

        let mut inner = scope.clone();
        self.out.push('<');
        self.out.push_str(&qname);
        for (prefix, uri) in bindings {
            let inherited = scope.get(&prefix).map_or("", String::as_str);
            if inherited == uri {
                continue;
            }
            if prefix.is_empty() {
                self.out.push_str(" xmlns=\"");
            } else {
                self.out.push_str(" xmlns:");
                self.out.push_str(&prefix);
                self.out.push_str("=\"");
            }
            write_escaped_attr(&mut self.out, &uri);
            self.out.push('"');
            inner.insert(prefix, uri);
        }
        for &attr in doc.attributes(id) {
            self.out.push(' ');
            self.out.push_str(&doc.qualified_name(attr).unwrap_or_default());
            self.out.push_str("=\"");
            write_escaped_attr(&mut self.out, doc.value(attr).unwrap_or_default());
            self.out.push('"');
        }

        if doc.first_child(id).is_none() {
            self.out.push_str("/>");
            return;
        }
        self.out.push('>');

        let indent_children = self.options.indent && is_element_only(doc, id);
        for child in doc.children(id) {
            if indent_children {
                if matches!(doc.kind(child), NodeKind::Text { .. }) {
                    continue;
                }
                self.out.push('\n');
            }
            self.write_node(child, &inner, depth + 1, indent_children);
        }
        if indent_children {
            self.out.push('\n');
            self.write_indent(depth);
        }

        self.out.push_str("</");
        self.out.push_str(&qname);
        self.out.push('>');
    }
}

/// Returns `true` if the element contains only other elements (and
/// optional whitespace text), meaning it's safe to add indentation.
fn is_element_only(doc: &Document, id: NodeId) -> bool {
    let mut has_element_child = false;
    for child in doc.children(id) {
        match doc.kind(child) {
            NodeKind::Element { .. } => has_element_child = true,
            NodeKind::Text { content } if !content.trim().is_empty() => return false,
            _ => {}
        }
    }
    has_element_child
}

fn quote_literal(literal: &str) -> String {
    if literal.contains('"') {
        format!("'{literal}'")
    } else {
        format!("\"{literal}\"")
    }
}

fn write_escaped_text(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#13;"),
            _ => out.push(ch),
        }
    }
}

fn write_escaped_attr(out: &mut String, value: &str) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#9;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            _ => out.push(ch),
        }
    }
}
