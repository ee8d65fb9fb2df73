//! Document type declaration reading.
//!
//! Only what document building needs is extracted from the internal
//! subset: attribute-list declarations (types and default values) and
//! internal general entities. Element and notation declarations, parameter
//! entities and comments are skipped. External subsets are never read.

use std::collections::HashMap;

use crate::error::ParseError;
use crate::tree::AttributeType;

/// How an attribute declaration defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultDecl {
    /// `#REQUIRED`.
    Required,
    /// `#IMPLIED`.
    Implied,
    /// `#FIXED "value"`.
    Fixed(String),
    /// A plain default value.
    Value(String),
}

impl DefaultDecl {
    /// Returns the default value, if the declaration supplies one.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        match self {
            Self::Fixed(v) | Self::Value(v) => Some(v),
            Self::Required | Self::Implied => None,
        }
    }
}

/// One attribute definition from an `<!ATTLIST>` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDecl {
    /// Qualified name of the element the attribute belongs to.
    pub element: String,
    /// Qualified name of the attribute.
    pub name: String,
    /// The declared type.
    pub attribute_type: AttributeType,
    /// The default declaration.
    pub default: DefaultDecl,
}

/// A parsed `<!DOCTYPE ...>` declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DoctypeDecl {
    /// The declared root element name.
    pub root_name: String,
    /// The PUBLIC identifier.
    pub public_id: Option<String>,
    /// The SYSTEM identifier.
    pub system_id: Option<String>,
    /// The internal subset text, without brackets.
    pub internal_subset: Option<String>,
    /// Attribute declarations, first declaration wins.
    pub attributes: Vec<AttributeDecl>,
    /// Internal general entities: name to replacement text.
    pub entities: HashMap<String, String>,
}

impl DoctypeDecl {
    /// Looks up the declaration for `attribute` on `element`.
    #[must_use]
    pub fn attribute(&self, element: &str, attribute: &str) -> Option<&AttributeDecl> {
        self.attributes
            .iter()
            .find(|decl| decl.element == element && decl.name == attribute)
    }

    /// Iterates over the declarations that supply defaults for `element`.
    pub fn defaults_for<'a>(&'a self, element: &'a str) -> impl Iterator<Item = &'a AttributeDecl> {
        self.attributes
            .iter()
            .filter(move |decl| decl.element == element && decl.default.value().is_some())
    }

    /// Resolves a general entity to its replacement text, including the
    /// five predefined entities.
    #[must_use]
    pub fn entity(&self, name: &str) -> Option<&str> {
        predefined_entity(name).or_else(|| self.entities.get(name).map(String::as_str))
    }
}

/// Returns the replacement text of a predefined XML entity.
#[must_use]
pub fn predefined_entity(name: &str) -> Option<&'static str> {
    Some(match name {
        "lt" => "<",
        "gt" => ">",
        "amp" => "&",
        "apos" => "'",
        "quot" => "\"",
        _ => return None,
    })
}

/// Parses the body of a DOCTYPE declaration (everything between
/// `<!DOCTYPE` and the final `>`).
///
/// # Errors
///
/// Returns `ParseError` for a missing root name, an unterminated literal,
/// or a malformed markup declaration in the internal subset.
pub fn parse_doctype(body: &str) -> Result<DoctypeDecl, ParseError> {
    let mut cursor = Cursor::new(body);
    cursor.skip_space();
    let root_name = cursor.name();
    if root_name.is_empty() {
        return Err(ParseError::new("DOCTYPE declaration without a root element name"));
    }
    let mut decl = DoctypeDecl {
        root_name: root_name.to_string(),
        ..DoctypeDecl::default()
    };

    cursor.skip_space();
    if cursor.eat("PUBLIC") {
        cursor.skip_space();
        decl.public_id = Some(cursor.literal()?.to_string());
        cursor.skip_space();
        if cursor.peek().is_some_and(|c| c == '"' || c == '\'') {
            decl.system_id = Some(cursor.literal()?.to_string());
        }
    } else if cursor.eat("SYSTEM") {
        cursor.skip_space();
        decl.system_id = Some(cursor.literal()?.to_string());
    }

    cursor.skip_space();
    if cursor.eat("[") {
        let Some(end) = cursor.rest().rfind(']') else {
            return Err(ParseError::new("unterminated internal subset"));
        };
        let subset = &cursor.rest()[..end];
        decl.internal_subset = Some(subset.to_string());
        read_internal_subset(subset, &mut decl)?;
    }
    Ok(decl)
}

fn read_internal_subset(subset: &str, decl: &mut DoctypeDecl) -> Result<(), ParseError> {
    let mut cursor = Cursor::new(subset);
    loop {
        cursor.skip_space();
        if cursor.is_empty() {
            return Ok(());
        }
        if cursor.eat("<!--") {
            cursor.skip_past("-->")?;
        } else if cursor.eat("<?") {
            cursor.skip_past("?>")?;
        } else if cursor.eat("<!ATTLIST") {
            read_attlist(&mut cursor, decl)?;
        } else if cursor.eat("<!ENTITY") {
            read_entity(&mut cursor, decl)?;
        } else if cursor.eat("<!") {
            cursor.skip_declaration()?;
        } else if cursor.eat("%") {
            cursor.skip_past(";")?;
        } else {
            return Err(ParseError::new(format!(
                "unexpected content in internal subset near {:?}",
                cursor.rest().chars().take(16).collect::<String>()
            )));
        }
    }
}

fn read_attlist(cursor: &mut Cursor<'_>, decl: &mut DoctypeDecl) -> Result<(), ParseError> {
    cursor.skip_space();
    let element = cursor.name().to_string();
    if element.is_empty() {
        return Err(ParseError::new("ATTLIST declaration without an element name"));
    }
    loop {
        cursor.skip_space();
        if cursor.eat(">") {
            return Ok(());
        }
        let name = cursor.name().to_string();
        if name.is_empty() {
            return Err(ParseError::new(format!("malformed ATTLIST declaration for {element}")));
        }
        cursor.skip_space();
        let attribute_type = if cursor.peek() == Some('(') {
            cursor.skip_past(")")?;
            AttributeType::Enumeration
        } else {
            let keyword = cursor.name();
            let attribute_type = AttributeType::from_keyword(keyword).ok_or_else(|| {
                ParseError::new(format!("unknown attribute type {keyword:?} for {name}"))
            })?;
            if attribute_type == AttributeType::Notation {
                cursor.skip_space();
                cursor.skip_past(")")?;
            }
            attribute_type
        };
        cursor.skip_space();
        let default = if cursor.eat("#REQUIRED") {
            DefaultDecl::Required
        } else if cursor.eat("#IMPLIED") {
            DefaultDecl::Implied
        } else if cursor.eat("#FIXED") {
            cursor.skip_space();
            DefaultDecl::Fixed(cursor.literal()?.to_string())
        } else {
            DefaultDecl::Value(cursor.literal()?.to_string())
        };
        if decl.attribute(&element, &name).is_none() {
            decl.attributes.push(AttributeDecl {
                element: element.clone(),
                name,
                attribute_type,
                default,
            });
        }
    }
}

fn read_entity(cursor: &mut Cursor<'_>, decl: &mut DoctypeDecl) -> Result<(), ParseError> {
    cursor.skip_space();
    if cursor.eat("%") {
        return cursor.skip_declaration();
    }
    let name = cursor.name().to_string();
    if name.is_empty() {
        return Err(ParseError::new("ENTITY declaration without a name"));
    }
    cursor.skip_space();
    if !cursor.peek().is_some_and(|c| c == '"' || c == '\'') {
        tracing::debug!(entity = %name, "skipping external entity declaration");
        return cursor.skip_declaration();
    }
    let value = cursor.literal()?;
    let expanded = quick_xml::escape::unescape_with(value, |ent| decl.entity(ent))
        .map_or_else(|_| value.to_string(), std::borrow::Cow::into_owned);
    decl.entities.entry(name).or_insert(expanded);
    cursor.skip_space();
    cursor.skip_declaration()
}

struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.text.len()
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn skip_space(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start_matches([' ', '\t', '\r', '\n']).len();
    }

    /// Reads a run of name characters (possibly empty).
    fn name(&mut self) -> &'a str {
        let rest = self.rest();
        let len = rest
            .find(|c: char| c.is_whitespace() || matches!(c, '[' | ']' | '>' | '(' | '"' | '\'' | '|' | ')'))
            .unwrap_or(rest.len());
        self.pos += len;
        &rest[..len]
    }

    /// Reads a quoted literal and returns its contents.
    fn literal(&mut self) -> Result<&'a str, ParseError> {
        let rest = self.rest();
        let Some(quote) = rest.chars().next().filter(|&c| c == '"' || c == '\'') else {
            return Err(ParseError::new("expected a quoted literal in DOCTYPE"));
        };
        let Some(end) = rest[1..].find(quote) else {
            return Err(ParseError::new("unterminated literal in DOCTYPE"));
        };
        self.pos += end + 2;
        Ok(&rest[1..=end])
    }

    fn skip_past(&mut self, token: &str) -> Result<(), ParseError> {
        match self.rest().find(token) {
            Some(i) => {
                self.pos += i + token.len();
                Ok(())
            }
            None => Err(ParseError::new(format!("expected {token:?} in DOCTYPE"))),
        }
    }

    /// Skips to the `>` closing the current declaration, ignoring any
    /// inside quoted literals.
    fn skip_declaration(&mut self) -> Result<(), ParseError> {
        let mut quote = None;
        for (i, c) in self.rest().char_indices() {
            match (quote, c) {
                (None, '"' | '\'') => quote = Some(c),
                (Some(q), _) if q == c => quote = None,
                (None, '>') => {
                    self.pos += i + 1;
                    return Ok(());
                }
                _ => {}
            }
        }
        Err(ParseError::new("unterminated markup declaration in DOCTYPE"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_external_ids() {
        let decl = parse_doctype(r#" html PUBLIC "-//W3C//DTD XHTML 1.0//EN" "xhtml1.dtd""#).unwrap();
        assert_eq!(decl.root_name, "html");
        assert_eq!(decl.public_id.as_deref(), Some("-//W3C//DTD XHTML 1.0//EN"));
        assert_eq!(decl.system_id.as_deref(), Some("xhtml1.dtd"));
        assert_eq!(decl.internal_subset, None);
    }

    #[test]
    fn test_attlist_types_and_defaults() {
        let decl = parse_doctype(
            r#" doc [
                <!ELEMENT doc (#PCDATA)>
                <!-- the id attribute -->
                <!ATTLIST doc id ID #IMPLIED
                              tokens NMTOKENS "a  b"
                              mode (on|off) #FIXED 'on'>
                <!ATTLIST doc id CDATA #IMPLIED>
            ]"#,
        )
        .unwrap();
        let id = decl.attribute("doc", "id").unwrap();
        assert_eq!(id.attribute_type, AttributeType::Id);
        assert_eq!(id.default, DefaultDecl::Implied);
        let mode = decl.attribute("doc", "mode").unwrap();
        assert_eq!(mode.attribute_type, AttributeType::Enumeration);
        assert_eq!(mode.default, DefaultDecl::Fixed("on".to_string()));
        let defaults: Vec<&str> = decl.defaults_for("doc").map(|d| d.name.as_str()).collect();
        assert_eq!(defaults, vec!["tokens", "mode"]);
    }

    #[test]
    fn test_internal_entities() {
        let decl = parse_doctype(
            r#" doc [
                <!ENTITY greeting "hello &#x21;">
                <!ENTITY ext SYSTEM "ext.xml">
                <!ENTITY % pe "ignored">
                %pe;
            ]"#,
        )
        .unwrap();
        assert_eq!(decl.entity("greeting"), Some("hello !"));
        assert_eq!(decl.entity("ext"), None);
        assert_eq!(decl.entity("amp"), Some("&"));
    }

    #[test]
    fn test_missing_root_name() {
        assert!(parse_doctype("   ").is_err());
        assert!(parse_doctype(r#" doc SYSTEM "unterminated"#).is_err());
    }
}
