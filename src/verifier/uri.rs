//! RFC 3986 URI-reference checking.
//!
//! A URI reference is split into its five components with the generic
//! syntax of RFC 3986 §3 and each present component is validated against
//! its production. Only ASCII is accepted: IRIs must be converted with
//! [`crate::util::uri::iri_to_uri`] first.
//!
//! See <https://www.rfc-editor.org/rfc/rfc3986>

use std::sync::Mutex;

use once_cell::sync::Lazy;

use crate::error::VerifyError;

/// The components of a URI reference, borrowed from the input.
///
/// Absent components are `None`; the path is always present, though
/// possibly empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParsedUri<'a> {
    /// Scheme without the trailing `:`.
    pub scheme: Option<&'a str>,
    /// Authority without the leading `//`.
    pub authority: Option<&'a str>,
    /// Path, possibly empty.
    pub path: &'a str,
    /// Query without the leading `?`.
    pub query: Option<&'a str>,
    /// Fragment without the leading `#`.
    pub fragment: Option<&'a str>,
}

impl<'a> ParsedUri<'a> {
    /// Splits `uri` into components and validates each one.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::MalformedUri`] naming the offending component
    /// when any component violates its production.
    ///
    /// # Examples
    ///
    /// ```
    /// use xmlcore::verifier::uri::ParsedUri;
    ///
    /// let parsed = ParsedUri::parse("http://example.com/a?q=1#top").unwrap();
    /// assert_eq!(parsed.scheme, Some("http"));
    /// assert_eq!(parsed.authority, Some("example.com"));
    /// assert_eq!(parsed.path, "/a");
    /// assert_eq!(parsed.query, Some("q=1"));
    /// assert_eq!(parsed.fragment, Some("top"));
    /// ```
    pub fn parse(uri: &'a str) -> Result<Self, VerifyError> {
        let parsed = Self::split(uri);
        parsed.validate(uri)?;
        Ok(parsed)
    }

    /// Splits `uri` into components without validating them.
    #[must_use]
    pub fn split(uri: &'a str) -> Self {
        let (rest, fragment) = match uri.find('#') {
            Some(i) => (&uri[..i], Some(&uri[i + 1..])),
            None => (uri, None),
        };
        let (rest, query) = match rest.find('?') {
            Some(i) => (&rest[..i], Some(&rest[i + 1..])),
            None => (rest, None),
        };
        let (scheme, rest) = match rest.find(':') {
            Some(i) if !rest[..i].contains('/') => (Some(&rest[..i]), &rest[i + 1..]),
            _ => (None, rest),
        };
        let (authority, path) = match rest.strip_prefix("//") {
            Some(after) => {
                let end = after.find('/').unwrap_or(after.len());
                (Some(&after[..end]), &after[end..])
            }
            None => (None, rest),
        };
        Self {
            scheme,
            authority,
            path,
            query,
            fragment,
        }
    }

    fn validate(&self, uri: &str) -> Result<(), VerifyError> {
        if let Some(scheme) = self.scheme {
            check_scheme(uri, scheme)?;
        }
        if let Some(authority) = self.authority {
            check_authority(uri, authority)?;
        }
        if self.path.contains("//") {
            return Err(VerifyError::uri(uri, self.path, "double slash in path"));
        }
        check_component(uri, self.path, "path", is_path_byte)?;
        if let Some(query) = self.query {
            check_component(uri, query, "query", is_query_byte)?;
        }
        if let Some(fragment) = self.fragment {
            check_component(uri, fragment, "fragment", is_query_byte)?;
        }
        Ok(())
    }
}

/// Checks that `uri` is a syntactically valid URI reference.
///
/// The empty string is a valid (same-document) reference.
///
/// # Errors
///
/// Returns [`VerifyError::MalformedUri`] on any grammar violation.
pub fn check_uri_reference(uri: &str) -> Result<(), VerifyError> {
    if uri.is_empty() {
        return Ok(());
    }
    ParsedUri::parse(uri).map(|_| ())
}

/// Checks that `uri` is a valid URI reference carrying a scheme.
///
/// Results are memoized in a small cache of recently validated strings,
/// since the same namespace URI is typically checked once per element.
///
/// # Errors
///
/// Returns [`VerifyError::MalformedUri`] when the reference is malformed or
/// relative.
pub fn check_absolute_uri_reference(uri: &str) -> Result<(), VerifyError> {
    if RECENT.contains(uri) {
        return Ok(());
    }
    let parsed = ParsedUri::parse(uri)?;
    if parsed.scheme.is_none() {
        return Err(VerifyError::uri(uri, uri, "missing scheme in absolute URI reference"));
    }
    RECENT.insert(uri);
    Ok(())
}

/// Checks that `uri` is an absolute URI: a scheme and no fragment.
///
/// # Errors
///
/// Returns [`VerifyError::MalformedUri`] when the URI is malformed,
/// relative, or has a fragment identifier.
pub fn check_absolute_uri(uri: &str) -> Result<(), VerifyError> {
    check_absolute_uri_reference(uri)?;
    match ParsedUri::split(uri).fragment {
        Some(fragment) => Err(VerifyError::uri(
            uri,
            fragment,
            "absolute URIs cannot have fragment identifiers",
        )),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Recently validated absolute URI references
// ---------------------------------------------------------------------------

const RECENT_CAPACITY: usize = 6;

struct RecentUris {
    slots: Mutex<Ring>,
}

#[derive(Default)]
struct Ring {
    entries: [Option<String>; RECENT_CAPACITY],
    next: usize,
}

impl RecentUris {
    fn contains(&self, uri: &str) -> bool {
        let Ok(ring) = self.slots.lock() else {
            return false;
        };
        ring.entries.iter().flatten().any(|cached| cached == uri)
    }

    fn insert(&self, uri: &str) {
        let Ok(mut ring) = self.slots.lock() else {
            return;
        };
        let slot = ring.next;
        ring.entries[slot] = Some(uri.to_string());
        ring.next = (slot + 1) % RECENT_CAPACITY;
    }
}

static RECENT: Lazy<RecentUris> = Lazy::new(|| RecentUris {
    slots: Mutex::new(Ring::default()),
});

// ---------------------------------------------------------------------------
// Component productions
// ---------------------------------------------------------------------------

fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~')
}

fn is_sub_delim(b: u8) -> bool {
    matches!(
        b,
        b'!' | b'$' | b'&' | b'\'' | b'(' | b')' | b'*' | b'+' | b',' | b';' | b'='
    )
}

fn is_pchar(b: u8) -> bool {
    is_unreserved(b) || is_sub_delim(b) || b == b':' || b == b'@'
}

fn is_path_byte(b: u8) -> bool {
    is_pchar(b) || b == b'/'
}

fn is_query_byte(b: u8) -> bool {
    is_pchar(b) || b == b'/' || b == b'?'
}

fn is_userinfo_byte(b: u8) -> bool {
    is_unreserved(b) || is_sub_delim(b) || b == b':'
}

fn is_reg_name_byte(b: u8) -> bool {
    is_unreserved(b) || is_sub_delim(b)
}

/// Validates every byte of `component`, accepting `%HH` escapes anywhere.
fn check_component(
    uri: &str,
    component: &str,
    what: &str,
    allowed: fn(u8) -> bool,
) -> Result<(), VerifyError> {
    let bytes = component.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'%' {
            let escape = bytes.get(i + 1..i + 3);
            match escape {
                Some(hex) if hex.iter().all(u8::is_ascii_hexdigit) => {
                    i += 3;
                    continue;
                }
                _ => {
                    let end = (i + 3).min(bytes.len());
                    let data = String::from_utf8_lossy(&bytes[i..end]);
                    return Err(VerifyError::uri(uri, &data, "bad percent escape"));
                }
            }
        }
        if !allowed(b) {
            let c = component[i..].chars().next().unwrap_or('?');
            return Err(VerifyError::uri(
                uri,
                &c.to_string(),
                format!("illegal character {c:?} in {what}"),
            ));
        }
        i += 1;
    }
    Ok(())
}

fn check_scheme(uri: &str, scheme: &str) -> Result<(), VerifyError> {
    if scheme == "http" {
        return Ok(());
    }
    let mut bytes = scheme.bytes();
    match bytes.next() {
        Some(first) if first.is_ascii_alphabetic() => {}
        _ => return Err(VerifyError::uri(uri, scheme, "scheme must start with a letter")),
    }
    if bytes.all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'-' | b'.')) {
        Ok(())
    } else {
        Err(VerifyError::uri(uri, scheme, "illegal character in scheme"))
    }
}

fn check_authority(uri: &str, authority: &str) -> Result<(), VerifyError> {
    let host_port = match authority.rfind('@') {
        Some(at) => {
            check_component(uri, &authority[..at], "user info", is_userinfo_byte)?;
            &authority[at + 1..]
        }
        None => authority,
    };

    let port = if let Some(literal) = host_port.strip_prefix('[') {
        let Some(close) = literal.find(']') else {
            return Err(VerifyError::uri(uri, host_port, "unterminated IP literal"));
        };
        let ip = &literal[..close];
        check_ip_literal(uri, ip)?;
        let after = &literal[close + 1..];
        if after.is_empty() {
            None
        } else if let Some(port) = after.strip_prefix(':') {
            Some(port)
        } else {
            return Err(VerifyError::uri(uri, after, "junk after IP literal"));
        }
    } else {
        let (host, port) = match host_port.rfind(':') {
            Some(i) => (&host_port[..i], Some(&host_port[i + 1..])),
            None => (host_port, None),
        };
        if host.len() > 255 {
            return Err(VerifyError::uri(uri, host, "host name too long"));
        }
        check_component(uri, host, "host", is_reg_name_byte)?;
        port
    };

    if let Some(port) = port {
        if !port.bytes().all(|b| b.is_ascii_digit()) {
            return Err(VerifyError::uri(uri, port, "port must be decimal digits"));
        }
    }
    Ok(())
}

fn check_ip_literal(uri: &str, ip: &str) -> Result<(), VerifyError> {
    if let Some(future) = ip.strip_prefix('v').or_else(|| ip.strip_prefix('V')) {
        let valid = future.split_once('.').is_some_and(|(version, rest)| {
            !version.is_empty()
                && version.bytes().all(|b| b.is_ascii_hexdigit())
                && !rest.is_empty()
                && rest.bytes().all(is_userinfo_byte)
        });
        return if valid {
            Ok(())
        } else {
            Err(VerifyError::uri(uri, ip, "malformed IPvFuture literal"))
        };
    }
    if is_ipv6(ip) {
        Ok(())
    } else {
        Err(VerifyError::uri(uri, ip, "malformed IPv6 address"))
    }
}

/// Counts the 16-bit groups in a run of `:`-separated IPv6 pieces, or
/// `None` if a piece is malformed. A trailing dotted quad counts as two.
fn ipv6_groups(run: &str, allow_ipv4: bool) -> Option<usize> {
    if run.is_empty() {
        return Some(0);
    }
    let pieces: Vec<&str> = run.split(':').collect();
    let last = pieces.len() - 1;
    let mut count = 0;
    for (i, piece) in pieces.iter().enumerate() {
        if piece.contains('.') {
            if !(allow_ipv4 && i == last && is_ipv4(piece)) {
                return None;
            }
            count += 2;
        } else if (1..=4).contains(&piece.len()) && piece.bytes().all(|b| b.is_ascii_hexdigit()) {
            count += 1;
        } else {
            return None;
        }
    }
    Some(count)
}

fn is_ipv6(ip: &str) -> bool {
    match ip.find("::") {
        Some(i) => {
            let head = &ip[..i];
            let tail = &ip[i + 2..];
            if tail.contains("::") {
                return false;
            }
            match (ipv6_groups(head, false), ipv6_groups(tail, true)) {
                (Some(h), Some(t)) => h + t <= 7,
                _ => false,
            }
        }
        None => ipv6_groups(ip, true) == Some(8),
    }
}

fn is_ipv4(s: &str) -> bool {
    let octets: Vec<&str> = s.split('.').collect();
    octets.len() == 4
        && octets.iter().all(|o| {
            (1..=3).contains(&o.len())
                && o.bytes().all(|b| b.is_ascii_digit())
                && o.parse::<u16>().is_ok_and(|v| v <= 255)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(uri: &str) {
        assert!(check_uri_reference(uri).is_ok(), "{uri} should be accepted");
    }

    fn bad(uri: &str) {
        assert!(check_uri_reference(uri).is_err(), "{uri} should be rejected");
    }

    #[test]
    fn test_accepts_common_references() {
        ok("");
        ok("http://example.com/a%2Fb?q=1#frag");
        ok("https://user:pw@example.com:8080/p/a/t/h?x=y");
        ok("file:///tmp/data.xml");
        ok("urn:isbn:0451450523");
        ok("mailto:someone@example.com");
        ok("../relative/path.xml");
        ok("#fragment-only");
        ok("?query-only");
        ok("http://example.com");
    }

    #[test]
    fn test_rejects_double_slash_in_path() {
        bad("http://example.com/a//b");
        bad("a//b");
    }

    #[test]
    fn test_rejects_bad_percent_escapes() {
        bad("http://example.com/%2G");
        bad("http://example.com/%2");
        bad("http://example.com/%");
        ok("http://example.com/%2f%C3%A9");
    }

    #[test]
    fn test_rejects_illegal_characters() {
        bad("http://example.com/a b");
        bad("http://example.com/<a>");
        bad("http://example.com/caf\u{e9}");
        bad("http://example.com/#a#b");
    }

    #[test]
    fn test_scheme_rules() {
        bad("1http://example.com/");
        bad(":nothing");
        bad("ht tp://example.com/");
        ok("svn+ssh://example.com/repo");
    }

    #[test]
    fn test_ipv6_hosts() {
        ok("http://[::1]/");
        ok("http://[::1]:80/");
        ok("http://[2001:db8::7]/c=GB?objectClass?one");
        ok("http://[1:2:3:4:5:6:7:8]/");
        ok("http://[::ffff:192.0.2.128]/");
        ok("http://[v7.fe80::a+en1]/");
        bad("http://[1:2:3:4:5:6:7:8:9]/");
        bad("http://[1::2::3]/");
        bad("http://[12345::]/");
        bad("http://[::1/");
        bad("http://[:1]/");
        bad("http://[::1]x/");
        bad("http://[::256.0.0.1]/");
    }

    #[test]
    fn test_port_must_be_numeric() {
        bad("http://example.com:80a/");
        ok("http://example.com:/");
    }

    #[test]
    fn test_host_length_limit() {
        let host = "a".repeat(256);
        bad(&format!("http://{host}/"));
        ok(&format!("http://{}/", "a".repeat(255)));
    }

    #[test]
    fn test_absolute_reference_requires_scheme() {
        assert!(check_absolute_uri_reference("http://example.com/#x").is_ok());
        assert!(check_absolute_uri_reference("relative/path").is_err());
        assert!(check_absolute_uri_reference("").is_err());
    }

    #[test]
    fn test_absolute_uri_forbids_fragment() {
        assert!(check_absolute_uri("http://example.com/").is_ok());
        assert!(check_absolute_uri("http://example.com/#x").is_err());
    }

    #[test]
    fn test_cache_only_holds_valid_entries() {
        let uri = "http://example.com/cached%20ok";
        assert!(check_absolute_uri_reference(uri).is_ok());
        assert!(check_absolute_uri_reference(uri).is_ok());
        assert!(check_absolute_uri_reference("http://example.com/%zz").is_err());
        assert!(!RECENT.contains("http://example.com/%zz"));
    }

    #[test]
    fn test_split_components() {
        let parsed = ParsedUri::split("s://auth/p?q#f");
        assert_eq!(
            parsed,
            ParsedUri {
                scheme: Some("s"),
                authority: Some("auth"),
                path: "/p",
                query: Some("q"),
                fragment: Some("f"),
            }
        );
        let relative = ParsedUri::split("a/b:c");
        assert_eq!(relative.scheme, None);
        assert_eq!(relative.path, "a/b:c");
    }
}
