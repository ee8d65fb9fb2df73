//! Qualified names (`prefix:local` or `local`).
//!
//! See <https://www.w3.org/TR/xml-names/#NT-QName>

use crate::error::VerifyError;
use crate::verifier;

/// Splits at the first colon. No checking; `a:b:c` gives `("a", "b:c")`.
///
/// # Examples
///
/// ```
/// use xmlcore::util::qname::split_qname;
///
/// assert_eq!(split_qname("svg:rect"), (Some("svg"), "rect"));
/// assert_eq!(split_qname("div"), (None, "div"));
/// ```
#[must_use]
pub fn split_qname(qname: &str) -> (Option<&str>, &str) {
    match qname.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, qname),
    }
}

/// Splits a qualified name and checks both halves: the local part must be
/// an `NCName` and the prefix, when present, a bindable prefix.
///
/// # Errors
///
/// Returns [`VerifyError::IllegalName`] for an empty half, a second colon,
/// or an `xmlns` prefix.
///
/// # Examples
///
/// ```
/// use xmlcore::util::qname::check_qname;
///
/// assert_eq!(check_qname("xi:include").unwrap(), (Some("xi"), "include"));
/// assert!(check_qname("a:b:c").is_err());
/// assert!(check_qname(":local").is_err());
/// assert!(check_qname("xmlns:p").is_err());
/// ```
pub fn check_qname(qname: &str) -> Result<(Option<&str>, &str), VerifyError> {
    let (prefix, local) = split_qname(qname);
    verifier::check_ncname(local)?;
    if let Some(prefix) = prefix {
        if prefix.is_empty() {
            return Err(VerifyError::name(qname, "a qualified name cannot start with a colon"));
        }
        verifier::check_namespace_prefix(prefix)?;
    }
    Ok((prefix, local))
}
