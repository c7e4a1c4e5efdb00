//! `QName` (qualified name) handling.
//!
//! A `QName` is a name of the form `prefix:localname` or just `localname` (with
//! no prefix). This module provides utilities for splitting and joining
//! qualified names and for recognizing namespace declaration attributes.
//!
//! See <https://www.w3.org/TR/xml-names/#NT-QName>

/// The namespace URI bound to the reserved `xmlns` prefix.
pub const XMLNS_NAMESPACE: &str = "http://www.w3.org/2000/xmlns/";

/// The namespace URI permanently bound to the `xml` prefix.
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Splits a `QName` into its prefix and local name parts.
///
/// Returns `(Some(prefix), localname)` if the name contains a colon,
/// or `(None, localname)` if it does not.
///
/// # Examples
///
/// ```
/// use xmlbridge::util::qname::split_qname;
///
/// assert_eq!(split_qname("svg:rect"), (Some("svg"), "rect"));
/// assert_eq!(split_qname("div"), (None, "div"));
/// ```
#[must_use]
pub fn split_qname(qname: &str) -> (Option<&str>, &str) {
    match qname.find(':') {
        Some(pos) => (Some(&qname[..pos]), &qname[pos + 1..]),
        None => (None, qname),
    }
}

/// Joins a prefix and local name into a qualified name.
///
/// An empty prefix yields the bare local name.
#[must_use]
pub fn join_qname(prefix: Option<&str>, local: &str) -> String {
    match prefix {
        Some(p) if !p.is_empty() => format!("{p}:{local}"),
        _ => local.to_string(),
    }
}

/// Classifies an attribute name as a namespace declaration.
///
/// Returns `Some("")` for the default-namespace form `xmlns`, `Some(p)` for
/// `xmlns:p`, and `None` for an ordinary attribute.
#[must_use]
pub fn namespace_decl_prefix(qname: &str) -> Option<&str> {
    if qname == "xmlns" {
        Some("")
    } else {
        qname.strip_prefix("xmlns:")
    }
}
