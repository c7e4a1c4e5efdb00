//! The event vocabulary shared by every source and writer.
//!
//! An [`XmlEvent`] is one step of a pull-style walk over XML content. Real
//! parsers ([`crate::reader::XmlStreamReader`]), the tree adapter
//! ([`crate::traverse::TreeReader`]) and the push shim
//! ([`crate::sax::PushShim`]) all produce the same closed set of events, so
//! the copy engine and the materializer never need to know which kind of
//! source they are draining.

use std::fmt;

use crate::error::SourceLocation;
use crate::util::qname::join_qname;

/// The tag of an [`XmlEvent`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// An element start tag.
    StartElement,
    /// An element end tag (also synthesized for `<empty/>` elements).
    EndElement,
    /// Character data.
    Characters,
    /// A CDATA section.
    CData,
    /// A comment.
    Comment,
    /// A processing instruction.
    ProcessingInstruction,
    /// An unexpanded entity reference.
    EntityReference,
    /// The start of a document.
    StartDocument,
    /// The end of a document.
    EndDocument,
    /// A standalone attribute.
    Attribute,
    /// A standalone namespace declaration.
    Namespace,
    /// A document type declaration.
    Dtd,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::StartElement => "START_ELEMENT",
            Self::EndElement => "END_ELEMENT",
            Self::Characters => "CHARACTERS",
            Self::CData => "CDATA",
            Self::Comment => "COMMENT",
            Self::ProcessingInstruction => "PROCESSING_INSTRUCTION",
            Self::EntityReference => "ENTITY_REFERENCE",
            Self::StartDocument => "START_DOCUMENT",
            Self::EndDocument => "END_DOCUMENT",
            Self::Attribute => "ATTRIBUTE",
            Self::Namespace => "NAMESPACE",
            Self::Dtd => "DTD",
        };
        f.write_str(label)
    }
}

/// A namespace-qualified name.
///
/// `prefix` and `namespace` use the empty string for "none", matching how
/// writers receive them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct QName {
    /// The prefix as written in the source (`""` when unprefixed).
    pub prefix: String,
    /// The local part.
    pub local_name: String,
    /// The resolved namespace URI (`""` when in no namespace).
    pub namespace: String,
}

impl QName {
    /// Creates a name in no namespace.
    pub fn local(local_name: impl Into<String>) -> Self {
        Self {
            prefix: String::new(),
            local_name: local_name.into(),
            namespace: String::new(),
        }
    }

    /// Creates a fully specified name.
    pub fn new(
        prefix: impl Into<String>,
        local_name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            local_name: local_name.into(),
            namespace: namespace.into(),
        }
    }

    /// Returns `prefix:local` or `local`.
    #[must_use]
    pub fn qualified(&self) -> String {
        join_qname(Some(&self.prefix), &self.local_name)
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.qualified())
        } else {
            write!(f, "{{{}}}{}", self.namespace, self.qualified())
        }
    }
}

/// One `xmlns` / `xmlns:p` declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamespaceDecl {
    /// The declared prefix (`""` for the default namespace).
    pub prefix: String,
    /// The namespace URI (`""` undeclares the default namespace).
    pub uri: String,
}

impl NamespaceDecl {
    /// Creates a declaration.
    pub fn new(prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            uri: uri.into(),
        }
    }
}

/// An ordinary (non-`xmlns`) attribute carried by a start element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventAttribute {
    /// The attribute name.
    pub name: QName,
    /// The attribute value, fully decoded.
    pub value: String,
}

impl EventAttribute {
    /// Creates an attribute in no namespace.
    pub fn new(local_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: QName::local(local_name),
            value: value.into(),
        }
    }
}

/// The payload of a START_ELEMENT event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StartElement {
    /// The element name.
    pub name: QName,
    /// Namespace declarations made on this element, in document order.
    pub namespaces: Vec<NamespaceDecl>,
    /// Ordinary attributes, in document order.
    pub attributes: Vec<EventAttribute>,
}

/// A parsed `<!DOCTYPE ...>` declaration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DocTypeDecl {
    /// The declared root element name.
    pub name: String,
    /// The PUBLIC identifier, if any.
    pub public_id: Option<String>,
    /// The SYSTEM identifier, if any.
    pub system_id: Option<String>,
    /// The raw internal subset, if any.
    pub internal_subset: Option<String>,
}

impl DocTypeDecl {
    /// Renders the declaration back to markup.
    #[must_use]
    pub fn to_markup(&self) -> String {
        let mut out = String::from("<!DOCTYPE ");
        out.push_str(&self.name);
        match (&self.public_id, &self.system_id) {
            (Some(pub_id), Some(sys_id)) => {
                out.push_str(" PUBLIC \"");
                out.push_str(pub_id);
                out.push_str("\" \"");
                out.push_str(sys_id);
                out.push('"');
            }
            (None, Some(sys_id)) => {
                out.push_str(" SYSTEM \"");
                out.push_str(sys_id);
                out.push('"');
            }
            _ => {}
        }
        if let Some(subset) = &self.internal_subset {
            out.push_str(" [");
            out.push_str(subset);
            out.push(']');
        }
        out.push('>');
        out
    }
}

/// A single pull-parse event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlEvent {
    /// The start of a document, with the XML declaration values if present.
    StartDocument {
        /// Declared XML version.
        version: Option<String>,
        /// Declared encoding.
        encoding: Option<String>,
        /// Declared standalone flag.
        standalone: Option<bool>,
    },
    /// The end of a document.
    EndDocument,
    /// An element start tag.
    StartElement(StartElement),
    /// An element end tag.
    EndElement {
        /// The element name.
        name: QName,
    },
    /// Character data.
    Characters(String),
    /// A CDATA section.
    CData(String),
    /// A comment.
    Comment(String),
    /// A processing instruction.
    ProcessingInstruction {
        /// The PI target.
        target: String,
        /// The PI data, if any.
        data: Option<String>,
    },
    /// An entity reference that was not expanded.
    EntityReference {
        /// The entity name.
        name: String,
        /// The declared replacement text, if the document declared one.
        replacement: Option<String>,
    },
    /// A standalone attribute (only produced by some push sources).
    Attribute(EventAttribute),
    /// A standalone namespace declaration (only produced by some push sources).
    Namespace(NamespaceDecl),
    /// A document type declaration.
    Dtd(DocTypeDecl),
}

impl XmlEvent {
    /// Returns the tag of this event.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::StartDocument { .. } => EventKind::StartDocument,
            Self::EndDocument => EventKind::EndDocument,
            Self::StartElement(_) => EventKind::StartElement,
            Self::EndElement { .. } => EventKind::EndElement,
            Self::Characters(_) => EventKind::Characters,
            Self::CData(_) => EventKind::CData,
            Self::Comment(_) => EventKind::Comment,
            Self::ProcessingInstruction { .. } => EventKind::ProcessingInstruction,
            Self::EntityReference { .. } => EventKind::EntityReference,
            Self::Attribute(_) => EventKind::Attribute,
            Self::Namespace(_) => EventKind::Namespace,
            Self::Dtd(_) => EventKind::Dtd,
        }
    }

    /// Returns `true` for character data that is entirely XML whitespace.
    #[must_use]
    pub fn is_whitespace(&self) -> bool {
        match self {
            Self::Characters(text) => text
                .bytes()
                .all(|b| matches!(b, b' ' | b'\t' | b'\r' | b'\n')),
            _ => false,
        }
    }
}

/// Where an event came from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Location {
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number.
    pub column: u32,
    /// 0-based character offset from the start of the input.
    pub offset: usize,
    /// The public identifier of the source, if known.
    pub public_id: Option<String>,
    /// The system identifier of the source, if known.
    pub system_id: Option<String>,
}

impl Location {
    /// The line/column/offset part, for error reporting.
    #[must_use]
    pub fn to_source_location(&self) -> SourceLocation {
        SourceLocation {
            line: self.line,
            column: self.column,
            byte_offset: self.offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_labels() {
        assert_eq!(EventKind::StartElement.to_string(), "START_ELEMENT");
        assert_eq!(EventKind::Dtd.to_string(), "DTD");
    }

    #[test]
    fn test_qname_display() {
        assert_eq!(QName::local("a").to_string(), "a");
        assert_eq!(QName::new("s", "Body", "urn:s").to_string(), "{urn:s}s:Body");
    }

    #[test]
    fn test_whitespace_detection() {
        assert!(XmlEvent::Characters(" \n\t".to_string()).is_whitespace());
        assert!(!XmlEvent::Characters(" x ".to_string()).is_whitespace());
        assert!(!XmlEvent::Comment(" ".to_string()).is_whitespace());
    }

    #[test]
    fn test_doctype_markup() {
        let dtd = DocTypeDecl {
            name: "html".to_string(),
            public_id: Some("-//W3C//DTD XHTML 1.0 Strict//EN".to_string()),
            system_id: Some("strict.dtd".to_string()),
            internal_subset: None,
        };
        assert_eq!(
            dtd.to_markup(),
            "<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.0 Strict//EN\" \"strict.dtd\">"
        );
    }
}
