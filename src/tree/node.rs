//! Node type definitions.
//!
//! The `NodeKind` enum is the closed vocabulary of node kinds a document tree
//! may contain. Each variant carries the node-type-specific payload (element
//! name and attributes, text content, ...).

use super::Attribute;

/// The kind of an XML node and its associated data.
///
/// This enum carries the payload for each node type. Navigation links
/// (parent, children, siblings) are stored in `NodeData`, not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// The document node; there is exactly one per `Document`.
    Document,

    /// A document fragment: an ordered sibling sequence with no single
    /// owning element.
    DocumentFragment,

    /// An element node, e.g., `<div class="x">`.
    Element {
        /// The element's local name.
        name: String,
        /// Namespace prefix (e.g., `"svg"` in `svg:rect`), if any.
        prefix: Option<String>,
        /// Namespace URI after resolution, if any.
        namespace: Option<String>,
        /// Attributes on this element, including `xmlns` declarations, in
        /// document order and unique by qualified name.
        attributes: Vec<Attribute>,
    },

    /// A text node containing character data.
    Text {
        /// The text content (already decoded, character references resolved).
        content: String,
    },

    /// A CDATA section, e.g., `<![CDATA[...]]>`.
    CData {
        /// The CDATA content (no escaping applied).
        content: String,
    },

    /// A comment node, e.g., `<!-- ... -->`.
    Comment {
        /// The comment text (without the `<!--` and `-->` delimiters).
        content: String,
    },

    /// A processing instruction, e.g., `<?target data?>`.
    ProcessingInstruction {
        /// The PI target (e.g., `"xml-stylesheet"`).
        target: String,
        /// The PI data, if any.
        data: Option<String>,
    },

    /// An unexpanded entity reference (e.g., `&product;`).
    EntityRef {
        /// The entity name (without `&` and `;`).
        name: String,
        /// The declared replacement text, when the document declared one.
        value: Option<String>,
    },

    /// A document type declaration node, e.g., `<!DOCTYPE html>`.
    DocumentType {
        /// The root element name declared in the DOCTYPE.
        name: String,
        /// The SYSTEM identifier (URI), if any.
        system_id: Option<String>,
        /// The PUBLIC identifier, if any.
        public_id: Option<String>,
        /// The raw internal subset text between `[` and `]`, if any.
        internal_subset: Option<String>,
    },
}

impl NodeKind {
    /// Returns `true` for element nodes.
    #[must_use]
    pub fn is_element(&self) -> bool {
        matches!(self, Self::Element { .. })
    }

    /// Short lowercase label used in diagnostics.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::DocumentFragment => "document fragment",
            Self::Element { .. } => "element",
            Self::Text { .. } => "text",
            Self::CData { .. } => "cdata",
            Self::Comment { .. } => "comment",
            Self::ProcessingInstruction { .. } => "processing instruction",
            Self::EntityRef { .. } => "entity reference",
            Self::DocumentType { .. } => "document type",
        }
    }
}
