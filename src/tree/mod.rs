//! Arena-based XML document tree.
//!
//! All nodes live in a contiguous `Vec<NodeData>` owned by the `Document`,
//! and are referenced by `NodeId`, a newtype over `NonZeroU32`.
//!
//! Navigation links (parent, first\_child, last\_child, next\_sibling,
//! prev\_sibling) are arena indices, so the tree has no reference cycles and
//! no per-node heap allocation. Dropping the `Document` frees everything.
//!
//! The tree is mutated only by appending (the materializer and the tree
//! writer build it front to back); the copy engine and the tree reader only
//! ever borrow it immutably.

mod node;

pub use node::NodeKind;

use crate::error::Result;
use crate::event::Location;
use crate::util::qname::{join_qname, namespace_decl_prefix, XMLNS_NAMESPACE};
use std::num::NonZeroU32;

/// A typed index into the document's node arena.
///
/// `NodeId` is a newtype over `NonZeroU32`, meaning it can never be zero
/// and `Option<NodeId>` has the same size as `NodeId` (niche optimization).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NodeId(NonZeroU32);

impl NodeId {
    /// Creates a `NodeId` from a raw index.
    ///
    /// # Panics
    ///
    /// Panics if `index` is 0.
    #[allow(clippy::expect_used, clippy::cast_possible_truncation)]
    fn from_index(index: usize) -> Self {
        Self(NonZeroU32::new(index as u32).expect("NodeId index must be non-zero"))
    }

    /// Returns the raw index as a `usize` for indexing into the arena.
    fn as_index(self) -> usize {
        self.0.get() as usize
    }
}

/// Storage for a single node in the document arena.
#[derive(Debug, Clone)]
pub struct NodeData {
    /// What kind of node this is (element, text, comment, etc.) and its payload.
    pub kind: NodeKind,
    /// Parent node, if any. The document root node has no parent.
    pub parent: Option<NodeId>,
    /// First child node.
    pub first_child: Option<NodeId>,
    /// Last child node (for O(1) append).
    pub last_child: Option<NodeId>,
    /// Next sibling.
    pub next_sibling: Option<NodeId>,
    /// Previous sibling.
    pub prev_sibling: Option<NodeId>,
    /// Source position recorded by the materializer, if any.
    pub location: Option<Location>,
}

impl NodeData {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            first_child: None,
            last_child: None,
            next_sibling: None,
            prev_sibling: None,
            location: None,
        }
    }
}

/// An XML attribute on an element.
///
/// Namespace declarations are stored as attributes too: `xmlns="u"` has
/// name `xmlns` and no prefix, `xmlns:p="u"` has name `p` and prefix
/// `xmlns`. Both carry the `xmlns` namespace URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// The attribute name (the local part, e.g., `"lang"` for `xml:lang`).
    pub name: String,
    /// The attribute value.
    pub value: String,
    /// Namespace prefix, if any (e.g., `"xml"` for `xml:lang`).
    pub prefix: Option<String>,
    /// Namespace URI after resolution, if any.
    pub namespace: Option<String>,
}

impl Attribute {
    /// Creates an attribute with no namespace.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            prefix: None,
            namespace: None,
        }
    }

    /// Creates a namespace-qualified attribute.
    pub fn with_namespace(
        prefix: Option<&str>,
        name: impl Into<String>,
        namespace: Option<&str>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            prefix: prefix.filter(|p| !p.is_empty()).map(String::from),
            namespace: namespace.filter(|n| !n.is_empty()).map(String::from),
        }
    }

    /// Creates a namespace declaration attribute. An empty `prefix` yields
    /// the default-namespace form `xmlns="uri"`.
    pub fn namespace_decl(prefix: &str, uri: impl Into<String>) -> Self {
        if prefix.is_empty() {
            Self {
                name: "xmlns".to_string(),
                value: uri.into(),
                prefix: None,
                namespace: Some(XMLNS_NAMESPACE.to_string()),
            }
        } else {
            Self {
                name: prefix.to_string(),
                value: uri.into(),
                prefix: Some("xmlns".to_string()),
                namespace: Some(XMLNS_NAMESPACE.to_string()),
            }
        }
    }

    /// Returns the qualified name (`prefix:name` or `name`).
    #[must_use]
    pub fn qualified_name(&self) -> String {
        join_qname(self.prefix.as_deref(), &self.name)
    }

    /// If this attribute declares a namespace, returns the declared prefix
    /// (`""` for the default namespace).
    #[must_use]
    pub fn declared_prefix(&self) -> Option<&str> {
        match self.prefix.as_deref() {
            Some("xmlns") => Some(&self.name),
            Some(_) => None,
            None => namespace_decl_prefix(&self.name),
        }
    }

    /// Returns `true` if this attribute is an `xmlns` declaration.
    #[must_use]
    pub fn is_namespace_decl(&self) -> bool {
        self.declared_prefix().is_some()
    }
}

/// An XML document.
///
/// The `Document` owns all nodes in an arena and provides methods for
/// tree navigation and mutation. All tree operations go through
/// `&Document` (navigation) or `&mut Document` (mutation).
///
/// # Examples
///
/// ```
/// use xmlbridge::Document;
///
/// let doc = Document::parse_str("<root/>").unwrap();
/// let root = doc.root_element().unwrap();
/// assert_eq!(doc.node_name(root), Some("root"));
/// ```
#[derive(Debug, Clone)]
pub struct Document {
    /// The node arena. Index 0 is unused (placeholder for `NonZeroU32`).
    nodes: Vec<NodeData>,
    /// The document root node id (the Document node, not the root element).
    root: NodeId,
    /// XML version from the XML declaration (e.g., "1.0").
    pub version: Option<String>,
    /// Encoding from the XML declaration (e.g., "UTF-8").
    pub encoding: Option<String>,
    /// Standalone flag from the XML declaration.
    pub standalone: Option<bool>,
}

impl Document {
    /// Creates a new empty document.
    ///
    /// The document contains a single root Document node.
    #[must_use]
    pub fn new() -> Self {
        let mut nodes = Vec::with_capacity(64);
        // Index 0: placeholder (NodeId uses NonZeroU32)
        nodes.push(NodeData::new(NodeKind::Document));
        // Index 1: the document root node
        nodes.push(NodeData::new(NodeKind::Document));
        let root = NodeId::from_index(1);
        Self {
            nodes,
            root,
            version: None,
            encoding: None,
            standalone: None,
        }
    }

    /// Parses an XML string into a `Document` using the default reader
    /// posture and no threshold limits.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not well-formed XML or references an
    /// external entity.
    pub fn parse_str(input: &str) -> Result<Self> {
        let mut reader = crate::reader::XmlStreamReader::new(input);
        crate::materialize::Materializer::default().read_document(&mut reader)
    }

    /// Returns the document root node id.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Returns the root element of the document (the single top-level element).
    ///
    /// Returns `None` if the document has no element children.
    #[must_use]
    pub fn root_element(&self) -> Option<NodeId> {
        self.children(self.root)
            .find(|&id| self.node(id).kind.is_element())
    }

    /// Returns a reference to the `NodeData` for the given node.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not refer to a valid node.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.as_index()]
    }

    /// Returns a mutable reference to the `NodeData` for the given node.
    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.as_index()]
    }

    /// Returns the name of a node, if applicable.
    ///
    /// Elements return their local name, PIs their target. Text, comments,
    /// CDATA, and document nodes return `None`.
    #[must_use]
    pub fn node_name(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Element { name, .. }
            | NodeKind::ProcessingInstruction { target: name, .. }
            | NodeKind::EntityRef { name, .. }
            | NodeKind::DocumentType { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Returns the qualified name of an element (`prefix:local` or `local`).
    #[must_use]
    pub fn qualified_name(&self, id: NodeId) -> Option<String> {
        match &self.node(id).kind {
            NodeKind::Element { name, prefix, .. } => Some(join_qname(prefix.as_deref(), name)),
            _ => None,
        }
    }

    /// Returns the namespace prefix of an element node, if any.
    #[must_use]
    pub fn node_prefix(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Element { prefix, .. } => prefix.as_deref(),
            _ => None,
        }
    }

    /// Returns the namespace URI of an element node, if any.
    #[must_use]
    pub fn node_namespace(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Element { namespace, .. } => namespace.as_deref(),
            _ => None,
        }
    }

    /// Returns the concatenated text content of a node and all its descendants.
    #[must_use]
    pub fn text_content(&self, id: NodeId) -> String {
        let mut result = String::new();
        self.collect_text(id, &mut result);
        result
    }

    fn collect_text(&self, id: NodeId, buf: &mut String) {
        match &self.node(id).kind {
            NodeKind::Text { content } | NodeKind::CData { content } => {
                buf.push_str(content);
            }
            NodeKind::EntityRef { value, .. } => {
                if let Some(val) = value {
                    buf.push_str(val);
                }
            }
            NodeKind::Comment { .. } | NodeKind::ProcessingInstruction { .. } => {}
            _ => {
                for child in self.children(id) {
                    self.collect_text(child, buf);
                }
            }
        }
    }

    /// Returns the attributes of an element node.
    ///
    /// Returns an empty slice for non-element nodes.
    #[must_use]
    pub fn attributes(&self, id: NodeId) -> &[Attribute] {
        match &self.node(id).kind {
            NodeKind::Element { attributes, .. } => attributes,
            _ => &[],
        }
    }

    /// Returns the value of an attribute by qualified name on an element node.
    #[must_use]
    pub fn attribute(&self, id: NodeId, qname: &str) -> Option<&str> {
        self.attributes(id)
            .iter()
            .find(|a| a.qualified_name() == qname)
            .map(|a| a.value.as_str())
    }

    /// Sets an attribute on an element, replacing an existing attribute with
    /// the same qualified name in place. Does nothing on non-element nodes.
    pub fn set_attribute(&mut self, id: NodeId, attr: Attribute) {
        if let NodeKind::Element { attributes, .. } = &mut self.node_mut(id).kind {
            let qname = attr.qualified_name();
            if let Some(existing) = attributes.iter_mut().find(|a| a.qualified_name() == qname) {
                *existing = attr;
            } else {
                attributes.push(attr);
            }
        }
    }

    /// Returns the source location recorded for a node, if any.
    #[must_use]
    pub fn location(&self, id: NodeId) -> Option<&Location> {
        self.node(id).location.as_ref()
    }

    /// Attaches a source location to a node.
    pub fn set_location(&mut self, id: NodeId, location: Location) {
        self.node_mut(id).location = Some(location);
    }

    // --- Navigation ---

    /// Returns the parent of a node.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Returns the first child of a node.
    #[must_use]
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).first_child
    }

    /// Returns the last child of a node.
    #[must_use]
    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).last_child
    }

    /// Returns the next sibling of a node.
    #[must_use]
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).next_sibling
    }

    /// Returns the previous sibling of a node.
    #[must_use]
    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).prev_sibling
    }

    /// Returns an iterator over the children of a node.
    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            doc: self,
            next: self.node(id).first_child,
        }
    }

    /// Returns an iterator over a node and its ancestors (walking up to root).
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            doc: self,
            next: Some(id),
        }
    }

    /// Returns an iterator over all descendants of a node (depth-first).
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        Descendants {
            doc: self,
            root: id,
            next: self.first_child(id),
        }
    }

    // --- Mutation ---

    /// Allocates a new node in the arena and returns its `NodeId`.
    pub fn create_node(&mut self, kind: NodeKind) -> NodeId {
        let index = self.nodes.len();
        self.nodes.push(NodeData::new(kind));
        NodeId::from_index(index)
    }

    /// Allocates a new element with no attributes.
    pub fn create_element(
        &mut self,
        prefix: Option<&str>,
        name: &str,
        namespace: Option<&str>,
    ) -> NodeId {
        self.create_node(NodeKind::Element {
            name: name.to_string(),
            prefix: prefix.filter(|p| !p.is_empty()).map(String::from),
            namespace: namespace.filter(|n| !n.is_empty()).map(String::from),
            attributes: Vec::new(),
        })
    }

    /// Allocates a new, empty document fragment.
    pub fn create_fragment(&mut self) -> NodeId {
        self.create_node(NodeKind::DocumentFragment)
    }

    /// Appends a child node to the end of a parent's child list.
    ///
    /// # Panics
    ///
    /// Panics (in debug builds) if `child` already has a parent.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        debug_assert!(
            self.node(child).parent.is_none(),
            "child already has a parent; detach it first"
        );

        self.node_mut(child).parent = Some(parent);

        if let Some(last) = self.node(parent).last_child {
            self.node_mut(last).next_sibling = Some(child);
            self.node_mut(child).prev_sibling = Some(last);
            self.node_mut(parent).last_child = Some(child);
        } else {
            self.node_mut(parent).first_child = Some(child);
            self.node_mut(parent).last_child = Some(child);
        }
    }

    /// Returns the total number of nodes in the arena (including placeholder).
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len() - 1 // subtract placeholder at index 0
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

// --- Iterators ---

/// Iterator over the children of a node.
pub struct Children<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.doc.node(current).next_sibling;
        Some(current)
    }
}

/// Iterator over a node and its ancestors.
pub struct Ancestors<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.doc.node(current).parent;
        Some(current)
    }
}

/// Depth-first iterator over all descendants of a node.
pub struct Descendants<'a> {
    doc: &'a Document,
    root: NodeId,
    next: Option<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;

        if let Some(child) = self.doc.first_child(current) {
            self.next = Some(child);
            return Some(current);
        }

        if let Some(sibling) = self.doc.next_sibling(current) {
            self.next = Some(sibling);
            return Some(current);
        }

        // Walk up to find an ancestor with a next sibling
        let mut ancestor = self.doc.parent(current);
        while let Some(anc) = ancestor {
            if anc == self.root {
                self.next = None;
                return Some(current);
            }
            if let Some(sibling) = self.doc.next_sibling(anc) {
                self.next = Some(sibling);
                return Some(current);
            }
            ancestor = self.doc.parent(anc);
        }

        self.next = None;
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(doc: &mut Document, s: &str) -> NodeId {
        doc.create_node(NodeKind::Text {
            content: s.to_string(),
        })
    }

    #[test]
    fn test_new_document_has_root() {
        let doc = Document::new();
        assert!(matches!(doc.node(doc.root()).kind, NodeKind::Document));
        assert_eq!(doc.node_count(), 1); // just the root
    }

    #[test]
    fn test_create_and_append_element() {
        let mut doc = Document::new();
        let root = doc.root();
        let elem = doc.create_element(Some("s"), "Envelope", Some("urn:soap"));
        doc.append_child(root, elem);

        assert_eq!(doc.first_child(root), Some(elem));
        assert_eq!(doc.last_child(root), Some(elem));
        assert_eq!(doc.parent(elem), Some(root));
        assert_eq!(doc.node_name(elem), Some("Envelope"));
        assert_eq!(doc.qualified_name(elem).as_deref(), Some("s:Envelope"));
        assert_eq!(doc.node_namespace(elem), Some("urn:soap"));
        assert_eq!(doc.root_element(), Some(elem));
    }

    #[test]
    fn test_append_multiple_children() {
        let mut doc = Document::new();
        let root = doc.root();
        let a = text(&mut doc, "A");
        let b = text(&mut doc, "B");
        let c = text(&mut doc, "C");
        doc.append_child(root, a);
        doc.append_child(root, b);
        doc.append_child(root, c);

        assert_eq!(doc.next_sibling(a), Some(b));
        assert_eq!(doc.next_sibling(c), None);
        assert_eq!(doc.prev_sibling(c), Some(b));
        assert_eq!(doc.prev_sibling(a), None);
        let children: Vec<NodeId> = doc.children(root).collect();
        assert_eq!(children, vec![a, b, c]);
    }

    #[test]
    fn test_fragment_holds_siblings() {
        let mut doc = Document::new();
        let frag = doc.create_fragment();
        let a = doc.create_element(None, "a", None);
        let b = doc.create_element(None, "b", None);
        doc.append_child(frag, a);
        doc.append_child(frag, b);
        assert_eq!(doc.children(frag).count(), 2);
        assert_eq!(doc.parent(frag), None);
        assert_eq!(doc.root_element(), None);
    }

    #[test]
    fn test_ancestors_and_descendants() {
        let mut doc = Document::new();
        let root = doc.root();
        let a = doc.create_element(None, "a", None);
        let b = doc.create_element(None, "b", None);
        let t = text(&mut doc, "x");
        let c = doc.create_element(None, "c", None);
        doc.append_child(root, a);
        doc.append_child(a, b);
        doc.append_child(b, t);
        doc.append_child(a, c);

        let up: Vec<NodeId> = doc.ancestors(t).collect();
        assert_eq!(up, vec![t, b, a, root]);
        let down: Vec<NodeId> = doc.descendants(a).collect();
        assert_eq!(down, vec![b, t, c]);
        assert_eq!(doc.text_content(a), "x");
    }

    #[test]
    fn test_set_attribute_is_unique_by_qualified_name() {
        let mut doc = Document::new();
        let e = doc.create_element(None, "e", None);
        doc.set_attribute(e, Attribute::new("id", "1"));
        doc.set_attribute(e, Attribute::namespace_decl("p", "urn:p"));
        doc.set_attribute(e, Attribute::new("id", "2"));

        assert_eq!(doc.attributes(e).len(), 2);
        assert_eq!(doc.attribute(e, "id"), Some("2"));
        assert_eq!(doc.attribute(e, "xmlns:p"), Some("urn:p"));
        assert_eq!(doc.attributes(e)[0].name, "id");
    }

    #[test]
    fn test_namespace_decl_classification() {
        let default = Attribute::namespace_decl("", "urn:d");
        assert_eq!(default.qualified_name(), "xmlns");
        assert_eq!(default.declared_prefix(), Some(""));

        let prefixed = Attribute::namespace_decl("w", "urn:w");
        assert_eq!(prefixed.qualified_name(), "xmlns:w");
        assert_eq!(prefixed.declared_prefix(), Some("w"));

        let plain = Attribute::with_namespace(Some("w"), "id", Some("urn:w"), "1");
        assert!(!plain.is_namespace_decl());
    }

    #[test]
    fn test_entity_ref_contributes_value_to_text_content() {
        let mut doc = Document::new();
        let e = doc.create_element(None, "e", None);
        let r = doc.create_node(NodeKind::EntityRef {
            name: "co".to_string(),
            value: Some("ACME".to_string()),
        });
        doc.append_child(e, r);
        assert_eq!(doc.text_content(e), "ACME");
    }
}
