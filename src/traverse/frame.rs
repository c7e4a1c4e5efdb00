//! Traversal cursor over an open tree element.
//!
//! A [`Frame`] records where a walk is positioned inside one open node:
//! which child was visited last, the namespace declarations the node makes
//! and which of its attributes are ordinary. Frames live in a
//! [`FrameStack`], a plain growable stack indexed by depth; the frame below
//! a frame is its enclosing element, so no frame owns or points at another.

use crate::error::{Result, XmlError};
use crate::event::EventKind;
use crate::tree::{Document, NodeId, NodeKind};

/// Traversal state for one open node.
#[derive(Debug, Clone)]
pub struct Frame {
    /// The node being walked (an element, document, or fragment).
    pub element: NodeId,
    /// The child the cursor was last moved to, if any.
    pub current_child: Option<NodeId>,
    /// Prefixes declared on the element, parallel to `ns_uris`.
    pub ns_prefixes: Vec<String>,
    /// URIs declared on the element, parallel to `ns_prefixes`.
    pub ns_uris: Vec<String>,
    /// Indices (into the element's attribute list) of ordinary attributes.
    pub attributes: Vec<usize>,
}

impl Frame {
    /// Creates a frame for `element`, partitioning its attributes into
    /// namespace declarations and ordinary attributes.
    #[must_use]
    pub fn new(doc: &Document, element: NodeId) -> Self {
        let mut frame = Self {
            element,
            current_child: None,
            ns_prefixes: Vec::new(),
            ns_uris: Vec::new(),
            attributes: Vec::new(),
        };
        for (index, attr) in doc.attributes(element).iter().enumerate() {
            match attr.declared_prefix() {
                Some(prefix) => {
                    frame.ns_prefixes.push(prefix.to_string());
                    frame.ns_uris.push(attr.value.clone());
                }
                None => frame.attributes.push(index),
            }
        }
        frame
    }

    /// Iterates the captured `(prefix, uri)` declarations in document order.
    pub fn declarations(&self) -> impl DoubleEndedIterator<Item = (&str, &str)> {
        self.ns_prefixes
            .iter()
            .zip(&self.ns_uris)
            .map(|(p, u)| (p.as_str(), u.as_str()))
    }

    /// Returns `true` if a child exists after the last-visited one (or a
    /// first child exists when none has been visited).
    #[must_use]
    pub fn has_more_children(&self, doc: &Document) -> bool {
        self.next_child(doc).is_some()
    }

    fn next_child(&self, doc: &Document) -> Option<NodeId> {
        match self.current_child {
            Some(child) => doc.next_sibling(child),
            None => doc.first_child(self.element),
        }
    }
}

/// Maps a tree node to the event tag it produces when the cursor reaches it.
///
/// # Errors
///
/// Returns [`XmlError::Unsupported`] for node kinds that cannot appear as a
/// child position (documents and fragments).
pub fn classify(doc: &Document, node: NodeId) -> Result<EventKind> {
    match &doc.node(node).kind {
        NodeKind::Element { .. } => Ok(EventKind::StartElement),
        NodeKind::Text { .. } => Ok(EventKind::Characters),
        NodeKind::Comment { .. } => Ok(EventKind::Comment),
        NodeKind::CData { .. } => Ok(EventKind::CData),
        NodeKind::EntityRef { .. } => Ok(EventKind::EntityReference),
        NodeKind::ProcessingInstruction { .. } => Ok(EventKind::ProcessingInstruction),
        NodeKind::DocumentType { .. } => Ok(EventKind::Dtd),
        other @ (NodeKind::Document | NodeKind::DocumentFragment) => Err(XmlError::Unsupported(
            format!("{} node in child position", other.label()),
        )),
    }
}

/// A stack of [`Frame`]s, one per open node, innermost last.
#[derive(Debug, Clone, Default)]
pub struct FrameStack {
    frames: Vec<Frame>,
}

impl FrameStack {
    /// Creates an empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens `element`: pushes a new frame for it.
    pub fn push(&mut self, doc: &Document, element: NodeId) {
        self.frames.push(Frame::new(doc, element));
    }

    /// Pops the innermost frame, returning to the enclosing one. Does
    /// nothing if the stack is already empty.
    pub fn end_element(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    /// The innermost frame.
    #[must_use]
    pub fn current(&self) -> Option<&Frame> {
        self.frames.last()
    }

    /// All open frames, outermost first.
    #[must_use]
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Number of open frames.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Returns `true` when no frame is open.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// See [`Frame::has_more_children`]; `false` on an empty stack.
    #[must_use]
    pub fn has_more_children(&self, doc: &Document) -> bool {
        self.current().is_some_and(|f| f.has_more_children(doc))
    }

    /// Moves the innermost frame's cursor to its next child and classifies
    /// that child. Returns `Ok(None)` when there is no next child.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::Unsupported`] if the child's kind has no event.
    pub fn advance(&mut self, doc: &Document) -> Result<Option<(NodeId, EventKind)>> {
        let Some(frame) = self.frames.last_mut() else {
            return Ok(None);
        };
        let Some(child) = frame.next_child(doc) else {
            return Ok(None);
        };
        frame.current_child = Some(child);
        let kind = classify(doc, child)?;
        Ok(Some((child, kind)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Attribute;

    fn sample() -> (Document, NodeId) {
        let mut doc = Document::new();
        let root = doc.root();
        let e = doc.create_element(Some("p"), "e", Some("urn:p"));
        doc.set_attribute(e, Attribute::namespace_decl("p", "urn:p"));
        doc.set_attribute(e, Attribute::new("id", "7"));
        doc.set_attribute(e, Attribute::namespace_decl("", "urn:d"));
        doc.append_child(root, e);
        let t = doc.create_node(NodeKind::Text {
            content: "hi".to_string(),
        });
        doc.append_child(e, t);
        let c = doc.create_node(NodeKind::Comment {
            content: "c".to_string(),
        });
        doc.append_child(e, c);
        let child = doc.create_element(None, "child", Some("urn:d"));
        doc.append_child(e, child);
        (doc, e)
    }

    #[test]
    fn test_frame_partitions_attributes() {
        let (doc, e) = sample();
        let frame = Frame::new(&doc, e);
        assert_eq!(frame.ns_prefixes, vec!["p", ""]);
        assert_eq!(frame.ns_uris, vec!["urn:p", "urn:d"]);
        assert_eq!(frame.attributes, vec![1]);
    }

    #[test]
    fn test_advance_classifies_children() {
        let (doc, e) = sample();
        let mut stack = FrameStack::new();
        stack.push(&doc, e);

        let kinds: Vec<EventKind> = std::iter::from_fn(|| stack.advance(&doc).unwrap())
            .map(|(_, k)| k)
            .collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::Characters,
                EventKind::Comment,
                EventKind::StartElement
            ]
        );
        assert!(!stack.has_more_children(&doc));
    }

    #[test]
    fn test_has_more_children_on_childless_element() {
        let mut doc = Document::new();
        let e = doc.create_element(None, "empty", None);
        let mut stack = FrameStack::new();
        assert!(!stack.has_more_children(&doc));
        stack.push(&doc, e);
        assert!(!stack.has_more_children(&doc));
        assert_eq!(stack.advance(&doc).unwrap(), None);
    }

    #[test]
    fn test_end_element_on_empty_stack_is_noop() {
        let mut stack = FrameStack::new();
        assert!(stack.end_element().is_none());
        assert!(stack.is_empty());
    }

    #[test]
    fn test_fragment_in_child_position_is_unsupported() {
        let mut doc = Document::new();
        let e = doc.create_element(None, "e", None);
        let frag = doc.create_fragment();
        doc.append_child(e, frag);
        let mut stack = FrameStack::new();
        stack.push(&doc, e);
        let err = stack.advance(&doc).unwrap_err();
        assert!(matches!(err, XmlError::Unsupported(_)));
    }
}
