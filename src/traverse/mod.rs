//! Presents a document tree through the pull-event interface.
//!
//! [`TreeReader`] walks a [`Document`] (or one element or fragment inside it)
//! with a [`FrameStack`] and yields the same [`XmlEvent`]s a parser would
//! produce for the serialized form of that tree. Consumers such as the copy
//! engine and the materializer therefore treat trees and byte streams alike.
//!
//! # Examples
//!
//! ```
//! use xmlbridge::event::EventKind;
//! use xmlbridge::reader::EventSource;
//! use xmlbridge::traverse::TreeReader;
//! use xmlbridge::Document;
//!
//! let doc = Document::parse_str("<a><b/>text</a>").unwrap();
//! let root = doc.root_element().unwrap();
//! let mut reader = TreeReader::new(&doc, root);
//!
//! let mut kinds = Vec::new();
//! while let Some(event) = reader.next_event().unwrap() {
//!     kinds.push(event.kind());
//! }
//! assert_eq!(
//!     kinds,
//!     vec![
//!         EventKind::StartElement,
//!         EventKind::StartElement,
//!         EventKind::EndElement,
//!         EventKind::Characters,
//!         EventKind::EndElement,
//!     ]
//! );
//! ```

pub mod frame;

use crate::error::{ParseError, Result, XmlError};
use crate::event::{
    DocTypeDecl, EventAttribute, EventKind, Location, NamespaceDecl, QName, StartElement, XmlEvent,
};
use crate::namespace::{NamespaceContext, TreeNamespaceContext};
use crate::reader::EventSource;
use crate::tree::{Document, NodeId, NodeKind};
pub use frame::{Frame, FrameStack};

/// Where the walk is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Nothing emitted yet.
    Init,
    /// Frames are open; events come from the cursor.
    Walking,
    /// Every event has been produced.
    Done,
}

/// A pull source over a tree.
///
/// The starting node decides the shape of the stream:
///
/// - a document node yields START_DOCUMENT, its children, END_DOCUMENT;
/// - an element yields its START_ELEMENT, content and END_ELEMENT;
/// - a fragment yields its children in order, with no enclosing events.
pub struct TreeReader<'d> {
    doc: &'d Document,
    start: NodeId,
    frames: FrameStack,
    state: State,
    /// The node behind the most recent event.
    current: Option<NodeId>,
    last_kind: Option<EventKind>,
    outer: Option<&'d dyn NamespaceContext>,
}

impl<'d> TreeReader<'d> {
    /// Creates a reader that walks `start` and its descendants.
    #[must_use]
    pub fn new(doc: &'d Document, start: NodeId) -> Self {
        Self {
            doc,
            start,
            frames: FrameStack::new(),
            state: State::Init,
            current: None,
            last_kind: None,
            outer: None,
        }
    }

    /// Creates a reader over the whole document.
    #[must_use]
    pub fn for_document(doc: &'d Document) -> Self {
        Self::new(doc, doc.root())
    }

    /// Supplies a namespace context consulted for prefixes the tree itself
    /// does not bind (for example, the scope of an enclosing envelope).
    #[must_use]
    pub fn with_outer_context(mut self, outer: &'d dyn NamespaceContext) -> Self {
        self.outer = Some(outer);
        self
    }

    /// The tree being walked.
    #[must_use]
    pub fn document(&self) -> &'d Document {
        self.doc
    }

    /// The namespace view at the current position.
    #[must_use]
    pub fn tree_context(&self) -> TreeNamespaceContext<'_> {
        TreeNamespaceContext::new(self.doc, self.frames.frames()).with_outer(self.outer)
    }

    fn begin(&mut self) -> Result<Option<XmlEvent>> {
        let doc = self.doc;
        match &doc.node(self.start).kind {
            NodeKind::Document => {
                self.frames.push(doc, self.start);
                self.state = State::Walking;
                Ok(Some(XmlEvent::StartDocument {
                    version: doc.version.clone(),
                    encoding: doc.encoding.clone(),
                    standalone: doc.standalone,
                }))
            }
            NodeKind::Element { .. } => {
                self.frames.push(doc, self.start);
                self.state = State::Walking;
                Ok(Some(self.start_element_event(self.start)))
            }
            NodeKind::DocumentFragment => {
                self.frames.push(doc, self.start);
                self.state = State::Walking;
                self.step()
            }
            other => Err(XmlError::Unsupported(format!(
                "{} node as traversal root",
                other.label()
            ))),
        }
    }

    fn step(&mut self) -> Result<Option<XmlEvent>> {
        let doc = self.doc;
        if let Some((child, kind)) = self.frames.advance(doc)? {
            self.current = Some(child);
            if kind == EventKind::StartElement {
                self.frames.push(doc, child);
                return Ok(Some(self.start_element_event(child)));
            }
            return leaf_event(doc, child).map(Some);
        }

        let Some(closed) = self.frames.end_element() else {
            self.state = State::Done;
            return Ok(None);
        };
        self.current = Some(closed.element);
        if self.frames.is_empty() {
            self.state = State::Done;
        }
        match &doc.node(closed.element).kind {
            NodeKind::Element { .. } => Ok(Some(XmlEvent::EndElement {
                name: element_qname(doc, closed.element, &self.tree_context()),
            })),
            NodeKind::Document => Ok(Some(XmlEvent::EndDocument)),
            _ => Ok(None),
        }
    }

    /// Builds the START_ELEMENT payload for `node`, whose frame is on top.
    fn start_element_event(&self, node: NodeId) -> XmlEvent {
        let doc = self.doc;
        let ctx = self.tree_context();
        let mut start = StartElement {
            name: element_qname(doc, node, &ctx),
            ..StartElement::default()
        };
        if let Some(frame) = self.frames.current() {
            start.namespaces = frame
                .declarations()
                .map(|(p, u)| NamespaceDecl::new(p, u))
                .collect();
            let attrs = doc.attributes(node);
            start.attributes = frame
                .attributes
                .iter()
                .filter_map(|&i| attrs.get(i))
                .map(|a| {
                    let prefix = a.prefix.clone().unwrap_or_default();
                    let namespace = a
                        .namespace
                        .clone()
                        .or_else(|| a.prefix.as_deref().and_then(|p| ctx.resolve(p)))
                        .unwrap_or_default();
                    EventAttribute {
                        name: QName::new(prefix, a.name.clone(), namespace),
                        value: a.value.clone(),
                    }
                })
                .collect();
        }
        XmlEvent::StartElement(start)
    }
}

fn element_qname(doc: &Document, node: NodeId, ctx: &TreeNamespaceContext<'_>) -> QName {
    let NodeKind::Element {
        name,
        prefix,
        namespace,
        ..
    } = &doc.node(node).kind
    else {
        return QName::default();
    };
    let uri = namespace
        .clone()
        .or_else(|| prefix.as_deref().and_then(|p| ctx.resolve(p)))
        .unwrap_or_default();
    QName::new(prefix.clone().unwrap_or_default(), name.clone(), uri)
}

/// The event for a non-element child.
fn leaf_event(doc: &Document, node: NodeId) -> Result<XmlEvent> {
    Ok(match &doc.node(node).kind {
        NodeKind::Text { content } => XmlEvent::Characters(content.clone()),
        NodeKind::CData { content } => XmlEvent::CData(content.clone()),
        NodeKind::Comment { content } => XmlEvent::Comment(content.clone()),
        NodeKind::ProcessingInstruction { target, data } => XmlEvent::ProcessingInstruction {
            target: target.clone(),
            data: data.clone(),
        },
        NodeKind::EntityRef { name, value } => XmlEvent::EntityReference {
            name: name.clone(),
            replacement: value.clone(),
        },
        NodeKind::DocumentType {
            name,
            system_id,
            public_id,
            internal_subset,
        } => XmlEvent::Dtd(DocTypeDecl {
            name: name.clone(),
            public_id: public_id.clone(),
            system_id: system_id.clone(),
            internal_subset: internal_subset.clone(),
        }),
        other => {
            return Err(XmlError::Unsupported(format!(
                "{} node in element content",
                other.label()
            )))
        }
    })
}

impl EventSource for TreeReader<'_> {
    fn next_event(&mut self) -> Result<Option<XmlEvent>> {
        let event = match self.state {
            State::Init => self.begin()?,
            State::Walking => self.step()?,
            State::Done => None,
        };
        self.last_kind = event.as_ref().map(XmlEvent::kind);
        Ok(event)
    }

    /// Returns the character content of the element just started and moves
    /// past its end, without producing the intervening events.
    ///
    /// A childless element yields `""`. Comments and PIs are skipped; a
    /// child element is an error.
    fn element_text(&mut self) -> Result<String> {
        let doc = self.doc;
        let positioned = self.last_kind == Some(EventKind::StartElement)
            && self.frames.current().is_some_and(|f| f.current_child.is_none());
        let Some(frame) = self.frames.current().filter(|_| positioned) else {
            return Err(ParseError::unlocated(
                "element_text() requires the reader to be on a START_ELEMENT",
            )
            .into());
        };

        let mut text = String::new();
        for child in doc.children(frame.element) {
            match &doc.node(child).kind {
                NodeKind::Text { content } | NodeKind::CData { content } => text.push_str(content),
                NodeKind::EntityRef { value, .. } => text.push_str(value.as_deref().unwrap_or("")),
                NodeKind::Comment { .. } | NodeKind::ProcessingInstruction { .. } => {}
                _ => {
                    return Err(ParseError::unlocated(
                        "element_text() found a child element in text-only content",
                    )
                    .into())
                }
            }
        }

        if let Some(closed) = self.frames.end_element() {
            self.current = Some(closed.element);
        }
        if self.frames.is_empty() {
            self.state = State::Done;
        }
        self.last_kind = Some(EventKind::EndElement);
        Ok(text)
    }

    fn namespace_context(&self) -> &dyn NamespaceContext {
        self
    }

    fn location(&self) -> Option<Location> {
        self.current.and_then(|n| self.doc.location(n).cloned())
    }

    fn close(&mut self) -> Result<()> {
        self.state = State::Done;
        Ok(())
    }
}

impl NamespaceContext for TreeReader<'_> {
    fn namespace_uri(&self, prefix: &str) -> Option<String> {
        self.tree_context().resolve(prefix)
    }

    fn prefix(&self, namespace_uri: &str) -> Option<String> {
        self.tree_context().resolve_prefix(namespace_uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Attribute;
    use pretty_assertions::assert_eq;

    fn kinds(reader: &mut TreeReader<'_>) -> Vec<EventKind> {
        let mut out = Vec::new();
        while let Some(event) = reader.next_event().unwrap() {
            out.push(event.kind());
        }
        out
    }

    fn build() -> (Document, NodeId) {
        let mut doc = Document::new();
        let root = doc.root();
        let a = doc.create_element(None, "a", Some("urn:x"));
        doc.set_attribute(a, Attribute::namespace_decl("", "urn:x"));
        doc.append_child(root, a);
        let b = doc.create_element(None, "b", Some("urn:x"));
        doc.set_attribute(b, Attribute::new("attr", "1"));
        doc.append_child(a, b);
        let t = doc.create_node(NodeKind::Text {
            content: "txt".to_string(),
        });
        doc.append_child(a, t);
        (doc, a)
    }

    #[test]
    fn test_document_walk_is_bracketed() {
        let (doc, _) = build();
        let mut reader = TreeReader::for_document(&doc);
        assert_eq!(
            kinds(&mut reader),
            vec![
                EventKind::StartDocument,
                EventKind::StartElement,
                EventKind::StartElement,
                EventKind::EndElement,
                EventKind::Characters,
                EventKind::EndElement,
                EventKind::EndDocument,
            ]
        );
        assert_eq!(reader.next_event().unwrap(), None);
    }

    #[test]
    fn test_start_element_payload() {
        let (doc, a) = build();
        let mut reader = TreeReader::new(&doc, a);
        let Some(XmlEvent::StartElement(start)) = reader.next_event().unwrap() else {
            panic!("expected start element");
        };
        assert_eq!(start.name, QName::new("", "a", "urn:x"));
        assert_eq!(start.namespaces, vec![NamespaceDecl::new("", "urn:x")]);
        assert!(start.attributes.is_empty());

        let Some(XmlEvent::StartElement(b)) = reader.next_event().unwrap() else {
            panic!("expected start element");
        };
        assert_eq!(b.attributes, vec![EventAttribute::new("attr", "1")]);
        assert_eq!(reader.namespace_uri("").as_deref(), Some("urn:x"));
    }

    #[test]
    fn test_fragment_yields_children_only() {
        let mut doc = Document::new();
        let frag = doc.create_fragment();
        for name in ["x", "y", "z"] {
            let e = doc.create_element(None, name, None);
            doc.append_child(frag, e);
        }
        let mut reader = TreeReader::new(&doc, frag);
        assert_eq!(
            kinds(&mut reader),
            vec![
                EventKind::StartElement,
                EventKind::EndElement,
                EventKind::StartElement,
                EventKind::EndElement,
                EventKind::StartElement,
                EventKind::EndElement,
            ]
        );
    }

    #[test]
    fn test_element_text_on_empty_element() {
        let (doc, a) = build();
        let mut reader = TreeReader::new(&doc, a);
        reader.next_event().unwrap();
        reader.next_event().unwrap(); // <b attr="1"/>
        assert_eq!(reader.element_text().unwrap(), "");
        assert_eq!(
            reader.next_event().unwrap(),
            Some(XmlEvent::Characters("txt".to_string()))
        );
        assert_eq!(reader.next_event().unwrap().map(|e| e.kind()), Some(EventKind::EndElement));
        assert_eq!(reader.next_event().unwrap(), None);
    }

    #[test]
    fn test_element_text_concatenates_and_finishes_root() {
        let mut doc = Document::new();
        let e = doc.create_element(None, "e", None);
        for (i, part) in ["one", "two"].iter().enumerate() {
            let node = if i == 0 {
                doc.create_node(NodeKind::Text {
                    content: (*part).to_string(),
                })
            } else {
                doc.create_node(NodeKind::CData {
                    content: (*part).to_string(),
                })
            };
            doc.append_child(e, node);
        }
        let mut reader = TreeReader::new(&doc, e);
        reader.next_event().unwrap();
        assert_eq!(reader.element_text().unwrap(), "onetwo");
        assert_eq!(reader.next_event().unwrap(), None);
    }

    #[test]
    fn test_element_text_rejects_mixed_content() {
        let (doc, a) = build();
        let mut reader = TreeReader::new(&doc, a);
        reader.next_event().unwrap();
        assert!(reader.element_text().unwrap_err().is_parse());
    }

    #[test]
    fn test_leaf_start_is_unsupported() {
        let mut doc = Document::new();
        let t = doc.create_node(NodeKind::Text {
            content: "x".to_string(),
        });
        let mut reader = TreeReader::new(&doc, t);
        assert!(matches!(
            reader.next_event().unwrap_err(),
            XmlError::Unsupported(_)
        ));
    }

    #[test]
    fn test_outer_context_resolves_unbound_prefixes() {
        use crate::namespace::ScopeStack;

        let mut doc = Document::new();
        let body = doc.create_element(Some("env"), "body", None);
        doc.set_attribute(body, Attribute::with_namespace(Some("env"), "role", None, "x"));
        let mut outer = ScopeStack::new();
        outer.push_scope();
        outer.bind("env", "urn:env");

        let mut reader = TreeReader::new(&doc, body).with_outer_context(&outer);
        let Some(XmlEvent::StartElement(start)) = reader.next_event().unwrap() else {
            panic!("expected start element");
        };
        assert_eq!(start.name, QName::new("env", "body", "urn:env"));
        assert_eq!(start.attributes[0].name, QName::new("env", "role", "urn:env"));
        assert_eq!(reader.namespace_uri("env").as_deref(), Some("urn:env"));
        assert_eq!(reader.prefix("urn:env").as_deref(), Some("env"));

        let mut reader = TreeReader::new(&doc, body).with_outer_context(&outer);
        let mut writer = crate::writer::XmlStreamWriter::new(Vec::new());
        crate::copy::copy_events(&mut reader, &mut writer, false).unwrap();
        assert_eq!(
            String::from_utf8(writer.into_inner().unwrap()).unwrap(),
            r#"<env:body xmlns:env="urn:env" env:role="x"/>"#
        );
    }

    #[test]
    fn test_without_outer_context_prefix_stays_unbound() {
        let mut doc = Document::new();
        let body = doc.create_element(Some("env"), "body", None);
        let mut reader = TreeReader::new(&doc, body);
        let Some(XmlEvent::StartElement(start)) = reader.next_event().unwrap() else {
            panic!("expected start element");
        };
        assert_eq!(start.name.namespace, "");
        assert_eq!(reader.namespace_uri("env"), None);
    }
}
