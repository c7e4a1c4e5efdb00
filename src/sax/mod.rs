//! Push-style (SAX) sources and the shim that turns them into pull sources.
//!
//! A [`PushSource`] drives a [`ContentHandler`] with callbacks instead of
//! handing out events one at a time. [`PushShim`] forwards those callbacks
//! into a buffer and serves them back through [`EventSource`], so the copy
//! engine and the materializer accept push producers unchanged.
//!
//! # Examples
//!
//! ```
//! use xmlbridge::event::QName;
//! use xmlbridge::sax::{parse_sax, ContentHandler};
//!
//! struct Counter {
//!     elements: usize,
//! }
//!
//! impl ContentHandler for Counter {
//!     fn start_element(
//!         &mut self,
//!         _name: &QName,
//!         _namespaces: &[xmlbridge::event::NamespaceDecl],
//!         _attributes: &[xmlbridge::event::EventAttribute],
//!     ) {
//!         self.elements += 1;
//!     }
//! }
//!
//! let mut counter = Counter { elements: 0 };
//! parse_sax("<root><a/><b/><c/></root>", &mut counter).unwrap();
//! assert_eq!(counter.elements, 4);
//! ```

use std::collections::VecDeque;

use crate::error::Result;
use crate::event::{DocTypeDecl, EventAttribute, NamespaceDecl, QName, StartElement, XmlEvent};
use crate::namespace::{NamespaceContext, ScopeStack};
use crate::reader::{EventSource, XmlStreamReader};

/// Receives parse callbacks.
///
/// Every method has a no-op default so implementors override only what they
/// need.
#[allow(unused_variables)]
pub trait ContentHandler {
    /// Called before any other callback.
    fn start_document(
        &mut self,
        version: Option<&str>,
        encoding: Option<&str>,
        standalone: Option<bool>,
    ) {
    }

    /// Called after every other callback.
    fn end_document(&mut self) {}

    /// Called for a start tag (or the start of a self-closing tag).
    fn start_element(
        &mut self,
        name: &QName,
        namespaces: &[NamespaceDecl],
        attributes: &[EventAttribute],
    ) {
    }

    /// Called for an end tag (or the end of a self-closing tag).
    fn end_element(&mut self, name: &QName) {}

    /// Called for character data.
    fn characters(&mut self, content: &str) {}

    /// Called for CDATA sections.
    fn cdata(&mut self, content: &str) {}

    /// Called for comments.
    fn comment(&mut self, content: &str) {}

    /// Called for processing instructions.
    fn processing_instruction(&mut self, target: &str, data: Option<&str>) {}

    /// Called for an unexpanded entity reference.
    fn entity_reference(&mut self, name: &str, replacement: Option<&str>) {}

    /// Called for the document type declaration.
    fn dtd(&mut self, decl: &DocTypeDecl) {}
}

/// A no-op handler.
pub struct DefaultHandler;

impl ContentHandler for DefaultHandler {}

/// A producer that pushes its whole content into a handler.
pub trait PushSource {
    /// Drives `handler` from start to end.
    ///
    /// # Errors
    ///
    /// Returns the producer's failure; callbacks already made stand.
    fn push_to(&mut self, handler: &mut dyn ContentHandler) -> Result<()>;
}

/// Calls the handler method matching `event`.
pub fn dispatch(event: &XmlEvent, handler: &mut dyn ContentHandler) {
    match event {
        XmlEvent::StartDocument {
            version,
            encoding,
            standalone,
        } => handler.start_document(version.as_deref(), encoding.as_deref(), *standalone),
        XmlEvent::EndDocument => handler.end_document(),
        XmlEvent::StartElement(start) => {
            handler.start_element(&start.name, &start.namespaces, &start.attributes);
        }
        XmlEvent::EndElement { name } => handler.end_element(name),
        XmlEvent::Characters(text) => handler.characters(text),
        XmlEvent::CData(text) => handler.cdata(text),
        XmlEvent::Comment(text) => handler.comment(text),
        XmlEvent::ProcessingInstruction { target, data } => {
            handler.processing_instruction(target, data.as_deref());
        }
        XmlEvent::EntityReference { name, replacement } => {
            handler.entity_reference(name, replacement.as_deref());
        }
        XmlEvent::Dtd(decl) => handler.dtd(decl),
        // Push producers report these inside start_element.
        XmlEvent::Attribute(_) | XmlEvent::Namespace(_) => {}
    }
}

/// Drives `handler` from any pull source until it is exhausted.
///
/// # Errors
///
/// Propagates the source's failure.
pub fn drive<S: EventSource + ?Sized>(source: &mut S, handler: &mut dyn ContentHandler) -> Result<()> {
    while let Some(event) = source.next_event()? {
        dispatch(&event, handler);
    }
    Ok(())
}

/// Parses `input` with the streaming reader, firing callbacks on `handler`.
///
/// # Errors
///
/// Returns parse and security failures from the reader.
pub fn parse_sax(input: &str, handler: &mut dyn ContentHandler) -> Result<()> {
    drive(&mut XmlStreamReader::new(input), handler)
}

/// A [`PushSource`] backed by XML text.
pub struct TextPushSource {
    text: String,
}

impl TextPushSource {
    /// Wraps XML text.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl PushSource for TextPushSource {
    fn push_to(&mut self, handler: &mut dyn ContentHandler) -> Result<()> {
        parse_sax(&self.text, handler)
    }
}

// -------------------------------------------------------------------------
// PushShim
// -------------------------------------------------------------------------

/// Buffers handler callbacks as events.
#[derive(Default)]
struct Collector {
    events: VecDeque<XmlEvent>,
}

impl ContentHandler for Collector {
    fn start_document(
        &mut self,
        version: Option<&str>,
        encoding: Option<&str>,
        standalone: Option<bool>,
    ) {
        self.events.push_back(XmlEvent::StartDocument {
            version: version.map(String::from),
            encoding: encoding.map(String::from),
            standalone,
        });
    }

    fn end_document(&mut self) {
        self.events.push_back(XmlEvent::EndDocument);
    }

    fn start_element(
        &mut self,
        name: &QName,
        namespaces: &[NamespaceDecl],
        attributes: &[EventAttribute],
    ) {
        self.events.push_back(XmlEvent::StartElement(StartElement {
            name: name.clone(),
            namespaces: namespaces.to_vec(),
            attributes: attributes.to_vec(),
        }));
    }

    fn end_element(&mut self, name: &QName) {
        self.events
            .push_back(XmlEvent::EndElement { name: name.clone() });
    }

    fn characters(&mut self, content: &str) {
        self.events
            .push_back(XmlEvent::Characters(content.to_string()));
    }

    fn cdata(&mut self, content: &str) {
        self.events.push_back(XmlEvent::CData(content.to_string()));
    }

    fn comment(&mut self, content: &str) {
        self.events.push_back(XmlEvent::Comment(content.to_string()));
    }

    fn processing_instruction(&mut self, target: &str, data: Option<&str>) {
        self.events.push_back(XmlEvent::ProcessingInstruction {
            target: target.to_string(),
            data: data.map(String::from),
        });
    }

    fn entity_reference(&mut self, name: &str, replacement: Option<&str>) {
        self.events.push_back(XmlEvent::EntityReference {
            name: name.to_string(),
            replacement: replacement.map(String::from),
        });
    }

    fn dtd(&mut self, decl: &DocTypeDecl) {
        self.events.push_back(XmlEvent::Dtd(decl.clone()));
    }
}

/// Presents a push producer as an [`EventSource`].
///
/// The producer runs to completion on the first call to `next_event`; its
/// callbacks are buffered and handed out one at a time. Namespace scope is
/// tracked from the buffered START_ELEMENT declarations.
pub struct PushShim<'a> {
    producer: Option<Box<dyn PushSource + 'a>>,
    buffer: Collector,
    scope: ScopeStack,
    pending_pop: bool,
    closed: bool,
}

impl<'a> PushShim<'a> {
    /// Wraps a push producer.
    #[must_use]
    pub fn new(producer: Box<dyn PushSource + 'a>) -> Self {
        Self {
            producer: Some(producer),
            buffer: Collector::default(),
            scope: ScopeStack::new(),
            pending_pop: false,
            closed: false,
        }
    }

    /// Serves a fixed event sequence.
    #[must_use]
    pub fn from_events(events: impl IntoIterator<Item = XmlEvent>) -> Self {
        Self {
            producer: None,
            buffer: Collector {
                events: events.into_iter().collect(),
            },
            scope: ScopeStack::new(),
            pending_pop: false,
            closed: false,
        }
    }
}

impl EventSource for PushShim<'_> {
    fn next_event(&mut self) -> Result<Option<XmlEvent>> {
        if self.closed {
            return Ok(None);
        }
        if let Some(mut producer) = self.producer.take() {
            producer.push_to(&mut self.buffer)?;
        }
        if self.pending_pop {
            self.pending_pop = false;
            self.scope.pop_scope();
        }
        let event = self.buffer.events.pop_front();
        match &event {
            Some(XmlEvent::StartElement(start)) => {
                self.scope.push_scope();
                for decl in &start.namespaces {
                    self.scope.bind(&decl.prefix, &decl.uri);
                }
            }
            Some(XmlEvent::EndElement { .. }) => self.pending_pop = true,
            _ => {}
        }
        Ok(event)
    }

    fn namespace_context(&self) -> &dyn NamespaceContext {
        &self.scope
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.producer = None;
        self.buffer.events.clear();
        Ok(())
    }
}
