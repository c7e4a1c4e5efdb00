//! Pull-based streaming XML reader.
//!
//! [`EventSource`] is the pull interface every producer of [`XmlEvent`]s
//! implements. [`XmlStreamReader`] is the real parser behind it: it advances
//! one construct at a time and hands back a fully-formed event, with
//! namespace prefixes already resolved.
//!
//! # Safe posture
//!
//! The reader's entity handling is fixed and cannot be changed per call:
//!
//! - the DOCTYPE is reported as one DTD event and never applied;
//! - a general entity other than the five predefined ones is not expanded:
//!   it is reported as an ENTITY_REFERENCE event, carrying the declared
//!   replacement text when the internal subset declared one;
//! - a reference to an entity declared `SYSTEM` or `PUBLIC` fails with
//!   [`XmlError::Security`].
//!
//! # Examples
//!
//! ```
//! use xmlbridge::event::XmlEvent;
//! use xmlbridge::reader::{EventSource, XmlStreamReader};
//!
//! let mut reader = XmlStreamReader::new("<doc attr=\"val\">text</doc>");
//! let mut texts = Vec::new();
//! while let Some(event) = reader.next_event().unwrap() {
//!     if let XmlEvent::Characters(text) = event {
//!         texts.push(text);
//!     }
//! }
//! assert_eq!(texts, vec!["text"]);
//! ```

use std::collections::VecDeque;
use std::io::Read;
use std::path::Path;

use crate::encoding::decode_to_utf8;
use crate::error::{ParseError, Result, XmlError};
use crate::event::{
    DocTypeDecl, EventAttribute, Location, NamespaceDecl, QName, StartElement, XmlEvent,
};
use crate::namespace::{NamespaceContext, ScopeStack};
use crate::parser::dtd::{scan_internal_subset, EntityDef, EntityTable};
use crate::parser::input::{
    at_xml_decl, parse_cdata_content, parse_comment_content, parse_pi_content, parse_xml_decl,
    Mark, ParserInput, Reference,
};
use crate::util::qname::{namespace_decl_prefix, split_qname, XMLNS_NAMESPACE, XML_NAMESPACE};

// -------------------------------------------------------------------------
// EventSource
// -------------------------------------------------------------------------

/// A pull-style iterator over XML parse events.
///
/// Implemented by the real parser ([`XmlStreamReader`]), the tree adapter
/// ([`crate::traverse::TreeReader`]) and the push shim
/// ([`crate::sax::PushShim`]).
pub trait EventSource {
    /// Produces the next event, or `None` once the source is exhausted.
    ///
    /// # Errors
    ///
    /// Returns an error if the next event cannot be produced.
    fn next_event(&mut self) -> Result<Option<XmlEvent>>;

    /// Reads the text content of the element whose START_ELEMENT was just
    /// returned and consumes its END_ELEMENT.
    ///
    /// Character data, CDATA and entity replacement text are concatenated;
    /// comments and processing instructions are skipped. An element with no
    /// content yields `""`.
    ///
    /// # Errors
    ///
    /// Returns a parse error if a child element is encountered or the
    /// source ends before the element does.
    fn element_text(&mut self) -> Result<String> {
        let mut text = String::new();
        loop {
            match self.next_event()? {
                Some(XmlEvent::Characters(s) | XmlEvent::CData(s)) => text.push_str(&s),
                Some(XmlEvent::EntityReference { replacement, .. }) => {
                    text.push_str(replacement.as_deref().unwrap_or(""));
                }
                Some(XmlEvent::Comment(_) | XmlEvent::ProcessingInstruction { .. }) => {}
                Some(XmlEvent::EndElement { .. }) => return Ok(text),
                Some(other) => {
                    return Err(located_error(
                        self.location(),
                        format!("element_text() found {} in text-only content", other.kind()),
                    ))
                }
                None => {
                    return Err(located_error(
                        self.location(),
                        "element_text() reached end of input",
                    ))
                }
            }
        }
    }

    /// The namespace bindings in scope at the current event.
    fn namespace_context(&self) -> &dyn NamespaceContext;

    /// Where the current event came from, if known.
    fn location(&self) -> Option<Location> {
        None
    }

    /// Releases the source. Further calls to `next_event` return `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if releasing the underlying resource fails.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Builds a parse error positioned at `location`.
pub(crate) fn located_error(location: Option<Location>, message: impl Into<String>) -> XmlError {
    let location = location
        .map(|l| l.to_source_location())
        .unwrap_or_default();
    ParseError::new(message, location).into()
}

impl<S: EventSource + ?Sized> EventSource for Box<S> {
    fn next_event(&mut self) -> Result<Option<XmlEvent>> {
        (**self).next_event()
    }

    fn element_text(&mut self) -> Result<String> {
        (**self).element_text()
    }

    fn namespace_context(&self) -> &dyn NamespaceContext {
        (**self).namespace_context()
    }

    fn location(&self) -> Option<Location> {
        (**self).location()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

// -------------------------------------------------------------------------
// XmlStreamReader
// -------------------------------------------------------------------------

/// Which part of the document the reader is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Before START_DOCUMENT.
    Start,
    /// Between the XML declaration and the root element.
    Prolog,
    /// Inside the root element.
    Content,
    /// After the root element closed.
    Epilog,
    /// END_DOCUMENT has been produced.
    Finished,
}

/// A pull parser over one XML document.
///
/// Input is decoded up front (see [`crate::encoding`]) and then scanned
/// lazily, one event per [`EventSource::next_event`] call.
pub struct XmlStreamReader {
    input: ParserInput,
    scope: ScopeStack,
    entities: EntityTable,
    phase: Phase,
    /// Events produced ahead of time (END_ELEMENT for `<empty/>`, an entity
    /// reference that ended a text run).
    queue: VecDeque<XmlEvent>,
    /// Names of open elements, for end-tag matching.
    open: Vec<(String, QName)>,
    /// The scope of the element that just ended is dropped on the next call,
    /// so the END_ELEMENT event still sees its bindings.
    pending_pop: bool,
    seen_doctype: bool,
    event_mark: Mark,
    system_id: Option<String>,
    public_id: Option<String>,
}

impl XmlStreamReader {
    /// Creates a reader over already-decoded text.
    ///
    /// # Examples
    ///
    /// ```
    /// use xmlbridge::reader::{EventSource, XmlStreamReader};
    ///
    /// let mut reader = XmlStreamReader::new("<root/>");
    /// assert!(reader.next_event().unwrap().is_some());
    /// ```
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        let input = ParserInput::new(text.into());
        let event_mark = input.mark();
        Self {
            input,
            scope: ScopeStack::new(),
            entities: EntityTable::default(),
            phase: Phase::Start,
            queue: VecDeque::new(),
            open: Vec::new(),
            pending_pop: false,
            seen_doctype: false,
            event_mark,
            system_id: None,
            public_id: None,
        }
    }

    /// Creates a reader over raw bytes.
    ///
    /// With `encoding` set, that label is used to decode; otherwise the BOM
    /// and XML declaration decide (UTF-8 by default).
    ///
    /// # Errors
    ///
    /// Returns a parse error if the bytes cannot be decoded.
    pub fn from_bytes(bytes: &[u8], encoding: Option<&str>) -> Result<Self> {
        let text = decode_to_utf8(bytes, encoding)
            .map_err(|e| ParseError::unlocated(e.to_string()))?;
        Ok(Self::new(text))
    }

    /// Creates a reader that drains `reader` completely before parsing.
    ///
    /// The whole input is buffered and decoded up front, as with
    /// [`open`](Self::open). Materializer thresholds bound the tree built
    /// from it, not this buffer; cap untrusted input at the transport.
    ///
    /// # Errors
    ///
    /// Transport failures and undecodable bytes are parse errors.
    pub fn from_reader(mut reader: impl Read, encoding: Option<&str>) -> Result<Self> {
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .map_err(|e| ParseError::unlocated(format!("read failed: {e}")))?;
        Self::from_bytes(&bytes, encoding)
    }

    /// Opens the file named by a system identifier.
    ///
    /// # Errors
    ///
    /// Returns a parse error if the file cannot be read or decoded.
    pub fn open(system_id: &str, encoding: Option<&str>) -> Result<Self> {
        let path = system_id.strip_prefix("file://").unwrap_or(system_id);
        let bytes = std::fs::read(Path::new(path))
            .map_err(|e| ParseError::unlocated(format!("cannot open '{system_id}': {e}")))?;
        Ok(Self::from_bytes(&bytes, encoding)?.with_system_id(system_id))
    }

    /// Sets the system identifier reported in locations.
    #[must_use]
    pub fn with_system_id(mut self, system_id: impl Into<String>) -> Self {
        self.system_id = Some(system_id.into());
        self
    }

    /// Sets the public identifier reported in locations.
    #[must_use]
    pub fn with_public_id(mut self, public_id: impl Into<String>) -> Self {
        self.public_id = Some(public_id.into());
        self
    }

    /// Number of currently open elements.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    // === Internal: dispatch ===

    fn read_event(&mut self) -> Result<Option<XmlEvent>> {
        match self.phase {
            Phase::Start => self.read_start().map(Some),
            Phase::Prolog => self.read_prolog().map(Some),
            Phase::Content => self.read_content().map(Some),
            Phase::Epilog => self.read_epilog().map(Some),
            Phase::Finished => Ok(None),
        }
    }

    fn read_start(&mut self) -> Result<XmlEvent> {
        self.phase = Phase::Prolog;
        if !at_xml_decl(&self.input) {
            return Ok(XmlEvent::StartDocument {
                version: None,
                encoding: None,
                standalone: None,
            });
        }
        let decl = parse_xml_decl(&mut self.input)?;
        Ok(XmlEvent::StartDocument {
            version: Some(decl.version),
            encoding: decl.encoding,
            standalone: decl.standalone,
        })
    }

    fn read_prolog(&mut self) -> Result<XmlEvent> {
        self.input.skip_whitespace();
        self.event_mark = self.input.mark();

        if self.input.at_end() {
            return Err(self.input.fatal("document has no root element").into());
        }
        if self.input.looking_at(b"<!DOCTYPE") {
            if self.seen_doctype {
                return Err(self.input.fatal("duplicate DOCTYPE declaration").into());
            }
            self.seen_doctype = true;
            return self.parse_doctype();
        }
        if self.input.looking_at(b"<!--") {
            return Ok(XmlEvent::Comment(parse_comment_content(&mut self.input)?));
        }
        if self.input.looking_at(b"<?") {
            return self.parse_processing_instruction();
        }
        if self.input.peek() == Some(b'<') {
            self.phase = Phase::Content;
            return self.parse_element_start();
        }
        Err(self.input.fatal("expected root element").into())
    }

    fn read_content(&mut self) -> Result<XmlEvent> {
        self.event_mark = self.input.mark();
        if self.input.at_end() {
            return Err(self
                .input
                .fatal("unexpected end of input in element content")
                .into());
        }
        if self.input.looking_at(b"</") {
            return self.parse_end_tag();
        }
        if self.input.looking_at(b"<![CDATA[") {
            return Ok(XmlEvent::CData(parse_cdata_content(&mut self.input)?));
        }
        if self.input.looking_at(b"<!--") {
            return Ok(XmlEvent::Comment(parse_comment_content(&mut self.input)?));
        }
        if self.input.looking_at(b"<?") {
            return self.parse_processing_instruction();
        }
        if self.input.peek() == Some(b'<') {
            return self.parse_element_start();
        }
        self.parse_char_data()
    }

    fn read_epilog(&mut self) -> Result<XmlEvent> {
        self.input.skip_whitespace();
        self.event_mark = self.input.mark();
        if self.input.at_end() {
            self.phase = Phase::Finished;
            return Ok(XmlEvent::EndDocument);
        }
        if self.input.looking_at(b"<!--") {
            return Ok(XmlEvent::Comment(parse_comment_content(&mut self.input)?));
        }
        if self.input.looking_at(b"<?") {
            return self.parse_processing_instruction();
        }
        Err(self.input.fatal("content after document element").into())
    }

    // === Internal: constructs ===

    fn parse_processing_instruction(&mut self) -> Result<XmlEvent> {
        let (target, data) = parse_pi_content(&mut self.input)?;
        Ok(XmlEvent::ProcessingInstruction { target, data })
    }

    /// `<!DOCTYPE name (SYSTEM|PUBLIC ...)? [internal subset]? >`
    fn parse_doctype(&mut self) -> Result<XmlEvent> {
        self.input.expect_str(b"<!DOCTYPE")?;
        self.input.skip_whitespace_required()?;
        let mut decl = DocTypeDecl {
            name: self.input.parse_name()?,
            ..DocTypeDecl::default()
        };
        self.input.skip_whitespace();

        if self.input.looking_at(b"SYSTEM") {
            self.input.expect_str(b"SYSTEM")?;
            self.input.skip_whitespace_required()?;
            decl.system_id = Some(self.input.parse_quoted_value()?);
            self.input.skip_whitespace();
        } else if self.input.looking_at(b"PUBLIC") {
            self.input.expect_str(b"PUBLIC")?;
            self.input.skip_whitespace_required()?;
            decl.public_id = Some(self.input.parse_quoted_value()?);
            self.input.skip_whitespace_required()?;
            decl.system_id = Some(self.input.parse_quoted_value()?);
            self.input.skip_whitespace();
        }
        self.entities.has_external_subset = decl.system_id.is_some();

        if self.input.peek() == Some(b'[') {
            self.input.advance(1);
            decl.internal_subset = Some(scan_internal_subset(&mut self.input, &mut self.entities)?);
            self.input.skip_whitespace();
        }
        self.input.expect_byte(b'>')?;
        Ok(XmlEvent::Dtd(decl))
    }

    fn parse_element_start(&mut self) -> Result<XmlEvent> {
        self.input.expect_byte(b'<')?;
        let qname = self.input.parse_name()?;

        let mut raw_attrs: Vec<(String, String, Mark)> = Vec::new();
        loop {
            let had_ws = self.input.skip_whitespace();
            if self.input.peek() == Some(b'>') || self.input.looking_at(b"/>") {
                break;
            }
            if !had_ws {
                return Err(self
                    .input
                    .fatal("whitespace required between attributes")
                    .into());
            }
            let mark = self.input.mark();
            let attr_name = self.input.parse_name()?;
            if raw_attrs.iter().any(|(n, _, _)| *n == attr_name) {
                return Err(ParseError::new(
                    format!("duplicate attribute '{attr_name}'"),
                    mark.source_location(),
                )
                .into());
            }
            self.input.skip_whitespace();
            self.input.expect_byte(b'=')?;
            self.input.skip_whitespace();
            let value = self.input.parse_attribute_value(&self.entities)?;
            raw_attrs.push((attr_name, value, mark));
        }
        let is_empty = self.input.looking_at(b"/>");
        self.input.advance(if is_empty { 2 } else { 1 });

        // Namespace declarations first: they apply to the element's own
        // name and to its attributes.
        self.scope.push_scope();
        let mut start = StartElement::default();
        for (attr_name, value, mark) in &raw_attrs {
            let Some(prefix) = namespace_decl_prefix(attr_name) else {
                continue;
            };
            check_declaration(prefix, value, *mark)?;
            self.scope.bind(prefix, value);
            start.namespaces.push(NamespaceDecl::new(prefix, value.as_str()));
        }

        start.name = self.resolve_name(&qname, true, self.event_mark)?;
        for (attr_name, value, mark) in raw_attrs {
            if namespace_decl_prefix(&attr_name).is_some() {
                continue;
            }
            start.attributes.push(EventAttribute {
                name: self.resolve_name(&attr_name, false, mark)?,
                value,
            });
        }

        if is_empty {
            self.queue.push_back(XmlEvent::EndElement {
                name: start.name.clone(),
            });
        } else {
            self.open.push((qname, start.name.clone()));
        }
        if is_empty && self.open.is_empty() {
            self.phase = Phase::Epilog;
        }
        Ok(XmlEvent::StartElement(start))
    }

    /// Resolves a lexical QName against the current scope. Unprefixed
    /// attributes are in no namespace.
    fn resolve_name(&self, qname: &str, is_element: bool, mark: Mark) -> Result<QName> {
        let (prefix, local) = split_qname(qname);
        let namespace = match prefix {
            Some(p) => self.scope.resolve(p).ok_or_else(|| {
                ParseError::new(
                    format!("unbound namespace prefix '{p}' in '{qname}'"),
                    mark.source_location(),
                )
            })?,
            None if is_element => self.scope.resolve("").unwrap_or(""),
            None => "",
        };
        if local.is_empty() || local.contains(':') {
            return Err(ParseError::new(
                format!("'{qname}' is not a valid qualified name"),
                mark.source_location(),
            )
            .into());
        }
        Ok(QName::new(prefix.unwrap_or(""), local, namespace))
    }

    fn parse_end_tag(&mut self) -> Result<XmlEvent> {
        self.input.expect_str(b"</")?;
        let qname = self.input.parse_name()?;
        self.input.skip_whitespace();
        self.input.expect_byte(b'>')?;

        let Some((expected, name)) = self.open.pop() else {
            return Err(self.input.fatal(format!("unexpected end tag </{qname}>")).into());
        };
        if expected != qname {
            return Err(ParseError::new(
                format!("mismatched end tag: expected </{expected}>, found </{qname}>"),
                self.event_mark.source_location(),
            )
            .into());
        }
        if self.open.is_empty() {
            self.phase = Phase::Epilog;
        }
        Ok(XmlEvent::EndElement { name })
    }

    /// Reads character data up to the next markup. A non-predefined entity
    /// reference ends the run; if text precedes it, the reference is queued
    /// behind the text.
    fn parse_char_data(&mut self) -> Result<XmlEvent> {
        let mut text = String::new();
        while let Some(b) = self.input.peek() {
            match b {
                b'<' => break,
                b'&' => {
                    let mark = self.input.mark();
                    match self.input.parse_reference()? {
                        Reference::Char(ch) => text.push(ch),
                        Reference::Entity(name) => {
                            let event = self.entity_reference(name, mark)?;
                            if text.is_empty() {
                                return Ok(event);
                            }
                            self.queue.push_back(event);
                            break;
                        }
                    }
                }
                b']' if self.input.looking_at(b"]]>") => {
                    return Err(self
                        .input
                        .fatal("']]>' not allowed in character data")
                        .into());
                }
                _ => text.push(self.input.next_char()?),
            }
        }
        Ok(XmlEvent::Characters(text))
    }

    fn entity_reference(&self, name: String, mark: Mark) -> Result<XmlEvent> {
        match self.entities.general(&name) {
            Some(def @ EntityDef::External { .. }) => {
                Err(def.rejection(&name, mark.source_location()))
            }
            Some(EntityDef::Internal(value)) => Ok(XmlEvent::EntityReference {
                replacement: Some(value.clone()),
                name,
            }),
            None if self.entities.has_external_subset => Ok(XmlEvent::EntityReference {
                name,
                replacement: None,
            }),
            None => Err(ParseError::new(
                format!("undeclared entity '&{name};'"),
                mark.source_location(),
            )
            .into()),
        }
    }
}

/// Namespaces in XML 1.0 §3 constraints on a declaration.
fn check_declaration(prefix: &str, uri: &str, mark: Mark) -> Result<()> {
    let problem = match prefix {
        "xmlns" => Some("the 'xmlns' prefix must not be declared"),
        "xml" if uri != XML_NAMESPACE => Some("the 'xml' prefix must not be rebound"),
        p if !p.is_empty() && uri.is_empty() => Some("a prefix cannot be undeclared"),
        p if p != "xml" && (uri == XML_NAMESPACE || uri == XMLNS_NAMESPACE) => {
            Some("reserved namespace URI bound to another prefix")
        }
        _ => None,
    };
    match problem {
        Some(message) => Err(ParseError::new(message, mark.source_location()).into()),
        None => Ok(()),
    }
}

impl EventSource for XmlStreamReader {
    fn next_event(&mut self) -> Result<Option<XmlEvent>> {
        if self.pending_pop {
            self.pending_pop = false;
            self.scope.pop_scope();
        }
        let event = match self.queue.pop_front() {
            Some(event) => Some(event),
            None => self.read_event()?,
        };
        if let Some(XmlEvent::EndElement { .. }) = event {
            self.pending_pop = true;
        }
        Ok(event)
    }

    fn namespace_context(&self) -> &dyn NamespaceContext {
        &self.scope
    }

    fn location(&self) -> Option<Location> {
        Some(Location {
            line: self.event_mark.line,
            column: self.event_mark.column,
            offset: self.event_mark.char_offset,
            public_id: self.public_id.clone(),
            system_id: self.system_id.clone(),
        })
    }

    fn close(&mut self) -> Result<()> {
        self.phase = Phase::Finished;
        self.queue.clear();
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use pretty_assertions::assert_eq;

    fn events(input: &str) -> Vec<XmlEvent> {
        let mut reader = XmlStreamReader::new(input);
        let mut out = Vec::new();
        while let Some(event) = reader.next_event().unwrap() {
            out.push(event);
        }
        out
    }

    fn kinds(input: &str) -> Vec<EventKind> {
        events(input).iter().map(XmlEvent::kind).collect()
    }

    fn first_error(input: &str) -> XmlError {
        let mut reader = XmlStreamReader::new(input);
        loop {
            match reader.next_event() {
                Ok(Some(_)) => {}
                Ok(None) => panic!("expected an error"),
                Err(e) => return e,
            }
        }
    }

    #[test]
    fn test_empty_element_yields_start_and_end() {
        assert_eq!(
            kinds("<root/>"),
            vec![
                EventKind::StartDocument,
                EventKind::StartElement,
                EventKind::EndElement,
                EventKind::EndDocument,
            ]
        );
    }

    #[test]
    fn test_xml_declaration_values() {
        let evs = events("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"no\"?><r/>");
        assert_eq!(
            evs[0],
            XmlEvent::StartDocument {
                version: Some("1.0".to_string()),
                encoding: Some("UTF-8".to_string()),
                standalone: Some(false),
            }
        );
    }

    #[test]
    fn test_namespaces_resolve_on_elements_and_attributes() {
        let evs = events(r#"<a xmlns="urn:x" xmlns:p="urn:p"><p:b p:k="1" k="2"/></a>"#);
        let XmlEvent::StartElement(a) = &evs[1] else {
            panic!("expected start element");
        };
        assert_eq!(a.name, QName::new("", "a", "urn:x"));
        assert_eq!(
            a.namespaces,
            vec![NamespaceDecl::new("", "urn:x"), NamespaceDecl::new("p", "urn:p")]
        );
        let XmlEvent::StartElement(b) = &evs[2] else {
            panic!("expected start element");
        };
        assert_eq!(b.name, QName::new("p", "b", "urn:p"));
        assert_eq!(b.attributes[0].name, QName::new("p", "k", "urn:p"));
        assert_eq!(b.attributes[1].name, QName::local("k"));
    }

    #[test]
    fn test_scope_visible_at_end_element() {
        let mut reader = XmlStreamReader::new(r#"<a xmlns:p="urn:p"></a>"#);
        reader.next_event().unwrap();
        reader.next_event().unwrap();
        assert_eq!(reader.next_event().unwrap().map(|e| e.kind()), Some(EventKind::EndElement));
        assert_eq!(reader.namespace_context().namespace_uri("p").as_deref(), Some("urn:p"));
        reader.next_event().unwrap();
        assert_eq!(reader.namespace_context().namespace_uri("p"), None);
    }

    #[test]
    fn test_unbound_prefix_is_parse_error() {
        assert!(first_error("<p:a/>").is_parse());
    }

    #[test]
    fn test_mismatched_end_tag() {
        let err = first_error("<a></b>");
        assert!(err.to_string().contains("mismatched end tag"));
    }

    #[test]
    fn test_references_in_text() {
        let evs = events("<a>x &lt; &#65;</a>");
        assert_eq!(evs[2], XmlEvent::Characters("x < A".to_string()));
    }

    #[test]
    fn test_internal_entity_is_surfaced_not_expanded() {
        let evs = events("<!DOCTYPE a [<!ENTITY co \"ACME\">]><a>by &co;!</a>");
        let kinds: Vec<EventKind> = evs.iter().map(XmlEvent::kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::StartDocument,
                EventKind::Dtd,
                EventKind::StartElement,
                EventKind::Characters,
                EventKind::EntityReference,
                EventKind::Characters,
                EventKind::EndElement,
                EventKind::EndDocument,
            ]
        );
        assert_eq!(
            evs[4],
            XmlEvent::EntityReference {
                name: "co".to_string(),
                replacement: Some("ACME".to_string()),
            }
        );
    }

    #[test]
    fn test_external_entity_is_security_rejection() {
        let err = first_error(
            "<!DOCTYPE a [<!ENTITY xxe SYSTEM \"file:///etc/passwd\">]><a>&xxe;</a>",
        );
        assert!(err.is_security());
    }

    #[test]
    fn test_external_entity_in_attribute_is_security_rejection() {
        let err = first_error(
            "<!DOCTYPE a [<!ENTITY xxe PUBLIC \"-//X//EN\" \"http://evil/x\">]><a v=\"&xxe;\"/>",
        );
        assert!(err.is_security());
    }

    #[test]
    fn test_undeclared_entity_is_parse_error() {
        assert!(first_error("<a>&nope;</a>").is_parse());
    }

    #[test]
    fn test_element_text_default_impl() {
        let mut reader = XmlStreamReader::new("<a>one<!--c--><![CDATA[two]]></a>");
        reader.next_event().unwrap();
        reader.next_event().unwrap();
        assert_eq!(reader.element_text().unwrap(), "onetwo");
        assert_eq!(reader.next_event().unwrap(), Some(XmlEvent::EndDocument));
    }

    #[test]
    fn test_element_text_empty_element() {
        let mut reader = XmlStreamReader::new("<a><b/></a>");
        reader.next_event().unwrap();
        reader.next_event().unwrap();
        reader.next_event().unwrap();
        assert_eq!(reader.element_text().unwrap(), "");
    }

    #[test]
    fn test_trailing_content_is_error() {
        assert!(first_error("<a/><b/>").is_parse());
    }

    #[test]
    fn test_location_tracks_events() {
        let mut reader = XmlStreamReader::new("<a>\n  <b/>\n</a>").with_system_id("mem:doc");
        reader.next_event().unwrap();
        reader.next_event().unwrap();
        reader.next_event().unwrap(); // whitespace
        reader.next_event().unwrap(); // <b/>
        let loc = reader.location().unwrap();
        assert_eq!((loc.line, loc.column), (2, 3));
        assert_eq!(loc.system_id.as_deref(), Some("mem:doc"));
    }

    #[test]
    fn test_from_bytes_with_declared_encoding() {
        let bytes = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><a>caf\xE9</a>";
        let mut reader = XmlStreamReader::from_bytes(bytes, None).unwrap();
        reader.next_event().unwrap();
        reader.next_event().unwrap();
        assert_eq!(
            reader.next_event().unwrap(),
            Some(XmlEvent::Characters("caf\u{e9}".to_string()))
        );
    }
}
