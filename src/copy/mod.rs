//! The copy engine.
//!
//! Two primitive modes reproduce XML onto an [`EventWriter`]:
//!
//! - [`copy_events`] drains an [`EventSource`] (a real parser or a
//!   [`TreeReader`]);
//! - [`copy_tree`] walks a document tree directly.
//!
//! Both write one namespace declaration per (prefix, URI) pair actually in
//! use: a declaration is skipped when the writer already has the same
//! binding in scope, and added when an element or attribute name needs a
//! binding the writer does not have yet. An attribute whose prefix the
//! start tag already binds to another URI is renamed to a generated prefix.
//!
//! # Examples
//!
//! ```
//! use xmlbridge::copy::copy_to_bytes;
//! use xmlbridge::reader::XmlStreamReader;
//!
//! let mut reader = XmlStreamReader::new("<a xmlns=\"urn:x\"><b attr=\"1\"/>txt</a>");
//! let bytes = copy_to_bytes(&mut reader, None).unwrap();
//! assert_eq!(bytes, b"<a xmlns=\"urn:x\"><b attr=\"1\"/>txt</a>");
//! ```

use crate::error::{Result, XmlError};
use crate::event::{DocTypeDecl, XmlEvent};
use crate::reader::EventSource;
use crate::traverse::TreeReader;
use crate::tree::{Document, NodeId, NodeKind};
use crate::writer::{EventWriter, XmlStreamWriter};

/// The prefix bindings one start tag declares or relies on.
///
/// A prefix means one URI per start tag. When an attribute needs a prefix
/// the tag already uses for another URI, it is written under a generated
/// `nsN` prefix instead.
#[derive(Default)]
struct TagBindings {
    used: Vec<(String, String)>,
}

impl TagBindings {
    fn uri_of(&self, prefix: &str) -> Option<&str> {
        self.used
            .iter()
            .find(|(p, _)| p == prefix)
            .map(|(_, u)| u.as_str())
    }

    /// Declares `prefix` → `uri` on the current element unless the writer
    /// already has exactly that binding in scope.
    fn declare<W: EventWriter + ?Sized>(&mut self, writer: &mut W, prefix: &str, uri: &str) -> Result<()> {
        if let Some(existing) = self.uri_of(prefix) {
            if existing == uri {
                return Ok(());
            }
            return Err(XmlError::Write(format!(
                "prefix '{prefix}' bound to both '{existing}' and '{uri}' on one element"
            )));
        }
        // A prefix cannot be bound to "no namespace".
        if !prefix.is_empty() && uri.is_empty() {
            return Ok(());
        }
        if writer.namespace_uri(prefix).as_deref().unwrap_or("") != uri {
            writer.write_namespace(prefix, uri)?;
        }
        self.used.push((prefix.to_owned(), uri.to_owned()));
        Ok(())
    }

    /// The prefix an attribute named `prefix` in `uri` is written with.
    fn attribute_prefix<W: EventWriter + ?Sized>(
        &mut self,
        writer: &mut W,
        prefix: &str,
        uri: &str,
    ) -> Result<String> {
        if prefix.is_empty() || uri.is_empty() {
            return Ok(prefix.to_owned());
        }
        if self.uri_of(prefix).is_some_and(|existing| existing != uri) {
            return self.fresh_prefix(writer, uri);
        }
        self.declare(writer, prefix, uri)?;
        Ok(prefix.to_owned())
    }

    fn fresh_prefix<W: EventWriter + ?Sized>(&mut self, writer: &mut W, uri: &str) -> Result<String> {
        let mut n = 1usize;
        loop {
            let candidate = format!("ns{n}");
            let free = match self.uri_of(&candidate) {
                Some(bound) => bound == uri,
                None => writer
                    .namespace_uri(&candidate)
                    .map_or(true, |bound| bound == uri),
            };
            if free {
                self.declare(writer, &candidate, uri)?;
                return Ok(candidate);
            }
            n += 1;
        }
    }
}

// -------------------------------------------------------------------------
// Event-driven mode
// -------------------------------------------------------------------------

/// Copies events from `source` to `writer`.
///
/// Without `fragment`, copying stops after the END_ELEMENT matching the
/// first START_ELEMENT; with it, copying continues until the source is
/// exhausted, so several sibling top-level elements are all written.
///
/// # Errors
///
/// Propagates source failures (parse, security) and writer failures.
pub fn copy_events<S, W>(source: &mut S, writer: &mut W, fragment: bool) -> Result<()>
where
    S: EventSource + ?Sized,
    W: EventWriter + ?Sized,
{
    let mut depth = 0usize;
    let mut in_document = false;
    let mut tag = TagBindings::default();

    while let Some(event) = source.next_event()? {
        match event {
            XmlEvent::StartDocument {
                version,
                encoding,
                standalone,
            } => {
                in_document = true;
                writer.start_document(version.as_deref(), encoding.as_deref(), standalone)?;
            }
            XmlEvent::EndDocument => {
                in_document = false;
                writer.end_document()?;
            }
            XmlEvent::StartElement(start) => {
                let name = &start.name;
                writer.start_element(&name.prefix, &name.local_name, &name.namespace)?;
                tag = TagBindings::default();
                for decl in &start.namespaces {
                    tag.declare(writer, &decl.prefix, &decl.uri)?;
                }
                tag.declare(writer, &name.prefix, &name.namespace)?;
                let prefixes = start
                    .attributes
                    .iter()
                    .map(|attr| tag.attribute_prefix(writer, &attr.name.prefix, &attr.name.namespace))
                    .collect::<Result<Vec<_>>>()?;
                for (attr, prefix) in start.attributes.iter().zip(&prefixes) {
                    writer.write_attribute(
                        prefix,
                        &attr.name.local_name,
                        &attr.name.namespace,
                        &attr.value,
                    )?;
                }
                depth += 1;
            }
            XmlEvent::EndElement { .. } => {
                writer.end_element()?;
                depth = depth.saturating_sub(1);
                if depth == 0 && !fragment {
                    break;
                }
            }
            XmlEvent::Characters(text) => writer.characters(&text)?,
            XmlEvent::CData(text) => writer.cdata(&text)?,
            XmlEvent::Comment(text) => writer.comment(&text)?,
            XmlEvent::ProcessingInstruction { target, data } => {
                writer.processing_instruction(&target, data.as_deref())?;
            }
            XmlEvent::EntityReference { name, replacement } => {
                writer.entity_ref(&name, replacement.as_deref())?;
            }
            XmlEvent::Dtd(decl) => writer.dtd(&decl)?,
            XmlEvent::Attribute(attr) => {
                let prefix = tag.attribute_prefix(writer, &attr.name.prefix, &attr.name.namespace)?;
                writer.write_attribute(
                    &prefix,
                    &attr.name.local_name,
                    &attr.name.namespace,
                    &attr.value,
                )?;
            }
            XmlEvent::Namespace(decl) => tag.declare(writer, &decl.prefix, &decl.uri)?,
        }
    }

    if in_document {
        writer.end_document()?;
    }
    writer.flush()
}

// -------------------------------------------------------------------------
// Tree-driven mode
// -------------------------------------------------------------------------

enum Step {
    Enter(NodeId),
    LeaveElement,
    LeaveDocument,
}

/// Writes the subtree rooted at `node` to `writer`.
///
/// A Document node is written with its XML declaration; a
/// DocumentFragment contributes only its children. Within each element the
/// namespace declarations present on the tree are written before the
/// ordinary attributes.
///
/// # Errors
///
/// Returns writer failures.
pub fn copy_tree<W>(doc: &Document, node: NodeId, writer: &mut W) -> Result<()>
where
    W: EventWriter + ?Sized,
{
    let mut stack = vec![Step::Enter(node)];
    while let Some(step) = stack.pop() {
        let id = match step {
            Step::Enter(id) => id,
            Step::LeaveElement => {
                writer.end_element()?;
                continue;
            }
            Step::LeaveDocument => {
                writer.end_document()?;
                continue;
            }
        };

        match &doc.node(id).kind {
            NodeKind::Document => {
                writer.start_document(
                    doc.version.as_deref(),
                    doc.encoding.as_deref(),
                    doc.standalone,
                )?;
                stack.push(Step::LeaveDocument);
            }
            NodeKind::DocumentFragment => {}
            NodeKind::Element { .. } => {
                write_start_tag(doc, id, writer)?;
                stack.push(Step::LeaveElement);
            }
            NodeKind::Text { content } => writer.characters(content)?,
            NodeKind::CData { content } => writer.cdata(content)?,
            NodeKind::Comment { content } => writer.comment(content)?,
            NodeKind::ProcessingInstruction { target, data } => {
                writer.processing_instruction(target, data.as_deref())?;
            }
            NodeKind::EntityRef { name, value } => writer.entity_ref(name, value.as_deref())?,
            NodeKind::DocumentType {
                name,
                system_id,
                public_id,
                internal_subset,
            } => writer.dtd(&DocTypeDecl {
                name: name.clone(),
                public_id: public_id.clone(),
                system_id: system_id.clone(),
                internal_subset: internal_subset.clone(),
            })?,
        }

        let first = stack.len();
        stack.extend(doc.children(id).map(Step::Enter));
        stack[first..].reverse();
    }
    Ok(())
}

fn write_start_tag<W: EventWriter + ?Sized>(doc: &Document, id: NodeId, writer: &mut W) -> Result<()> {
    let prefix = doc.node_prefix(id).unwrap_or("");
    let namespace = doc.node_namespace(id).unwrap_or("");
    let name = doc.node_name(id).unwrap_or("");
    writer.start_element(prefix, name, namespace)?;

    let attributes = doc.attributes(id);
    let mut tag = TagBindings::default();
    for attr in attributes {
        if let Some(declared) = attr.declared_prefix() {
            tag.declare(writer, declared, &attr.value)?;
        }
    }
    tag.declare(writer, prefix, namespace)?;

    let ordinary: Vec<_> = attributes.iter().filter(|a| !a.is_namespace_decl()).collect();
    let prefixes = ordinary
        .iter()
        .map(|attr| match (attr.prefix.as_deref(), attr.namespace.as_deref()) {
            (Some(p), Some(ns)) => tag.attribute_prefix(writer, p, ns),
            (p, _) => Ok(p.unwrap_or("").to_owned()),
        })
        .collect::<Result<Vec<_>>>()?;
    for (attr, prefix) in ordinary.iter().zip(&prefixes) {
        writer.write_attribute(
            prefix,
            &attr.name,
            attr.namespace.as_deref().unwrap_or(""),
            &attr.value,
        )?;
    }
    Ok(())
}

// -------------------------------------------------------------------------
// Conveniences
// -------------------------------------------------------------------------

fn into_string(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| XmlError::Write(format!("output is not UTF-8: {e}")))
}

/// Serializes a whole document to a UTF-8 string.
///
/// # Errors
///
/// Returns writer failures.
///
/// # Examples
///
/// ```
/// use xmlbridge::copy::document_to_string;
/// use xmlbridge::Document;
///
/// let doc = Document::parse_str("<?xml version=\"1.0\"?><a><b/></a>").unwrap();
/// assert_eq!(document_to_string(&doc).unwrap(), "<?xml version=\"1.0\"?><a><b/></a>");
/// ```
pub fn document_to_string(doc: &Document) -> Result<String> {
    node_to_string(doc, doc.root())
}

/// Serializes one node (and its subtree) to a UTF-8 string.
///
/// # Errors
///
/// Returns writer failures.
pub fn node_to_string(doc: &Document, node: NodeId) -> Result<String> {
    let mut writer = XmlStreamWriter::new(Vec::new());
    copy_tree(doc, node, &mut writer)?;
    into_string(writer.into_inner()?)
}

/// Writes one node to `writer` and flushes it.
///
/// # Errors
///
/// Returns writer failures.
pub fn write_node<W>(doc: &Document, node: NodeId, writer: &mut W) -> Result<()>
where
    W: EventWriter + ?Sized,
{
    copy_tree(doc, node, writer)?;
    writer.flush()
}

/// Copies everything `source` produces to `writer`, including content
/// before and after the document element.
///
/// # Errors
///
/// Propagates source and writer failures.
pub fn copy_source<S, W>(source: &mut S, writer: &mut W) -> Result<()>
where
    S: EventSource + ?Sized,
    W: EventWriter + ?Sized,
{
    copy_events(source, writer, true)
}

/// Copies `source` into a byte buffer in the given encoding (UTF-8 when
/// `None`).
///
/// # Errors
///
/// Propagates source failures; an unknown encoding label is a write
/// failure.
pub fn copy_to_bytes<S>(source: &mut S, encoding: Option<&str>) -> Result<Vec<u8>>
where
    S: EventSource + ?Sized,
{
    let mut writer = match encoding {
        Some(label) => XmlStreamWriter::with_encoding(Vec::new(), label)?,
        None => XmlStreamWriter::new(Vec::new()),
    };
    copy_source(source, &mut writer)?;
    writer.into_inner()
}

/// Serializes a subtree by walking it through a [`TreeReader`] instead of
/// directly. Produces the same output as [`node_to_string`] for elements.
///
/// # Errors
///
/// Returns an error for node kinds the adapter cannot start at, and writer
/// failures.
pub fn node_to_string_streamed(doc: &Document, node: NodeId) -> Result<String> {
    let mut reader = TreeReader::new(doc, node);
    let mut writer = XmlStreamWriter::new(Vec::new());
    copy_events(&mut reader, &mut writer, true)?;
    into_string(writer.into_inner()?)
}
