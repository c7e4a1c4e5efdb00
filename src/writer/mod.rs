//! Push-style XML writers.
//!
//! [`EventWriter`] is the construction interface the copy engine drives.
//! [`XmlStreamWriter`] serializes to any `io::Write` in any `encoding_rs`
//! encoding; [`TreeWriter`] builds a [`crate::Document`] instead.
//!
//! Both keep a namespace scope per open element, so callers can ask
//! [`EventWriter::namespace_uri`] whether a binding is already in force
//! before declaring it again.
//!
//! # Examples
//!
//! ```
//! use xmlbridge::writer::{EventWriter, XmlStreamWriter};
//!
//! let mut writer = XmlStreamWriter::new(Vec::new());
//! writer.start_element("", "a", "urn:x").unwrap();
//! writer.write_default_namespace("urn:x").unwrap();
//! writer.start_element("", "b", "urn:x").unwrap();
//! writer.end_element().unwrap();
//! writer.end_element().unwrap();
//! let bytes = writer.into_inner().unwrap();
//! assert_eq!(bytes, b"<a xmlns=\"urn:x\"><b/></a>");
//! ```

mod tree;

pub use tree::TreeWriter;

use std::io::Write;

use crate::encoding::OutputEncoder;
use crate::error::{Result, XmlError};
use crate::event::DocTypeDecl;
use crate::namespace::ScopeStack;
use crate::parser::input::is_xml_char;
use crate::util::qname::join_qname;

/// Encoded bytes are handed to the sink once this many are buffered.
const FLUSH_THRESHOLD: usize = 8 * 1024;

/// A push-style consumer of XML construction calls.
///
/// Namespace declarations and attributes apply to the element most recently
/// opened with [`start_element`](Self::start_element) and must be written
/// before any of its content. An empty prefix means the default namespace;
/// an empty namespace URI means no namespace.
pub trait EventWriter {
    /// Begins the document. Serializing writers emit an XML declaration
    /// only when `version` is given.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::Write`] if the sink rejects the output.
    fn start_document(
        &mut self,
        version: Option<&str>,
        encoding: Option<&str>,
        standalone: Option<bool>,
    ) -> Result<()>;

    /// Ends the document.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::Write`] if the sink rejects the output.
    fn end_document(&mut self) -> Result<()>;

    /// Opens an element and a new namespace scope. Does not declare
    /// `namespace`; see [`write_namespace`](Self::write_namespace).
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::Write`] if the sink rejects the output.
    fn start_element(&mut self, prefix: &str, local_name: &str, namespace: &str) -> Result<()>;

    /// Closes the innermost open element.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::Write`] if no element is open.
    fn end_element(&mut self) -> Result<()>;

    /// Declares `prefix` as bound to `uri` on the current element.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::Write`] if no start tag is open.
    fn write_namespace(&mut self, prefix: &str, uri: &str) -> Result<()>;

    /// Declares the default namespace on the current element.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::Write`] if no start tag is open.
    fn write_default_namespace(&mut self, uri: &str) -> Result<()> {
        self.write_namespace("", uri)
    }

    /// Writes an ordinary attribute on the current element.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::Write`] if no start tag is open.
    fn write_attribute(
        &mut self,
        prefix: &str,
        local_name: &str,
        namespace: &str,
        value: &str,
    ) -> Result<()>;

    /// Writes character data.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::Write`] if the sink rejects the output.
    fn characters(&mut self, text: &str) -> Result<()>;

    /// Writes a CDATA section.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::Write`] if the sink rejects the output.
    fn cdata(&mut self, text: &str) -> Result<()>;

    /// Writes a comment.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::Write`] if `text` cannot appear in a comment.
    fn comment(&mut self, text: &str) -> Result<()>;

    /// Writes a processing instruction.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::Write`] if `data` contains `?>`.
    fn processing_instruction(&mut self, target: &str, data: Option<&str>) -> Result<()>;

    /// Writes an unexpanded entity reference.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::Write`] if the sink rejects the output.
    fn entity_ref(&mut self, name: &str, replacement: Option<&str>) -> Result<()>;

    /// Writes a document type declaration.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::Write`] if the sink rejects the output.
    fn dtd(&mut self, decl: &DocTypeDecl) -> Result<()>;

    /// Binds `prefix` to `uri` in the current scope without writing a
    /// declaration.
    ///
    /// # Errors
    ///
    /// Implementations may reject the binding.
    fn set_prefix(&mut self, prefix: &str, uri: &str) -> Result<()>;

    /// The URI `prefix` is bound to in the current scope.
    fn namespace_uri(&self, prefix: &str) -> Option<String>;

    /// A prefix bound to `uri` in the current scope.
    fn prefix(&self, uri: &str) -> Option<String>;

    /// Pushes buffered output to the underlying sink.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::Write`] on I/O failure.
    fn flush(&mut self) -> Result<()>;

    /// Flushes and releases the writer. Further writes fail.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::Write`] on I/O failure.
    fn close(&mut self) -> Result<()>;
}

impl<T: EventWriter + ?Sized> EventWriter for &mut T {
    fn start_document(
        &mut self,
        version: Option<&str>,
        encoding: Option<&str>,
        standalone: Option<bool>,
    ) -> Result<()> {
        (**self).start_document(version, encoding, standalone)
    }
    fn end_document(&mut self) -> Result<()> {
        (**self).end_document()
    }
    fn start_element(&mut self, prefix: &str, local_name: &str, namespace: &str) -> Result<()> {
        (**self).start_element(prefix, local_name, namespace)
    }
    fn end_element(&mut self) -> Result<()> {
        (**self).end_element()
    }
    fn write_namespace(&mut self, prefix: &str, uri: &str) -> Result<()> {
        (**self).write_namespace(prefix, uri)
    }
    fn write_attribute(
        &mut self,
        prefix: &str,
        local_name: &str,
        namespace: &str,
        value: &str,
    ) -> Result<()> {
        (**self).write_attribute(prefix, local_name, namespace, value)
    }
    fn characters(&mut self, text: &str) -> Result<()> {
        (**self).characters(text)
    }
    fn cdata(&mut self, text: &str) -> Result<()> {
        (**self).cdata(text)
    }
    fn comment(&mut self, text: &str) -> Result<()> {
        (**self).comment(text)
    }
    fn processing_instruction(&mut self, target: &str, data: Option<&str>) -> Result<()> {
        (**self).processing_instruction(target, data)
    }
    fn entity_ref(&mut self, name: &str, replacement: Option<&str>) -> Result<()> {
        (**self).entity_ref(name, replacement)
    }
    fn dtd(&mut self, decl: &DocTypeDecl) -> Result<()> {
        (**self).dtd(decl)
    }
    fn set_prefix(&mut self, prefix: &str, uri: &str) -> Result<()> {
        (**self).set_prefix(prefix, uri)
    }
    fn namespace_uri(&self, prefix: &str) -> Option<String> {
        (**self).namespace_uri(prefix)
    }
    fn prefix(&self, uri: &str) -> Option<String> {
        (**self).prefix(uri)
    }
    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

// -------------------------------------------------------------------------
// XmlStreamWriter
// -------------------------------------------------------------------------

/// Serializes construction calls as XML text.
///
/// Start tags are left open until the first content or the matching end, so
/// a childless element is written as `<x/>`. Output passes through an
/// [`OutputEncoder`]; characters the target encoding cannot represent become
/// numeric character references.
pub struct XmlStreamWriter<W: Write> {
    sink: Option<W>,
    encoder: OutputEncoder,
    /// Encoded bytes not yet handed to `sink`.
    buf: Vec<u8>,
    /// Scratch space for building markup before encoding.
    text: String,
    scope: ScopeStack,
    open: Vec<String>,
    start_tag_open: bool,
}

impl<W: Write> XmlStreamWriter<W> {
    /// Creates a UTF-8 writer.
    pub fn new(sink: W) -> Self {
        Self::with_encoder(sink, OutputEncoder::utf8())
    }

    /// Creates a writer for an `encoding_rs` label.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::Write`] for an unknown label.
    pub fn with_encoding(sink: W, label: &str) -> Result<Self> {
        let encoder = OutputEncoder::for_label(label).map_err(|e| XmlError::Write(e.to_string()))?;
        Ok(Self::with_encoder(sink, encoder))
    }

    fn with_encoder(sink: W, encoder: OutputEncoder) -> Self {
        Self {
            sink: Some(sink),
            encoder,
            buf: Vec::new(),
            text: String::new(),
            scope: ScopeStack::new(),
            open: Vec::new(),
            start_tag_open: false,
        }
    }

    /// The canonical name of the output encoding.
    #[must_use]
    pub fn encoding(&self) -> &'static str {
        self.encoder.name()
    }

    /// Number of currently open elements.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Flushes everything and returns the sink.
    ///
    /// # Errors
    ///
    /// Returns [`XmlError::Write`] on I/O failure or if the writer was
    /// already closed.
    pub fn into_inner(mut self) -> Result<W> {
        self.finish()?;
        self.sink
            .take()
            .ok_or_else(|| XmlError::Write("writer is closed".to_string()))
    }

    // === Internal ===

    fn ensure_open(&self) -> Result<()> {
        if self.sink.is_none() {
            return Err(XmlError::Write("writer is closed".to_string()));
        }
        Ok(())
    }

    /// Encodes the scratch text into the byte buffer.
    fn emit(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.encoder.encode(&self.text, &mut self.buf);
        self.text.clear();
        if self.buf.len() >= FLUSH_THRESHOLD {
            self.drain()?;
        }
        Ok(())
    }

    fn drain(&mut self) -> Result<()> {
        if let Some(sink) = self.sink.as_mut() {
            sink.write_all(&self.buf)?;
            self.buf.clear();
        }
        Ok(())
    }

    fn close_start_tag(&mut self) {
        if self.start_tag_open {
            self.start_tag_open = false;
            self.text.push('>');
        }
    }

    fn require_start_tag(&self, what: &str) -> Result<()> {
        if self.start_tag_open {
            Ok(())
        } else {
            Err(XmlError::Write(format!(
                "{what} written outside of a start tag"
            )))
        }
    }

    fn finish(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.close_start_tag();
        self.emit()?;
        self.encoder.finish(&mut self.buf);
        self.drain()?;
        if let Some(sink) = self.sink.as_mut() {
            sink.flush()?;
        }
        Ok(())
    }
}

impl<W: Write> EventWriter for XmlStreamWriter<W> {
    fn start_document(
        &mut self,
        version: Option<&str>,
        encoding: Option<&str>,
        standalone: Option<bool>,
    ) -> Result<()> {
        self.ensure_open()?;
        let Some(version) = version else {
            return Ok(());
        };
        self.text.push_str("<?xml version=\"");
        self.text.push_str(version);
        self.text.push('"');
        // The declaration names the encoding actually written, never the
        // source's.
        if encoding.is_some() || self.encoder.name() != "UTF-8" {
            self.text.push_str(" encoding=\"");
            self.text.push_str(self.encoder.name());
            self.text.push('"');
        }
        if let Some(standalone) = standalone {
            self.text.push_str(" standalone=\"");
            self.text.push_str(if standalone { "yes" } else { "no" });
            self.text.push('"');
        }
        self.text.push_str("?>");
        self.emit()
    }

    fn end_document(&mut self) -> Result<()> {
        while !self.open.is_empty() {
            self.end_element()?;
        }
        self.flush()
    }

    fn start_element(&mut self, prefix: &str, local_name: &str, _namespace: &str) -> Result<()> {
        self.close_start_tag();
        let qname = join_qname(Some(prefix), local_name);
        self.text.push('<');
        self.text.push_str(&qname);
        self.open.push(qname);
        self.scope.push_scope();
        self.start_tag_open = true;
        self.emit()
    }

    fn end_element(&mut self) -> Result<()> {
        let Some(qname) = self.open.pop() else {
            return Err(XmlError::Write(
                "end_element called with no open element".to_string(),
            ));
        };
        if self.start_tag_open {
            self.start_tag_open = false;
            self.text.push_str("/>");
        } else {
            self.text.push_str("</");
            self.text.push_str(&qname);
            self.text.push('>');
        }
        self.scope.pop_scope();
        self.emit()
    }

    fn write_namespace(&mut self, prefix: &str, uri: &str) -> Result<()> {
        self.require_start_tag("namespace declaration")?;
        check_chars(uri, "namespace URI")?;
        if prefix.is_empty() {
            self.text.push_str(" xmlns=\"");
        } else {
            self.text.push_str(" xmlns:");
            self.text.push_str(prefix);
            self.text.push_str("=\"");
        }
        escape_attribute(&mut self.text, uri);
        self.text.push('"');
        self.scope.bind(prefix, uri);
        self.emit()
    }

    fn write_attribute(
        &mut self,
        prefix: &str,
        local_name: &str,
        _namespace: &str,
        value: &str,
    ) -> Result<()> {
        self.require_start_tag("attribute")?;
        check_chars(value, "attribute value")?;
        self.text.push(' ');
        self.text.push_str(&join_qname(Some(prefix), local_name));
        self.text.push_str("=\"");
        escape_attribute(&mut self.text, value);
        self.text.push('"');
        self.emit()
    }

    fn characters(&mut self, text: &str) -> Result<()> {
        check_chars(text, "character data")?;
        self.close_start_tag();
        escape_text(&mut self.text, text);
        self.emit()
    }

    fn cdata(&mut self, text: &str) -> Result<()> {
        check_chars(text, "CDATA section")?;
        self.close_start_tag();
        // `]]>` cannot occur inside a section; split it across two.
        self.text.push_str("<![CDATA[");
        self.text.push_str(&text.replace("]]>", "]]]]><![CDATA[>"));
        self.text.push_str("]]>");
        self.emit()
    }

    fn comment(&mut self, text: &str) -> Result<()> {
        if text.contains("--") || text.ends_with('-') {
            return Err(XmlError::Write(format!(
                "'{text}' cannot be written as a comment"
            )));
        }
        check_chars(text, "comment")?;
        self.close_start_tag();
        self.text.push_str("<!--");
        self.text.push_str(text);
        self.text.push_str("-->");
        self.emit()
    }

    fn processing_instruction(&mut self, target: &str, data: Option<&str>) -> Result<()> {
        if data.is_some_and(|d| d.contains("?>")) {
            return Err(XmlError::Write(format!(
                "processing instruction '{target}' data contains '?>'"
            )));
        }
        check_chars(data.unwrap_or(""), "processing instruction data")?;
        self.close_start_tag();
        self.text.push_str("<?");
        self.text.push_str(target);
        if let Some(data) = data.filter(|d| !d.is_empty()) {
            self.text.push(' ');
            self.text.push_str(data);
        }
        self.text.push_str("?>");
        self.emit()
    }

    fn entity_ref(&mut self, name: &str, _replacement: Option<&str>) -> Result<()> {
        self.close_start_tag();
        self.text.push('&');
        self.text.push_str(name);
        self.text.push(';');
        self.emit()
    }

    fn dtd(&mut self, decl: &DocTypeDecl) -> Result<()> {
        self.close_start_tag();
        self.text.push_str(&decl.to_markup());
        self.emit()
    }

    fn set_prefix(&mut self, prefix: &str, uri: &str) -> Result<()> {
        self.scope.bind(prefix, uri);
        Ok(())
    }

    fn namespace_uri(&self, prefix: &str) -> Option<String> {
        self.scope.resolve(prefix).map(String::from)
    }

    fn prefix(&self, uri: &str) -> Option<String> {
        self.scope.prefix_for(uri).map(String::from)
    }

    fn flush(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.close_start_tag();
        self.emit()?;
        self.drain()?;
        if let Some(sink) = self.sink.as_mut() {
            sink.flush()?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.sink.is_none() {
            return Ok(());
        }
        self.finish()?;
        self.sink = None;
        Ok(())
    }
}

// -------------------------------------------------------------------------
// Escaping
// -------------------------------------------------------------------------

/// Fails on characters XML 1.0 cannot carry, not even as a character
/// reference.
fn check_chars(text: &str, what: &str) -> Result<()> {
    match text.chars().find(|&c| !is_xml_char(c)) {
        Some(c) => Err(XmlError::Write(format!(
            "{what} contains U+{:04X}, which XML 1.0 cannot represent",
            c as u32
        ))),
        None => Ok(()),
    }
}

/// Escapes character data: `&`, `<`, `>` by name and `\r` by number.
pub(crate) fn escape_text(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#13;"),
            _ => out.push(ch),
        }
    }
}

/// Escapes a double-quoted attribute value. Whitespace other than space is
/// written as a reference so attribute-value normalization on re-read keeps
/// it.
pub(crate) fn escape_attribute(out: &mut String, value: &str) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#9;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            _ => out.push(ch),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn written(build: impl FnOnce(&mut XmlStreamWriter<Vec<u8>>)) -> String {
        let mut writer = XmlStreamWriter::new(Vec::new());
        build(&mut writer);
        String::from_utf8(writer.into_inner().unwrap()).unwrap()
    }

    #[test]
    fn test_childless_element_is_self_closed() {
        let out = written(|w| {
            w.start_element("", "a", "").unwrap();
            w.write_attribute("", "k", "", "v").unwrap();
            w.end_element().unwrap();
        });
        assert_eq!(out, "<a k=\"v\"/>");
    }

    #[test]
    fn test_text_and_attribute_escaping() {
        let out = written(|w| {
            w.start_element("", "a", "").unwrap();
            w.write_attribute("", "k", "", "\"x\"\t&\n").unwrap();
            w.characters("1 < 2 & 3 > 2\r").unwrap();
            w.end_element().unwrap();
        });
        assert_eq!(
            out,
            "<a k=\"&quot;x&quot;&#9;&amp;&#10;\">1 &lt; 2 &amp; 3 &gt; 2&#13;</a>"
        );
    }

    #[test]
    fn test_namespace_scope_follows_elements() {
        let mut w = XmlStreamWriter::new(Vec::new());
        w.start_element("p", "a", "urn:p").unwrap();
        w.write_namespace("p", "urn:p").unwrap();
        w.start_element("p", "b", "urn:p").unwrap();
        assert_eq!(w.namespace_uri("p").as_deref(), Some("urn:p"));
        assert_eq!(w.prefix("urn:p").as_deref(), Some("p"));
        w.end_element().unwrap();
        w.end_element().unwrap();
        assert_eq!(w.namespace_uri("p"), None);
        assert_eq!(
            String::from_utf8(w.into_inner().unwrap()).unwrap(),
            "<p:a xmlns:p=\"urn:p\"><p:b/></p:a>"
        );
    }

    #[test]
    fn test_attribute_after_content_is_error() {
        let mut w = XmlStreamWriter::new(Vec::new());
        w.start_element("", "a", "").unwrap();
        w.characters("x").unwrap();
        assert!(w.write_attribute("", "k", "", "v").unwrap_err().is_write());
    }

    #[test]
    fn test_end_element_underflow() {
        let mut w = XmlStreamWriter::new(Vec::new());
        assert!(w.end_element().unwrap_err().is_write());
    }

    #[test]
    fn test_write_after_close_fails() {
        let mut w = XmlStreamWriter::new(Vec::new());
        w.close().unwrap();
        assert!(w.characters("x").unwrap_err().is_write());
        assert!(w.close().is_ok());
    }

    #[test]
    fn test_cdata_split_and_comment_check() {
        let out = written(|w| {
            w.start_element("", "a", "").unwrap();
            w.cdata("x]]>y").unwrap();
            w.end_element().unwrap();
        });
        assert_eq!(out, "<a><![CDATA[x]]]]><![CDATA[>y]]></a>");

        let mut w = XmlStreamWriter::new(Vec::new());
        assert!(w.comment("a--b").is_err());
    }

    #[test]
    fn test_declaration_names_output_encoding() {
        let mut w = XmlStreamWriter::with_encoding(Vec::new(), "ISO-8859-1").unwrap();
        w.start_document(Some("1.0"), None, None).unwrap();
        w.start_element("", "r", "").unwrap();
        w.characters("\u{e9}\u{100}").unwrap();
        w.end_element().unwrap();
        let bytes = w.into_inner().unwrap();
        assert_eq!(
            bytes,
            b"<?xml version=\"1.0\" encoding=\"windows-1252\"?><r>\xE9&#256;</r>".to_vec()
        );
    }

    #[test]
    fn test_no_declaration_without_version() {
        let out = written(|w| {
            w.start_document(None, None, None).unwrap();
            w.start_element("", "r", "").unwrap();
            w.end_document().unwrap();
        });
        assert_eq!(out, "<r/>");
    }

    #[test]
    fn test_end_document_closes_open_elements() {
        let out = written(|w| {
            w.start_element("", "a", "").unwrap();
            w.start_element("", "b", "").unwrap();
            w.characters("t").unwrap();
            w.end_document().unwrap();
        });
        assert_eq!(out, "<a><b>t</b></a>");
    }

    #[test]
    fn test_unrepresentable_characters_are_rejected() {
        let mut w = XmlStreamWriter::new(Vec::new());
        w.start_element("", "a", "").unwrap();
        let err = w.write_attribute("", "k", "", "x\u{1}y").unwrap_err();
        assert!(err.is_write());
        assert!(w.characters("bell\u{7}").unwrap_err().is_write());
        assert!(w.comment("\u{FFFF}").unwrap_err().is_write());
        w.characters("ok\ttab").unwrap();
        w.end_element().unwrap();
        assert_eq!(
            String::from_utf8(w.into_inner().unwrap()).unwrap(),
            "<a>ok\ttab</a>"
        );
    }
}
