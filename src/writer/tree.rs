//! Tree-result sink.

use crate::error::{Result, XmlError};
use crate::event::DocTypeDecl;
use crate::namespace::ScopeStack;
use crate::tree::{Attribute, Document, NodeId, NodeKind};

use super::EventWriter;

/// An [`EventWriter`] that appends nodes to a [`Document`] instead of
/// serializing.
///
/// Namespace declarations become `xmlns` / `xmlns:p` attributes on the
/// element they were written on. When appending below an existing node, the
/// declarations already in force at that node are taken into account by
/// [`namespace_uri`](EventWriter::namespace_uri).
///
/// # Examples
///
/// ```
/// use xmlbridge::writer::{EventWriter, TreeWriter};
/// use xmlbridge::Document;
///
/// let mut doc = Document::new();
/// let root = doc.root();
/// let mut writer = TreeWriter::new(&mut doc, root);
/// writer.start_element("", "a", "").unwrap();
/// writer.characters("hi").unwrap();
/// writer.end_element().unwrap();
///
/// let a = doc.root_element().unwrap();
/// assert_eq!(doc.text_content(a), "hi");
/// ```
pub struct TreeWriter<'d> {
    doc: &'d mut Document,
    base: NodeId,
    /// Open elements, innermost last.
    open: Vec<NodeId>,
    /// Whether the innermost open element may still take attributes.
    start_tag_open: bool,
    scope: ScopeStack,
}

impl<'d> TreeWriter<'d> {
    /// Creates a writer appending below `parent`.
    pub fn new(doc: &'d mut Document, parent: NodeId) -> Self {
        let mut scope = ScopeStack::new();
        let chain: Vec<NodeId> = doc.ancestors(parent).collect();
        for &node in chain.iter().rev() {
            scope.push_scope();
            for attr in doc.attributes(node) {
                if let Some(prefix) = attr.declared_prefix() {
                    scope.bind(prefix, &attr.value);
                }
            }
        }
        Self {
            doc,
            base: parent,
            open: Vec::new(),
            start_tag_open: false,
            scope,
        }
    }

    /// The node new top-level content is appended to.
    #[must_use]
    pub fn base(&self) -> NodeId {
        self.base
    }

    fn current_parent(&self) -> NodeId {
        self.open.last().copied().unwrap_or(self.base)
    }

    fn append(&mut self, kind: NodeKind) {
        self.start_tag_open = false;
        let parent = self.current_parent();
        let node = self.doc.create_node(kind);
        self.doc.append_child(parent, node);
    }

    fn current_element(&self, what: &str) -> Result<NodeId> {
        match self.open.last() {
            Some(&element) if self.start_tag_open => Ok(element),
            _ => Err(XmlError::Write(format!(
                "{what} written outside of a start tag"
            ))),
        }
    }
}

impl EventWriter for TreeWriter<'_> {
    fn start_document(
        &mut self,
        version: Option<&str>,
        encoding: Option<&str>,
        standalone: Option<bool>,
    ) -> Result<()> {
        if self.base == self.doc.root() {
            self.doc.version = version.map(String::from);
            self.doc.encoding = encoding.map(String::from);
            self.doc.standalone = standalone;
        }
        Ok(())
    }

    fn end_document(&mut self) -> Result<()> {
        while !self.open.is_empty() {
            self.end_element()?;
        }
        Ok(())
    }

    fn start_element(&mut self, prefix: &str, local_name: &str, namespace: &str) -> Result<()> {
        let parent = self.current_parent();
        let element = self
            .doc
            .create_element(Some(prefix), local_name, Some(namespace));
        self.doc.append_child(parent, element);
        self.open.push(element);
        self.scope.push_scope();
        self.start_tag_open = true;
        Ok(())
    }

    fn end_element(&mut self) -> Result<()> {
        if self.open.pop().is_none() {
            return Err(XmlError::Write(
                "end_element called with no open element".to_string(),
            ));
        }
        self.scope.pop_scope();
        self.start_tag_open = false;
        Ok(())
    }

    fn write_namespace(&mut self, prefix: &str, uri: &str) -> Result<()> {
        let element = self.current_element("namespace declaration")?;
        self.doc
            .set_attribute(element, Attribute::namespace_decl(prefix, uri));
        self.scope.bind(prefix, uri);
        Ok(())
    }

    fn write_attribute(
        &mut self,
        prefix: &str,
        local_name: &str,
        namespace: &str,
        value: &str,
    ) -> Result<()> {
        let element = self.current_element("attribute")?;
        self.doc.set_attribute(
            element,
            Attribute::with_namespace(Some(prefix), local_name, Some(namespace), value),
        );
        Ok(())
    }

    fn characters(&mut self, text: &str) -> Result<()> {
        self.append(NodeKind::Text {
            content: text.to_string(),
        });
        Ok(())
    }

    fn cdata(&mut self, text: &str) -> Result<()> {
        self.append(NodeKind::CData {
            content: text.to_string(),
        });
        Ok(())
    }

    fn comment(&mut self, text: &str) -> Result<()> {
        self.append(NodeKind::Comment {
            content: text.to_string(),
        });
        Ok(())
    }

    fn processing_instruction(&mut self, target: &str, data: Option<&str>) -> Result<()> {
        self.append(NodeKind::ProcessingInstruction {
            target: target.to_string(),
            data: data.map(String::from),
        });
        Ok(())
    }

    fn entity_ref(&mut self, name: &str, replacement: Option<&str>) -> Result<()> {
        self.append(NodeKind::EntityRef {
            name: name.to_string(),
            value: replacement.map(String::from),
        });
        Ok(())
    }

    fn dtd(&mut self, decl: &DocTypeDecl) -> Result<()> {
        self.append(NodeKind::DocumentType {
            name: decl.name.clone(),
            system_id: decl.system_id.clone(),
            public_id: decl.public_id.clone(),
            internal_subset: decl.internal_subset.clone(),
        });
        Ok(())
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
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.start_tag_open = false;
        Ok(())
    }
}
