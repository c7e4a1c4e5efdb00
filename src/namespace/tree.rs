//! Namespace resolution at a position inside a document tree.

use super::NamespaceContext;
use crate::traverse::frame::Frame;
use crate::tree::{Document, NodeId};
use crate::util::qname::XML_NAMESPACE;

/// Answers prefix/URI questions for the position described by a frame stack.
///
/// Declarations captured by the frames are consulted innermost first. When
/// the frames are exhausted, the ancestors of the outermost frame's node are
/// scanned for `xmlns` attributes directly, which covers subtrees walked on
/// their own. A context supplied as `outer` is asked last.
#[derive(Clone, Copy)]
pub struct TreeNamespaceContext<'a> {
    doc: &'a Document,
    frames: &'a [Frame],
    outer: Option<&'a dyn NamespaceContext>,
}

impl<'a> TreeNamespaceContext<'a> {
    /// Creates a context over `frames`, outermost first.
    #[must_use]
    pub fn new(doc: &'a Document, frames: &'a [Frame]) -> Self {
        Self {
            doc,
            frames,
            outer: None,
        }
    }

    /// Sets the context consulted when neither the frames nor the tree bind
    /// the name being looked up.
    #[must_use]
    pub fn with_outer(mut self, outer: Option<&'a dyn NamespaceContext>) -> Self {
        self.outer = outer;
        self
    }

    fn current_node(&self) -> Option<NodeId> {
        self.frames.last().map(|f| f.element)
    }

    /// Resolves `prefix` to a URI. An `xmlns=""` undeclaration yields `None`
    /// for the default prefix.
    #[must_use]
    pub fn resolve(&self, prefix: &str) -> Option<String> {
        for frame in self.frames.iter().rev() {
            if let Some((_, uri)) = frame.declarations().rev().find(|(p, _)| *p == prefix) {
                return non_empty(uri);
            }
        }

        if let Some(root_frame) = self.frames.first() {
            for ancestor in self.doc.ancestors(root_frame.element).skip(1) {
                let found = self
                    .doc
                    .attributes(ancestor)
                    .iter()
                    .find(|a| a.declared_prefix() == Some(prefix));
                if let Some(attr) = found {
                    return non_empty(&attr.value);
                }
            }
        }

        if prefix == "xml" {
            return Some(XML_NAMESPACE.to_string());
        }
        self.outer.and_then(|o| o.namespace_uri(prefix))
    }

    /// Finds the prefix declared for `uri` on the current element or its
    /// nearest ancestor. The default-namespace form yields `""`.
    #[must_use]
    pub fn resolve_prefix(&self, uri: &str) -> Option<String> {
        if uri == XML_NAMESPACE {
            return Some("xml".to_string());
        }
        if let Some(node) = self.current_node() {
            for ancestor in self.doc.ancestors(node) {
                for attr in self.doc.attributes(ancestor) {
                    if attr.value == uri {
                        if let Some(prefix) = attr.declared_prefix() {
                            return Some(prefix.to_string());
                        }
                    }
                }
            }
        }
        self.outer.and_then(|o| o.prefix(uri))
    }
}

fn non_empty(uri: &str) -> Option<String> {
    (!uri.is_empty()).then(|| uri.to_string())
}

impl NamespaceContext for TreeNamespaceContext<'_> {
    fn namespace_uri(&self, prefix: &str) -> Option<String> {
        self.resolve(prefix)
    }

    fn prefix(&self, namespace_uri: &str) -> Option<String> {
        self.resolve_prefix(namespace_uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::ScopeStack;
    use crate::tree::Attribute;
    use pretty_assertions::assert_eq;

    /// `<outer xmlns:a="urn:a" xmlns="urn:d"><inner xmlns:a="urn:a2"><leaf/></inner></outer>`
    fn sample() -> (Document, NodeId, NodeId, NodeId) {
        let mut doc = Document::new();
        let root = doc.root();
        let outer = doc.create_element(None, "outer", Some("urn:d"));
        doc.set_attribute(outer, Attribute::namespace_decl("a", "urn:a"));
        doc.set_attribute(outer, Attribute::namespace_decl("", "urn:d"));
        doc.append_child(root, outer);
        let inner = doc.create_element(None, "inner", Some("urn:d"));
        doc.set_attribute(inner, Attribute::namespace_decl("a", "urn:a2"));
        doc.append_child(outer, inner);
        let leaf = doc.create_element(None, "leaf", Some("urn:d"));
        doc.append_child(inner, leaf);
        (doc, outer, inner, leaf)
    }

    #[test]
    fn test_inner_frame_shadows_outer() {
        let (doc, outer, inner, _) = sample();
        let frames = vec![Frame::new(&doc, outer), Frame::new(&doc, inner)];
        let ctx = TreeNamespaceContext::new(&doc, &frames);
        assert_eq!(ctx.resolve("a").as_deref(), Some("urn:a2"));
        assert_eq!(ctx.resolve("").as_deref(), Some("urn:d"));
        assert_eq!(ctx.resolve("xml").as_deref(), Some(XML_NAMESPACE));
        assert_eq!(ctx.resolve("zz"), None);
    }

    #[test]
    fn test_subtree_falls_back_to_ancestor_attributes() {
        let (doc, _, _, leaf) = sample();
        // Walking only `leaf`: its ancestors still carry the declarations.
        let frames = vec![Frame::new(&doc, leaf)];
        let ctx = TreeNamespaceContext::new(&doc, &frames);
        assert_eq!(ctx.resolve("a").as_deref(), Some("urn:a2"));
        assert_eq!(ctx.resolve("").as_deref(), Some("urn:d"));
    }

    #[test]
    fn test_resolve_prefix_scans_outward() {
        let (doc, outer, inner, leaf) = sample();
        let frames = vec![
            Frame::new(&doc, outer),
            Frame::new(&doc, inner),
            Frame::new(&doc, leaf),
        ];
        let ctx = TreeNamespaceContext::new(&doc, &frames);
        assert_eq!(ctx.resolve_prefix("urn:a2").as_deref(), Some("a"));
        assert_eq!(ctx.resolve_prefix("urn:d").as_deref(), Some(""));
        assert_eq!(ctx.resolve_prefix("urn:none"), None);
    }

    #[test]
    fn test_outer_context_is_consulted_last() {
        let (doc, outer, _, _) = sample();
        let frames = vec![Frame::new(&doc, outer)];
        let mut scope = ScopeStack::new();
        scope.push_scope();
        scope.bind("env", "urn:env");
        scope.bind("a", "urn:ignored");

        let ctx = TreeNamespaceContext::new(&doc, &frames).with_outer(Some(&scope));
        assert_eq!(ctx.resolve("env").as_deref(), Some("urn:env"));
        assert_eq!(ctx.resolve("a").as_deref(), Some("urn:a"));
        assert_eq!(ctx.resolve_prefix("urn:env").as_deref(), Some("env"));
    }

    #[test]
    fn test_empty_frames_know_only_xml() {
        let doc = Document::new();
        let ctx = TreeNamespaceContext::new(&doc, &[]);
        assert_eq!(ctx.resolve(""), None);
        assert_eq!(ctx.resolve("xml").as_deref(), Some(XML_NAMESPACE));
    }
}
