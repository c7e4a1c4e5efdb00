//! Prefix ⇄ namespace URI resolution.
//!
//! [`NamespaceContext`] is the read-only question every source and writer can
//! answer: "what does this prefix mean here?" and "which prefix is bound to
//! this URI here?". Two implementations live in this module:
//!
//! - [`ScopeStack`], a stack of binding frames mirroring element nesting,
//!   used by the streaming reader and the writers;
//! - [`TreeNamespaceContext`], the bridge that answers the same questions for
//!   a position inside a document tree being walked by a frame stack.

mod tree;

pub use tree::TreeNamespaceContext;

use crate::util::qname::XML_NAMESPACE;

/// Position-scoped prefix ⇄ URI resolution.
///
/// The empty string stands for the default namespace (as a prefix) and for
/// "no namespace" (as a URI).
pub trait NamespaceContext {
    /// Resolves `prefix` to its namespace URI at the current position.
    fn namespace_uri(&self, prefix: &str) -> Option<String>;

    /// Finds a prefix bound to `namespace_uri` at the current position.
    /// Returns `Some("")` when the URI is the default namespace.
    fn prefix(&self, namespace_uri: &str) -> Option<String>;
}

/// A context with no bindings beyond the reserved `xml` prefix.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyNamespaceContext;

impl NamespaceContext for EmptyNamespaceContext {
    fn namespace_uri(&self, prefix: &str) -> Option<String> {
        (prefix == "xml").then(|| XML_NAMESPACE.to_string())
    }

    fn prefix(&self, namespace_uri: &str) -> Option<String> {
        (namespace_uri == XML_NAMESPACE).then(|| "xml".to_string())
    }
}

/// Manages namespace scope while streaming.
///
/// Maintains a stack of binding frames that mirrors the element nesting.
/// Each frame contains the declarations introduced on that element.
/// Resolution walks the stack from top to bottom so inner declarations
/// shadow outer ones.
#[derive(Debug, Clone)]
pub struct ScopeStack {
    /// Each frame is a list of `(prefix, uri)` pairs; `""` is the default
    /// namespace prefix.
    stack: Vec<Vec<(String, String)>>,
}

impl ScopeStack {
    /// Creates a stack with the `xml` prefix pre-bound.
    #[must_use]
    pub fn new() -> Self {
        let initial = vec![("xml".to_string(), XML_NAMESPACE.to_string())];
        Self {
            stack: vec![initial],
        }
    }

    /// Pushes a new (empty) scope for an element.
    pub fn push_scope(&mut self) {
        self.stack.push(Vec::new());
    }

    /// Pops the current scope. The outermost (`xml`) scope is never popped.
    pub fn pop_scope(&mut self) {
        if self.stack.len() > 1 {
            self.stack.pop();
        }
    }

    /// Number of open element scopes.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len() - 1
    }

    /// Binds a prefix to a URI in the current scope, replacing an existing
    /// binding of the same prefix in that scope.
    pub fn bind(&mut self, prefix: &str, uri: &str) {
        if let Some(frame) = self.stack.last_mut() {
            if let Some(slot) = frame.iter_mut().find(|(p, _)| p == prefix) {
                slot.1 = uri.to_string();
            } else {
                frame.push((prefix.to_string(), uri.to_string()));
            }
        }
    }

    /// Resolves a prefix to its URI, borrowing from the stack.
    ///
    /// `xmlns=""` undeclares the default namespace, so resolving `""` below
    /// such a declaration yields `None`.
    #[must_use]
    pub fn resolve(&self, prefix: &str) -> Option<&str> {
        for frame in self.stack.iter().rev() {
            for (p, uri) in frame.iter().rev() {
                if p == prefix {
                    if uri.is_empty() {
                        return None;
                    }
                    return Some(uri.as_str());
                }
            }
        }
        None
    }

    /// Finds the innermost prefix bound to `uri` that is not shadowed by a
    /// nearer binding of the same prefix.
    #[must_use]
    pub fn prefix_for(&self, uri: &str) -> Option<&str> {
        for frame in self.stack.iter().rev() {
            for (p, bound) in frame.iter().rev() {
                if bound == uri && self.resolve(p) == Some(uri) {
                    return Some(p.as_str());
                }
            }
        }
        None
    }
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

impl NamespaceContext for ScopeStack {
    fn namespace_uri(&self, prefix: &str) -> Option<String> {
        self.resolve(prefix).map(String::from)
    }

    fn prefix(&self, namespace_uri: &str) -> Option<String> {
        self.prefix_for(namespace_uri).map(String::from)
    }
}
