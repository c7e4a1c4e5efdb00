//! The kinds of input and output the engine accepts.
//!
//! [`Source`] and [`Destination`] are closed sums over the supported
//! varieties; [`crate::engine::Engine`] picks the code path from the
//! variant.

use std::io::{Read, Write};

use crate::reader::EventSource;
use crate::sax::PushSource;
use crate::tree::{Document, NodeId};

/// Where XML comes from.
pub enum Source<'a> {
    /// An existing pull reader.
    Reader(Box<dyn EventSource + 'a>),
    /// A push producer, consumed through a [`crate::sax::PushShim`].
    Push(Box<dyn PushSource + 'a>),
    /// A node of an existing tree: a document, element or fragment.
    Tree {
        /// The tree.
        doc: &'a Document,
        /// The node to start at.
        node: NodeId,
    },
    /// A byte stream. With no stream, `system_id` names a file to open;
    /// with neither, the source is empty.
    Bytes {
        /// The stream, if any.
        input: Option<Box<dyn Read + 'a>>,
        /// An explicit encoding label; otherwise the BOM and XML
        /// declaration decide.
        encoding: Option<String>,
        /// The identifier reported in locations, or the file to open.
        system_id: Option<String>,
    },
    /// Decoded text. With no text, `system_id` names a file to open; with
    /// neither, the source is empty.
    Chars {
        /// The text, if any.
        input: Option<String>,
        /// The identifier reported in locations, or the file to open.
        system_id: Option<String>,
    },
    /// Nothing. Copying it writes nothing and succeeds.
    Empty,
}

impl<'a> Source<'a> {
    /// A source over XML text.
    pub fn text(input: impl Into<String>) -> Self {
        Self::Chars {
            input: Some(input.into()),
            system_id: None,
        }
    }

    /// A source over a byte slice.
    #[must_use]
    pub fn bytes(input: &'a [u8]) -> Self {
        Self::Bytes {
            input: Some(Box::new(input)),
            encoding: None,
            system_id: None,
        }
    }

    /// A source over any `io::Read`.
    pub fn stream(input: impl Read + 'a, encoding: Option<&str>) -> Self {
        Self::Bytes {
            input: Some(Box::new(input)),
            encoding: encoding.map(String::from),
            system_id: None,
        }
    }

    /// A source reading the file a system identifier names.
    pub fn file(system_id: impl Into<String>) -> Self {
        Self::Bytes {
            input: None,
            encoding: None,
            system_id: Some(system_id.into()),
        }
    }

    /// A source over a whole document.
    #[must_use]
    pub fn document(doc: &'a Document) -> Self {
        Self::Tree {
            doc,
            node: doc.root(),
        }
    }

    /// A source over one node of a tree.
    #[must_use]
    pub fn node(doc: &'a Document, node: NodeId) -> Self {
        Self::Tree { doc, node }
    }

    /// A source wrapping an existing reader.
    pub fn reader(reader: impl EventSource + 'a) -> Self {
        Self::Reader(Box::new(reader))
    }

    /// A source wrapping a push producer.
    pub fn push(producer: impl PushSource + 'a) -> Self {
        Self::Push(Box::new(producer))
    }

    /// Returns `true` if the source can produce nothing: `Empty`, or a
    /// byte/char source with neither input nor system identifier.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Bytes {
                input: None,
                system_id: None,
                ..
            }
            | Self::Chars {
                input: None,
                system_id: None,
            } => true,
            _ => false,
        }
    }
}

/// Where XML goes.
pub enum Destination<'a> {
    /// Serialized text appended to a string.
    Chars(&'a mut String),
    /// Serialized bytes in the given encoding (UTF-8 when `None`).
    Bytes {
        /// The sink.
        output: Box<dyn Write + 'a>,
        /// An `encoding_rs` label.
        encoding: Option<String>,
    },
    /// Nodes appended below a node of an existing tree.
    Tree(&'a mut Document, NodeId),
}

impl<'a> Destination<'a> {
    /// A UTF-8 byte destination.
    pub fn bytes(output: impl Write + 'a) -> Self {
        Self::Bytes {
            output: Box::new(output),
            encoding: None,
        }
    }

    /// A byte destination in the given encoding.
    pub fn bytes_with_encoding(output: impl Write + 'a, encoding: &str) -> Self {
        Self::Bytes {
            output: Box::new(output),
            encoding: Some(encoding.to_string()),
        }
    }

    /// Appends to the document node of `doc`.
    pub fn document(doc: &'a mut Document) -> Self {
        let root = doc.root();
        Self::Tree(doc, root)
    }
}
