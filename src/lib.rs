//! # xmlbridge
//!
//! Bridges the two ways of holding XML: as a stream of events and as an
//! in-memory tree. A tree can be read back as a pull stream, a stream can
//! be copied to a writer with namespace declarations kept faithful, and a
//! stream can be materialized into a tree under depth and element-count
//! guards.
//!
//! ## Quick Start
//!
//! ```
//! use xmlbridge::Document;
//!
//! let doc = Document::parse_str("<root><child>Hello</child></root>").unwrap();
//! let root = doc.root_element().unwrap();
//! assert_eq!(doc.node_name(root), Some("root"));
//! ```
//!
//! Copying between any source and destination goes through an
//! [`engine::Engine`]:
//!
//! ```
//! use xmlbridge::engine::Engine;
//! use xmlbridge::source::{Destination, Source};
//!
//! let engine = Engine::default();
//! let mut out = String::new();
//! engine
//!     .copy(
//!         Source::text(r#"<p:a xmlns:p="urn:p"><p:b/></p:a>"#),
//!         Destination::Chars(&mut out),
//!         false,
//!     )
//!     .unwrap();
//! assert_eq!(out, r#"<p:a xmlns:p="urn:p"><p:b/></p:a>"#);
//! ```

pub mod copy;
pub mod encoding;
pub mod engine;
pub mod error;
pub mod event;
pub mod materialize;
pub mod namespace;
pub(crate) mod parser;
pub mod pool;
pub mod reader;
pub mod sax;
pub mod source;
pub mod traverse;
pub mod tree;
pub mod util;
pub mod writer;

// Re-export primary types at the crate root for convenience.
pub use error::{Result, XmlError};
pub use event::XmlEvent;
pub use reader::{EventSource, XmlStreamReader};
pub use tree::{Attribute, Document, NodeId};
pub use writer::{EventWriter, XmlStreamWriter};
