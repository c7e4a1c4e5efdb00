//! Lexical layer of the streaming reader.
//!
//! A hand-rolled recursive descent scanner over decoded text. The pieces
//! here know XML 1.0 syntax but nothing about events or namespaces;
//! [`crate::reader::XmlStreamReader`] assembles them into a pull parser.

pub(crate) mod dtd;
pub(crate) mod input;
