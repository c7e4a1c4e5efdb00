//! Small helpers shared by the reader, the writers and the tree.

pub mod qname;
