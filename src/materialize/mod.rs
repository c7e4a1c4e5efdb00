//! Building document trees from event sources.
//!
//! A [`Materializer`] consumes an [`EventSource`] and appends the nodes it
//! describes to a [`Document`]. Three independent policies apply:
//!
//! - **namespace repair** synthesizes a declaration for an element or
//!   attribute whose prefix is not declared on the element or an ancestor;
//! - **location recording** attaches the source position to each node;
//! - **threshold guarding** aborts with [`XmlError::LimitExceeded`] once the
//!   nesting depth or the cumulative element count passes its limit.
//!
//! # Examples
//!
//! ```
//! use xmlbridge::materialize::{Materializer, MaterializeOptions, ThresholdLimits};
//! use xmlbridge::reader::XmlStreamReader;
//!
//! let limits = ThresholdLimits::default().with_max_depth(2);
//! let materializer = Materializer::new(MaterializeOptions::default(), limits);
//!
//! let ok = materializer.read_document(&mut XmlStreamReader::new("<a><b/></a>"));
//! assert!(ok.is_ok());
//!
//! let deep = materializer.read_document(&mut XmlStreamReader::new("<a><b><c/></b></a>"));
//! assert!(deep.unwrap_err().is_limit_exceeded());
//! ```

use crate::error::{LimitKind, Result, XmlError};
use crate::event::{EventAttribute, Location, StartElement, XmlEvent};
use crate::reader::EventSource;
use crate::tree::{Attribute, Document, NodeId, NodeKind};

/// Policies applied while building a tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaterializeOptions {
    /// Synthesize missing namespace declarations. Defaults to `false`.
    pub repair_namespaces: bool,
    /// Attach source locations to created nodes. Defaults to `false`.
    pub record_locations: bool,
}

impl MaterializeOptions {
    /// Enables or disables namespace repair.
    #[must_use]
    pub fn repair_namespaces(mut self, enable: bool) -> Self {
        self.repair_namespaces = enable;
        self
    }

    /// Enables or disables location recording.
    #[must_use]
    pub fn record_locations(mut self, enable: bool) -> Self {
        self.record_locations = enable;
        self
    }
}

/// Depth and element-count limits. A value of zero or less disables the
/// corresponding guard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThresholdLimits {
    /// Maximum element nesting depth.
    pub max_depth: i64,
    /// Maximum number of elements per materialization.
    pub max_element_count: i64,
}

impl ThresholdLimits {
    /// No limits.
    #[must_use]
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Sets the maximum nesting depth.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: i64) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Sets the maximum element count.
    #[must_use]
    pub fn with_max_element_count(mut self, max_element_count: i64) -> Self {
        self.max_element_count = max_element_count;
        self
    }

    /// Returns `true` if either guard is active.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.max_depth > 0 || self.max_element_count > 0
    }

    fn check(kind: LimitKind, limit: i64, actual: u64) -> Result<()> {
        match u64::try_from(limit) {
            Ok(limit) if limit > 0 && actual > limit => Err(XmlError::LimitExceeded {
                kind,
                limit,
                actual,
            }),
            _ => Ok(()),
        }
    }
}

/// Per-call location attachment state.
///
/// Once a source fails to report a location, the recorder stops asking for
/// the rest of that call; the next call starts fresh.
#[derive(Debug, Clone, Copy)]
pub struct LocationRecorder {
    active: bool,
}

impl LocationRecorder {
    /// Creates a recorder; an inactive one never records.
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self { active: enabled }
    }

    /// Returns `true` while locations are still being recorded.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Attaches `location` to `node`. A missing location disables the
    /// recorder.
    pub fn record(&mut self, doc: &mut Document, node: NodeId, location: Option<Location>) {
        if !self.active {
            return;
        }
        match location {
            Some(location) => doc.set_location(node, location),
            None => {
                log::debug!("source reports no location; location recording stopped for this call");
                self.active = false;
            }
        }
    }
}

/// Builds trees from event sources.
#[derive(Debug, Clone, Copy, Default)]
pub struct Materializer {
    options: MaterializeOptions,
    limits: ThresholdLimits,
}

impl Materializer {
    /// Creates a materializer.
    #[must_use]
    pub fn new(options: MaterializeOptions, limits: ThresholdLimits) -> Self {
        Self { options, limits }
    }

    /// The build policies.
    #[must_use]
    pub fn options(&self) -> MaterializeOptions {
        self.options
    }

    /// The threshold limits.
    #[must_use]
    pub fn limits(&self) -> ThresholdLimits {
        self.limits
    }

    /// Reads a document. Consumption stops once the document element
    /// closes.
    ///
    /// # Errors
    ///
    /// Propagates source failures and returns
    /// [`XmlError::LimitExceeded`] when a guard trips.
    pub fn read_document<S: EventSource + ?Sized>(&self, source: &mut S) -> Result<Document> {
        let mut doc = Document::new();
        let root = doc.root();
        self.read_into(&mut doc, root, source)?;
        Ok(doc)
    }

    /// Reads any number of sibling nodes into a new document fragment.
    ///
    /// # Errors
    ///
    /// As for [`read_document`](Self::read_document).
    pub fn read_fragment<S: EventSource + ?Sized>(
        &self,
        source: &mut S,
    ) -> Result<(Document, NodeId)> {
        let mut doc = Document::new();
        let fragment = doc.create_fragment();
        self.read_into(&mut doc, fragment, source)?;
        Ok((doc, fragment))
    }

    /// Appends the nodes `source` describes below `parent`.
    ///
    /// # Errors
    ///
    /// As for [`read_document`](Self::read_document).
    pub fn read_into<S: EventSource + ?Sized>(
        &self,
        doc: &mut Document,
        parent: NodeId,
        source: &mut S,
    ) -> Result<()> {
        let mut build = Build {
            doc,
            base: parent,
            parent,
            markers: Vec::new(),
            elements: 0,
            recorder: LocationRecorder::new(self.options.record_locations),
        };

        while let Some(event) = source.next_event()? {
            match event {
                XmlEvent::StartDocument {
                    version,
                    encoding,
                    standalone,
                } => {
                    if build.parent == build.doc.root() {
                        build.doc.version = version;
                        build.doc.encoding = encoding;
                        build.doc.standalone = standalone;
                    }
                }
                XmlEvent::EndDocument => break,
                XmlEvent::StartElement(start) => {
                    build.elements += 1;
                    ThresholdLimits::check(
                        LimitKind::ElementCount,
                        self.limits.max_element_count,
                        build.elements,
                    )?;
                    let element = self.create_element(build.doc, &start);
                    build.append(element, source.location());
                    if self.options.repair_namespaces {
                        repair_namespaces(build.doc, element);
                    }
                    build.markers.push(element);
                    build.parent = element;
                    ThresholdLimits::check(
                        LimitKind::Depth,
                        self.limits.max_depth,
                        build.markers.len() as u64,
                    )?;
                }
                XmlEvent::EndElement { .. } => {
                    if build.markers.pop().is_none() {
                        break;
                    }
                    build.parent = build.markers.last().copied().unwrap_or(build.base);
                    if build.parent == build.doc.root() {
                        break;
                    }
                }
                XmlEvent::Characters(content) => {
                    // The document node holds no character data.
                    if build.parent == build.doc.root() {
                        continue;
                    }
                    build.append_kind(NodeKind::Text { content }, source.location());
                }
                XmlEvent::CData(content) => {
                    build.append_kind(NodeKind::CData { content }, source.location());
                }
                XmlEvent::Comment(content) => {
                    build.append_kind(NodeKind::Comment { content }, source.location());
                }
                XmlEvent::ProcessingInstruction { target, data } => {
                    build.append_kind(
                        NodeKind::ProcessingInstruction { target, data },
                        source.location(),
                    );
                }
                XmlEvent::EntityReference { name, replacement } => {
                    build.append_kind(
                        NodeKind::EntityRef {
                            name,
                            value: replacement,
                        },
                        source.location(),
                    );
                }
                XmlEvent::Dtd(decl) => {
                    build.append_kind(
                        NodeKind::DocumentType {
                            name: decl.name,
                            system_id: decl.system_id,
                            public_id: decl.public_id,
                            internal_subset: decl.internal_subset,
                        },
                        source.location(),
                    );
                }
                XmlEvent::Attribute(attr) => {
                    let element = build.open_element("attribute")?;
                    build.doc.set_attribute(element, ordinary_attribute(&attr));
                }
                XmlEvent::Namespace(decl) => {
                    let element = build.open_element("namespace declaration")?;
                    build
                        .doc
                        .set_attribute(element, Attribute::namespace_decl(&decl.prefix, decl.uri));
                }
            }
        }
        Ok(())
    }

    fn create_element(&self, doc: &mut Document, start: &StartElement) -> NodeId {
        let name = &start.name;
        let element = doc.create_element(
            Some(name.prefix.as_str()),
            &name.local_name,
            Some(name.namespace.as_str()),
        );
        for decl in &start.namespaces {
            doc.set_attribute(element, Attribute::namespace_decl(&decl.prefix, decl.uri.as_str()));
        }
        for attr in &start.attributes {
            doc.set_attribute(element, ordinary_attribute(attr));
        }
        element
    }
}

fn ordinary_attribute(attr: &EventAttribute) -> Attribute {
    Attribute::with_namespace(
        Some(attr.name.prefix.as_str()),
        attr.name.local_name.as_str(),
        Some(attr.name.namespace.as_str()),
        attr.value.as_str(),
    )
}

/// The URI `prefix` is bound to at `node` by `xmlns` attributes on the node
/// or its ancestors.
fn declared_in_tree<'d>(doc: &'d Document, node: NodeId, prefix: &str) -> Option<&'d str> {
    doc.ancestors(node).find_map(|ancestor| {
        doc.attributes(ancestor)
            .iter()
            .find(|attr| attr.declared_prefix() == Some(prefix))
            .map(|attr| attr.value.as_str())
    })
}

/// Adds the declarations an element needs but neither it nor an ancestor
/// makes.
fn repair_namespaces(doc: &mut Document, element: NodeId) {
    let mut needed: Vec<(String, String)> = Vec::new();
    if let Some(ns) = doc.node_namespace(element) {
        needed.push((doc.node_prefix(element).unwrap_or("").to_string(), ns.to_string()));
    } else if doc.node_prefix(element).is_none() {
        needed.push((String::new(), String::new()));
    }
    for attr in doc.attributes(element) {
        if let (Some(p), Some(ns)) = (attr.prefix.as_deref(), attr.namespace.as_deref()) {
            if !attr.is_namespace_decl() && p != "xml" {
                needed.push((p.to_string(), ns.to_string()));
            }
        }
    }

    for (prefix, uri) in needed {
        let declared = declared_in_tree(doc, element, &prefix).unwrap_or("");
        if declared == uri {
            continue;
        }
        log::trace!("repairing missing declaration of prefix '{prefix}'");
        doc.set_attribute(element, Attribute::namespace_decl(&prefix, uri));
    }
}

struct Build<'a> {
    doc: &'a mut Document,
    base: NodeId,
    parent: NodeId,
    markers: Vec<NodeId>,
    elements: u64,
    recorder: LocationRecorder,
}

impl Build<'_> {
    fn append(&mut self, node: NodeId, location: Option<Location>) {
        self.doc.append_child(self.parent, node);
        self.recorder.record(self.doc, node, location);
    }

    fn append_kind(&mut self, kind: NodeKind, location: Option<Location>) {
        let node = self.doc.create_node(kind);
        self.append(node, location);
    }

    fn open_element(&self, what: &str) -> Result<NodeId> {
        if self.doc.node(self.parent).kind.is_element() {
            Ok(self.parent)
        } else {
            Err(XmlError::Unsupported(format!("{what} event outside an element")))
        }
    }
}
