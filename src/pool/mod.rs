//! Reusable reader and writer factories.
//!
//! Factories are cheap to build but are still pooled: an [`EventSourcePool`]
//! hands them out from bounded queues and takes them back afterwards.
//! Acquiring never blocks. An empty (or momentarily contended) queue makes
//! the pool construct a fresh factory; a full one makes release drop the
//! returned factory.
//!
//! When the installation declares its reader factory safe to share
//! ([`EventSourcePool::new`] with `shared_reader_factory`), every acquire
//! returns the same singleton and the reader queue is bypassed.
//!
//! Every reader factory carries the same fixed [`ReaderSettings`]: namespace
//! aware, DTDs reported but never applied, no entity expansion, no external
//! entity resolution. No API exists to change them.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::Result;
use crate::reader::XmlStreamReader;
use crate::tree::{Document, NodeId};
use crate::writer::{TreeWriter, XmlStreamWriter};

/// Default number of idle factories kept per queue.
pub const DEFAULT_POOL_CAPACITY: usize = 20;

static NEXT_FACTORY_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_FACTORY_ID.fetch_add(1, Ordering::Relaxed)
}

// -------------------------------------------------------------------------
// Factories
// -------------------------------------------------------------------------

/// Describes the posture of every [`XmlStreamReader`].
///
/// The reader has this posture built in; the settings report it and cannot
/// configure it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderSettings {
    namespace_aware: bool,
    dtd_processing: bool,
    expand_entity_references: bool,
    resolve_external_entities: bool,
}

impl ReaderSettings {
    const SAFE: Self = Self {
        namespace_aware: true,
        dtd_processing: false,
        expand_entity_references: false,
        resolve_external_entities: false,
    };

    /// Prefixes are resolved to namespace URIs.
    #[must_use]
    pub fn namespace_aware(&self) -> bool {
        self.namespace_aware
    }

    /// The DTD is applied (defaults, validation). Always `false`.
    #[must_use]
    pub fn dtd_processing(&self) -> bool {
        self.dtd_processing
    }

    /// Entity references are replaced by their text. Always `false`.
    #[must_use]
    pub fn expand_entity_references(&self) -> bool {
        self.expand_entity_references
    }

    /// External entities are fetched. Always `false`; a reference to one is
    /// a security failure.
    #[must_use]
    pub fn resolve_external_entities(&self) -> bool {
        self.resolve_external_entities
    }
}

/// Creates [`XmlStreamReader`]s.
#[derive(Debug)]
pub struct ReaderFactory {
    id: u64,
    settings: ReaderSettings,
}

impl ReaderFactory {
    /// Constructs a factory with the fixed safe posture.
    #[must_use]
    pub fn new() -> Self {
        let id = next_id();
        log::debug!("constructed reader factory #{id}");
        Self {
            id,
            settings: ReaderSettings::SAFE,
        }
    }

    /// A process-unique identity, for diagnostics and tests.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The posture readers from this factory use.
    #[must_use]
    pub fn settings(&self) -> ReaderSettings {
        self.settings
    }

    /// A reader over decoded text.
    #[must_use]
    pub fn create_reader(&self, text: impl Into<String>) -> XmlStreamReader {
        XmlStreamReader::new(text)
    }

    /// A reader over an `io::Read`.
    ///
    /// # Errors
    ///
    /// Returns a parse error on transport or decoding failure.
    pub fn create_reader_from_io(
        &self,
        input: impl Read,
        encoding: Option<&str>,
    ) -> Result<XmlStreamReader> {
        XmlStreamReader::from_reader(input, encoding)
    }

    /// A reader over the file a system identifier names.
    ///
    /// # Errors
    ///
    /// Returns a parse error if the file cannot be read or decoded.
    pub fn open(&self, system_id: &str, encoding: Option<&str>) -> Result<XmlStreamReader> {
        XmlStreamReader::open(system_id, encoding)
    }
}

impl Default for ReaderFactory {
    fn default() -> Self {
        Self::new()
    }
}

/// Creates writers.
#[derive(Debug)]
pub struct WriterFactory {
    id: u64,
}

impl WriterFactory {
    /// Constructs a factory.
    #[must_use]
    pub fn new() -> Self {
        let id = next_id();
        log::debug!("constructed writer factory #{id}");
        Self { id }
    }

    /// A process-unique identity, for diagnostics and tests.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// A UTF-8 serializing writer.
    pub fn create_writer<W: Write>(&self, sink: W) -> XmlStreamWriter<W> {
        XmlStreamWriter::new(sink)
    }

    /// A serializing writer in the given encoding (UTF-8 when `None`).
    ///
    /// # Errors
    ///
    /// Returns a write error for an unknown encoding label.
    pub fn create_writer_with_encoding<W: Write>(
        &self,
        sink: W,
        encoding: Option<&str>,
    ) -> Result<XmlStreamWriter<W>> {
        match encoding {
            Some(label) => XmlStreamWriter::with_encoding(sink, label),
            None => Ok(XmlStreamWriter::new(sink)),
        }
    }

    /// A writer that appends nodes below `parent`.
    pub fn create_tree_writer<'d>(&self, doc: &'d mut Document, parent: NodeId) -> TreeWriter<'d> {
        TreeWriter::new(doc, parent)
    }
}

impl Default for WriterFactory {
    fn default() -> Self {
        Self::new()
    }
}

// -------------------------------------------------------------------------
// Pools
// -------------------------------------------------------------------------

/// A bounded queue of idle instances.
///
/// Uses `try_lock` on both paths so that neither acquire nor release ever
/// waits for another thread.
pub struct FactoryPool<T> {
    idle: Mutex<Vec<T>>,
    capacity: usize,
    make: fn() -> T,
}

impl<T> FactoryPool<T> {
    /// Creates an empty pool that constructs with `make`.
    #[must_use]
    pub fn new(capacity: usize, make: fn() -> T) -> Self {
        Self {
            idle: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
            make,
        }
    }

    /// Takes an idle instance, or constructs one.
    pub fn acquire(&self) -> T {
        if let Ok(mut idle) = self.idle.try_lock() {
            if let Some(item) = idle.pop() {
                return item;
            }
        }
        (self.make)()
    }

    /// Returns an instance; dropped when the pool is full or busy.
    pub fn release(&self, item: T) {
        if let Ok(mut idle) = self.idle.try_lock() {
            if idle.len() < self.capacity {
                idle.push(item);
                return;
            }
        }
        log::trace!("factory pool full; dropping released instance");
    }

    /// Number of idle instances.
    #[must_use]
    pub fn idle(&self) -> usize {
        self.idle.lock().map_or(0, |idle| idle.len())
    }

    /// Maximum number of idle instances kept.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

fn new_reader_factory() -> Arc<ReaderFactory> {
    Arc::new(ReaderFactory::new())
}

fn new_writer_factory() -> Arc<WriterFactory> {
    Arc::new(WriterFactory::new())
}

/// Reader and writer factory pools.
pub struct EventSourcePool {
    readers: FactoryPool<Arc<ReaderFactory>>,
    writers: FactoryPool<Arc<WriterFactory>>,
    shared_reader: Option<Arc<ReaderFactory>>,
}

impl EventSourcePool {
    /// Creates pools keeping up to `capacity` idle factories each. With
    /// `shared_reader_factory`, one reader factory is built now and handed
    /// to every caller.
    #[must_use]
    pub fn new(capacity: usize, shared_reader_factory: bool) -> Self {
        Self {
            readers: FactoryPool::new(capacity, new_reader_factory),
            writers: FactoryPool::new(capacity, new_writer_factory),
            shared_reader: shared_reader_factory.then(new_reader_factory),
        }
    }

    /// Gets a reader factory.
    #[must_use]
    pub fn acquire_reader_factory(&self) -> Arc<ReaderFactory> {
        match &self.shared_reader {
            Some(shared) => Arc::clone(shared),
            None => self.readers.acquire(),
        }
    }

    /// Returns a reader factory. The shared singleton is never queued.
    pub fn release_reader_factory(&self, factory: Arc<ReaderFactory>) {
        if self
            .shared_reader
            .as_ref()
            .is_some_and(|shared| Arc::ptr_eq(shared, &factory))
        {
            return;
        }
        self.readers.release(factory);
    }

    /// Gets a writer factory.
    #[must_use]
    pub fn acquire_writer_factory(&self) -> Arc<WriterFactory> {
        self.writers.acquire()
    }

    /// Returns a writer factory.
    pub fn release_writer_factory(&self, factory: Arc<WriterFactory>) {
        self.writers.release(factory);
    }

    /// Idle reader factories (excluding the shared singleton).
    #[must_use]
    pub fn idle_readers(&self) -> usize {
        self.readers.idle()
    }

    /// Idle writer factories.
    #[must_use]
    pub fn idle_writers(&self) -> usize {
        self.writers.idle()
    }
}

impl Default for EventSourcePool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_CAPACITY, false)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_acquire_on_empty_constructs() {
        let pool = EventSourcePool::new(1, false);
        let a = pool.acquire_reader_factory();
        let b = pool.acquire_reader_factory();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_release_reuses_and_drops_when_full() {
        let pool = EventSourcePool::new(1, false);
        let a = pool.acquire_writer_factory();
        let b = pool.acquire_writer_factory();
        let a_id = a.id();
        pool.release_writer_factory(a);
        pool.release_writer_factory(b);
        assert_eq!(pool.idle_writers(), 1);
        assert_eq!(pool.acquire_writer_factory().id(), a_id);
    }

    #[test]
    fn test_shared_singleton_bypasses_pool() {
        let pool = EventSourcePool::new(4, true);
        let a = pool.acquire_reader_factory();
        let b = pool.acquire_reader_factory();
        assert!(Arc::ptr_eq(&a, &b));
        pool.release_reader_factory(a);
        assert_eq!(pool.idle_readers(), 0);
    }

    #[test]
    fn test_settings_are_safe() {
        let settings = ReaderFactory::new().settings();
        assert!(settings.namespace_aware());
        assert!(!settings.dtd_processing());
        assert!(!settings.expand_entity_references());
        assert!(!settings.resolve_external_entities());
    }

    #[test]
    fn test_readers_behave_as_settings_describe() {
        use crate::event::XmlEvent;
        use crate::reader::EventSource;

        let factory = ReaderFactory::new();
        let mut reader = factory.create_reader(
            "<!DOCTYPE r [<!ENTITY i \"text\">]><r>&i;</r>",
        );
        let mut saw_reference = false;
        while let Some(event) = reader.next_event().unwrap() {
            if let XmlEvent::EntityReference { name, .. } = event {
                assert_eq!(name, "i");
                saw_reference = true;
            }
        }
        assert!(saw_reference);

        let mut reader = factory
            .create_reader_from_io(
                &b"<!DOCTYPE r [<!ENTITY x SYSTEM \"x.txt\">]><r>&x;</r>"[..],
                None,
            )
            .unwrap();
        let err = loop {
            match reader.next_event() {
                Ok(Some(_)) => {}
                Ok(None) => panic!("external entity was accepted"),
                Err(err) => break err,
            }
        };
        assert!(err.is_security());
    }

    #[test]
    fn test_concurrent_acquire_release() {
        let pool = EventSourcePool::new(2, false);
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..50 {
                        let f = pool.acquire_reader_factory();
                        pool.release_reader_factory(f);
                    }
                });
            }
        });
        assert!(pool.idle_readers() <= 2);
    }

    #[test]
    fn test_zero_capacity_never_keeps() {
        let pool: FactoryPool<u32> = FactoryPool::new(0, || 7);
        pool.release(1);
        assert_eq!(pool.idle(), 0);
        assert_eq!(pool.acquire(), 7);
    }
}
