//! The facade tying sources, writers, the pool and the materializer
//! together.
//!
//! # Examples
//!
//! ```
//! use xmlbridge::engine::{Engine, EngineConfig};
//! use xmlbridge::source::{Destination, Source};
//!
//! let engine = Engine::new(EngineConfig::default());
//! let mut out = String::new();
//! engine
//!     .copy(Source::text("<a><b/></a>"), Destination::Chars(&mut out), false)
//!     .unwrap();
//! assert_eq!(out, "<a><b/></a>");
//! ```

mod config;

pub use config::{EngineConfig, ENV_MAX_ELEMENT_COUNT, ENV_MAX_ELEMENT_DEPTH, ENV_POOL_CAPACITY};

use crate::copy::{copy_events, copy_tree};
use crate::error::{Result, XmlError};
use crate::materialize::Materializer;
use crate::pool::{EventSourcePool, ReaderFactory, WriterFactory};
use crate::reader::EventSource;
use crate::sax::PushShim;
use crate::source::{Destination, Source};
use crate::traverse::TreeReader;
use crate::tree::{Document, NodeId};
use crate::writer::EventWriter;

/// Copies and materializes XML according to one [`EngineConfig`].
pub struct Engine {
    config: EngineConfig,
    pool: EventSourcePool,
}

impl Engine {
    /// Creates an engine and its factory pools.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        let pool = EventSourcePool::new(config.pool_capacity, config.shared_reader_factory);
        Self { config, pool }
    }

    /// Creates an engine configured from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(EngineConfig::from_env())
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The factory pools.
    #[must_use]
    pub fn pool(&self) -> &EventSourcePool {
        &self.pool
    }

    /// A materializer with this engine's options and limits.
    #[must_use]
    pub fn materializer(&self) -> Materializer {
        Materializer::new(self.config.materialize_options(), self.config.limits())
    }

    /// Turns a source into a pull reader. Returns `None` for an empty
    /// source.
    ///
    /// # Errors
    ///
    /// Returns a parse error if a byte stream cannot be read or decoded or
    /// a named file cannot be opened.
    pub fn reader_for<'a>(&self, source: Source<'a>) -> Result<Option<Box<dyn EventSource + 'a>>> {
        let factory = self.pool.acquire_reader_factory();
        let result = open_source(&factory, source);
        self.pool.release_reader_factory(factory);
        result
    }

    /// Copies `source` to `destination`.
    ///
    /// Copying stops after the first top-level element unless `fragment`
    /// is set. A tree source copied with `fragment` is walked directly;
    /// otherwise it is read as events like any other source. An empty
    /// source writes nothing.
    ///
    /// # Errors
    ///
    /// Propagates source and writer failures. A failure to close a reader
    /// or writer after a primary failure is logged and dropped.
    pub fn copy(&self, source: Source<'_>, destination: Destination<'_>, fragment: bool) -> Result<()> {
        if let Source::Tree { doc, node } = source {
            if fragment {
                return self.with_writer(destination, |writer| copy_tree(doc, node, writer));
            }
        }
        let owned = !matches!(source, Source::Reader(_));
        let Some(mut reader) = self.reader_for(source)? else {
            log::debug!("source is empty; nothing copied");
            return Ok(());
        };
        let result = self.with_writer(destination, |writer| {
            copy_events(&mut *reader, writer, fragment)
        });
        if owned {
            close_quietly(&mut *reader);
        }
        result
    }

    /// Builds a document from `source`. An empty source yields an empty
    /// document.
    ///
    /// # Errors
    ///
    /// Propagates source failures and threshold-guard failures.
    pub fn materialize(&self, source: Source<'_>) -> Result<Document> {
        let materializer = self.materializer();
        self.with_reader(source, |reader| match reader {
            Some(reader) => materializer.read_document(reader),
            None => Ok(Document::new()),
        })
    }

    /// Builds a document fragment holding every top-level node `source`
    /// produces.
    ///
    /// # Errors
    ///
    /// As for [`materialize`](Self::materialize).
    pub fn materialize_fragment(&self, source: Source<'_>) -> Result<(Document, NodeId)> {
        let materializer = self.materializer();
        self.with_reader(source, |reader| match reader {
            Some(reader) => materializer.read_fragment(reader),
            None => {
                let mut doc = Document::new();
                let fragment = doc.create_fragment();
                Ok((doc, fragment))
            }
        })
    }

    fn with_reader<T>(
        &self,
        source: Source<'_>,
        f: impl FnOnce(Option<&mut dyn EventSource>) -> Result<T>,
    ) -> Result<T> {
        let owned = !matches!(source, Source::Reader(_));
        match self.reader_for(source)? {
            Some(mut reader) => {
                let result = f(Some(&mut *reader));
                if owned {
                    close_quietly(&mut *reader);
                }
                result
            }
            None => f(None),
        }
    }

    fn with_writer(
        &self,
        destination: Destination<'_>,
        f: impl FnOnce(&mut dyn EventWriter) -> Result<()>,
    ) -> Result<()> {
        let factory = self.pool.acquire_writer_factory();
        let result = write_to(&factory, destination, f);
        self.pool.release_writer_factory(factory);
        result
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

fn open_source<'a>(
    factory: &ReaderFactory,
    source: Source<'a>,
) -> Result<Option<Box<dyn EventSource + 'a>>> {
    let reader: Box<dyn EventSource + 'a> = match source {
        Source::Reader(reader) => reader,
        Source::Push(producer) => Box::new(PushShim::new(producer)),
        Source::Tree { doc, node } => Box::new(TreeReader::new(doc, node)),
        Source::Bytes {
            input: Some(input),
            encoding,
            system_id,
        } => {
            let reader = factory.create_reader_from_io(input, encoding.as_deref())?;
            Box::new(match system_id {
                Some(id) => reader.with_system_id(id),
                None => reader,
            })
        }
        Source::Chars {
            input: Some(text),
            system_id,
        } => {
            let reader = factory.create_reader(text);
            Box::new(match system_id {
                Some(id) => reader.with_system_id(id),
                None => reader,
            })
        }
        Source::Bytes {
            input: None,
            encoding,
            system_id: Some(id),
        } => Box::new(factory.open(&id, encoding.as_deref())?),
        Source::Chars {
            input: None,
            system_id: Some(id),
        } => Box::new(factory.open(&id, None)?),
        Source::Bytes { .. } | Source::Chars { .. } | Source::Empty => return Ok(None),
    };
    Ok(Some(reader))
}

fn write_to(
    factory: &WriterFactory,
    destination: Destination<'_>,
    f: impl FnOnce(&mut dyn EventWriter) -> Result<()>,
) -> Result<()> {
    match destination {
        Destination::Chars(out) => {
            let mut writer = factory.create_writer(Vec::new());
            f(&mut writer)?;
            let bytes = writer.into_inner()?;
            let text = String::from_utf8(bytes)
                .map_err(|e| XmlError::Write(format!("output is not UTF-8: {e}")))?;
            out.push_str(&text);
            Ok(())
        }
        Destination::Bytes { output, encoding } => {
            let mut writer = factory.create_writer_with_encoding(output, encoding.as_deref())?;
            let result = f(&mut writer);
            finish_writer(&mut writer, result)
        }
        Destination::Tree(doc, parent) => {
            let mut writer = factory.create_tree_writer(doc, parent);
            let result = f(&mut writer);
            finish_writer(&mut writer, result)
        }
    }
}

/// Closes `writer`. After a failure the close error is logged and the
/// original failure returned.
fn finish_writer(writer: &mut dyn EventWriter, result: Result<()>) -> Result<()> {
    match result {
        Ok(()) => writer.close(),
        Err(err) => {
            if let Err(close_err) = writer.close() {
                log::warn!("ignoring failure closing writer after error: {close_err}");
            }
            Err(err)
        }
    }
}

fn close_quietly(reader: &mut dyn EventSource) {
    if let Err(err) = reader.close() {
        log::debug!("ignoring failure closing reader: {err}");
    }
}
