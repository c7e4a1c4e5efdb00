//! Error types for parsing, copying and materializing XML.
//!
//! Every public entry point returns [`Result`], whose error side is one of
//! the [`XmlError`] kinds. Parse failures carry a [`SourceLocation`] with
//! line, column and byte offset so callers can point at the offending input.
//!
//! No operation in this crate retries. Failures surface to the direct caller
//! immediately; the only failures that are ever swallowed are close/cleanup
//! failures raised while another failure is already propagating.

use std::fmt;

/// Source location within an XML document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number (in characters, not bytes).
    pub column: u32,
    /// 0-based byte offset from the start of the input.
    pub byte_offset: usize,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// The error produced when a source cannot yield its next event.
///
/// Covers malformed markup, undecodable bytes and I/O failures of the
/// underlying transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// The primary error message.
    pub message: String,
    /// Where in the source the error occurred.
    pub location: SourceLocation,
}

impl ParseError {
    /// Creates a `ParseError` at the given location.
    pub fn new(message: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            message: message.into(),
            location,
        }
    }

    /// Creates a `ParseError` with no meaningful location (e.g. transport
    /// failures before the first byte was read).
    pub fn unlocated(message: impl Into<String>) -> Self {
        Self::new(message, SourceLocation::default())
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parse error at {}: {}", self.location, self.message)
    }
}

impl std::error::Error for ParseError {}

/// Which threshold guard tripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitKind {
    /// Element nesting depth.
    Depth,
    /// Cumulative number of elements.
    ElementCount,
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Depth => write!(f, "element depth"),
            Self::ElementCount => write!(f, "element count"),
        }
    }
}

/// The error type of every fallible operation in this crate.
#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    /// The source could not produce the next event.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// An external entity resolution was attempted. Always fatal.
    #[error("external entity '{entity}' rejected: {reason}")]
    Security {
        /// The entity name as referenced in the document.
        entity: String,
        /// Why the reference was refused.
        reason: String,
        /// Where the reference occurred.
        location: SourceLocation,
    },

    /// A threshold guard was exceeded while materializing.
    #[error("{kind} limit exceeded: {actual} > {limit}")]
    LimitExceeded {
        /// The guard that tripped.
        kind: LimitKind,
        /// The configured limit.
        limit: u64,
        /// The value that exceeded it.
        actual: u64,
    },

    /// The writer could not accept the next event.
    #[error("write error: {0}")]
    Write(String),

    /// A node or event kind that the operation does not handle.
    #[error("unsupported {0}")]
    Unsupported(String),
}

impl XmlError {
    /// Returns `true` if this is a threshold-guard failure.
    #[must_use]
    pub fn is_limit_exceeded(&self) -> bool {
        matches!(self, Self::LimitExceeded { .. })
    }

    /// Returns `true` if this is a rejected external entity.
    #[must_use]
    pub fn is_security(&self) -> bool {
        matches!(self, Self::Security { .. })
    }

    /// Returns `true` if this is a parse failure.
    #[must_use]
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse(_))
    }

    /// Returns `true` if this is a write failure.
    #[must_use]
    pub fn is_write(&self) -> bool {
        matches!(self, Self::Write(_))
    }
}

impl From<std::io::Error> for XmlError {
    fn from(err: std::io::Error) -> Self {
        Self::Write(err.to_string())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, XmlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_location_display() {
        let loc = SourceLocation {
            line: 10,
            column: 5,
            byte_offset: 42,
        };
        assert_eq!(loc.to_string(), "10:5");
    }

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::new(
            "unexpected end of input",
            SourceLocation {
                line: 1,
                column: 15,
                byte_offset: 14,
            },
        );
        assert_eq!(
            err.to_string(),
            "parse error at 1:15: unexpected end of input"
        );
    }

    #[test]
    fn test_parse_error_is_transparent() {
        let err: XmlError = ParseError::unlocated("bad").into();
        assert!(err.is_parse());
        assert_eq!(err.to_string(), "parse error at 0:0: bad");
    }

    #[test]
    fn test_limit_exceeded_display() {
        let err = XmlError::LimitExceeded {
            kind: LimitKind::Depth,
            limit: 3,
            actual: 4,
        };
        assert!(err.is_limit_exceeded());
        assert!(!err.is_parse());
        assert_eq!(err.to_string(), "element depth limit exceeded: 4 > 3");
    }

    #[test]
    fn test_io_error_is_write_failure() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed");
        let err = XmlError::from(io);
        assert!(err.is_write());
    }
}
