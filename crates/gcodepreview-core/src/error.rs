//! Error handling for GCodePreview
//!
//! Provides error types for every layer of the preview engine:
//! - Parse errors (dialect detection, malformed G-code)
//! - Cache errors (missing or corrupt entries, storage failures)
//! - Transport errors (downloads from the file-serving collaborator)
//! - Render errors (cursor outside the loaded document)
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// G-code parse error type
///
/// Raised by the parser when content cannot be turned into a layer model.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// No registered dialect recognizes the content
    #[error("Unsupported G-code dialect: no registered recognizer accepted the file")]
    UnsupportedDialect,

    /// Content was recognized but is structurally invalid
    #[error("Malformed G-code at line {line_number}: {reason}")]
    MalformedInput {
        /// The 1-based line number where the problem was detected.
        line_number: u32,
        /// The reason the input is invalid.
        reason: String,
    },
}

impl ParseError {
    /// Create a malformed input error for the given line
    pub fn malformed(line_number: u32, reason: impl Into<String>) -> Self {
        ParseError::MalformedInput {
            line_number,
            reason: reason.into(),
        }
    }
}

/// Cache error type
///
/// Represents failures of the document cache. `Miss` and `Corrupt` are
/// recoverable by falling back to a remote download.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CacheError {
    /// No entry exists for the key
    #[error("Cache miss for {key}")]
    Miss {
        /// The cache key that was looked up.
        key: String,
    },

    /// The entry exists but its blob is missing or unreadable
    #[error("Cache entry {key} is corrupt: {reason}")]
    Corrupt {
        /// The cache key of the corrupt entry.
        key: String,
        /// Why the entry was considered corrupt.
        reason: String,
    },

    /// A single document is larger than the whole cache budget
    #[error("Entry of {size} bytes exceeds the cache budget of {max_size} bytes")]
    EntryTooLarge {
        /// Serialized size of the rejected document.
        size: u64,
        /// The configured cache budget.
        max_size: u64,
    },

    /// Underlying index or blob storage failed
    #[error("Cache storage error: {reason}")]
    Storage {
        /// The reason for the storage failure.
        reason: String,
    },
}

impl CacheError {
    /// Whether the orchestrator may recover by loading from the remote source
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CacheError::Miss { .. } | CacheError::Corrupt { .. })
    }
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Storage {
            reason: err.to_string(),
        }
    }
}

/// Transport error type
///
/// Represents failures reported by the file-serving collaborator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    /// Download of the file failed
    #[error("Download of {path} failed: {reason}")]
    DownloadFailed {
        /// Server-relative path of the file.
        path: String,
        /// The reason reported by the transport.
        reason: String,
    },

    /// File metadata could not be retrieved
    #[error("Metadata for {path} unavailable: {reason}")]
    MetadataUnavailable {
        /// Server-relative path of the file.
        path: String,
        /// The reason reported by the transport.
        reason: String,
    },

    /// The load was cancelled by the caller
    #[error("Load of {path} was cancelled")]
    Cancelled {
        /// Server-relative path of the file.
        path: String,
    },
}

/// Render error type
///
/// Contract errors raised by the render context factory.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    /// Requested layer does not exist
    #[error("Layer {layer} out of range (document has {layer_count} layers)")]
    LayerOutOfRange {
        /// The requested layer index.
        layer: usize,
        /// Number of layers in the document.
        layer_count: usize,
    },

    /// Document has no layers to render
    #[error("Document contains no layers")]
    EmptyDocument,

    /// No document has been loaded yet
    #[error("No document loaded")]
    NoDocument,
}

/// Main error type for GCodePreview
///
/// A unified error type that can represent any error from all layers.
/// This is the primary error type used in public APIs and carried by
/// failed load states.
#[derive(Error, Debug)]
pub enum Error {
    /// Parse error
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Cache error
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Transport error
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Render error
    #[error(transparent)]
    Render(#[from] RenderError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a parse error
    pub fn is_parse_error(&self) -> bool {
        matches!(self, Error::Parse(_))
    }

    /// Check if this is a cache error
    pub fn is_cache_error(&self) -> bool {
        matches!(self, Error::Cache(_))
    }

    /// Check if this is a transport error
    pub fn is_transport_error(&self) -> bool {
        matches!(self, Error::Transport(_))
    }

    /// Check if this is a render error
    pub fn is_render_error(&self) -> bool {
        matches!(self, Error::Render(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::malformed(12, "arc without I/J/R");
        assert_eq!(
            err.to_string(),
            "Malformed G-code at line 12: arc without I/J/R"
        );
    }

    #[test]
    fn test_cache_error_recoverable() {
        let miss = CacheError::Miss {
            key: "a.gcode".to_string(),
        };
        let corrupt = CacheError::Corrupt {
            key: "a.gcode".to_string(),
            reason: "blob missing".to_string(),
        };
        let storage = CacheError::Storage {
            reason: "disk full".to_string(),
        };
        assert!(miss.is_recoverable());
        assert!(corrupt.is_recoverable());
        assert!(!storage.is_recoverable());
    }

    #[test]
    fn test_error_conversion() {
        let err: Error = RenderError::LayerOutOfRange {
            layer: 7,
            layer_count: 3,
        }
        .into();
        assert!(err.is_render_error());
        assert_eq!(
            err.to_string(),
            "Layer 7 out of range (document has 3 layers)"
        );

        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let cache_err: CacheError = io_err.into();
        assert!(matches!(cache_err, CacheError::Storage { .. }));
    }
}
