//! Error types for the cache crate.
//!
//! The error enum itself lives in `gcodepreview-core` so load states can
//! carry it; this module adds the result alias and constructors used by
//! the stores.

use std::fmt::Display;

pub use gcodepreview_core::CacheError;

/// Result type for cache operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;

pub(crate) fn storage(context: &str, err: impl Display) -> CacheError {
    CacheError::Storage {
        reason: format!("{context}: {err}"),
    }
}

pub(crate) fn corrupt(key: &str, reason: impl Display) -> CacheError {
    CacheError::Corrupt {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
