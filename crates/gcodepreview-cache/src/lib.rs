//! # GCodePreview Cache
//!
//! Persistent, size-bounded cache of parsed G-code documents.

pub mod cache;
pub mod error;
pub mod model;
pub mod store;

pub use cache::{GcodeCache, BLOB_DIR_NAME, INDEX_FILE_NAME};
pub use error::{CacheError, CacheResult};
pub use model::{CacheEntry, CacheIndex, BLOB_FORMAT_VERSION, INDEX_FORMAT_VERSION};
pub use store::{BlobStore, FsBlobStore, IndexStore, JsonIndexStore, MemoryBlobStore, MemoryIndexStore};
