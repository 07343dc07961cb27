//! Storage collaborators of the cache
//!
//! The cache talks to its persistence through two traits: an
//! [`IndexStore`] holding the whole index and a [`BlobStore`] holding one
//! serialized document per entry. Filesystem and in-memory
//! implementations are provided.

use crate::error::{storage, CacheResult};
use crate::model::CacheIndex;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Persistence of the cache index
pub trait IndexStore: Send + Sync {
    /// Load the whole index; an absent index is empty
    fn load(&self) -> CacheResult<CacheIndex>;

    /// Replace the stored index
    fn save(&self, index: &CacheIndex) -> CacheResult<()>;
}

/// Persistence of document blobs
pub trait BlobStore: Send + Sync {
    /// Store bytes under a fresh handle and return it
    fn write(&self, bytes: &[u8]) -> CacheResult<String>;

    /// Read a blob, `None` when it does not exist
    fn read(&self, blob_ref: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Delete a blob; deleting a missing blob succeeds
    fn delete(&self, blob_ref: &str) -> CacheResult<()>;

    /// Size of a blob in bytes, `None` when it does not exist
    fn size(&self, blob_ref: &str) -> CacheResult<Option<u64>>;

    /// Handles of all stored blobs
    fn list(&self) -> CacheResult<Vec<String>>;

    /// Whether a blob exists
    fn exists(&self, blob_ref: &str) -> bool {
        matches!(self.size(blob_ref), Ok(Some(_)))
    }
}

/// Index stored as a single JSON file
///
/// Saves write a sibling temp file and rename it over the index so a crash
/// never leaves a partially written index behind.
#[derive(Debug, Clone)]
pub struct JsonIndexStore {
    path: PathBuf,
}

impl JsonIndexStore {
    /// Create a store for the index file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the index file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl IndexStore for JsonIndexStore {
    fn load(&self) -> CacheResult<CacheIndex> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(CacheIndex::default()),
            Err(e) => return Err(storage("Failed to read cache index", e)),
        };

        match serde_json::from_str(&content) {
            Ok(index) => Ok(index),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "Discarding unreadable cache index: {}", e);
                Ok(CacheIndex::default())
            }
        }
    }

    fn save(&self, index: &CacheIndex) -> CacheResult<()> {
        let content =
            serde_json::to_vec(index).map_err(|e| storage("Failed to serialize cache index", e))?;

        let temp = self.path.with_extension("json.tmp");
        std::fs::write(&temp, content).map_err(|e| storage("Failed to write cache index", e))?;
        std::fs::rename(&temp, &self.path)
            .map_err(|e| storage("Failed to replace cache index", e))?;
        Ok(())
    }
}

/// Blobs stored as `<uuid>.json` files in one directory
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    directory: PathBuf,
}

impl FsBlobStore {
    /// Create a store in `directory`, creating it if needed
    pub fn new(directory: impl Into<PathBuf>) -> CacheResult<Self> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory)
            .map_err(|e| storage("Failed to create blob directory", e))?;
        Ok(Self { directory })
    }

    /// Directory holding the blobs
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path of the file behind a handle
    ///
    /// Handles are plain file names; anything else is rejected so an index
    /// can never point outside the blob directory.
    pub fn blob_path(&self, blob_ref: &str) -> CacheResult<PathBuf> {
        let valid = !blob_ref.is_empty()
            && blob_ref.ends_with(".json")
            && !blob_ref.contains(['/', '\\'])
            && blob_ref != ".."
            && !blob_ref.starts_with('.');
        if !valid {
            return Err(storage("Invalid blob reference", blob_ref));
        }
        Ok(self.directory.join(blob_ref))
    }
}

impl BlobStore for FsBlobStore {
    fn write(&self, bytes: &[u8]) -> CacheResult<String> {
        let blob_ref = format!("{}.json", Uuid::new_v4());
        std::fs::write(self.blob_path(&blob_ref)?, bytes)
            .map_err(|e| storage("Failed to write cache blob", e))?;
        Ok(blob_ref)
    }

    fn read(&self, blob_ref: &str) -> CacheResult<Option<Vec<u8>>> {
        match std::fs::read(self.blob_path(blob_ref)?) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage("Failed to read cache blob", e)),
        }
    }

    fn delete(&self, blob_ref: &str) -> CacheResult<()> {
        match std::fs::remove_file(self.blob_path(blob_ref)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage("Failed to delete cache blob", e)),
        }
    }

    fn size(&self, blob_ref: &str) -> CacheResult<Option<u64>> {
        match std::fs::metadata(self.blob_path(blob_ref)?) {
            Ok(meta) if meta.is_file() => Ok(Some(meta.len())),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage("Failed to stat cache blob", e)),
        }
    }

    fn list(&self) -> CacheResult<Vec<String>> {
        let entries = std::fs::read_dir(&self.directory)
            .map_err(|e| storage("Failed to list cache blobs", e))?;

        let mut blobs = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| storage("Failed to list cache blobs", e))?;
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.ends_with(".json") && entry.file_type().is_ok_and(|t| t.is_file()) {
                blobs.push(name);
            }
        }
        Ok(blobs)
    }
}

/// Index kept in memory, for tests and ephemeral caches
#[derive(Debug, Default)]
pub struct MemoryIndexStore {
    index: Mutex<CacheIndex>,
}

impl MemoryIndexStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl IndexStore for MemoryIndexStore {
    fn load(&self) -> CacheResult<CacheIndex> {
        Ok(self.index.lock().clone())
    }

    fn save(&self, index: &CacheIndex) -> CacheResult<()> {
        *self.index.lock() = index.clone();
        Ok(())
    }
}

/// Blobs kept in memory, for tests and ephemeral caches
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a blob in place
    pub fn overwrite(&self, blob_ref: &str, bytes: Vec<u8>) {
        self.blobs.lock().insert(blob_ref.to_string(), bytes);
    }
}

impl BlobStore for MemoryBlobStore {
    fn write(&self, bytes: &[u8]) -> CacheResult<String> {
        let blob_ref = format!("{}.json", Uuid::new_v4());
        self.blobs.lock().insert(blob_ref.clone(), bytes.to_vec());
        Ok(blob_ref)
    }

    fn read(&self, blob_ref: &str) -> CacheResult<Option<Vec<u8>>> {
        Ok(self.blobs.lock().get(blob_ref).cloned())
    }

    fn delete(&self, blob_ref: &str) -> CacheResult<()> {
        self.blobs.lock().remove(blob_ref);
        Ok(())
    }

    fn size(&self, blob_ref: &str) -> CacheResult<Option<u64>> {
        Ok(self.blobs.lock().get(blob_ref).map(|b| b.len() as u64))
    }

    fn list(&self) -> CacheResult<Vec<String>> {
        Ok(self.blobs.lock().keys().cloned().collect())
    }
}
