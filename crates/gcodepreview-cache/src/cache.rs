//! Size-bounded document cache
//!
//! Stores parsed [`GcodeDocument`]s keyed by file identity so a file
//! previewed before opens without downloading or parsing it again.
//!
//! Writes follow a fixed order: the blob is written first, the index is
//! committed second, and only then are superseded or evicted blobs
//! deleted. A crash therefore leaves at worst an unreferenced blob, which
//! is swept the next time the cache is opened.

use crate::error::{corrupt, storage, CacheError, CacheResult};
use crate::model::{CacheEntry, CacheIndex, StoredDocument, StoredDocumentRef, BLOB_FORMAT_VERSION};
use crate::store::{BlobStore, FsBlobStore, IndexStore, JsonIndexStore};
use gcodepreview_core::GcodeDocument;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info, warn};

/// File name of the index inside a cache directory
pub const INDEX_FILE_NAME: &str = "index.json";

/// Directory name of the blobs inside a cache directory
pub const BLOB_DIR_NAME: &str = "blobs";

struct CacheState {
    index: CacheIndex,
    last_timestamp: i64,
}

/// Size-bounded cache of parsed documents
///
/// All operations are blocking and serialized per instance. Share it
/// behind an `Arc` and call it from a blocking context.
pub struct GcodeCache {
    index_store: Box<dyn IndexStore>,
    blobs: Box<dyn BlobStore>,
    max_size: u64,
    state: Mutex<CacheState>,
}

impl std::fmt::Debug for GcodeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("GcodeCache")
            .field("max_size", &self.max_size)
            .field("entries", &state.index.entries.len())
            .field("total_size", &state.index.total_size())
            .finish()
    }
}

impl GcodeCache {
    /// Open a cache in `directory` with the filesystem stores
    pub fn open(directory: impl AsRef<Path>, max_size: u64) -> CacheResult<Self> {
        let directory = directory.as_ref();
        std::fs::create_dir_all(directory)
            .map_err(|e| storage("Failed to create cache directory", e))?;

        let index_store = JsonIndexStore::new(directory.join(INDEX_FILE_NAME));
        let blobs = FsBlobStore::new(directory.join(BLOB_DIR_NAME))?;
        info!(directory = %directory.display(), max_size, "Opening G-code cache");
        Self::with_stores(Box::new(index_store), Box::new(blobs), max_size)
    }

    /// Open a cache on arbitrary stores
    ///
    /// Reconciles the index with the blobs: entries without a blob are
    /// dropped, blobs without an entry are deleted and the size budget is
    /// enforced.
    pub fn with_stores(
        index_store: Box<dyn IndexStore>,
        blobs: Box<dyn BlobStore>,
        max_size: u64,
    ) -> CacheResult<Self> {
        let mut index = index_store.load()?;
        let mut dirty = false;

        let before = index.entries.len();
        index.entries.retain(|_, entry| blobs.exists(&entry.blob_ref));
        if index.entries.len() != before {
            warn!(dropped = before - index.entries.len(), "Dropped cache entries without blob");
            dirty = true;
        }

        let referenced: HashSet<&str> = index.entries.values().map(|e| e.blob_ref.as_str()).collect();
        for blob_ref in blobs.list()? {
            if !referenced.contains(blob_ref.as_str()) {
                debug!(blob_ref = %blob_ref, "Sweeping orphaned cache blob");
                blobs.delete(&blob_ref)?;
            }
        }

        let last_timestamp = index.newest_timestamp().unwrap_or(i64::MIN);
        let cache = Self {
            index_store,
            blobs,
            max_size,
            state: Mutex::new(CacheState {
                index,
                last_timestamp,
            }),
        };

        {
            let mut state = cache.state.lock();
            let evicted = cache.evict_locked(&mut state, None)?;
            if dirty && evicted.is_empty() {
                cache.index_store.save(&state.index)?;
            }
        }
        Ok(cache)
    }

    /// Size budget in bytes
    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Sum of all stored blob sizes
    pub fn total_size(&self) -> u64 {
        self.state.lock().index.total_size()
    }

    /// Number of cached documents
    pub fn len(&self) -> usize {
        self.state.lock().index.entries.len()
    }

    /// Whether the cache holds no documents
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All entries, oldest first
    pub fn entries(&self) -> Vec<CacheEntry> {
        let mut entries: Vec<CacheEntry> = self.state.lock().index.entries.values().cloned().collect();
        entries.sort_by(|a, b| a.updated_at.cmp(&b.updated_at).then_with(|| a.key.cmp(&b.key)));
        entries
    }

    /// Whether a document is cached under `key`
    ///
    /// An entry whose blob has disappeared is purged and reported absent.
    pub fn has(&self, key: &str) -> bool {
        let mut state = self.state.lock();
        let Some(entry) = state.index.entries.get(key) else {
            return false;
        };
        if self.blobs.exists(&entry.blob_ref) {
            return true;
        }

        warn!(key, "Cache entry has no blob, purging");
        if let Err(e) = self.purge_locked(&mut state, key) {
            warn!(key, "Failed to purge dangling cache entry: {}", e);
        }
        false
    }

    /// Load the document cached under `key`
    ///
    /// Fails with [`CacheError::Miss`] when nothing is cached and
    /// [`CacheError::Corrupt`] when the blob is missing or unreadable; a
    /// corrupt entry is purged before returning.
    pub fn load(&self, key: &str) -> CacheResult<GcodeDocument> {
        let mut state = self.state.lock();
        let entry = state.index.entries.get(key).cloned().ok_or_else(|| CacheError::Miss {
            key: key.to_string(),
        })?;

        let decoded = match self.blobs.read(&entry.blob_ref)? {
            None => Err(corrupt(key, "blob is missing")),
            Some(bytes) => decode(key, &bytes),
        };

        match decoded {
            Ok(document) => {
                debug!(key, layers = document.layer_count(), "Loaded document from cache");
                Ok(document)
            }
            Err(err) => {
                warn!(key, "Purging corrupt cache entry: {}", err);
                self.purge_locked(&mut state, key)?;
                Err(err)
            }
        }
    }

    /// Store `document` under `key`, replacing any previous entry
    ///
    /// Evicts the oldest entries until the cache fits its budget again. A
    /// document larger than the whole budget is rejected before anything
    /// is written.
    pub fn store(&self, key: &str, document: &GcodeDocument) -> CacheResult<()> {
        let bytes = serde_json::to_vec(&StoredDocumentRef {
            version: BLOB_FORMAT_VERSION,
            document,
        })
        .map_err(|e| storage("Failed to serialize document", e))?;

        let size = bytes.len() as u64;
        if size > self.max_size {
            return Err(CacheError::EntryTooLarge {
                size,
                max_size: self.max_size,
            });
        }

        let mut state = self.state.lock();
        let blob_ref = self.blobs.write(&bytes)?;

        let updated_at = next_timestamp(&mut state.last_timestamp);
        let entry = CacheEntry {
            key: key.to_string(),
            updated_at,
            blob_ref: blob_ref.clone(),
            size,
        };
        let previous = state.index.entries.insert(key.to_string(), entry);

        if let Err(err) = self.commit_with_eviction(&mut state, key) {
            // Roll back to the previous entry so the index matches what is on disk
            match previous {
                Some(previous) => state.index.entries.insert(key.to_string(), previous),
                None => state.index.entries.remove(key),
            };
            let _ = self.blobs.delete(&blob_ref);
            return Err(err);
        }

        if let Some(previous) = previous {
            if let Err(e) = self.blobs.delete(&previous.blob_ref) {
                warn!(key, "Failed to delete superseded cache blob: {}", e);
            }
        }
        debug!(key, size, total = state.index.total_size(), "Stored document in cache");
        Ok(())
    }

    /// Remove the entry for `key`, returning whether one existed
    pub fn remove(&self, key: &str) -> CacheResult<bool> {
        let mut state = self.state.lock();
        if !state.index.entries.contains_key(key) {
            return Ok(false);
        }
        self.purge_locked(&mut state, key)?;
        Ok(true)
    }

    /// Remove all entries
    pub fn clear(&self) -> CacheResult<()> {
        let mut state = self.state.lock();
        let removed = std::mem::take(&mut state.index.entries);
        self.index_store.save(&state.index)?;
        for entry in removed.values() {
            self.blobs.delete(&entry.blob_ref)?;
        }
        info!(removed = removed.len(), "Cleared G-code cache");
        Ok(())
    }

    /// Evict and commit the index; eviction never removes `keep`
    fn commit_with_eviction(&self, state: &mut CacheState, keep: &str) -> CacheResult<()> {
        let evicted = self.evict_locked(state, Some(keep))?;
        if evicted.is_empty() {
            self.index_store.save(&state.index)?;
        }
        Ok(())
    }

    /// Remove the oldest entries until the budget holds
    ///
    /// Commits the index and deletes the evicted blobs when anything was
    /// evicted.
    fn evict_locked(&self, state: &mut CacheState, keep: Option<&str>) -> CacheResult<Vec<CacheEntry>> {
        let mut evicted = Vec::new();
        while state.index.total_size() > self.max_size {
            let Some(oldest) = state.index.oldest(keep).map(|e| e.key.clone()) else {
                break;
            };
            if let Some(entry) = state.index.entries.remove(&oldest) {
                evicted.push(entry);
            }
        }

        if evicted.is_empty() {
            return Ok(evicted);
        }

        if let Err(err) = self.index_store.save(&state.index) {
            for entry in evicted {
                state.index.entries.insert(entry.key.clone(), entry);
            }
            return Err(err);
        }
        for entry in &evicted {
            debug!(key = %entry.key, size = entry.size, "Evicted cache entry");
            if let Err(e) = self.blobs.delete(&entry.blob_ref) {
                warn!(key = %entry.key, "Failed to delete evicted cache blob: {}", e);
            }
        }
        Ok(evicted)
    }

    fn purge_locked(&self, state: &mut CacheState, key: &str) -> CacheResult<()> {
        if let Some(entry) = state.index.entries.remove(key) {
            self.index_store.save(&state.index)?;
            self.blobs.delete(&entry.blob_ref)?;
        }
        Ok(())
    }
}

fn decode(key: &str, bytes: &[u8]) -> CacheResult<GcodeDocument> {
    let stored: StoredDocument = serde_json::from_slice(bytes).map_err(|e| corrupt(key, e))?;
    if stored.version != BLOB_FORMAT_VERSION {
        return Err(corrupt(
            key,
            format!(
                "blob format version {} is not {}",
                stored.version, BLOB_FORMAT_VERSION
            ),
        ));
    }
    Ok(stored.document)
}

/// Current time in milliseconds, strictly after `last`
fn next_timestamp(last: &mut i64) -> i64 {
    let now = chrono::Utc::now().timestamp_millis();
    let next = now.max(last.saturating_add(1));
    *last = next;
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryBlobStore, MemoryIndexStore};
    use gcodepreview_core::{Dialect, Layer, Move, MoveKind, Point2D};

    fn document(moves: usize) -> GcodeDocument {
        let moves = (0..moves)
            .map(|i| Move {
                from: Point2D::new(i as f32, 0.0),
                to: Point2D::new(i as f32 + 1.0, 0.0),
                kind: MoveKind::Extrude,
                extrusion_width: Some(0.4),
                source_byte_offset: i as u64 * 12,
            })
            .collect();
        GcodeDocument::new(Dialect::Generic, vec![Layer::new(0.2, moves, 0, 1000)], 1000)
    }

    fn memory_cache(max_size: u64) -> GcodeCache {
        GcodeCache::with_stores(
            Box::new(MemoryIndexStore::new()),
            Box::new(MemoryBlobStore::new()),
            max_size,
        )
        .unwrap()
    }

    fn blob_size(doc: &GcodeDocument) -> u64 {
        serde_json::to_vec(&StoredDocumentRef {
            version: BLOB_FORMAT_VERSION,
            document: doc,
        })
        .unwrap()
        .len() as u64
    }

    #[test]
    fn test_store_and_load() {
        let cache = memory_cache(1 << 20);
        let doc = document(10);
        cache.store("a", &doc).unwrap();
        assert!(cache.has("a"));
        assert_eq!(cache.load("a").unwrap(), doc);
        assert_eq!(cache.total_size(), blob_size(&doc));
    }

    #[test]
    fn test_miss() {
        let cache = memory_cache(1 << 20);
        assert!(!cache.has("nope"));
        assert_eq!(
            cache.load("nope").unwrap_err(),
            CacheError::Miss {
                key: "nope".to_string()
            }
        );
    }

    #[test]
    fn test_eviction_removes_oldest() {
        let doc = document(10);
        let size = blob_size(&doc);
        let cache = memory_cache(size * 2);

        cache.store("a", &doc).unwrap();
        cache.store("b", &doc).unwrap();
        cache.store("c", &doc).unwrap();

        assert!(!cache.has("a"));
        assert!(cache.has("b"));
        assert!(cache.has("c"));
        assert!(cache.total_size() <= cache.max_size());
    }

    #[test]
    fn test_restore_refreshes_timestamp() {
        let doc = document(10);
        let size = blob_size(&doc);
        let cache = memory_cache(size * 2);

        cache.store("a", &doc).unwrap();
        cache.store("b", &doc).unwrap();
        cache.store("a", &doc).unwrap();
        cache.store("c", &doc).unwrap();

        assert!(cache.has("a"));
        assert!(!cache.has("b"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_timestamps_strictly_increase() {
        let cache = memory_cache(1 << 20);
        for key in ["a", "b", "c", "d"] {
            cache.store(key, &document(1)).unwrap();
        }
        let entries = cache.entries();
        assert!(entries.windows(2).all(|w| w[0].updated_at < w[1].updated_at));
        let keys: Vec<&str> = entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_entry_too_large() {
        let doc = document(50);
        let size = blob_size(&doc);
        let cache = memory_cache(size - 1);
        cache.store("small", &document(1)).unwrap();

        let err = cache.store("big", &doc).unwrap_err();
        assert_eq!(
            err,
            CacheError::EntryTooLarge {
                size,
                max_size: size - 1
            }
        );
        // Nothing was written or evicted
        assert!(cache.has("small"));
        assert!(!cache.has("big"));
    }

    #[test]
    fn test_remove_and_clear() {
        let cache = memory_cache(1 << 20);
        cache.store("a", &document(1)).unwrap();
        cache.store("b", &document(1)).unwrap();

        assert!(cache.remove("a").unwrap());
        assert!(!cache.remove("a").unwrap());
        assert_eq!(cache.len(), 1);

        cache.clear().unwrap();
        assert!(cache.is_empty());
        assert_eq!(cache.total_size(), 0);
    }

    #[test]
    fn test_next_timestamp_never_repeats() {
        let mut last = i64::MAX - 1;
        assert_eq!(next_timestamp(&mut last), i64::MAX);
        let mut last = 0;
        let first = next_timestamp(&mut last);
        let second = next_timestamp(&mut last);
        assert!(second > first);
    }
}
