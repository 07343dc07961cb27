use gcodepreview_core::GcodeDocument;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Format version of stored document blobs
pub const BLOB_FORMAT_VERSION: u32 = 1;

/// Format version of the cache index
pub const INDEX_FORMAT_VERSION: u32 = 1;

/// Index record of one cached document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheEntry {
    /// Cache key, derived from the file identity
    pub key: String,
    /// Time of the last store in milliseconds since the epoch
    pub updated_at: i64,
    /// Handle of the blob holding the serialized document
    pub blob_ref: String,
    /// Blob size in bytes
    pub size: u64,
}

/// All cache entries keyed by cache key
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheIndex {
    pub version: u32,
    pub entries: BTreeMap<String, CacheEntry>,
}

impl Default for CacheIndex {
    fn default() -> Self {
        Self {
            version: INDEX_FORMAT_VERSION,
            entries: BTreeMap::new(),
        }
    }
}

impl CacheIndex {
    /// Sum of all blob sizes
    pub fn total_size(&self) -> u64 {
        self.entries.values().map(|e| e.size).sum()
    }

    /// Entry with the oldest `updated_at`, ties broken by key order
    ///
    /// The entry stored under `keep`, if any, is never returned.
    pub fn oldest(&self, keep: Option<&str>) -> Option<&CacheEntry> {
        self.entries
            .values()
            .filter(|e| Some(e.key.as_str()) != keep)
            .min_by(|a, b| a.updated_at.cmp(&b.updated_at).then_with(|| a.key.cmp(&b.key)))
    }

    /// Latest `updated_at` in the index
    pub fn newest_timestamp(&self) -> Option<i64> {
        self.entries.values().map(|e| e.updated_at).max()
    }
}

/// Serialized form of a cached document
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct StoredDocument {
    pub version: u32,
    pub document: GcodeDocument,
}

#[derive(Serialize)]
pub(crate) struct StoredDocumentRef<'a> {
    pub version: u32,
    pub document: &'a GcodeDocument,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(key: &str, updated_at: i64, size: u64) -> CacheEntry {
        CacheEntry {
            key: key.to_string(),
            updated_at,
            blob_ref: format!("{key}.json"),
            size,
        }
    }

    #[test]
    fn test_oldest_breaks_ties_by_key() {
        let mut index = CacheIndex::default();
        for e in [entry("b", 5, 10), entry("a", 5, 10), entry("c", 9, 10)] {
            index.entries.insert(e.key.clone(), e);
        }
        assert_eq!(index.oldest(None).map(|e| e.key.as_str()), Some("a"));
        assert_eq!(index.oldest(Some("a")).map(|e| e.key.as_str()), Some("b"));
        assert_eq!(index.total_size(), 30);
        assert_eq!(index.newest_timestamp(), Some(9));
    }

    #[test]
    fn test_index_tolerates_missing_fields() {
        let index: CacheIndex = serde_json::from_str("{}").unwrap();
        assert_eq!(index, CacheIndex::default());
    }
}
