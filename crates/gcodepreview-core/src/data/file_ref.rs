//! Remote file references

use serde::{Deserialize, Serialize};

/// Reference to a G-code file on the printer server
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileRef {
    /// Server-relative path (e.g. `local/benchy.gcode`)
    pub path: String,
    /// File size in bytes, if the listing reported it
    pub size: Option<u64>,
    /// Upload date as a unix timestamp, if known
    pub date: Option<i64>,
    /// Content hash reported by the server, if known
    pub hash: Option<String>,
}

impl FileRef {
    /// Create a reference with only a path
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            size: None,
            date: None,
            hash: None,
        }
    }

    /// Set the reported size
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Set the upload date
    pub fn with_date(mut self, date: i64) -> Self {
        self.date = Some(date);
        self
    }

    /// Set the content hash
    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = Some(hash.into());
        self
    }

    /// Stable cache identity
    ///
    /// Includes date and hash so a re-uploaded file under the same path is a
    /// different identity.
    pub fn cache_key(&self) -> String {
        format!(
            "{}:{}:{}",
            self.path,
            self.date.map(|d| d.to_string()).unwrap_or_default(),
            self.hash.as_deref().unwrap_or_default()
        )
    }
}

/// Metadata reported by the file transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FileMetadata {
    /// File size in bytes
    pub size: Option<u64>,
}
