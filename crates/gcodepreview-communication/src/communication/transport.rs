//! File transport seam
//!
//! The engine never talks HTTP itself. Hosts implement [`FileTransport`]
//! on top of whatever client they use to reach the printer server.

use async_trait::async_trait;
use gcodepreview_core::{FileMetadata, FileRef, ProgressCallback, TransportError};

/// Access to G-code files on the printer server
#[async_trait]
pub trait FileTransport: Send + Sync {
    /// Query metadata (size) of a file
    async fn file_metadata(&self, file: &FileRef) -> Result<FileMetadata, TransportError>;

    /// Download the complete file
    ///
    /// `progress` receives `(bytes_done, bytes_total)` after every chunk;
    /// `bytes_total` is 0 when the server did not announce a length.
    async fn download_file(
        &self,
        file: &FileRef,
        progress: ProgressCallback,
    ) -> Result<Vec<u8>, TransportError>;

    /// Download size threshold advertised by the server, if any
    ///
    /// Overrides the locally configured threshold when present.
    async fn download_size_threshold(&self) -> Option<u64> {
        None
    }
}
