//! Remote loader
//!
//! Downloads a file through the [`FileTransport`], parses it on the
//! blocking pool and stores the result in the cache. Large files are
//! gated behind an explicit opt-in.

use crate::communication::stream::{stopped, StateSink};
use crate::communication::{FileTransport, LoadHandle, LoadStream};
use gcodepreview_cache::GcodeCache;
use gcodepreview_core::constants::{DEFAULT_LARGE_FILE_THRESHOLD, DOWNLOAD_PROGRESS_SHARE};
use gcodepreview_core::{Error, FileRef, GcodeDocument, LoadState, TransportError};
use gcodepreview_visualizer::GcodeParser;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Remote loader configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteLoaderConfig {
    /// Size above which downloads need opt-in; `None` disables the gate
    pub large_file_threshold: Option<u64>,
}

impl Default for RemoteLoaderConfig {
    fn default() -> Self {
        Self {
            large_file_threshold: Some(DEFAULT_LARGE_FILE_THRESHOLD),
        }
    }
}

enum Outcome {
    Ready(Arc<GcodeDocument>),
    LargeFileDownloadRequired,
}

/// Loads documents from the printer server
#[derive(Clone)]
pub struct RemoteLoader {
    transport: Arc<dyn FileTransport>,
    parser: Arc<GcodeParser>,
    cache: Option<Arc<GcodeCache>>,
    config: RemoteLoaderConfig,
}

impl RemoteLoader {
    /// Create a new remote loader
    ///
    /// Without a cache, parsed documents are not persisted.
    pub fn new(
        transport: Arc<dyn FileTransport>,
        parser: Arc<GcodeParser>,
        cache: Option<Arc<GcodeCache>>,
        config: RemoteLoaderConfig,
    ) -> Self {
        Self {
            transport,
            parser,
            cache,
            config,
        }
    }

    /// Loader configuration
    pub fn config(&self) -> &RemoteLoaderConfig {
        &self.config
    }

    /// Start loading `file`
    ///
    /// Must be called from within a tokio runtime.
    pub fn load(&self, file: FileRef, allow_large_download: bool) -> LoadStream {
        let handle = LoadHandle::new();
        let (sink, receiver) = StateSink::channel();
        let loader = self.clone();
        let task_handle = handle.clone();
        tokio::spawn(async move {
            loader.run(file, allow_large_download, sink, task_handle).await;
        });
        LoadStream::new(receiver, handle)
    }

    /// Drive one load to its terminal state
    pub(crate) async fn run(&self, file: FileRef, allow_large_download: bool, sink: StateSink, handle: LoadHandle) {
        let terminal = match self.execute(&file, allow_large_download, &sink, &handle).await {
            Ok(Outcome::Ready(document)) => LoadState::Ready(document),
            Ok(Outcome::LargeFileDownloadRequired) => LoadState::FailedLargeFileDownloadRequired,
            Err(err) => {
                match &err {
                    Error::Transport(TransportError::Cancelled { .. }) => {
                        debug!(path = %file.path, "Load cancelled")
                    }
                    _ => warn!(path = %file.path, "Load failed: {}", err),
                }
                LoadState::Failed(Arc::new(err))
            }
        };
        sink.finish(terminal);
    }

    async fn execute(
        &self,
        file: &FileRef,
        allow_large_download: bool,
        sink: &StateSink,
        handle: &LoadHandle,
    ) -> Result<Outcome, Error> {
        if !allow_large_download && self.exceeds_threshold(file).await? {
            info!(path = %file.path, "File exceeds download threshold, opt-in required");
            return Ok(Outcome::LargeFileDownloadRequired);
        }

        sink.progress(0.0);
        let cancelled = || TransportError::Cancelled {
            path: file.path.clone(),
        };

        let progress_sink = sink.clone();
        let progress = Box::new(move |done: u64, total: u64| {
            if total > 0 {
                let fraction = (done as f64 / total as f64).min(1.0) as f32;
                progress_sink.progress(fraction * DOWNLOAD_PROGRESS_SHARE);
            }
        });

        let bytes = tokio::select! {
            biased;
            _ = stopped(handle, sink) => return Err(cancelled().into()),
            result = self.transport.download_file(file, progress) => result?,
        };
        debug!(path = %file.path, bytes = bytes.len(), "Downloaded G-code");
        sink.progress(DOWNLOAD_PROGRESS_SHARE);

        if handle.is_cancelled() {
            return Err(cancelled().into());
        }

        let parser = self.parser.clone();
        let parse_sink = sink.clone();
        let parse_handle = handle.clone();
        let parse = tokio::task::spawn_blocking(move || {
            parser.parse_with_progress(&bytes, &mut |fraction| {
                if !parse_handle.is_cancelled() {
                    let share = 1.0 - DOWNLOAD_PROGRESS_SHARE;
                    parse_sink.progress((DOWNLOAD_PROGRESS_SHARE + share * fraction).min(1.0));
                }
            })
        });
        let document = tokio::select! {
            biased;
            _ = stopped(handle, sink) => return Err(cancelled().into()),
            joined = parse => joined.map_err(|e| Error::other(format!("Parser task failed: {}", e)))??,
        };
        let document = Arc::new(document);
        sink.progress(1.0);

        if let Some(cache) = &self.cache {
            let cache = cache.clone();
            let key = file.cache_key();
            let stored = document.clone();
            let result = tokio::task::spawn_blocking(move || cache.store(&key, &stored)).await;
            match result {
                Ok(Ok(())) => debug!(path = %file.path, "Cached parsed document"),
                Ok(Err(e)) => warn!(path = %file.path, "Failed to cache document: {}", e),
                Err(e) => warn!(path = %file.path, "Cache task failed: {}", e),
            }
        }

        if handle.is_cancelled() {
            return Err(cancelled().into());
        }
        Ok(Outcome::Ready(document))
    }

    /// Whether the file is larger than the effective threshold
    async fn exceeds_threshold(&self, file: &FileRef) -> Result<bool, Error> {
        let threshold = match self.transport.download_size_threshold().await {
            Some(server) => Some(server),
            None => self.config.large_file_threshold,
        };
        let Some(threshold) = threshold else {
            return Ok(false);
        };

        let size = match file.size {
            Some(size) => Some(size),
            None => self.transport.file_metadata(file).await?.size,
        };
        match size {
            Some(size) => Ok(size > threshold),
            None => {
                debug!(path = %file.path, "File size unknown, skipping download threshold");
                Ok(false)
            }
        }
    }
}

impl std::fmt::Debug for RemoteLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteLoader")
            .field("config", &self.config)
            .field("cached", &self.cache.is_some())
            .finish()
    }
}
