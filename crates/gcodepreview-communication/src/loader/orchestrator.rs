//! Load orchestrator
//!
//! Entry point for loading a file: serves it from the cache when possible
//! and falls back to the [`RemoteLoader`] otherwise. Only the most recent
//! load of a file is kept alive.

use super::remote::RemoteLoader;
use crate::communication::stream::StateSink;
use crate::communication::{LoadHandle, LoadStream};
use gcodepreview_cache::GcodeCache;
use gcodepreview_core::{FileRef, GcodeDocument, LoadState, ThreadSafeMap, TransportError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug)]
struct ActiveLoad {
    generation: u64,
    handle: LoadHandle,
}

/// Cache-first document loading with latest-wins semantics per file
#[derive(Clone)]
pub struct LoadOrchestrator {
    cache: Option<Arc<GcodeCache>>,
    remote: RemoteLoader,
    active: ThreadSafeMap<String, ActiveLoad>,
    generation: Arc<AtomicU64>,
}

impl LoadOrchestrator {
    /// Create an orchestrator over an optional cache and a remote loader
    pub fn new(cache: Option<Arc<GcodeCache>>, remote: RemoteLoader) -> Self {
        Self {
            cache,
            remote,
            active: gcodepreview_core::thread_safe_map(),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Start loading `file`
    ///
    /// Cancels any earlier load of the same file. Must be called from
    /// within a tokio runtime.
    pub fn load(&self, file: FileRef, allow_large_download: bool) -> LoadStream {
        let key = file.cache_key();
        let handle = LoadHandle::new();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let previous = self.active.lock().insert(
            key.clone(),
            ActiveLoad {
                generation,
                handle: handle.clone(),
            },
        );
        if let Some(previous) = previous {
            debug!(key = %key, "Superseding running load");
            previous.handle.cancel();
        }

        let (sink, receiver) = StateSink::channel();
        let orchestrator = self.clone();
        let task_handle = handle.clone();
        tokio::spawn(async move {
            orchestrator
                .run(file, allow_large_download, sink, task_handle)
                .await;
            orchestrator.release(&key, generation);
        });
        LoadStream::new(receiver, handle)
    }

    /// Whether `file` can be served from the cache
    ///
    /// Blocking: touches the cache storage.
    pub fn can_load_from_cache(&self, file: &FileRef) -> bool {
        self.cache
            .as_ref()
            .is_some_and(|cache| cache.has(&file.cache_key()))
    }

    /// Cancel the running load of `file`, if any
    pub fn cancel(&self, file: &FileRef) -> bool {
        match self.active.lock().remove(&file.cache_key()) {
            Some(active) => {
                active.handle.cancel();
                true
            }
            None => false,
        }
    }

    /// Number of loads currently running
    pub fn active_loads(&self) -> usize {
        self.active.lock().len()
    }

    /// The cache used by this orchestrator
    pub fn cache(&self) -> Option<&Arc<GcodeCache>> {
        self.cache.as_ref()
    }

    async fn run(&self, file: FileRef, allow_large_download: bool, sink: StateSink, handle: LoadHandle) {
        if let Some(document) = self.load_cached(&file).await {
            let terminal = if handle.is_cancelled() {
                LoadState::failed(TransportError::Cancelled { path: file.path })
            } else {
                LoadState::Ready(Arc::new(document))
            };
            sink.finish(terminal);
            return;
        }
        self.remote.run(file, allow_large_download, sink, handle).await;
    }

    async fn load_cached(&self, file: &FileRef) -> Option<GcodeDocument> {
        let cache = self.cache.clone()?;
        let key = file.cache_key();
        let result = tokio::task::spawn_blocking(move || {
            if !cache.has(&key) {
                return None;
            }
            Some(cache.load(&key))
        })
        .await;

        match result {
            Ok(None) => None,
            Ok(Some(Ok(document))) => {
                debug!(path = %file.path, "Serving document from cache");
                Some(document)
            }
            Ok(Some(Err(e))) if e.is_recoverable() => {
                debug!(path = %file.path, "Cache unusable, loading remotely: {}", e);
                None
            }
            Ok(Some(Err(e))) => {
                warn!(path = %file.path, "Cache read failed, loading remotely: {}", e);
                None
            }
            Err(e) => {
                warn!(path = %file.path, "Cache task failed: {}", e);
                None
            }
        }
    }

    fn release(&self, key: &str, generation: u64) {
        let mut active = self.active.lock();
        if active.get(key).is_some_and(|a| a.generation == generation) {
            active.remove(key);
        }
    }
}

impl std::fmt::Debug for LoadOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadOrchestrator")
            .field("remote", &self.remote)
            .field("active_loads", &self.active_loads())
            .finish()
    }
}
