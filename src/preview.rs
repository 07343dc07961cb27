//! Preview facade
//!
//! [`GcodePreview`] ties the load pipeline to the render context factory:
//! it starts loads, remembers the document of the most recent load that
//! reached `Ready`, and answers render requests against it.

use anyhow::Context;
use gcodepreview_cache::GcodeCache;
use gcodepreview_communication::{
    FileTransport, LoadOrchestrator, LoadStream, RemoteLoader, RemoteLoaderConfig,
};
use gcodepreview_core::{
    thread_safe_rw, FileRef, GcodeDocument, LoadState, RenderContext, RenderError, Result,
    ThreadSafeRw,
};
use gcodepreview_settings::PreviewConfig;
use gcodepreview_visualizer::{for_file_location, for_layer_progress, GcodeParser, ParserConfig};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone)]
struct CurrentDocument {
    file: FileRef,
    document: Arc<GcodeDocument>,
}

/// Entry point for hosts rendering G-code previews
#[derive(Clone)]
pub struct GcodePreview {
    orchestrator: LoadOrchestrator,
    current: ThreadSafeRw<Option<CurrentDocument>>,
    generation: Arc<AtomicU64>,
}

impl GcodePreview {
    /// Create a facade over an existing orchestrator
    pub fn new(orchestrator: LoadOrchestrator) -> Self {
        Self {
            orchestrator,
            current: thread_safe_rw(None),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Build the whole pipeline from configuration
    ///
    /// A cache directory that cannot be opened degrades to loading without
    /// a cache.
    pub fn from_config(
        config: &PreviewConfig,
        transport: Arc<dyn FileTransport>,
    ) -> anyhow::Result<Self> {
        config.validate().context("Invalid preview configuration")?;

        let cache = match GcodeCache::open(&config.cache.directory, config.cache.max_size_bytes) {
            Ok(cache) => Some(Arc::new(cache)),
            Err(e) => {
                tracing::warn!(
                    directory = %config.cache.directory.display(),
                    error = %e,
                    "Layer cache unavailable, continuing without it"
                );
                None
            }
        };

        let parser = Arc::new(GcodeParser::new(ParserConfig {
            arc_segment_length: config.parser.arc_segment_length,
            max_arc_segments: config.parser.max_arc_segments,
        }));
        let remote = RemoteLoader::new(
            transport,
            parser,
            cache.clone(),
            RemoteLoaderConfig {
                large_file_threshold: config.download.threshold(),
            },
        );

        tracing::info!(
            cache = cache.is_some(),
            max_size_bytes = config.cache.max_size_bytes,
            "G-code preview initialized"
        );
        Ok(Self::new(LoadOrchestrator::new(cache, remote)))
    }

    /// Start loading `file`
    ///
    /// When the load reaches `Ready` and no newer load was started in the
    /// meantime, its document becomes the current document. Must be called
    /// from within a tokio runtime.
    pub fn load_file(&self, file: FileRef, allow_large_download: bool) -> LoadStream {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let current = self.current.clone();
        let latest = self.generation.clone();
        let loaded_file = file.clone();

        tracing::debug!(path = %file.path, generation, "Loading file for preview");
        self.orchestrator
            .load(file, allow_large_download)
            .inspect(move |state| {
                let LoadState::Ready(document) = state else {
                    return;
                };
                let mut current = current.write();
                // Checked under the lock so a newer load cannot be overwritten
                if latest.load(Ordering::SeqCst) != generation {
                    tracing::debug!(path = %loaded_file.path, "Discarding superseded document");
                    return;
                }
                *current = Some(CurrentDocument {
                    file: loaded_file.clone(),
                    document: document.clone(),
                });
            })
    }

    /// Render context for the print head at `byte_offset` of the current file
    pub fn use_file_location(&self, byte_offset: u64) -> Result<RenderContext> {
        let document = self.document().ok_or(RenderError::NoDocument)?;
        Ok(for_file_location(&document, byte_offset)?)
    }

    /// Render context for manual scrubbing through the current document
    pub fn use_layer_progress(&self, layer_number: usize, progress: f32) -> Result<RenderContext> {
        let document = self.document().ok_or(RenderError::NoDocument)?;
        Ok(for_layer_progress(&document, layer_number, progress)?)
    }

    /// Whether `file` can be shown without downloading it
    pub fn can_load_from_cache(&self, file: &FileRef) -> bool {
        self.orchestrator.can_load_from_cache(file)
    }

    /// Document of the most recent successful load
    pub fn document(&self) -> Option<Arc<GcodeDocument>> {
        self.current.read().as_ref().map(|c| c.document.clone())
    }

    /// File the current document was loaded from
    pub fn current_file(&self) -> Option<FileRef> {
        self.current.read().as_ref().map(|c| c.file.clone())
    }

    /// Forget the current document
    pub fn clear(&self) {
        *self.current.write() = None;
    }

    /// Underlying load orchestrator
    pub fn orchestrator(&self) -> &LoadOrchestrator {
        &self.orchestrator
    }
}

impl std::fmt::Debug for GcodePreview {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcodePreview")
            .field("orchestrator", &self.orchestrator)
            .field("current_file", &self.current_file())
            .finish()
    }
}
