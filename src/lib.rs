//! # GCodePreview
//!
//! G-code preview engine for 3D-printer remote clients:
//! - Dialect-aware parsing of Cura, PrusaSlicer and generic G-code into layers
//! - A size-bounded on-disk cache of parsed layer models
//! - Remote loading with progress, cancellation and a large-file gate
//! - Render contexts for live print progress and manual scrubbing
//!
//! ## Architecture
//!
//! GCodePreview is organized as a workspace with multiple crates:
//!
//! 1. **gcodepreview-core** - Layer model, load states, errors
//! 2. **gcodepreview-visualizer** - Parser, dialects, render context factory
//! 3. **gcodepreview-cache** - Layer model cache with LRU eviction
//! 4. **gcodepreview-communication** - File transport seam, remote loader, orchestrator
//! 5. **gcodepreview-settings** - Configuration files
//! 6. **gcodepreview** - The [`GcodePreview`] facade tying them together

pub mod preview;

pub use preview::GcodePreview;

pub use gcodepreview_core::{
    Dialect, Error, FileMetadata, FileRef, GcodeDocument, Layer, LoadState, Move, MoveKind,
    Point2D, ProgressCallback, RenderContext, Result,
};

pub use gcodepreview_core::{CacheError, ParseError, RenderError, TransportError};

pub use gcodepreview_visualizer::{
    for_file_location, for_layer_progress, DialectRecognizer, DialectRegistry, GcodeParser,
    ParserConfig, RenderCursor,
};

pub use gcodepreview_cache::GcodeCache;

pub use gcodepreview_communication::{
    FileTransport, LoadHandle, LoadOrchestrator, LoadStream, RemoteLoader, RemoteLoaderConfig,
};

pub use gcodepreview_settings::{PreviewConfig, SettingsError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging with the default configuration
///
/// Sets up structured logging with:
/// - Console output with target and line numbers
/// - RUST_LOG environment variable support (defaults to `info`)
///
/// Fails when a global subscriber is already installed.
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_thread_names(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}
