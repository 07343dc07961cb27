//! Preview rendering support
//!
//! Maps cursors onto parsed documents. Drawing itself is left to the host.

pub mod render_context;

pub use render_context::{for_file_location, for_layer_progress, RenderCursor};
