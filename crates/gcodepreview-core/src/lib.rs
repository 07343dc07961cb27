//! # GCodePreview Core
//!
//! Core types and utilities for GCodePreview.
//! Provides the layer model produced by the parser, load state
//! notifications, file references and the error taxonomy shared by all
//! crates of the workspace.

pub mod constants;
pub mod core;
pub mod data;
pub mod error;
pub mod types;

pub use crate::core::LoadState;

pub use data::{
    Dialect, FileMetadata, FileRef, GcodeDocument, Layer, Move, MoveKind, Point2D, RenderContext,
};

pub use error::{CacheError, Error, ParseError, RenderError, Result, TransportError};

// Re-export type aliases for convenience
pub use types::{thread_safe_map, thread_safe_rw, ProgressCallback, ThreadSafeMap, ThreadSafeRw};
