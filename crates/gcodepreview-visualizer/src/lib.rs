//! # GCodePreview Visualizer
//!
//! G-code parsing and preview support for GCodePreview.
//! Includes the dialect-aware parser producing layered documents and the
//! render context factory mapping cursors onto them.

pub mod gcode;
pub mod visualizer;

pub use gcode::{
    ArcExpander, ArcExpanderConfig, CommandCode, DialectProbe, DialectRecognizer, DialectRegistry,
    DialectRules, GcodeLine, GcodeParser, LayerBoundary, ParserConfig,
};

pub use visualizer::{for_file_location, for_layer_progress, RenderCursor};
