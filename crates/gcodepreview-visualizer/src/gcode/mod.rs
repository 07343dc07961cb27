//! G-Code parsing
//!
//! This module provides:
//! - Line tokenization (commands, parameters, comments)
//! - Dialect recognition through an ordered registry
//! - Arc linearisation
//! - The parser building the layer model

pub mod arc;
pub mod command;
pub mod dialect;
pub mod parser;

pub use arc::{center_from_radius, ArcExpander, ArcExpanderConfig};
pub use command::{CommandCode, GcodeLine};
pub use dialect::{DialectProbe, DialectRecognizer, DialectRegistry, DialectRules, LayerBoundary};
pub use parser::{GcodeParser, ParserConfig};
