//! Data models for GCodePreview
//!
//! Provides the immutable layer model produced by the parser:
//! - [`GcodeDocument`]: all layers of one file plus totals
//! - [`Layer`]: moves sharing one Z height and the byte range they came from
//! - [`Move`]: one 2D transition classified as travel, extrusion or retraction
//!
//! Also contains the render context handed to painters and the file
//! references used to address remote files.

pub mod file_ref;
pub mod render_context;

pub use file_ref::{FileMetadata, FileRef};
pub use render_context::RenderContext;

use serde::{Deserialize, Serialize};

/// 2D position in machine coordinates (mm)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2D {
    /// X coordinate
    pub x: f32,
    /// Y coordinate
    pub y: f32,
}

impl Point2D {
    /// Create a new point
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Classification of a move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveKind {
    /// Positioning without material
    Travel,
    /// Material deposited while moving in X/Y
    Extrude,
    /// Filament pulled back
    Retract,
}

impl std::fmt::Display for MoveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Travel => write!(f, "travel"),
            Self::Extrude => write!(f, "extrude"),
            Self::Retract => write!(f, "retract"),
        }
    }
}

/// G-code dialect that produced a document
///
/// Selected by the parser's recognizer registry; each variant carries its
/// own layer-change rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dialect {
    /// Cura (`;LAYER:<n>` markers)
    Cura,
    /// PrusaSlicer family (`;LAYER_CHANGE` markers, `;WIDTH:` hints)
    PrusaSlicer,
    /// Plain G-code, layers inferred from Z changes while extruding
    Generic,
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cura => write!(f, "Cura"),
            Self::PrusaSlicer => write!(f, "PrusaSlicer"),
            Self::Generic => write!(f, "Generic"),
        }
    }
}

/// One positional transition within a layer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Move {
    /// Start position
    pub from: Point2D,
    /// End position
    pub to: Point2D,
    /// Move classification
    pub kind: MoveKind,
    /// Extrusion width hint from the slicer, if any
    pub extrusion_width: Option<f32>,
    /// Byte offset of the originating line in the source text
    pub source_byte_offset: u64,
}

impl Move {
    /// Length of the move in the XY plane
    pub fn length(&self) -> f32 {
        ((self.to.x - self.from.x).powi(2) + (self.to.y - self.from.y).powi(2)).sqrt()
    }
}

/// The set of moves sharing one Z height, in print order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    z_height: f32,
    moves: Vec<Move>,
    start_byte_offset: u64,
    end_byte_offset: u64,
}

impl Layer {
    /// Create a new layer covering `start_byte_offset..end_byte_offset`
    pub fn new(z_height: f32, moves: Vec<Move>, start_byte_offset: u64, end_byte_offset: u64) -> Self {
        Self {
            z_height,
            moves,
            start_byte_offset,
            end_byte_offset,
        }
    }

    /// Z height in mm
    pub fn z_height(&self) -> f32 {
        self.z_height
    }

    /// Moves in playback order
    pub fn moves(&self) -> &[Move] {
        &self.moves
    }

    /// Number of moves in the layer
    pub fn move_count(&self) -> usize {
        self.moves.len()
    }

    /// First byte of the source text belonging to this layer
    pub fn start_byte_offset(&self) -> u64 {
        self.start_byte_offset
    }

    /// One past the last byte of the source text belonging to this layer
    pub fn end_byte_offset(&self) -> u64 {
        self.end_byte_offset
    }

    fn first_move_offset(&self) -> Option<u64> {
        self.moves.first().map(|m| m.source_byte_offset)
    }
}

/// Parsed G-code file
///
/// Immutable once built. Moves enumerated layer by layer have
/// non-decreasing `source_byte_offset`, which keeps byte-offset lookups
/// logarithmic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GcodeDocument {
    dialect: Dialect,
    layers: Vec<Layer>,
    move_count: usize,
    byte_length: u64,
}

impl GcodeDocument {
    /// Create a document from parsed layers
    pub fn new(dialect: Dialect, layers: Vec<Layer>, byte_length: u64) -> Self {
        let move_count = layers.iter().map(Layer::move_count).sum();
        Self {
            dialect,
            layers,
            move_count,
            byte_length,
        }
    }

    /// Dialect that produced the document
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// All layers in print order
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Layer by index
    pub fn layer(&self, index: usize) -> Option<&Layer> {
        self.layers.get(index)
    }

    /// Number of layers
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Total number of moves across all layers
    pub fn move_count(&self) -> usize {
        self.move_count
    }

    /// Size of the source text in bytes
    pub fn byte_length(&self) -> u64 {
        self.byte_length
    }

    /// Whether the document has no layers
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Iterate all moves in playback order
    pub fn moves(&self) -> impl Iterator<Item = &Move> {
        self.layers.iter().flat_map(|layer| layer.moves.iter())
    }

    /// Locate the last move whose source offset is at or before `byte_offset`
    ///
    /// Returns `(layer_index, move_index)`, or `None` when the offset lies
    /// before the first move of the document.
    pub fn locate_byte_offset(&self, byte_offset: u64) -> Option<(usize, usize)> {
        let layer_end = self
            .layers
            .partition_point(|layer| layer.first_move_offset().is_some_and(|o| o <= byte_offset));
        let layer_index = layer_end.checked_sub(1)?;
        let moves = self.layers[layer_index].moves();
        let move_end = moves.partition_point(|m| m.source_byte_offset <= byte_offset);
        Some((layer_index, move_end.checked_sub(1)?))
    }
}
