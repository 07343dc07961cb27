//! Render context handed to painters

use super::{Move, Point2D};

/// Description of what to draw for one cursor position
///
/// Recomputed on every cursor change and never persisted. The previous
/// layer "ghost" is not included; painters append it themselves.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderContext {
    /// Number of layers in the document
    pub layer_count: usize,
    /// Current layer (0-indexed)
    pub layer_number: usize,
    /// Fraction of the current layer shown, in `[0, 1]`
    pub layer_progress: f32,
    /// Z height of the current layer in mm
    pub layer_z_height: f32,
    /// Moves of the current layer up to the cursor
    pub visible_moves: Vec<Move>,
    /// Print head position when following a live print
    pub print_head_position: Option<Point2D>,
}

impl RenderContext {
    /// Number of visible moves
    pub fn visible_move_count(&self) -> usize {
        self.visible_moves.len()
    }
}
