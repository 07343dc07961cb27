//! Render context factory
//!
//! Turns a cursor into the slice of a [`GcodeDocument`] a painter needs to
//! draw. Two cursors exist: a byte offset into the source file (following
//! a live print) and a manual layer/progress pair (scrubbing).

use gcodepreview_core::{GcodeDocument, RenderContext, RenderError};
use serde::{Deserialize, Serialize};

/// Position within a document to render
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RenderCursor {
    /// Follow the printer's position in the source file
    FileLocation {
        /// Byte offset into the source text
        byte_offset: u64,
    },
    /// Manually selected layer and fraction of its moves
    LayerProgress {
        /// Layer index (0-based)
        layer_number: usize,
        /// Fraction of the layer, clamped to `[0, 1]`
        progress: f32,
    },
}

impl RenderCursor {
    /// Compute the render context for this cursor
    pub fn render_context(&self, document: &GcodeDocument) -> Result<RenderContext, RenderError> {
        match *self {
            RenderCursor::FileLocation { byte_offset } => for_file_location(document, byte_offset),
            RenderCursor::LayerProgress {
                layer_number,
                progress,
            } => for_layer_progress(document, layer_number, progress),
        }
    }
}

/// Render context for a byte offset in the source file
///
/// Selects the last move whose source offset is at or before
/// `byte_offset`. An offset before the first move yields layer 0 with
/// nothing visible.
pub fn for_file_location(document: &GcodeDocument, byte_offset: u64) -> Result<RenderContext, RenderError> {
    let first_layer = document.layer(0).ok_or(RenderError::EmptyDocument)?;

    let Some((layer_number, move_index)) = document.locate_byte_offset(byte_offset) else {
        return Ok(RenderContext {
            layer_count: document.layer_count(),
            layer_number: 0,
            layer_progress: 0.0,
            layer_z_height: first_layer.z_height(),
            visible_moves: Vec::new(),
            print_head_position: None,
        });
    };

    let layer = &document.layers()[layer_number];
    let moves = layer.moves();
    let visible_moves = moves[..=move_index].to_vec();
    Ok(RenderContext {
        layer_count: document.layer_count(),
        layer_number,
        layer_progress: move_index as f32 / moves.len() as f32,
        layer_z_height: layer.z_height(),
        print_head_position: visible_moves.last().map(|m| m.to),
        visible_moves,
    })
}

/// Render context for a manually selected layer and progress
///
/// At least the first move of the layer is always visible; progress 1
/// shows the whole layer. NaN progress is treated as 0.
pub fn for_layer_progress(
    document: &GcodeDocument,
    layer_number: usize,
    progress: f32,
) -> Result<RenderContext, RenderError> {
    if document.is_empty() {
        return Err(RenderError::EmptyDocument);
    }
    let layer = document
        .layer(layer_number)
        .ok_or(RenderError::LayerOutOfRange {
            layer: layer_number,
            layer_count: document.layer_count(),
        })?;

    let progress = if progress.is_nan() {
        0.0
    } else {
        progress.clamp(0.0, 1.0)
    };
    let count = layer.move_count();
    let visible = ((progress * count as f32).floor() as usize).max(1).min(count);

    Ok(RenderContext {
        layer_count: document.layer_count(),
        layer_number,
        layer_progress: progress,
        layer_z_height: layer.z_height(),
        visible_moves: layer.moves()[..visible].to_vec(),
        print_head_position: None,
    })
}
