//! Arc linearisation
//!
//! Converts G2/G3 arcs into chord end points so arcs can be stored as
//! ordinary moves.

use gcodepreview_core::constants::{DEFAULT_ARC_SEGMENT_LENGTH, DEFAULT_MAX_ARC_SEGMENTS};
use gcodepreview_core::Point2D;
use std::f32::consts::PI;

/// Arc expansion configuration
#[derive(Debug, Clone, Copy)]
pub struct ArcExpanderConfig {
    /// Maximum chord length in mm
    pub segment_length: f32,
    /// Upper bound of chords per arc
    pub max_segments: usize,
}

impl Default for ArcExpanderConfig {
    fn default() -> Self {
        Self {
            segment_length: DEFAULT_ARC_SEGMENT_LENGTH,
            max_segments: DEFAULT_MAX_ARC_SEGMENTS,
        }
    }
}

/// Converts arcs to line segments
#[derive(Debug, Clone, Default)]
pub struct ArcExpander {
    config: ArcExpanderConfig,
}

impl ArcExpander {
    /// Create a new arc expander
    pub fn new(config: ArcExpanderConfig) -> Self {
        Self { config }
    }

    /// Expand an arc into chord end points
    ///
    /// The returned points exclude `start` and always end exactly at `end`.
    /// Coincident start and end describe a full circle.
    pub fn expand_arc(&self, start: Point2D, end: Point2D, center: Point2D, clockwise: bool) -> Vec<Point2D> {
        let radius_x = start.x - center.x;
        let radius_y = start.y - center.y;
        let radius = (radius_x * radius_x + radius_y * radius_y).sqrt();
        if !radius.is_finite() || radius < 1e-4 {
            return vec![end];
        }

        let start_angle = radius_y.atan2(radius_x);
        let end_angle = (end.y - center.y).atan2(end.x - center.x);

        let mut angle_delta = end_angle - start_angle;
        if clockwise && angle_delta >= 0.0 {
            angle_delta -= 2.0 * PI;
        } else if !clockwise && angle_delta <= 0.0 {
            angle_delta += 2.0 * PI;
        }

        let arc_length = angle_delta.abs() * radius;
        let segment_length = self.config.segment_length.max(f32::EPSILON);
        let segments = ((arc_length / segment_length).ceil() as usize).clamp(2, self.config.max_segments.max(2));

        let mut points = Vec::with_capacity(segments);
        for i in 1..segments {
            let fraction = i as f32 / segments as f32;
            let angle = start_angle + angle_delta * fraction;
            points.push(Point2D::new(
                center.x + radius * angle.cos(),
                center.y + radius * angle.sin(),
            ));
        }
        points.push(end);
        points
    }
}

/// Compute the centre of an R-form arc
///
/// A negative radius selects the arc longer than a half circle. Returns
/// `None` when the radius cannot span the chord.
pub fn center_from_radius(start: Point2D, end: Point2D, radius: f32, clockwise: bool) -> Option<Point2D> {
    let x = end.x - start.x;
    let y = end.y - start.y;
    let chord = (x * x + y * y).sqrt();
    if chord < 1e-6 {
        return None;
    }

    let mut h_x2_div_d = 4.0 * radius * radius - x * x - y * y;
    if h_x2_div_d < 0.0 {
        // Allow for rounding in slicer output
        if h_x2_div_d < -1e-3 * radius * radius {
            return None;
        }
        h_x2_div_d = 0.0;
    }
    h_x2_div_d = -h_x2_div_d.sqrt() / chord;
    if !clockwise {
        h_x2_div_d = -h_x2_div_d;
    }
    if radius < 0.0 {
        h_x2_div_d = -h_x2_div_d;
    }

    Some(Point2D::new(
        start.x + 0.5 * (x - y * h_x2_div_d),
        start.y + 0.5 * (y + x * h_x2_div_d),
    ))
}
