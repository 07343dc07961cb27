//! G-Code parser producing the layer model
//!
//! The parser scans the text line by line, tracking position, distance
//! modes, units and a running byte offset. Moves are collected into a
//! pending layer which is closed according to the detected dialect's
//! layer boundary rule.

use gcodepreview_core::constants::{
    DEFAULT_ARC_SEGMENT_LENGTH, DEFAULT_MAX_ARC_SEGMENTS, MM_PER_INCH,
};
use gcodepreview_core::{Dialect, GcodeDocument, Layer, Move, MoveKind, ParseError, Point2D};
use serde::{Deserialize, Serialize};

use super::arc::{center_from_radius, ArcExpander, ArcExpanderConfig};
use super::command::GcodeLine;
use super::dialect::{DialectRegistry, DialectRules, LayerBoundary};

/// Parser tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Maximum chord length when linearising arcs (mm)
    pub arc_segment_length: f32,
    /// Upper bound of segments per arc
    pub max_arc_segments: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            arc_segment_length: DEFAULT_ARC_SEGMENT_LENGTH,
            max_arc_segments: DEFAULT_MAX_ARC_SEGMENTS,
        }
    }
}

/// G-Code parser
///
/// Stateless between calls; a single instance can parse any number of
/// files, including concurrently.
#[derive(Debug, Clone)]
pub struct GcodeParser {
    registry: DialectRegistry,
    arcs: ArcExpander,
}

impl GcodeParser {
    /// Create a parser with the built-in dialects
    pub fn new(config: ParserConfig) -> Self {
        Self::with_registry(config, DialectRegistry::with_defaults())
    }

    /// Create a parser with a custom dialect registry
    pub fn with_registry(config: ParserConfig, registry: DialectRegistry) -> Self {
        Self {
            registry,
            arcs: ArcExpander::new(ArcExpanderConfig {
                segment_length: config.arc_segment_length,
                max_segments: config.max_arc_segments,
            }),
        }
    }

    /// The dialect registry in use
    pub fn registry(&self) -> &DialectRegistry {
        &self.registry
    }

    /// Detect the dialect of a file without parsing it
    pub fn detect_dialect(&self, source: impl AsRef<[u8]>) -> Result<Dialect, ParseError> {
        self.registry
            .detect_bytes(source.as_ref())
            .map(|r| r.dialect)
            .ok_or(ParseError::UnsupportedDialect)
    }

    /// Parse complete G-code file content
    pub fn parse(&self, source: impl AsRef<[u8]>) -> Result<GcodeDocument, ParseError> {
        self.parse_with_progress(source, &mut |_| {})
    }

    /// Parse complete G-code file content, reporting the consumed fraction
    ///
    /// Byte offsets refer to the raw content, so they match the file
    /// positions reported by the printer even when lines are not valid
    /// UTF-8. Each line is decoded lossily for tokenizing only.
    ///
    /// `progress` is called whenever another whole percent of the input
    /// has been consumed.
    pub fn parse_with_progress(
        &self,
        source: impl AsRef<[u8]>,
        progress: &mut dyn FnMut(f32),
    ) -> Result<GcodeDocument, ParseError> {
        let bytes = source.as_ref();
        let recognizer = self
            .registry
            .detect_bytes(bytes)
            .ok_or(ParseError::UnsupportedDialect)?;
        tracing::debug!(dialect = %recognizer.dialect, bytes = bytes.len(), "Parsing G-code");

        let total = bytes.len() as u64;
        let mut state = ParseState::new(recognizer.rules, &self.arcs);
        let mut offset: u64 = 0;
        let mut line_number: u32 = 0;
        let mut last_percent = 0;

        for raw in bytes.split_inclusive(|&b| b == b'\n') {
            line_number += 1;
            let line = String::from_utf8_lossy(trim_line_end(raw));
            state.parse_line(&line, offset, line_number)?;
            offset += raw.len() as u64;

            let percent = offset * 100 / total.max(1);
            if percent != last_percent {
                last_percent = percent;
                progress(offset as f32 / total as f32);
            }
        }

        let layers = state.finish(total, line_number)?;
        let document = GcodeDocument::new(recognizer.dialect, layers, total);
        tracing::debug!(
            layers = document.layer_count(),
            moves = document.move_count(),
            "Parsed G-code"
        );
        Ok(document)
    }
}

fn trim_line_end(mut line: &[u8]) -> &[u8] {
    while let [rest @ .., b'\r' | b'\n'] = line {
        line = rest;
    }
    line
}

impl Default for GcodeParser {
    fn default() -> Self {
        Self::new(ParserConfig::default())
    }
}

/// Moves collected since the last closed layer
#[derive(Default)]
struct PendingLayer {
    moves: Vec<Move>,
    start_byte_offset: u64,
    extrusion_z: Option<f32>,
    first_move_z: Option<f32>,
}

struct ClosedLayer {
    z_height: f32,
    moves: Vec<Move>,
    start_byte_offset: u64,
}

struct ParseState<'a> {
    rules: DialectRules,
    arcs: &'a ArcExpander,
    x: f32,
    y: f32,
    z: f32,
    e: f32,
    absolute_xyz: bool,
    absolute_e: bool,
    unit_scale: f32,
    width: Option<f32>,
    last_extrusion_z: Option<f32>,
    pending: PendingLayer,
    closed: Vec<ClosedLayer>,
}

impl<'a> ParseState<'a> {
    fn new(rules: DialectRules, arcs: &'a ArcExpander) -> Self {
        Self {
            rules,
            arcs,
            x: 0.0,
            y: 0.0,
            z: 0.0,
            e: 0.0,
            absolute_xyz: true,
            absolute_e: true,
            unit_scale: 1.0,
            width: None,
            last_extrusion_z: None,
            pending: PendingLayer::default(),
            closed: Vec::new(),
        }
    }

    fn parse_line(&mut self, line: &str, offset: u64, line_number: u32) -> Result<(), ParseError> {
        let parsed = GcodeLine::parse(line);
        if let Some(comment) = parsed.comment {
            self.handle_comment(comment.trim(), offset, line_number)?;
        }

        let Some(command) = parsed.command else {
            return Ok(());
        };
        if command.subcode.is_some() {
            return Ok(());
        }

        match (command.letter, command.number) {
            ('G', 0 | 1) => self.linear_move(&parsed, offset, line_number),
            ('G', 2) => self.arc_move(&parsed, true, offset, line_number),
            ('G', 3) => self.arc_move(&parsed, false, offset, line_number),
            ('G', 20) => {
                self.unit_scale = MM_PER_INCH;
                Ok(())
            }
            ('G', 21) => {
                self.unit_scale = 1.0;
                Ok(())
            }
            ('G', 28) => {
                self.home(&parsed);
                Ok(())
            }
            ('G', 90) => {
                self.absolute_xyz = true;
                self.absolute_e = true;
                Ok(())
            }
            ('G', 91) => {
                self.absolute_xyz = false;
                self.absolute_e = false;
                Ok(())
            }
            ('G', 92) => self.set_position(&parsed, line_number),
            ('M', 82) => {
                self.absolute_e = true;
                Ok(())
            }
            ('M', 83) => {
                self.absolute_e = false;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn handle_comment(&mut self, comment: &str, offset: u64, line_number: u32) -> Result<(), ParseError> {
        match self.rules.layer_boundary {
            LayerBoundary::CuraLayerMarker => {
                if let Some(index) = comment.strip_prefix("LAYER:") {
                    index.trim().parse::<i64>().map_err(|_| {
                        ParseError::malformed(line_number, format!("invalid layer index '{}'", index.trim()))
                    })?;
                    self.close_layer(offset);
                }
            }
            LayerBoundary::LayerChangeComment => {
                if comment == "LAYER_CHANGE" {
                    self.close_layer(offset);
                }
            }
            LayerBoundary::ExtrusionZChange => {}
        }

        if self.rules.width_hints {
            if let Some(width) = comment.strip_prefix("WIDTH:") {
                match width.trim().parse::<f32>() {
                    Ok(width) if width.is_finite() && width > 0.0 => self.width = Some(width),
                    _ => tracing::warn!(line = line_number, "Ignoring invalid width hint '{}'", width),
                }
            }
        }
        Ok(())
    }

    /// Close the pending layer at `offset` if it contains an extrusion
    ///
    /// A pending layer without extrusions stays open and merges into the
    /// next one.
    fn close_layer(&mut self, offset: u64) {
        let Some(z_height) = self.pending.extrusion_z else {
            return;
        };
        let pending = std::mem::take(&mut self.pending);
        self.closed.push(ClosedLayer {
            z_height,
            moves: pending.moves,
            start_byte_offset: pending.start_byte_offset,
        });
        self.pending.start_byte_offset = offset;
    }

    fn axis(
        parsed: &GcodeLine<'_>,
        letter: char,
        line_number: u32,
    ) -> Result<Option<f32>, ParseError> {
        match parsed.param(letter) {
            Ok(Some(value)) if value.is_finite() => Ok(Some(value)),
            Ok(None) => Ok(None),
            Ok(Some(_)) | Err(_) => Err(ParseError::malformed(
                line_number,
                format!(
                    "invalid {} value '{}'",
                    letter,
                    parsed.raw_param(letter).unwrap_or_default()
                ),
            )),
        }
    }

    fn target(&self, value: Option<f32>, current: f32, absolute: bool) -> f32 {
        match value {
            Some(v) if absolute => v * self.unit_scale,
            Some(v) => current + v * self.unit_scale,
            None => current,
        }
    }

    fn linear_move(&mut self, parsed: &GcodeLine<'_>, offset: u64, line_number: u32) -> Result<(), ParseError> {
        let x = Self::axis(parsed, 'X', line_number)?;
        let y = Self::axis(parsed, 'Y', line_number)?;
        let z = Self::axis(parsed, 'Z', line_number)?;
        let e = Self::axis(parsed, 'E', line_number)?;

        let from = Point2D::new(self.x, self.y);
        let to = Point2D::new(
            self.target(x, self.x, self.absolute_xyz),
            self.target(y, self.y, self.absolute_xyz),
        );
        self.z = self.target(z, self.z, self.absolute_xyz);
        let e_delta = self.advance_e(e);

        self.x = to.x;
        self.y = to.y;
        self.record(&[to], from, e_delta, offset);
        Ok(())
    }

    fn arc_move(
        &mut self,
        parsed: &GcodeLine<'_>,
        clockwise: bool,
        offset: u64,
        line_number: u32,
    ) -> Result<(), ParseError> {
        let x = Self::axis(parsed, 'X', line_number)?;
        let y = Self::axis(parsed, 'Y', line_number)?;
        let z = Self::axis(parsed, 'Z', line_number)?;
        let e = Self::axis(parsed, 'E', line_number)?;
        let i = Self::axis(parsed, 'I', line_number)?;
        let j = Self::axis(parsed, 'J', line_number)?;
        let r = Self::axis(parsed, 'R', line_number)?;

        let from = Point2D::new(self.x, self.y);
        let to = Point2D::new(
            self.target(x, self.x, self.absolute_xyz),
            self.target(y, self.y, self.absolute_xyz),
        );

        let center = if i.is_some() || j.is_some() {
            Point2D::new(
                from.x + i.unwrap_or(0.0) * self.unit_scale,
                from.y + j.unwrap_or(0.0) * self.unit_scale,
            )
        } else if let Some(r) = r {
            center_from_radius(from, to, r * self.unit_scale, clockwise).ok_or_else(|| {
                ParseError::malformed(line_number, format!("arc radius {} cannot reach end point", r))
            })?
        } else {
            return Err(ParseError::malformed(line_number, "arc without I, J or R"));
        };

        self.z = self.target(z, self.z, self.absolute_xyz);
        let e_delta = self.advance_e(e);

        let points = self.arcs.expand_arc(from, to, center, clockwise);
        self.x = to.x;
        self.y = to.y;
        self.record(&points, from, e_delta, offset);
        Ok(())
    }

    fn advance_e(&mut self, e: Option<f32>) -> f32 {
        let next = self.target(e, self.e, self.absolute_e);
        let delta = next - self.e;
        self.e = next;
        delta
    }

    /// Classify and store the moves of one line
    fn record(&mut self, points: &[Point2D], from: Point2D, e_delta: f32, offset: u64) {
        let Some(&to) = points.last() else {
            return;
        };
        let has_xy_motion = to != from || points.len() > 1;
        let kind = if e_delta < 0.0 {
            MoveKind::Retract
        } else if e_delta > 0.0 && has_xy_motion {
            MoveKind::Extrude
        } else if has_xy_motion || e_delta > 0.0 {
            MoveKind::Travel
        } else {
            // Feed-rate changes and pure Z moves
            return;
        };

        if kind == MoveKind::Extrude {
            if self.rules.layer_boundary == LayerBoundary::ExtrusionZChange
                && self.last_extrusion_z != Some(self.z)
            {
                self.close_layer(offset);
            }
            self.last_extrusion_z = Some(self.z);
            if self.pending.extrusion_z.is_none() {
                self.pending.extrusion_z = Some(self.z);
            }
        }
        if self.pending.first_move_z.is_none() {
            self.pending.first_move_z = Some(self.z);
        }

        let extrusion_width = match kind {
            MoveKind::Extrude => self.width,
            _ => None,
        };
        let mut previous = from;
        for &point in points {
            self.pending.moves.push(Move {
                from: previous,
                to: point,
                kind,
                extrusion_width,
                source_byte_offset: offset,
            });
            previous = point;
        }
    }

    fn home(&mut self, parsed: &GcodeLine<'_>) {
        let any = ['X', 'Y', 'Z'].iter().any(|&axis| parsed.has_param(axis));
        if !any || parsed.has_param('X') {
            self.x = 0.0;
        }
        if !any || parsed.has_param('Y') {
            self.y = 0.0;
        }
        if !any || parsed.has_param('Z') {
            self.z = 0.0;
        }
    }

    fn set_position(&mut self, parsed: &GcodeLine<'_>, line_number: u32) -> Result<(), ParseError> {
        let x = Self::axis(parsed, 'X', line_number)?;
        let y = Self::axis(parsed, 'Y', line_number)?;
        let z = Self::axis(parsed, 'Z', line_number)?;
        let e = Self::axis(parsed, 'E', line_number)?;

        if x.is_none() && y.is_none() && z.is_none() && e.is_none() {
            self.x = 0.0;
            self.y = 0.0;
            self.z = 0.0;
            self.e = 0.0;
            return Ok(());
        }
        if let Some(x) = x {
            self.x = x * self.unit_scale;
        }
        if let Some(y) = y {
            self.y = y * self.unit_scale;
        }
        if let Some(z) = z {
            self.z = z * self.unit_scale;
        }
        if let Some(e) = e {
            self.e = e * self.unit_scale;
        }
        Ok(())
    }

    /// Flush the pending layer and lay out contiguous byte ranges
    fn finish(mut self, byte_length: u64, line_count: u32) -> Result<Vec<Layer>, ParseError> {
        let pending = std::mem::take(&mut self.pending);
        if !pending.moves.is_empty() {
            if let Some(z_height) = pending.extrusion_z {
                self.closed.push(ClosedLayer {
                    z_height,
                    moves: pending.moves,
                    start_byte_offset: pending.start_byte_offset,
                });
            } else if let Some(last) = self.closed.last_mut() {
                // Trailing travel and retractions belong to the last layer
                last.moves.extend(pending.moves);
            } else {
                self.closed.push(ClosedLayer {
                    z_height: pending.first_move_z.unwrap_or(self.z),
                    moves: pending.moves,
                    start_byte_offset: pending.start_byte_offset,
                });
            }
        }

        if self.closed.is_empty() {
            return Err(ParseError::malformed(line_count.max(1), "file contains no moves"));
        }

        let starts: Vec<u64> = self.closed.iter().map(|l| l.start_byte_offset).collect();
        let layers = self
            .closed
            .into_iter()
            .enumerate()
            .map(|(index, layer)| {
                let start = if index == 0 { 0 } else { layer.start_byte_offset };
                let end = starts.get(index + 1).copied().unwrap_or(byte_length);
                Layer::new(layer.z_height, layer.moves, start, end)
            })
            .collect();
        Ok(layers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> GcodeDocument {
        GcodeParser::default().parse(text).unwrap()
    }

    #[test]
    fn test_generic_layers_from_z_changes() {
        let doc = parse(
            "G28\nG1 Z0.2\nG1 X10 Y0 E1\nG1 X10 Y10 E2\nG1 Z0.4\nG1 X0 Y10 E3\nG1 X0 Y0 E4\n",
        );
        assert_eq!(doc.dialect(), Dialect::Generic);
        assert_eq!(doc.layer_count(), 2);
        assert_eq!(doc.layer(0).unwrap().z_height(), 0.2);
        assert_eq!(doc.layer(1).unwrap().z_height(), 0.4);
        assert_eq!(doc.move_count(), 4);
        assert!(doc.moves().all(|m| m.kind == MoveKind::Extrude));
    }

    #[test]
    fn test_byte_offsets_count_crlf() {
        let text = "G1 X1 Y0 E1\r\nG1 X2 Y0 E2\r\n";
        let doc = parse(text);
        let offsets: Vec<u64> = doc.moves().map(|m| m.source_byte_offset).collect();
        assert_eq!(offsets, vec![0, 13]);
        assert_eq!(doc.byte_length(), text.len() as u64);
        assert_eq!(doc.layer(0).unwrap().end_byte_offset(), text.len() as u64);
    }

    #[test]
    fn test_move_classification() {
        let doc = parse("G1 X10 Y0\nG1 X20 Y0 E1\nG1 E0.2\nG1 E0.5\nG1 F1200\nG1 Z5\n");
        let kinds: Vec<MoveKind> = doc.moves().map(|m| m.kind).collect();
        assert_eq!(
            kinds,
            vec![MoveKind::Travel, MoveKind::Extrude, MoveKind::Retract, MoveKind::Travel]
        );
        let retract = doc.moves().nth(2).unwrap();
        assert_eq!(retract.from, retract.to);
    }

    #[test]
    fn test_relative_extrusion_and_positioning() {
        let doc = parse("M83\nG1 X10 Y0 E1\nG1 X20 Y0 E1\nG91\nG1 X5 Y5 E1\n");
        assert_eq!(doc.move_count(), 3);
        let last = doc.moves().last().unwrap();
        assert_eq!(last.to, Point2D::new(25.0, 5.0));
        assert_eq!(last.kind, MoveKind::Extrude);
    }

    #[test]
    fn test_g92_resets_extruder() {
        let doc = parse("G1 X10 Y0 E5\nG92 E0\nG1 X20 Y0 E1\n");
        assert!(doc.moves().all(|m| m.kind == MoveKind::Extrude));
    }

    #[test]
    fn test_inch_units() {
        let doc = parse("G20\nG1 X1 Y1 E0.1\n");
        let m = doc.moves().next().unwrap();
        assert!((m.to.x - 25.4).abs() < 1e-4);
        assert!((m.to.y - 25.4).abs() < 1e-4);
    }

    #[test]
    fn test_cura_layer_markers() {
        let text = ";FLAVOR:Marlin\nG0 X5 Y5 Z0.3\n;LAYER:0\nG1 X10 Y0 E1\n;LAYER:1\nG1 X10 Y10 E2\n";
        let doc = parse(text);
        assert_eq!(doc.dialect(), Dialect::Cura);
        assert_eq!(doc.layer_count(), 2);
        // The travel before the first marker merges into layer 0
        assert_eq!(doc.layer(0).unwrap().move_count(), 2);
        assert_eq!(doc.layer(0).unwrap().start_byte_offset(), 0);
        let marker = text.find(";LAYER:1").unwrap() as u64;
        assert_eq!(doc.layer(0).unwrap().end_byte_offset(), marker);
        assert_eq!(doc.layer(1).unwrap().start_byte_offset(), marker);
    }

    #[test]
    fn test_invalid_cura_layer_index() {
        let err = GcodeParser::default()
            .parse(";FLAVOR:Marlin\n;LAYER:abc\nG1 X1 Y1 E1\n")
            .unwrap_err();
        assert!(matches!(err, ParseError::MalformedInput { line_number: 2, .. }));
    }

    #[test]
    fn test_prusa_width_hints() {
        let text = "; generated by PrusaSlicer 2.6.0\n;LAYER_CHANGE\n;Z:0.2\n;WIDTH:0.45\nG1 Z0.2\nG1 X10 Y0 E1\nG1 X20 Y0\n";
        let doc = parse(text);
        assert_eq!(doc.dialect(), Dialect::PrusaSlicer);
        let moves: Vec<&Move> = doc.moves().collect();
        assert_eq!(moves[0].extrusion_width, Some(0.45));
        assert_eq!(moves[1].extrusion_width, None);
    }

    #[test]
    fn test_arc_segments_share_offset() {
        let doc = parse("G1 X10 Y0 E1\nG3 X0 Y10 I-10 J0 E2\n");
        let arc: Vec<&Move> = doc.moves().skip(1).collect();
        assert!(arc.len() > 2);
        assert!(arc.iter().all(|m| m.source_byte_offset == 13));
        assert!(arc.iter().all(|m| m.kind == MoveKind::Extrude));
        assert_eq!(arc.last().unwrap().to, Point2D::new(0.0, 10.0));
        assert_eq!(arc[0].from, Point2D::new(10.0, 0.0));
    }

    #[test]
    fn test_arc_without_center_is_malformed() {
        let err = GcodeParser::default().parse("G1 X1 Y1\nG2 X5 Y5 E1\n").unwrap_err();
        assert_eq!(err, ParseError::malformed(2, "arc without I, J or R"));
    }

    #[test]
    fn test_invalid_axis_value_is_malformed() {
        let err = GcodeParser::default().parse("G1 X1 Y1\nG1 X1-2 Y3\n").unwrap_err();
        assert!(matches!(err, ParseError::MalformedInput { line_number: 2, .. }));
    }

    #[test]
    fn test_unsupported_dialect() {
        let err = GcodeParser::default().parse("hello\nworld\n").unwrap_err();
        assert_eq!(err, ParseError::UnsupportedDialect);
    }

    #[test]
    fn test_no_moves_is_malformed() {
        let err = GcodeParser::default().parse("G1 F1200\nG1 Z1\n").unwrap_err();
        assert!(matches!(err, ParseError::MalformedInput { .. }));
    }

    #[test]
    fn test_travel_only_file_is_one_layer() {
        let doc = parse("G0 X1 Y1\nG0 X2 Y2\n");
        assert_eq!(doc.layer_count(), 1);
        assert_eq!(doc.move_count(), 2);
    }

    #[test]
    fn test_trailing_travel_joins_last_layer() {
        let doc = parse("G1 Z0.2\nG1 X10 Y0 E1\nG1 E0.5\nG0 X0 Y0\n");
        assert_eq!(doc.layer_count(), 1);
        assert_eq!(doc.layer(0).unwrap().move_count(), 3);
    }

    #[test]
    fn test_progress_reports_whole_percent() {
        let text = "G1 X1 Y1 E1\n".repeat(1000);
        let mut reports = Vec::new();
        GcodeParser::default()
            .parse_with_progress(&text, &mut |p| reports.push(p))
            .unwrap();
        assert_eq!(reports.len(), 100);
        assert!(reports.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(reports.last().copied(), Some(1.0));
    }

    #[test]
    fn test_offsets_count_raw_bytes_of_non_utf8_lines() {
        // Windows-1252 degree sign in a slicer comment
        let source: &[u8] = b"; temp 210\xb0C\nG1 X1 Y0 E1\nG1 Z0.4\nG1 X2 Y0 E2\n";
        let doc = GcodeParser::default().parse(source).unwrap();

        assert_eq!(doc.byte_length(), source.len() as u64);
        let offsets: Vec<u64> = doc.moves().map(|m| m.source_byte_offset).collect();
        assert_eq!(offsets, vec![13, 33]);
        assert_eq!(doc.layer_count(), 2);
        assert_eq!(doc.layer(1).unwrap().start_byte_offset(), 33);
        assert_eq!(doc.locate_byte_offset(33), Some((1, 0)));
    }

    #[test]
    fn test_crlf_offsets() {
        let doc = parse("G1 X1 Y0 E1\r\nG1 X2 Y0 E2\r\n");
        let offsets: Vec<u64> = doc.moves().map(|m| m.source_byte_offset).collect();
        assert_eq!(offsets, vec![0, 13]);
        assert_eq!(doc.byte_length(), 26);
    }
}
