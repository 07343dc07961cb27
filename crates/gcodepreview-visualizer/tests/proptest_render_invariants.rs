//! Property-based invariant tests for parsing and cursor mapping.
//!
//! 1. Source byte offsets are non-decreasing in playback order
//! 2. Layers tile the source text
//! 3. The byte-offset cursor never moves backwards
//! 4. Layer progress always shows between one move and the whole layer

use gcodepreview_core::GcodeDocument;
use gcodepreview_visualizer::{for_file_location, for_layer_progress, GcodeParser};
use proptest::prelude::*;

/// Layers described by their move count, rendered as generic G-code
fn print_strategy() -> impl Strategy<Value = (Vec<usize>, bool)> {
    (prop::collection::vec(1usize..20, 1..12), any::<bool>())
}

fn render_print(layers: &[usize], crlf: bool) -> String {
    let eol = if crlf { "\r\n" } else { "\n" };
    let mut text = format!("; test print{eol}G28{eol}");
    let mut e = 0.0;
    for (layer, moves) in layers.iter().enumerate() {
        text.push_str(&format!("G1 Z{:.1}{eol}", 0.2 * (layer + 1) as f32));
        text.push_str(&format!("G0 X0 Y{}{eol}", layer));
        for k in 0..*moves {
            e += 1.0;
            text.push_str(&format!("G1 X{} Y{} E{}{eol}", k + 1, layer, e));
        }
    }
    text
}

fn parse(layers: &[usize], crlf: bool) -> (String, GcodeDocument) {
    let text = render_print(layers, crlf);
    let doc = GcodeParser::default().parse(&text).unwrap();
    (text, doc)
}

proptest! {
    #[test]
    fn offsets_are_non_decreasing((layers, crlf) in print_strategy()) {
        let (_, doc) = parse(&layers, crlf);
        let offsets: Vec<u64> = doc.moves().map(|m| m.source_byte_offset).collect();
        prop_assert!(offsets.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn layers_tile_the_source((layers, crlf) in print_strategy()) {
        let (text, doc) = parse(&layers, crlf);
        prop_assert_eq!(doc.layer_count(), layers.len());
        prop_assert_eq!(doc.layers()[0].start_byte_offset(), 0);
        for pair in doc.layers().windows(2) {
            prop_assert_eq!(pair[0].end_byte_offset(), pair[1].start_byte_offset());
        }
        prop_assert_eq!(doc.layers().last().unwrap().end_byte_offset(), text.len() as u64);
    }

    #[test]
    fn file_cursor_is_monotonic(
        (layers, crlf) in print_strategy(),
        a in 0.0f64..1.0,
        b in 0.0f64..1.0,
    ) {
        let (text, doc) = parse(&layers, crlf);
        let len = text.len() as f64;
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let first = for_file_location(&doc, (lo * len) as u64).unwrap();
        let second = for_file_location(&doc, (hi * len) as u64).unwrap();
        prop_assert!(
            (first.layer_number, first.visible_move_count())
                <= (second.layer_number, second.visible_move_count())
        );
    }

    #[test]
    fn layer_progress_is_bounded(
        (layers, crlf) in print_strategy(),
        layer_seed in any::<usize>(),
        progress in -0.5f32..1.5,
    ) {
        let (_, doc) = parse(&layers, crlf);
        let layer_number = layer_seed % doc.layer_count();
        let count = doc.layer(layer_number).unwrap().move_count();
        let ctx = for_layer_progress(&doc, layer_number, progress).unwrap();
        prop_assert!(ctx.visible_move_count() >= 1);
        prop_assert!(ctx.visible_move_count() <= count);
        prop_assert!((0.0..=1.0).contains(&ctx.layer_progress));
    }
}
