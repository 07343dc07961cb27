//! Fifty layer print scrubbed with both cursors

use gcodepreview_core::{Dialect, MoveKind};
use gcodepreview_visualizer::{for_file_location, for_layer_progress, GcodeParser, RenderCursor};

fn fifty_layer_print() -> String {
    let mut text = String::from("G28\nG90\nM82\nG92 E0\n");
    let mut e = 0.0;
    for layer in 0..50 {
        text.push_str(&format!("G1 Z{:.2} F600\n", 0.2 * (layer + 1) as f32));
        for k in 0..24 {
            e += 0.5;
            text.push_str(&format!("G1 X{} Y{} E{:.3}\n", k + 1, layer, e));
        }
    }
    text
}

#[test]
fn test_fifty_layers_of_twenty_four_moves() {
    let text = fifty_layer_print();
    let doc = GcodeParser::default().parse(&text).unwrap();

    assert_eq!(doc.dialect(), Dialect::Generic);
    assert_eq!(doc.layer_count(), 50);
    assert_eq!(doc.move_count(), 50 * 24);
    assert!(doc.layers().iter().all(|l| l.move_count() == 24));
    assert!(doc.moves().all(|m| m.kind == MoveKind::Extrude));

    let ctx = for_layer_progress(&doc, 25, 0.5).unwrap();
    assert_eq!(ctx.layer_number, 25);
    assert_eq!(ctx.layer_count, 50);
    assert_eq!(ctx.visible_move_count(), 12);
    assert_eq!(ctx.visible_moves[..], doc.layer(25).unwrap().moves()[..12]);
    assert!(ctx.print_head_position.is_none());
}

#[test]
fn test_end_of_file_shows_last_layer_complete() {
    let text = fifty_layer_print();
    let doc = GcodeParser::default().parse(&text).unwrap();

    let ctx = RenderCursor::FileLocation {
        byte_offset: text.len() as u64,
    }
    .render_context(&doc)
    .unwrap();
    assert_eq!(ctx.layer_number, 49);
    assert_eq!(ctx.visible_move_count(), 24);
    assert!((ctx.layer_z_height - 10.0).abs() < 1e-4);
}

#[test]
fn test_header_offset_shows_nothing() {
    let text = fifty_layer_print();
    let doc = GcodeParser::default().parse(&text).unwrap();

    let ctx = for_file_location(&doc, 3).unwrap();
    assert_eq!(ctx.layer_number, 0);
    assert_eq!(ctx.layer_progress, 0.0);
    assert!(ctx.visible_moves.is_empty());
}
