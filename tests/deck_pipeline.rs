//! End-to-end deck rendering: deck file on disk -> loader -> projection ->
//! compositor -> PNG batch.

use std::path::Path;
use std::sync::atomic::AtomicBool;

use cardsmith::{
    Compositor, FontLibrary, LayoutDocument,
    data::loader::load_deck,
    export::deck::export_deck,
};

fn write_png(path: &Path, rgba: [u8; 4]) {
    image::RgbaImage::from_pixel(6, 4, image::Rgba(rgba))
        .save(path)
        .unwrap();
}

#[test]
fn csv_deck_renders_to_one_png_per_card() {
    let dir = tempfile::tempdir().unwrap();
    let deck_path = dir.path().join("deck.csv");
    std::fs::write(
        &deck_path,
        "name,type,description\nIron Wyrm,unit,Breathes rust.\nBolt,spell,Zap.\n",
    )
    .unwrap();

    let doc = LayoutDocument::default_template();
    let deck = load_deck(&deck_path).unwrap();
    let mut compositor = Compositor::new(FontLibrary::empty());

    let out_dir = dir.path().join("export");
    let report = export_deck(
        &doc,
        &deck,
        &mut compositor,
        &out_dir,
        &AtomicBool::new(false),
        |_, _, _| {},
    )
    .unwrap();

    assert!(report.is_clean());
    assert_eq!(report.written.len(), 2);
    assert!(out_dir.join("iron_wyrm-001.png").is_file());
    assert!(out_dir.join("bolt-002.png").is_file());

    let card = image::open(&report.written[0]).unwrap().to_rgba8();
    assert_eq!(card.dimensions(), (744, 1038));
    // Template background outside every element.
    assert_eq!(card.get_pixel(5, 5).0, [28, 28, 28, 255]);
    // No art on disk, so the artwork box carries the placeholder fill.
    assert_eq!(card.get_pixel(300, 300).0, [45, 60, 75, 255]);
}

#[test]
fn autodetected_art_lands_in_the_artwork_box() {
    let dir = tempfile::tempdir().unwrap();
    let decks = dir.path().join("decks");
    let arts = dir.path().join("arts");
    std::fs::create_dir_all(&decks).unwrap();
    std::fs::create_dir_all(&arts).unwrap();
    write_png(&arts.join("Rex.png"), [200, 30, 30, 255]);

    let deck_path = decks.join("deck.json");
    std::fs::write(&deck_path, r#"[{"name": "Rex"}]"#).unwrap();

    let doc = LayoutDocument::default_template();
    let deck = load_deck(&deck_path).unwrap();
    let mut compositor = Compositor::new(FontLibrary::empty());

    let out_dir = dir.path().join("export");
    let report = export_deck(
        &doc,
        &deck,
        &mut compositor,
        &out_dir,
        &AtomicBool::new(false),
        |_, _, _| {},
    )
    .unwrap();
    assert_eq!(report.written.len(), 1);

    let card = image::open(&report.written[0]).unwrap().to_rgba8();
    // The artwork box is 520x320 at (112,160); a 6x4 source letterboxes to
    // 480x320 centered, so the box center is art, not placeholder.
    let center = card.get_pixel(112 + 260, 160 + 160).0;
    assert!(center[0] > 150, "expected art red at center, got {center:?}");
    assert_ne!(center, [45, 60, 75, 255]);
}

#[test]
fn batch_of_five_with_one_bad_row_writes_four() {
    let dir = tempfile::tempdir().unwrap();
    let mut doc = LayoutDocument::default_template();
    // Cards without their own description fall back to this malformed
    // template and fail projection.
    if let cardsmith::ElementSpec::Text(text) = doc.items.get_mut("description").unwrap() {
        text.text = "oops {".to_string();
    }

    let deck_path = dir.path().join("deck.json");
    std::fs::write(
        &deck_path,
        r#"[
            {"name": "A", "description": "ok"},
            {"name": "B", "description": "ok"},
            {"name": "C"},
            {"name": "D", "description": "ok"},
            {"name": "E", "description": "ok"}
        ]"#,
    )
    .unwrap();

    let deck = load_deck(&deck_path).unwrap();
    let mut compositor = Compositor::new(FontLibrary::empty());
    let report = export_deck(
        &doc,
        &deck,
        &mut compositor,
        &dir.path().join("export"),
        &AtomicBool::new(false),
        |_, _, _| {},
    )
    .unwrap();

    assert_eq!(report.written.len(), 4);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].name, "C");
    assert!(report.failures[0].error.contains("render failure:"));
}
