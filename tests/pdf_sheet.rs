//! Print-sheet assembly from rendered card PNGs.

use std::path::Path;

use cardsmith::export::pdf::export_pdf;

fn write_png(path: &Path, w: u32, h: u32) {
    image::RgbaImage::from_pixel(w, h, image::Rgba([40, 80, 120, 255]))
        .save(path)
        .unwrap();
}

#[test]
fn sheet_has_one_page_per_card() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.png");
    let b = dir.path().join("b.png");
    let c = dir.path().join("c.png");
    write_png(&a, 32, 44);
    write_png(&b, 44, 32);
    write_png(&c, 10, 10);
    let out = dir.path().join("sheet.pdf");

    let pages = export_pdf(&[a, b, c], &out).unwrap();
    assert_eq!(pages, 3);

    let bytes = std::fs::read(&out).unwrap();
    assert!(bytes.starts_with(b"%PDF-"));

    let doc = lopdf::Document::load(&out).unwrap();
    assert_eq!(doc.get_pages().len(), 3);
}

#[test]
fn unreadable_card_is_skipped_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.png");
    write_png(&a, 16, 16);
    let bogus = dir.path().join("bogus.png");
    std::fs::write(&bogus, b"not a png").unwrap();
    let out = dir.path().join("sheet.pdf");

    let pages = export_pdf(&[a, bogus], &out).unwrap();
    assert_eq!(pages, 1);
}
