//! CLI smoke tests against the built binary.

use std::path::Path;
use std::process::Command;

fn cardsmith() -> Command {
    Command::new(env!("CARGO_BIN_EXE_cardsmith"))
}

#[test]
fn init_template_writes_a_loadable_template() {
    let dir = tempfile::tempdir().unwrap();
    let template = dir.path().join("template.json");

    let out = cardsmith()
        .args(["init-template", "--out"])
        .arg(&template)
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(template.is_file());

    cardsmith::LayoutDocument::load(&template).unwrap();
}

#[test]
fn card_then_pdf_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let template = dir.path().join("template.json");
    cardsmith::LayoutDocument::default_template()
        .save(&template)
        .unwrap();

    let deck = dir.path().join("deck.csv");
    std::fs::write(&deck, "name,type\nRex,unit\n").unwrap();

    let card_png = dir.path().join("rex.png");
    let out = cardsmith()
        .args(["card", "--template"])
        .arg(&template)
        .arg("--deck")
        .arg(&deck)
        .args(["--index", "0", "--out"])
        .arg(&card_png)
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(card_png.is_file());

    let pdf = dir.path().join("sheet.pdf");
    let out = cardsmith()
        .arg("pdf")
        .arg(&card_png)
        .arg("--out")
        .arg(&pdf)
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(std::fs::read(&pdf).unwrap().starts_with(b"%PDF-"));
}

#[test]
fn render_exports_a_directory_of_cards() {
    let dir = tempfile::tempdir().unwrap();
    let template = dir.path().join("template.json");
    cardsmith::LayoutDocument::default_template()
        .save(&template)
        .unwrap();
    let deck = dir.path().join("deck.csv");
    std::fs::write(&deck, "name,type\nRex,unit\nBolt,spell\n").unwrap();
    let out_dir = dir.path().join("export");

    let out = cardsmith()
        .args(["render", "--template"])
        .arg(&template)
        .arg("--deck")
        .arg(&deck)
        .arg("--out-dir")
        .arg(&out_dir)
        .output()
        .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let pngs = std::fs::read_dir(&out_dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| {
            Path::new(&e.file_name()).extension().and_then(|x| x.to_str()) == Some("png")
        })
        .count();
    assert_eq!(pngs, 2);
}

#[test]
fn bad_deck_extension_fails_with_context() {
    let dir = tempfile::tempdir().unwrap();
    let template = dir.path().join("template.json");
    cardsmith::LayoutDocument::default_template()
        .save(&template)
        .unwrap();
    let deck = dir.path().join("deck.toml");
    std::fs::write(&deck, "").unwrap();

    let out = cardsmith()
        .args(["card", "--template"])
        .arg(&template)
        .arg("--deck")
        .arg(&deck)
        .args(["--out", "ignored.png"])
        .output()
        .unwrap();
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("load deck"), "stderr: {stderr}");
}
