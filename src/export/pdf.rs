//! Print-sheet PDF assembly: one US-letter page per card image, each image
//! JPEG-embedded and fitted to the page with its aspect ratio preserved.
//! Unreadable images are skipped so one bad file does not sink the sheet.

use std::io::Cursor;
use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, Stream, dictionary};

use crate::foundation::error::{CardsmithError, CardsmithResult};

const PAGE_WIDTH: f32 = 612.0;
const PAGE_HEIGHT: f32 = 792.0;
const JPEG_QUALITY: u8 = 90;

/// Write `images` to a PDF at `out_path`, one page each. Returns the page
/// count. An empty input list is an error; a list where nothing could be
/// embedded is too.
#[tracing::instrument(skip_all, fields(images = images.len()))]
pub fn export_pdf(images: &[impl AsRef<Path>], out_path: &Path) -> CardsmithResult<usize> {
    if images.is_empty() {
        return Err(CardsmithError::data("no card images to export"));
    }
    if let Some(parent) = out_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| {
            CardsmithError::external_tool(format!("create '{}': {e}", parent.display()))
        })?;
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut kids: Vec<Object> = Vec::new();
    for path in images {
        let path = path.as_ref();
        match build_page(&mut doc, pages_id, path) {
            Ok(page_id) => kids.push(page_id.into()),
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "skipping image");
            }
        }
    }
    if kids.is_empty() {
        return Err(CardsmithError::data("none of the card images could be embedded"));
    }

    let count = kids.len();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    doc.save(out_path).map_err(|e| {
        CardsmithError::external_tool(format!("write pdf '{}': {e}", out_path.display()))
    })?;
    Ok(count)
}

fn build_page(doc: &mut Document, pages_id: ObjectId, path: &Path) -> CardsmithResult<ObjectId> {
    if !path.is_file() {
        return Err(CardsmithError::missing_asset(format!(
            "'{}' is not a file",
            path.display()
        )));
    }
    let img = image::open(path)
        .map_err(|e| CardsmithError::missing_asset(format!("decode '{}': {e}", path.display())))?
        .to_rgb8();
    let (width, height) = img.dimensions();

    let mut jpeg = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut Cursor::new(&mut jpeg), JPEG_QUALITY)
        .encode_image(&img)
        .map_err(|e| CardsmithError::render(format!("jpeg encode '{}': {e}", path.display())))?;

    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(width),
            "Height" => i64::from(height),
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        },
        jpeg,
    ));

    // Centered aspect-preserving fit on the page.
    let scale = (PAGE_WIDTH / width as f32).min(PAGE_HEIGHT / height as f32);
    let dw = width as f32 * scale;
    let dh = height as f32 * scale;
    let x = (PAGE_WIDTH - dw) / 2.0;
    let y = (PAGE_HEIGHT - dh) / 2.0;

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    dw.into(),
                    0f32.into(),
                    0f32.into(),
                    dh.into(),
                    x.into(),
                    y.into(),
                ],
            ),
            Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(
        dictionary! {},
        content
            .encode()
            .map_err(|e| CardsmithError::external_tool(format!("encode page content: {e}")))?,
    ));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! { "Im0" => image_id },
        },
    });
    Ok(page_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_png(path: &Path, w: u32, h: u32) {
        image::RgbaImage::from_pixel(w, h, image::Rgba([120, 10, 10, 255]))
            .save(path)
            .unwrap();
    }

    #[test]
    fn one_page_per_image() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.png");
        let b = dir.path().join("b.png");
        write_png(&a, 8, 8);
        write_png(&b, 4, 12);
        let out = dir.path().join("deck.pdf");

        let pages = export_pdf(&[&a, &b], &out).unwrap();
        assert_eq!(pages, 2);

        let bytes = std::fs::read(&out).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
        let doc = Document::load(&out).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }

    #[test]
    fn missing_images_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.png");
        write_png(&a, 8, 8);
        let out = dir.path().join("deck.pdf");

        let pages = export_pdf(&[a, dir.path().join("gone.png")], &out).unwrap();
        assert_eq!(pages, 1);
    }

    #[test]
    fn empty_list_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("deck.pdf");
        let err = export_pdf(&[] as &[&Path], &out).unwrap_err();
        assert!(err.to_string().contains("data error:"));
        assert!(!out.exists());
    }

    #[test]
    fn all_unreadable_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("deck.pdf");
        let err = export_pdf(&[dir.path().join("gone.png")], &out).unwrap_err();
        assert!(err.to_string().contains("data error:"));
    }
}
