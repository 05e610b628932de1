//! PNG output with the document DPI recorded in a `pHYs` chunk, so print
//! tools see the intended physical card size. Pixels are never rescaled.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use crate::foundation::error::{CardsmithError, CardsmithResult};

const INCHES_PER_METER: f64 = 39.3701;

pub fn write_png_with_dpi(path: &Path, image: &image::RgbaImage, dpi: u32) -> CardsmithResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .map_err(|e| CardsmithError::render(format!("create '{}': {e}", parent.display())))?;
    }

    let file = File::create(path)
        .map_err(|e| CardsmithError::render(format!("create '{}': {e}", path.display())))?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), image.width(), image.height());
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    if dpi > 0 {
        let ppu = (f64::from(dpi) * INCHES_PER_METER).round() as u32;
        encoder.set_pixel_dims(Some(png::PixelDimensions {
            xppu: ppu,
            yppu: ppu,
            unit: png::Unit::Meter,
        }));
    }

    let mut writer = encoder
        .write_header()
        .map_err(|e| CardsmithError::render(format!("write '{}': {e}", path.display())))?;
    writer
        .write_image_data(image.as_raw())
        .map_err(|e| CardsmithError::render(format!("write '{}': {e}", path.display())))?;
    Ok(())
}
