//! Premultiplied RGBA8 pixel surface and the blend primitives the
//! compositor draws with. Straight alpha exists only at the PNG boundary.

use crate::assets::decode::unpremultiply_rgba8_in_place;
use crate::foundation::error::{CardsmithError, CardsmithResult};

pub type PremulRgba8 = [u8; 4];

/// Source-over for premultiplied pixels with an extra per-draw opacity.
pub fn over(dst: PremulRgba8, src: PremulRgba8, opacity: f32) -> PremulRgba8 {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 || src[3] == 0 {
        return dst;
    }

    let op = ((opacity * 255.0).round() as i32).clamp(0, 255) as u16;
    let sa = mul_div255(u16::from(src[3]), op);
    if sa == 0 {
        return dst;
    }

    let inv = 255u16 - u16::from(sa);

    let mut out = [0u8; 4];
    out[3] = mul_div255(u16::from(src[3]), op).saturating_add(mul_div255(u16::from(dst[3]), inv));

    for i in 0..3 {
        let sc = mul_div255(u16::from(src[i]), op);
        let dc = mul_div255(u16::from(dst[i]), inv);
        out[i] = sc.saturating_add(dc);
    }
    out
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

/// Scale a premultiplied pixel by a 0..255 coverage value.
pub fn scale_coverage(px: PremulRgba8, coverage: u8) -> PremulRgba8 {
    let c = u16::from(coverage);
    [
        mul_div255(u16::from(px[0]), c),
        mul_div255(u16::from(px[1]), c),
        mul_div255(u16::from(px[2]), c),
        mul_div255(u16::from(px[3]), c),
    ]
}

#[derive(Clone, Debug)]
pub struct Surface {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Surface {
    pub fn new(width: u32, height: u32) -> CardsmithResult<Self> {
        let len = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(4))
            .ok_or_else(|| CardsmithError::render("surface size overflow"))?;
        Ok(Self {
            width,
            height,
            data: vec![0u8; len],
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn pixel(&self, x: u32, y: u32) -> PremulRgba8 {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }

    pub fn fill(&mut self, px: PremulRgba8) {
        for chunk in self.data.chunks_exact_mut(4) {
            chunk.copy_from_slice(&px);
        }
    }

    /// Blend a solid rectangle, clipped to the surface.
    pub fn fill_rect(&mut self, x: i64, y: i64, w: i64, h: i64, px: PremulRgba8, opacity: f32) {
        if w <= 0 || h <= 0 {
            return;
        }
        let x0 = x.max(0);
        let y0 = y.max(0);
        let x1 = (x + w).min(i64::from(self.width));
        let y1 = (y + h).min(i64::from(self.height));
        for dy in y0..y1 {
            for dx in x0..x1 {
                self.blend_at(dx as u32, dy as u32, px, opacity);
            }
        }
    }

    /// Blend a premultiplied source buffer at (x, y), clipped.
    pub fn blit(&mut self, src: &[u8], sw: u32, sh: u32, x: i64, y: i64, opacity: f32) {
        debug_assert_eq!(src.len(), (sw as usize) * (sh as usize) * 4);
        for sy in 0..i64::from(sh) {
            let dy = y + sy;
            if dy < 0 || dy >= i64::from(self.height) {
                continue;
            }
            for sx in 0..i64::from(sw) {
                let dx = x + sx;
                if dx < 0 || dx >= i64::from(self.width) {
                    continue;
                }
                let i = ((sy * i64::from(sw) + sx) * 4) as usize;
                let px = [src[i], src[i + 1], src[i + 2], src[i + 3]];
                self.blend_at(dx as u32, dy as u32, px, opacity);
            }
        }
    }

    /// Blend a single-channel coverage mask tinted with `color`.
    ///
    /// `shear` slants rows horizontally (italic synthesis): row `r` of an
    /// `mh`-row mask shifts right by `(mh - 1 - r) * shear` pixels, so the
    /// bottom row stays put.
    pub fn draw_mask(
        &mut self,
        mask: &[u8],
        mw: u32,
        mh: u32,
        x: i64,
        y: i64,
        color: PremulRgba8,
        opacity: f32,
        shear: f32,
    ) {
        debug_assert_eq!(mask.len(), (mw as usize) * (mh as usize));
        for my in 0..mh {
            let dy = y + i64::from(my);
            if dy < 0 || dy >= i64::from(self.height) {
                continue;
            }
            let slant = ((mh - 1 - my) as f32 * shear).round() as i64;
            for mx in 0..mw {
                let coverage = mask[my as usize * mw as usize + mx as usize];
                if coverage == 0 {
                    continue;
                }
                let dx = x + i64::from(mx) + slant;
                if dx < 0 || dx >= i64::from(self.width) {
                    continue;
                }
                let px = scale_coverage(color, coverage);
                self.blend_at(dx as u32, dy as u32, px, opacity);
            }
        }
    }

    fn blend_at(&mut self, x: u32, y: u32, px: PremulRgba8, opacity: f32) {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        let dst = [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ];
        let out = over(dst, px, opacity);
        self.data[i..i + 4].copy_from_slice(&out);
    }

    /// Finish the surface as a straight-alpha raster for PNG output.
    pub fn into_rgba_image(mut self) -> CardsmithResult<image::RgbaImage> {
        unpremultiply_rgba8_in_place(&mut self.data);
        image::RgbaImage::from_raw(self.width, self.height, self.data)
            .ok_or_else(|| CardsmithError::render("surface buffer does not match dimensions"))
    }
}
