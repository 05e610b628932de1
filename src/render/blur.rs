//! Separable Gaussian blur over premultiplied RGBA8, used for text drop
//! shadows. Q16 fixed-point weights keep the passes integer-only.

use crate::foundation::error::{CardsmithError, CardsmithResult};
use crate::render::surface::Surface;

const Q16_ONE: i64 = 1 << 16;

/// Blur a premultiplied surface. `radius == 0` returns a copy unchanged.
pub fn blur_premul(src: &Surface, radius: u32, sigma: f32) -> CardsmithResult<Surface> {
    if radius == 0 {
        return Ok(src.clone());
    }
    let kernel = gaussian_kernel_q16(radius, sigma)?;

    let mut tmp = src.clone();
    pass(src.data(), tmp.data_mut(), src.width(), src.height(), &kernel, Axis::X);
    let mut out = src.clone();
    pass(tmp.data(), out.data_mut(), src.width(), src.height(), &kernel, Axis::Y);
    Ok(out)
}

#[derive(Clone, Copy)]
enum Axis {
    X,
    Y,
}

fn gaussian_kernel_q16(radius: u32, sigma: f32) -> CardsmithResult<Vec<u32>> {
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(CardsmithError::render("blur sigma must be > 0"));
    }

    let r = radius as i32;
    let sigma = f64::from(sigma);
    let denom = 2.0 * sigma * sigma;
    let weights_f: Vec<f64> = (-r..=r).map(|i| (-(i * i) as f64 / denom).exp()).collect();
    let sum: f64 = weights_f.iter().sum();

    // Normalize into Q16 and push any rounding remainder onto the center
    // tap so the weights sum to exactly one.
    let mut acc: i64 = 0;
    let mut weights = Vec::with_capacity(weights_f.len());
    for wf in &weights_f {
        let q = ((wf / sum) * Q16_ONE as f64).round() as i64;
        let q = q.clamp(0, Q16_ONE);
        weights.push(q as u32);
        acc += q;
    }
    let mid = weights.len() / 2;
    let fixed = (i64::from(weights[mid]) + (Q16_ONE - acc)).clamp(0, Q16_ONE);
    weights[mid] = fixed as u32;
    Ok(weights)
}

fn pass(src: &[u8], dst: &mut [u8], width: u32, height: u32, kernel: &[u32], axis: Axis) {
    let radius = (kernel.len() / 2) as i32;
    let w = width as i32;
    let h = height as i32;
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0u64; 4];
            for (ki, &kw) in kernel.iter().enumerate() {
                let d = ki as i32 - radius;
                let (sx, sy) = match axis {
                    Axis::X => ((x + d).clamp(0, w - 1), y),
                    Axis::Y => (x, (y + d).clamp(0, h - 1)),
                };
                let idx = ((sy * w + sx) as usize) * 4;
                for c in 0..4 {
                    acc[c] += u64::from(kw) * u64::from(src[idx + c]);
                }
            }
            let out_idx = ((y * w + x) as usize) * 4;
            for c in 0..4 {
                dst[out_idx + c] = q16_to_u8(acc[c]);
            }
        }
    }
}

fn q16_to_u8(acc: u64) -> u8 {
    ((acc + 32768) >> 16).min(255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radius_0_is_identity() {
        let mut s = Surface::new(2, 2).unwrap();
        s.fill([9, 8, 7, 255]);
        let out = blur_premul(&s, 0, 1.0).unwrap();
        assert_eq!(out.data(), s.data());
    }

    #[test]
    fn constant_surface_is_unchanged() {
        let mut s = Surface::new(4, 3).unwrap();
        s.fill([10, 20, 30, 40]);
        let out = blur_premul(&s, 3, 2.0).unwrap();
        assert_eq!(out.data(), s.data());
    }

    #[test]
    fn energy_spreads_but_is_conserved() {
        let mut s = Surface::new(5, 5).unwrap();
        s.fill_rect(2, 2, 1, 1, [255, 255, 255, 255], 1.0);

        let out = blur_premul(&s, 2, 1.2).unwrap();

        let nonzero = out.data().chunks_exact(4).filter(|px| px[3] != 0).count();
        assert!(nonzero > 1);

        let sum_a: u32 = out.data().chunks_exact(4).map(|px| u32::from(px[3])).sum();
        assert!((sum_a as i32 - 255).abs() <= 4);
    }

    #[test]
    fn nonpositive_sigma_is_rejected() {
        let s = Surface::new(2, 2).unwrap();
        assert!(blur_premul(&s, 1, 0.0).is_err());
        assert!(blur_premul(&s, 1, f32::NAN).is_err());
    }
}
