use image::RgbaImage;
use rayon::prelude::*;

use crate::flow::field::DisplacementField;
use crate::foundation::error::{PoleRemovalError, PoleRemovalResult, ensure_same_dimensions};
use crate::foundation::math::{cubic_weights, round_to_u8};

/// Resample `src` through `field`: `out(x, y) = src(x + dx, y + dy)`.
///
/// Sampling is bicubic over all four channels; taps outside `src` read as transparent black.
pub fn warp_with_flow(src: &RgbaImage, field: &DisplacementField) -> PoleRemovalResult<RgbaImage> {
    ensure_same_dimensions(
        "warp source",
        src.dimensions(),
        "displacement field",
        field.dimensions(),
    )?;
    let (w, h) = src.dimensions();
    let stride = w as usize * 4;
    let mut out = vec![0u8; stride * h as usize];
    if stride == 0 {
        return rgba_from_raw(w, h, out);
    }

    out.par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, px) in row.chunks_exact_mut(4).enumerate() {
                let [dx, dy] = field.get(x as u32, y as u32);
                let v = sample_cubic(src, x as f32 + dx, y as f32 + dy);
                for c in 0..4 {
                    px[c] = round_to_u8(v[c]);
                }
            }
        });

    rgba_from_raw(w, h, out)
}

fn sample_cubic(src: &RgbaImage, sx: f32, sy: f32) -> [f32; 4] {
    // Also rejects NaN and infinities.
    if !(sx.abs() < 1.0e7 && sy.abs() < 1.0e7) {
        return [0.0; 4];
    }
    let (w, h) = (src.width() as i64, src.height() as i64);
    let (x0, y0) = (sx.floor(), sy.floor());
    let wx = cubic_weights(sx - x0);
    let wy = cubic_weights(sy - y0);
    let (x0, y0) = (x0 as i64, y0 as i64);
    if x0 + 2 < 0 || y0 + 2 < 0 || x0 - 1 >= w || y0 - 1 >= h {
        return [0.0; 4];
    }

    let mut acc = [0.0f32; 4];
    for (j, wyj) in wy.iter().enumerate() {
        let ty = y0 - 1 + j as i64;
        if ty < 0 || ty >= h || *wyj == 0.0 {
            continue;
        }
        for (i, wxi) in wx.iter().enumerate() {
            let tx = x0 - 1 + i as i64;
            if tx < 0 || tx >= w || *wxi == 0.0 {
                continue;
            }
            let p = src.get_pixel(tx as u32, ty as u32).0;
            let k = wxi * wyj;
            for c in 0..4 {
                acc[c] += k * f32::from(p[c]);
            }
        }
    }
    acc
}

fn rgba_from_raw(w: u32, h: u32, buf: Vec<u8>) -> PoleRemovalResult<RgbaImage> {
    RgbaImage::from_raw(w, h, buf).ok_or_else(|| {
        PoleRemovalError::Other(anyhow::anyhow!("rgba buffer does not match {w}x{h}"))
    })
}

#[cfg(test)]
#[path = "../../tests/unit/render/warp.rs"]
mod tests;
