use image::RgbaImage;
use rayon::prelude::*;

use crate::foundation::error::{PoleRemovalResult, ensure_same_dimensions};
use crate::mask::alpha::{circle_alpha_cut, feather_alpha};

/// One straight-alpha RGBA8 pixel.
pub type Rgba8 = [u8; 4];

/// Fill one primary pixel from the secondary.
///
/// When the primary is not fully opaque and the secondary has any coverage, the color becomes
/// `a1 * p + (1 - a1) * s` and the pixel is made opaque. The secondary's own alpha only gates the
/// fill; it does not weight it.
pub fn fill_pixel(p: Rgba8, s: Rgba8) -> Rgba8 {
    let a1 = p[3];
    if a1 == 255 || s[3] == 0 {
        return p;
    }
    let inv = 255 - a1;
    let mut out = [0u8; 4];
    for i in 0..3 {
        out[i] = blend_div255(p[i], a1, s[i], inv);
    }
    out[3] = 255;
    out
}

/// Fill the gaps of `primary` in place from the aligned, color-matched `secondary`.
///
/// Returns the number of pixels that changed.
pub fn composite_fill_gaps(
    primary: &mut RgbaImage,
    secondary: &RgbaImage,
) -> PoleRemovalResult<usize> {
    ensure_same_dimensions(
        "primary image",
        primary.dimensions(),
        "secondary image",
        secondary.dimensions(),
    )?;
    let stride = primary.width() as usize * 4;
    if stride == 0 {
        return Ok(0);
    }

    let src: &[u8] = secondary;
    let dst: &mut [u8] = primary;
    let filled = dst
        .par_chunks_mut(stride)
        .zip(src.par_chunks(stride))
        .map(|(drow, srow)| {
            let mut n = 0usize;
            for (d, s) in drow.chunks_exact_mut(4).zip(srow.chunks_exact(4)) {
                let before = [d[0], d[1], d[2], d[3]];
                let out = fill_pixel(before, [s[0], s[1], s[2], s[3]]);
                if out != before {
                    d.copy_from_slice(&out);
                    n += 1;
                }
            }
            n
        })
        .sum();
    Ok(filled)
}

/// Re-apply the circular field of view and soften its rim.
///
/// Compositing makes every gap-filled pixel opaque, including ones outside the lens circle;
/// this restores transparency there.
pub fn repair_alpha_hole(img: &mut RgbaImage, radius: f32, feather_px: u32) {
    circle_alpha_cut(img, radius);
    feather_alpha(img, feather_px);
}

fn blend_div255(a: u8, wa: u8, b: u8, wb: u8) -> u8 {
    let v = u32::from(a) * u32::from(wa) + u32::from(b) * u32::from(wb);
    ((v + 127) / 255) as u8
}
