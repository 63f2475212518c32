use image::{DynamicImage, GrayImage, Luma, Rgba, RgbImage, RgbaImage};

use crate::foundation::error::{PoleRemovalResult, ensure_same_dimensions};

/// Minimum red value of a pole pixel in a red-painted mask.
const POLE_RED_MIN: u8 = 128;
/// Maximum green/blue value of a pole pixel in a red-painted mask.
const POLE_OTHER_MAX: u8 = 127;

const INF: f64 = 1e20;

/// Pixels occluded by the rig's support pole, as a single-channel image (255 = pole).
#[derive(Clone, Debug, PartialEq)]
pub struct PoleMask {
    mask: GrayImage,
}

impl PoleMask {
    /// Build from a color image where the pole region is painted red.
    pub fn from_red_painted(img: &RgbImage) -> Self {
        let mask = GrayImage::from_fn(img.width(), img.height(), |x, y| {
            let [r, g, b] = img.get_pixel(x, y).0;
            let pole = r >= POLE_RED_MIN && g <= POLE_OTHER_MAX && b <= POLE_OTHER_MAX;
            Luma([if pole { 255 } else { 0 }])
        });
        Self { mask }
    }

    /// Build from a decoded mask file of either convention.
    ///
    /// Grayscale files (with or without alpha) mark the pole with any nonzero value; color files
    /// mark it in red.
    pub fn from_image(img: &DynamicImage) -> Self {
        match img {
            DynamicImage::ImageLuma8(_)
            | DynamicImage::ImageLumaA8(_)
            | DynamicImage::ImageLuma16(_)
            | DynamicImage::ImageLumaA16(_) => Self::from_luma(img.to_luma8()),
            _ => Self::from_red_painted(&img.to_rgb8()),
        }
    }

    /// Build from a single-channel image; any nonzero value marks a pole pixel.
    pub fn from_luma(mask: GrayImage) -> Self {
        Self { mask }
    }

    /// Mask width in pixels.
    pub fn width(&self) -> u32 {
        self.mask.width()
    }

    /// Mask height in pixels.
    pub fn height(&self) -> u32 {
        self.mask.height()
    }

    /// `true` if the mask has a zero dimension.
    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// `true` when `(x, y)` is marked as pole.
    pub fn is_pole(&self, x: u32, y: u32) -> bool {
        self.mask.get_pixel(x, y).0[0] != 0
    }

    /// Number of pixels marked as pole.
    pub fn pole_pixel_count(&self) -> usize {
        self.mask.pixels().filter(|p| p.0[0] != 0).count()
    }
}

/// Promote an RGB image to RGBA with every pixel fully opaque.
pub fn rgb_to_rgba(rgb: &RgbImage) -> RgbaImage {
    RgbaImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        Rgba([r, g, b, 255])
    })
}

/// Set alpha to 255 inside the circle of `radius` around the image center and to 0 outside.
pub fn circle_alpha_cut(img: &mut RgbaImage, radius: f32) {
    let cx = img.width() as f32 / 2.0;
    let cy = img.height() as f32 / 2.0;
    let r2 = radius * radius;
    for (x, y, px) in img.enumerate_pixels_mut() {
        let dx = x as f32 - cx;
        let dy = y as f32 - cy;
        px.0[3] = if dx * dx + dy * dy <= r2 { 255 } else { 0 };
    }
}

/// Zero the alpha of every pixel marked in `mask`.
pub fn cut_pole_mask(img: &mut RgbaImage, mask: &PoleMask) -> PoleRemovalResult<()> {
    ensure_same_dimensions("image", img.dimensions(), "pole mask", mask.mask.dimensions())?;
    for (x, y, px) in img.enumerate_pixels_mut() {
        if mask.is_pole(x, y) {
            px.0[3] = 0;
        }
    }
    Ok(())
}

/// Ramp alpha up from 0 over `feather_px` pixels away from every fully transparent pixel.
///
/// Each alpha becomes `min(alpha, 255 * min(d / feather_px, 1))`, with `d` the Euclidean distance
/// to the nearest pixel whose alpha is 0. A zero width leaves the image unchanged.
pub fn feather_alpha(img: &mut RgbaImage, feather_px: u32) {
    if feather_px == 0 {
        return;
    }
    let dist2 = squared_distance_to_transparent(img);
    let width = f64::from(feather_px);
    for (px, &d2) in img.pixels_mut().zip(dist2.iter()) {
        let ramp = (d2.sqrt() / width).min(1.0) * 255.0;
        let ramp = ramp.round() as u8;
        px.0[3] = px.0[3].min(ramp);
    }
}

/// Full mask synthesis: promote to RGBA, cut the usable circle, cut the pole, feather.
pub fn build_alpha_image(
    rgb: &RgbImage,
    usable_radius: f32,
    mask: &PoleMask,
    feather_px: u32,
) -> PoleRemovalResult<RgbaImage> {
    let mut img = rgb_to_rgba(rgb);
    circle_alpha_cut(&mut img, usable_radius);
    cut_pole_mask(&mut img, mask)?;
    feather_alpha(&mut img, feather_px);
    Ok(img)
}

/// Exact squared Euclidean distance transform (Felzenszwalb-Huttenlocher), columns then rows.
fn squared_distance_to_transparent(img: &RgbaImage) -> Vec<f64> {
    let (w, h) = (img.width() as usize, img.height() as usize);
    let mut grid: Vec<f64> = img
        .pixels()
        .map(|p| if p.0[3] == 0 { 0.0 } else { INF })
        .collect();
    if w == 0 || h == 0 {
        return grid;
    }

    let n = w.max(h);
    let mut f = vec![0.0; n];
    let mut d = vec![0.0; n];
    let mut v = vec![0usize; n];
    let mut z = vec![0.0; n + 1];

    for x in 0..w {
        for y in 0..h {
            f[y] = grid[y * w + x];
        }
        edt_1d(&f[..h], &mut d[..h], &mut v, &mut z);
        for y in 0..h {
            grid[y * w + x] = d[y];
        }
    }
    for row in grid.chunks_exact_mut(w) {
        f[..w].copy_from_slice(row);
        edt_1d(&f[..w], &mut d[..w], &mut v, &mut z);
        row.copy_from_slice(&d[..w]);
    }
    grid
}

fn edt_1d(f: &[f64], d: &mut [f64], v: &mut [usize], z: &mut [f64]) {
    let n = f.len();
    if n == 0 {
        return;
    }
    let intersect = |q: usize, p: usize| {
        let (qf, pf) = (q as f64, p as f64);
        ((f[q] + qf * qf) - (f[p] + pf * pf)) / (2.0 * qf - 2.0 * pf)
    };

    let mut k = 0usize;
    v[0] = 0;
    z[0] = f64::NEG_INFINITY;
    z[1] = f64::INFINITY;
    for q in 1..n {
        let mut s = intersect(q, v[k]);
        while s <= z[k] {
            k -= 1;
            s = intersect(q, v[k]);
        }
        k += 1;
        v[k] = q;
        z[k] = s;
        z[k + 1] = f64::INFINITY;
    }

    k = 0;
    for (q, out) in d.iter_mut().enumerate() {
        while z[k + 1] < q as f64 {
            k += 1;
        }
        let dq = q as f64 - v[k] as f64;
        *out = dq * dq + f[v[k]];
    }
}

#[cfg(test)]
#[path = "../../tests/unit/mask/alpha.rs"]
mod tests;
