//! Coarse-to-fine block matching flow.
//!
//! Each pyramid level refines the upsampled estimate from the level above by searching a small
//! window of candidate offsets and keeping the one with the lowest alpha-weighted mean absolute
//! luma difference over a square patch. Offsets against the direction hint pay a linear penalty.
//! A pixel is trusted only when it is opaque in the primary and its starting offset has usable
//! support. Untrusted pixels take their value from trusted neighbours: by region growing at the
//! coarsest level and through the smoothing pass at every level.

use image::RgbaImage;
use rayon::prelude::*;

use crate::flow::cache::PriorFrame;
use crate::flow::field::DisplacementField;
use crate::flow::provider::{BLOCK_MATCH, DirectionHint, FlowProvider};
use crate::foundation::error::{PoleRemovalResult, ensure_same_dimensions};
use crate::foundation::math::{alpha_unit, luma};

/// Minimum fraction of a full patch that must be covered by usable pixels for a candidate to
/// count.
const MIN_SUPPORT: f32 = 0.25;

/// Tunables for [`BlockMatchFlow`].
#[derive(Clone, Debug, PartialEq)]
pub struct BlockMatchFlow {
    /// Patch half-size; patches are `(2r + 1)^2` pixels.
    pub patch_radius: u32,
    /// Search half-size at refinement levels.
    pub search_radius: i32,
    /// Search half-size at the coarsest level.
    pub coarse_search_radius: i32,
    /// Candidate offsets per pixel of search range along each axis.
    pub subpixel_steps: i32,
    /// Stop building the pyramid before either side drops below this size.
    pub min_level_size: u32,
    /// Upper bound on the number of pyramid levels, including full resolution.
    pub max_levels: usize,
    /// Cost added per pixel of displacement against the direction hint.
    pub direction_penalty: f32,
    /// Largest mean luma difference between the current and the cached primary image for which
    /// the cached field is reused.
    pub temporal_max_diff: f32,
}

impl Default for BlockMatchFlow {
    fn default() -> Self {
        Self {
            patch_radius: 2,
            search_radius: 1,
            coarse_search_radius: 3,
            subpixel_steps: 2,
            min_level_size: 16,
            max_levels: 6,
            direction_penalty: 0.5,
            temporal_max_diff: 24.0,
        }
    }
}

impl FlowProvider for BlockMatchFlow {
    fn name(&self) -> &'static str {
        BLOCK_MATCH
    }

    #[tracing::instrument(skip_all, fields(width = primary.width(), height = primary.height()))]
    fn compute_flow(
        &mut self,
        primary: &RgbaImage,
        secondary: &RgbaImage,
        prior: Option<&PriorFrame>,
        hint: DirectionHint,
    ) -> PoleRemovalResult<DisplacementField> {
        ensure_same_dimensions(
            "primary",
            primary.dimensions(),
            "secondary",
            secondary.dimensions(),
        )?;
        let (w, h) = primary.dimensions();
        if w == 0 || h == 0 {
            return Ok(DisplacementField::zeros(w, h));
        }

        let prior_field = prior
            .filter(|p| self.prior_is_reusable(p, primary))
            .map(|p| &p.field);
        tracing::debug!(warm_start = prior_field.is_some(), "block matching");

        let pyr_a = self.pyramid(Level::from_rgba(primary));
        let pyr_b = self.pyramid(Level::from_rgba(secondary));
        let coarsest = pyr_a.len() - 1;

        let mut field = match prior_field {
            Some(f) => resample_to_level(f, &pyr_a[coarsest], coarsest),
            None => vec![[0.0, 0.0]; pyr_a[coarsest].w * pyr_a[coarsest].h],
        };
        for level in (0..=coarsest).rev() {
            let (a, b) = (&pyr_a[level], &pyr_b[level]);
            if level != coarsest {
                field = upsample(&field, &pyr_a[level + 1], a);
            }
            let prior_here = prior_field.map(|f| resample_to_level(f, a, level));
            let radius = if level == coarsest {
                self.coarse_search_radius
            } else {
                self.search_radius
            };

            let (refined, mut known) =
                self.match_level(a, b, &field, prior_here.as_deref(), radius, hint);
            field = refined;
            if level == coarsest {
                fill_unknown(&mut field, &mut known, a.w, a.h);
            }
            field = box_smooth(&field, &known, a.w, a.h);
        }

        DisplacementField::from_vec(w, h, field)
    }
}

impl BlockMatchFlow {
    fn prior_is_reusable(&self, prior: &PriorFrame, primary: &RgbaImage) -> bool {
        if prior.field.dimensions() != primary.dimensions()
            || prior.primary.dimensions() != primary.dimensions()
        {
            return false;
        }
        let (mut sum, mut n) = (0.0f64, 0u64);
        for (p, q) in primary.pixels().zip(prior.primary.pixels()) {
            if p.0[3] == 0 || q.0[3] == 0 {
                continue;
            }
            let d = luma(p.0[0], p.0[1], p.0[2]) - luma(q.0[0], q.0[1], q.0[2]);
            sum += f64::from(d.abs());
            n += 1;
        }
        n > 0 && (sum / n as f64) as f32 <= self.temporal_max_diff
    }

    fn pyramid(&self, base: Level) -> Vec<Level> {
        let mut levels = vec![base];
        while levels.len() < self.max_levels.max(1) {
            let Some(last) = levels.last() else { break };
            let (nw, nh) = (last.w.div_ceil(2), last.h.div_ceil(2));
            if nw.min(nh) < self.min_level_size as usize {
                break;
            }
            let next = last.downsample();
            levels.push(next);
        }
        levels
    }

    fn match_level(
        &self,
        a: &Level,
        b: &Level,
        init: &[[f32; 2]],
        prior: Option<&[[f32; 2]]>,
        radius: i32,
        hint: DirectionHint,
    ) -> (Vec<[f32; 2]>, Vec<bool>) {
        let pr = self.patch_radius as i32;
        let min_support = MIN_SUPPORT * ((2 * pr + 1) * (2 * pr + 1)) as f32;
        let steps = self.subpixel_steps.max(1);
        let reach = radius * steps;
        let step = 1.0 / steps as f32;
        let hint = hint.unit();
        let penalty = |d: [f32; 2]| match hint {
            Some([ux, uy]) => self.direction_penalty * (-(d[0] * ux + d[1] * uy)).max(0.0),
            None => 0.0,
        };

        let rows: Vec<(Vec<[f32; 2]>, Vec<bool>)> = (0..a.h)
            .into_par_iter()
            .map(|y| {
                let mut out = Vec::with_capacity(a.w);
                let mut known = Vec::with_capacity(a.w);
                for x in 0..a.w {
                    let idx = y * a.w + x;
                    let start = init[idx];
                    let mut best: Option<([f32; 2], f32)> = None;
                    let mut consider = |d: [f32; 2]| {
                        let Some(cost) = patch_cost(a, b, x, y, d, pr, min_support) else {
                            return false;
                        };
                        let cost = cost + penalty(d);
                        if best.is_none_or(|(_, c)| cost < c) {
                            best = Some((d, cost));
                        }
                        true
                    };
                    let start_supported = consider(start);
                    for sy in -reach..=reach {
                        for sx in -reach..=reach {
                            if sx != 0 || sy != 0 {
                                let (ox, oy) = (sx as f32 * step, sy as f32 * step);
                                consider([start[0] + ox, start[1] + oy]);
                            }
                        }
                    }
                    if let Some(p) = prior {
                        consider(p[idx]);
                    }
                    match best {
                        Some((d, _)) => {
                            out.push(d);
                            known.push(start_supported && a.alpha[idx] > 0.0);
                        }
                        None => {
                            out.push(start);
                            known.push(false);
                        }
                    }
                }
                (out, known)
            })
            .collect();

        let mut field = Vec::with_capacity(a.w * a.h);
        let mut known = Vec::with_capacity(a.w * a.h);
        for (f, k) in rows {
            field.extend(f);
            known.extend(k);
        }
        (field, known)
    }
}

/// Single-channel working image: luma plus alpha in `[0, 1]`.
struct Level {
    w: usize,
    h: usize,
    luma: Vec<f32>,
    alpha: Vec<f32>,
}

impl Level {
    fn from_rgba(img: &RgbaImage) -> Self {
        let (luma_v, alpha) = img
            .pixels()
            .map(|p| (luma(p.0[0], p.0[1], p.0[2]), alpha_unit(p.0[3])))
            .unzip();
        Self {
            w: img.width() as usize,
            h: img.height() as usize,
            luma: luma_v,
            alpha,
        }
    }

    /// Halve both sides; luma is alpha-weighted so transparent pixels do not bleed in.
    fn downsample(&self) -> Self {
        let (nw, nh) = (self.w.div_ceil(2), self.h.div_ceil(2));
        let mut luma_v = Vec::with_capacity(nw * nh);
        let mut alpha = Vec::with_capacity(nw * nh);
        for y in 0..nh {
            for x in 0..nw {
                let (mut sl, mut sa, mut plain) = (0.0, 0.0, 0.0);
                for (sx, sy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                    let px = (2 * x + sx).min(self.w - 1);
                    let py = (2 * y + sy).min(self.h - 1);
                    let i = py * self.w + px;
                    sl += self.luma[i] * self.alpha[i];
                    sa += self.alpha[i];
                    plain += self.luma[i];
                }
                luma_v.push(if sa > 0.0 { sl / sa } else { plain / 4.0 });
                alpha.push(sa / 4.0);
            }
        }
        Self {
            w: nw,
            h: nh,
            luma: luma_v,
            alpha,
        }
    }

    /// Bilinear `(luma, alpha)` at a sub-pixel position, `None` outside the image.
    fn sample(&self, x: f32, y: f32) -> Option<(f32, f32)> {
        if !(x >= 0.0 && y >= 0.0 && x <= (self.w - 1) as f32 && y <= (self.h - 1) as f32) {
            return None;
        }
        let (x0, y0) = (x.floor() as usize, y.floor() as usize);
        let (x1, y1) = ((x0 + 1).min(self.w - 1), (y0 + 1).min(self.h - 1));
        let (fx, fy) = (x - x0 as f32, y - y0 as f32);
        let lerp2 = |v: &[f32]| {
            let top = v[y0 * self.w + x0] * (1.0 - fx) + v[y0 * self.w + x1] * fx;
            let bot = v[y1 * self.w + x0] * (1.0 - fx) + v[y1 * self.w + x1] * fx;
            top * (1.0 - fy) + bot * fy
        };
        Some((lerp2(&self.luma), lerp2(&self.alpha)))
    }
}

fn patch_cost(
    a: &Level,
    b: &Level,
    x: usize,
    y: usize,
    d: [f32; 2],
    pr: i32,
    min_support: f32,
) -> Option<f32> {
    let (mut sum, mut weight) = (0.0f32, 0.0f32);
    for py in (y as i32 - pr)..=(y as i32 + pr) {
        if py < 0 || py >= a.h as i32 {
            continue;
        }
        for px in (x as i32 - pr)..=(x as i32 + pr) {
            if px < 0 || px >= a.w as i32 {
                continue;
            }
            let i = py as usize * a.w + px as usize;
            let wa = a.alpha[i];
            if wa <= 0.0 {
                continue;
            }
            let Some((lb, wb)) = b.sample(px as f32 + d[0], py as f32 + d[1]) else {
                continue;
            };
            let wgt = wa * wb;
            sum += wgt * (a.luma[i] - lb).abs();
            weight += wgt;
        }
    }
    (weight >= min_support).then(|| sum / weight)
}

/// Sample a full-resolution field at `level`, scaling offsets to that level.
fn resample_to_level(field: &DisplacementField, target: &Level, level: usize) -> Vec<[f32; 2]> {
    let s = 1usize << level;
    let inv = 1.0 / s as f32;
    let (fw, fh) = (field.width() as usize, field.height() as usize);
    let mut out = Vec::with_capacity(target.w * target.h);
    for y in 0..target.h {
        for x in 0..target.w {
            let [dx, dy] = field.as_slice()[(y * s).min(fh - 1) * fw + (x * s).min(fw - 1)];
            out.push([dx * inv, dy * inv]);
        }
    }
    out
}

fn upsample(coarse: &[[f32; 2]], from: &Level, to: &Level) -> Vec<[f32; 2]> {
    let mut out = Vec::with_capacity(to.w * to.h);
    for y in 0..to.h {
        let cy = (y / 2).min(from.h - 1);
        for x in 0..to.w {
            let [dx, dy] = coarse[cy * from.w + (x / 2).min(from.w - 1)];
            out.push([dx * 2.0, dy * 2.0]);
        }
    }
    out
}

/// Grow known values into unknown pixels, one 4-neighbour ring per pass.
fn fill_unknown(field: &mut [[f32; 2]], known: &mut [bool], w: usize, h: usize) {
    if !known.iter().any(|&k| k) {
        return;
    }
    loop {
        let snapshot = known.to_vec();
        let mut changed = false;
        for y in 0..h {
            for x in 0..w {
                let i = y * w + x;
                if snapshot[i] {
                    continue;
                }
                let mut acc = [0.0f32, 0.0f32];
                let mut n = 0.0f32;
                let neighbours = [
                    (x > 0).then(|| i - 1),
                    (x + 1 < w).then(|| i + 1),
                    (y > 0).then(|| i - w),
                    (y + 1 < h).then(|| i + w),
                ];
                for j in neighbours.into_iter().flatten() {
                    if snapshot[j] {
                        acc[0] += field[j][0];
                        acc[1] += field[j][1];
                        n += 1.0;
                    }
                }
                if n > 0.0 {
                    field[i] = [acc[0] / n, acc[1] / n];
                    known[i] = true;
                    changed = true;
                }
            }
        }
        if !changed {
            break;
        }
    }
}

/// 3x3 mean over trusted pixels only; a pixel with no trusted neighbour keeps its value.
fn box_smooth(field: &[[f32; 2]], known: &[bool], w: usize, h: usize) -> Vec<[f32; 2]> {
    let mut out = vec![[0.0, 0.0]; w * h];
    out.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
        for (x, slot) in row.iter_mut().enumerate() {
            let mut acc = [0.0f32, 0.0f32];
            let mut n = 0.0f32;
            for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
                for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                    let i = ny * w + nx;
                    if known[i] {
                        acc[0] += field[i][0];
                        acc[1] += field[i][1];
                        n += 1.0;
                    }
                }
            }
            *slot = if n > 0.0 {
                [acc[0] / n, acc[1] / n]
            } else {
                field[y * w + x]
            };
        }
    });
    out
}

#[cfg(test)]
#[path = "../../tests/unit/flow/block_match.rs"]
mod tests;
