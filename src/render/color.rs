use image::RgbaImage;
use rayon::prelude::*;

use crate::foundation::error::{PoleRemovalResult, ensure_same_dimensions};
use crate::foundation::math::round_to_u8;

const MIN_GAIN: f32 = 0.25;
const MAX_GAIN: f32 = 4.0;
const MIN_SOURCE_STD: f64 = 1.0e-3;
const MIN_SAMPLES: u64 = 2;

/// Affine correction `out = gain * in + offset` for one color channel.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ChannelAdjustment {
    /// Multiplicative term.
    pub gain: f32,
    /// Additive term, in 8-bit units.
    pub offset: f32,
}

impl ChannelAdjustment {
    /// The no-op adjustment.
    pub const IDENTITY: Self = Self {
        gain: 1.0,
        offset: 0.0,
    };

    fn apply(self, v: u8) -> u8 {
        round_to_u8(self.gain * f32::from(v) + self.offset)
    }
}

/// Per-channel RGB correction bringing one camera's colors toward another's.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ColorAdjustmentModel {
    /// Adjustments for R, G, B.
    pub channels: [ChannelAdjustment; 3],
}

impl Default for ColorAdjustmentModel {
    fn default() -> Self {
        Self {
            channels: [ChannelAdjustment::IDENTITY; 3],
        }
    }
}

#[derive(Clone, Copy, Default)]
struct Moments {
    n: u64,
    sum: [f64; 3],
    sum_sq: [f64; 3],
}

impl Moments {
    fn push(&mut self, px: [u8; 4]) {
        self.n += 1;
        for c in 0..3 {
            let v = f64::from(px[c]);
            self.sum[c] += v;
            self.sum_sq[c] += v * v;
        }
    }

    fn mean_std(&self, c: usize) -> (f64, f64) {
        let n = self.n as f64;
        let mean = self.sum[c] / n;
        let var = (self.sum_sq[c] / n - mean * mean).max(0.0);
        (mean, var.sqrt())
    }
}

impl ColorAdjustmentModel {
    /// Fit a model mapping `source` statistics onto `target` statistics.
    ///
    /// Each channel matches mean and standard deviation over pixels where both images are fully
    /// opaque. If there are fewer than two such pixels, pixels where both are non-transparent are
    /// used, then all pixels. A channel with a (near) constant source keeps the identity.
    pub fn fit(target: &RgbaImage, source: &RgbaImage) -> PoleRemovalResult<Self> {
        ensure_same_dimensions(
            "color target",
            target.dimensions(),
            "color source",
            source.dimensions(),
        )?;

        let gather = |keep: fn(u8, u8) -> bool| {
            let (mut t, mut s) = (Moments::default(), Moments::default());
            for (pt, ps) in target.pixels().zip(source.pixels()) {
                if keep(pt.0[3], ps.0[3]) {
                    t.push(pt.0);
                    s.push(ps.0);
                }
            }
            (t, s)
        };

        let mut stats = gather(|a, b| a == 255 && b == 255);
        if stats.0.n < MIN_SAMPLES {
            stats = gather(|a, b| a > 0 && b > 0);
        }
        if stats.0.n < MIN_SAMPLES {
            stats = gather(|_, _| true);
        }
        let (t, s) = stats;

        let mut model = Self::default();
        if s.n < MIN_SAMPLES {
            return Ok(model);
        }
        for (c, adj) in model.channels.iter_mut().enumerate() {
            let (mean_t, std_t) = t.mean_std(c);
            let (mean_s, std_s) = s.mean_std(c);
            if std_s < MIN_SOURCE_STD {
                continue;
            }
            let gain = ((std_t / std_s) as f32).clamp(MIN_GAIN, MAX_GAIN);
            *adj = ChannelAdjustment {
                gain,
                offset: (mean_t - f64::from(gain) * mean_s) as f32,
            };
        }
        tracing::debug!(?model, samples = s.n, "fitted color adjustment");
        Ok(model)
    }

    /// `true` if every channel is the identity.
    pub fn is_identity(&self) -> bool {
        self.channels
            .iter()
            .all(|c| *c == ChannelAdjustment::IDENTITY)
    }

    /// Apply the model to the color channels of `img`; alpha is copied unchanged.
    pub fn apply(&self, img: &RgbaImage) -> RgbaImage {
        let mut out = img.clone();
        if self.is_identity() {
            return out;
        }
        let stride = img.width() as usize * 4;
        if stride == 0 {
            return out;
        }
        let channels = self.channels;
        let buf: &mut [u8] = &mut out;
        buf.par_chunks_mut(stride).for_each(|row| {
            for px in row.chunks_exact_mut(4) {
                for c in 0..3 {
                    px[c] = channels[c].apply(px[c]);
                }
            }
        });
        out
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/color.rs"]
mod tests;
