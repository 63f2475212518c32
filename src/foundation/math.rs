/// Keys cubic convolution parameter, matching the common `INTER_CUBIC` remap kernel.
pub(crate) const CUBIC_A: f32 = -0.75;

pub(crate) fn round_to_u8(v: f32) -> u8 {
    if v.is_nan() {
        return 0;
    }
    v.round().clamp(0.0, 255.0) as u8
}

pub(crate) fn alpha_unit(a: u8) -> f32 {
    f32::from(a) / 255.0
}

/// Rec. 601 luma of an 8-bit RGB triple, in `[0, 255]`.
pub(crate) fn luma(r: u8, g: u8, b: u8) -> f32 {
    0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b)
}

/// Tap weights for samples at offsets `-1, 0, 1, 2` around a fractional position `t in [0, 1)`.
pub(crate) fn cubic_weights(t: f32) -> [f32; 4] {
    let a = CUBIC_A;
    let x0 = t + 1.0;
    let x1 = t;
    let x2 = 1.0 - t;
    let w0 = ((a * x0 - 5.0 * a) * x0 + 8.0 * a) * x0 - 4.0 * a;
    let w1 = ((a + 2.0) * x1 - (a + 3.0)) * x1 * x1 + 1.0;
    let w2 = ((a + 2.0) * x2 - (a + 3.0)) * x2 * x2 + 1.0;
    [w0, w1, w2, 1.0 - w0 - w1 - w2]
}
