use super::*;
use crate::foundation::error::PoleRemovalError;

fn textured(w: u32, h: u32) -> RgbaImage {
    RgbaImage::from_fn(w, h, |x, y| {
        image::Rgba([
            (40 + (x * 7 + y * 3) % 120) as u8,
            (60 + (x * 2 + y * 9) % 100) as u8,
            (30 + (x * 11 + y * 5) % 140) as u8,
            255,
        ])
    })
}

fn perturb(img: &RgbaImage, gain: f32, offset: f32) -> RgbaImage {
    let mut out = img.clone();
    for px in out.pixels_mut() {
        for c in 0..3 {
            px.0[c] = round_to_u8(gain * f32::from(px.0[c]) + offset);
        }
    }
    out
}

#[test]
fn recovers_known_gain_and_offset() {
    let target = textured(32, 32);
    // source = 0.8 * target + 10; the inverse is gain 1.25, offset -12.5.
    let source = perturb(&target, 0.8, 10.0);
    let model = ColorAdjustmentModel::fit(&target, &source).unwrap();
    for adj in model.channels {
        assert!((adj.gain - 1.25).abs() < 0.05, "gain {}", adj.gain);
        assert!((adj.offset + 12.5).abs() < 4.0, "offset {}", adj.offset);
    }

    let corrected = model.apply(&source);
    let max_err = corrected
        .pixels()
        .zip(target.pixels())
        .flat_map(|(a, b)| (0..3).map(move |c| (i32::from(a.0[c]) - i32::from(b.0[c])).abs()))
        .max()
        .unwrap();
    assert!(max_err <= 2, "max error {max_err}");
}

#[test]
fn uniform_source_keeps_identity() {
    let target = textured(8, 8);
    let source = RgbaImage::from_pixel(8, 8, image::Rgba([90, 90, 90, 255]));
    let model = ColorAdjustmentModel::fit(&target, &source).unwrap();
    assert!(model.is_identity());
    assert_eq!(model.apply(&source), source);
}

#[test]
fn statistics_ignore_transparent_pixels() {
    let target = textured(16, 16);
    let mut source = target.clone();
    // Garbage under zero alpha must not disturb the fit.
    for y in 0..4 {
        for x in 0..16 {
            source.put_pixel(x, y, image::Rgba([255, 0, 255, 0]));
        }
    }
    let model = ColorAdjustmentModel::fit(&target, &source).unwrap();
    for adj in model.channels {
        assert!((adj.gain - 1.0).abs() < 1e-3);
        assert!(adj.offset.abs() < 0.1);
    }
}

#[test]
fn gain_is_clamped() {
    let target = textured(16, 16);
    let source = RgbaImage::from_fn(16, 16, |x, _| {
        let v = 100 + (x % 2) as u8;
        image::Rgba([v, v, v, 255])
    });
    let model = ColorAdjustmentModel::fit(&target, &source).unwrap();
    for adj in model.channels {
        assert_eq!(adj.gain, 4.0);
    }
}

#[test]
fn apply_leaves_alpha_alone() {
    let src = RgbaImage::from_fn(4, 4, |x, y| image::Rgba([100, 100, 100, (x * 60 + y) as u8]));
    let model = ColorAdjustmentModel {
        channels: [ChannelAdjustment {
            gain: 2.0,
            offset: 5.0,
        }; 3],
    };
    let out = model.apply(&src);
    for (a, b) in out.pixels().zip(src.pixels()) {
        assert_eq!(a.0[3], b.0[3]);
        assert_eq!(&a.0[..3], &[205, 205, 205]);
    }
}

#[test]
fn size_mismatch_is_rejected() {
    let err = ColorAdjustmentModel::fit(&RgbaImage::new(3, 3), &RgbaImage::new(3, 4)).unwrap_err();
    assert!(matches!(err, PoleRemovalError::DimensionMismatch(_)));
}
