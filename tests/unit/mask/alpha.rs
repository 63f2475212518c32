use super::*;
use crate::foundation::error::PoleRemovalError;

fn gray_rgb(w: u32, h: u32) -> RgbImage {
    RgbImage::from_pixel(w, h, image::Rgb([90, 100, 110]))
}

fn no_pole(w: u32, h: u32) -> PoleMask {
    PoleMask::from_luma(GrayImage::new(w, h))
}

#[test]
fn red_painted_convention_marks_only_red_pixels() {
    let mut img = RgbImage::new(4, 1);
    img.put_pixel(0, 0, image::Rgb([255, 0, 0]));
    img.put_pixel(1, 0, image::Rgb([200, 30, 30]));
    img.put_pixel(2, 0, image::Rgb([255, 255, 255]));
    img.put_pixel(3, 0, image::Rgb([0, 0, 0]));

    let mask = PoleMask::from_red_painted(&img);
    assert!(mask.is_pole(0, 0));
    assert!(mask.is_pole(1, 0));
    assert!(!mask.is_pole(2, 0));
    assert!(!mask.is_pole(3, 0));
    assert_eq!(mask.pole_pixel_count(), 2);
}

#[test]
fn decoded_mask_picks_convention_from_channel_layout() {
    let mut gray = GrayImage::new(3, 1);
    gray.put_pixel(1, 0, Luma([255]));
    let mask = PoleMask::from_image(&DynamicImage::ImageLuma8(gray));
    assert!(mask.is_pole(1, 0));
    assert_eq!(mask.pole_pixel_count(), 1);

    // White in a color file is not red, so it marks nothing.
    let white = RgbImage::from_pixel(3, 1, image::Rgb([255, 255, 255]));
    let mask = PoleMask::from_image(&DynamicImage::ImageRgb8(white));
    assert_eq!(mask.pole_pixel_count(), 0);

    let mut gray_alpha = image::GrayAlphaImage::new(2, 1);
    gray_alpha.put_pixel(0, 0, image::LumaA([200, 255]));
    let mask = PoleMask::from_image(&DynamicImage::ImageLumaA8(gray_alpha));
    assert!(mask.is_pole(0, 0));
    assert!(!mask.is_pole(1, 0));
}

#[test]
fn circle_cut_is_opaque_inside_and_transparent_outside() {
    let (w, h) = (41u32, 41u32);
    let radius = 15.0f32;
    let feather = 3u32;
    let img = build_alpha_image(&gray_rgb(w, h), radius, &no_pole(w, h), feather).unwrap();

    let (cx, cy) = (w as f32 / 2.0, h as f32 / 2.0);
    for (x, y, px) in img.enumerate_pixels() {
        let dist = ((x as f32 - cx).powi(2) + (y as f32 - cy).powi(2)).sqrt();
        if dist > radius {
            assert_eq!(px.0[3], 0, "outside pixel ({x},{y}) must be transparent");
        } else if dist <= radius - feather as f32 - 1.0 {
            assert_eq!(px.0[3], 255, "inner pixel ({x},{y}) must be opaque");
        }
        assert_eq!(&px.0[..3], &[90, 100, 110]);
    }
}

#[test]
fn pole_pixels_are_cut_even_inside_the_circle() {
    let (w, h) = (20u32, 20u32);
    let mut mask = GrayImage::new(w, h);
    mask.put_pixel(10, 10, Luma([255]));
    mask.put_pixel(11, 10, Luma([255]));

    let img = build_alpha_image(&gray_rgb(w, h), 100.0, &PoleMask::from_luma(mask), 0).unwrap();
    assert_eq!(img.get_pixel(10, 10).0[3], 0);
    assert_eq!(img.get_pixel(11, 10).0[3], 0);
    assert_eq!(img.get_pixel(12, 10).0[3], 255);
}

#[test]
fn feather_ramps_monotonically_away_from_pole_edge() {
    let (w, h) = (30u32, 6u32);
    let feather = 8u32;
    let mut mask = GrayImage::new(w, h);
    for y in 0..h {
        for x in 0..5 {
            mask.put_pixel(x, y, Luma([255]));
        }
    }

    let img = build_alpha_image(&gray_rgb(w, h), 1000.0, &PoleMask::from_luma(mask), feather)
        .unwrap();

    for y in 0..h {
        let mut prev = 0u8;
        for x in 0..w {
            let a = img.get_pixel(x, y).0[3];
            assert!(a >= prev, "alpha must not decrease inward at ({x},{y})");
            prev = a;

            let expected = if x < 5 {
                0
            } else {
                let d = f64::from(x - 4);
                ((d / f64::from(feather)).min(1.0) * 255.0).round() as u8
            };
            assert_eq!(a, expected, "column {x}");
        }
    }
}

#[test]
fn feather_zero_and_fully_opaque_images_are_unchanged() {
    let mut img = rgb_to_rgba(&gray_rgb(5, 5));
    img.get_pixel_mut(2, 2).0[3] = 0;
    let before = img.clone();
    feather_alpha(&mut img, 0);
    assert_eq!(img, before);

    let mut opaque = rgb_to_rgba(&gray_rgb(5, 5));
    let before = opaque.clone();
    feather_alpha(&mut opaque, 10);
    assert_eq!(opaque, before);
}

#[test]
fn mask_size_must_match_image() {
    let err = build_alpha_image(&gray_rgb(10, 10), 4.0, &no_pole(10, 11), 2).unwrap_err();
    assert!(matches!(err, PoleRemovalError::DimensionMismatch(_)));
}
