use super::*;

fn temp_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "pole_removal_{name}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ))
}

fn sample_field(w: u32, h: u32) -> DisplacementField {
    let data = (0..w * h)
        .map(|i| {
            let i = i as f32;
            [i * 0.125 - 3.3, -i * 1.0e-3 + 0.1]
        })
        .collect();
    DisplacementField::from_vec(w, h, data).unwrap()
}

#[test]
fn field_bytes_roundtrip_bit_exact() {
    let mut field = sample_field(5, 3);
    field.set(0, 0, [f32::MIN_POSITIVE, -0.0]);
    field.set(4, 2, [1.0e30, -7.25]);

    let mut buf = Vec::new();
    write_field(&mut buf, &field).unwrap();
    assert_eq!(buf.len(), 16 + 5 * 3 * 8);

    let back = read_field(buf.as_slice()).unwrap();
    assert_eq!(back.dimensions(), (5, 3));
    for (a, b) in field.as_slice().iter().zip(back.as_slice()) {
        assert_eq!(a[0].to_bits(), b[0].to_bits());
        assert_eq!(a[1].to_bits(), b[1].to_bits());
    }
}

#[test]
fn truncated_or_foreign_bytes_are_resource_errors() {
    let mut buf = Vec::new();
    write_field(&mut buf, &sample_field(4, 4)).unwrap();

    let truncated = &buf[..buf.len() - 3];
    assert!(matches!(
        read_field(truncated),
        Err(PoleRemovalError::Resource(_))
    ));
    assert!(matches!(
        read_field(&buf[..10]),
        Err(PoleRemovalError::Resource(_))
    ));

    let mut foreign = buf.clone();
    foreign[0] = b'X';
    let err = read_field(foreign.as_slice()).unwrap_err();
    assert!(err.to_string().contains("magic"));

    let mut zero = buf.clone();
    zero[8..12].copy_from_slice(&0u32.to_le_bytes());
    assert!(read_field(zero.as_slice()).is_err());
}

#[test]
fn huge_header_with_short_payload_is_a_resource_error() {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"PRFL");
    bytes.extend_from_slice(&1u32.to_le_bytes());
    bytes.extend_from_slice(&0x3FFF_FFFFu32.to_le_bytes());
    bytes.extend_from_slice(&0x3FFF_FFFFu32.to_le_bytes());
    bytes.extend_from_slice(&[0u8; 24]);

    let err = read_field(bytes.as_slice()).unwrap_err();
    assert!(matches!(err, PoleRemovalError::Resource(_)), "{err}");
    assert!(err.to_string().contains("truncated"), "{err}");
}

#[test]
fn zero_size_field_is_rejected_on_write() {
    let mut buf = Vec::new();
    let err = write_field(&mut buf, &DisplacementField::zeros(0, 0)).unwrap_err();
    assert!(matches!(err, PoleRemovalError::Resource(_)));
    assert!(buf.is_empty());
    assert!(write_field(&mut buf, &DisplacementField::zeros(3, 0)).is_err());
}

#[test]
fn frame_cache_save_then_load() {
    let tmp = temp_dir("frame_cache_roundtrip");
    let cache = FrameCache::new(&tmp);

    let field = sample_field(6, 4);
    let primary = RgbaImage::from_fn(6, 4, |x, y| image::Rgba([x as u8, y as u8, 7, 255]));
    let secondary = RgbaImage::from_fn(6, 4, |x, y| image::Rgba([y as u8, x as u8, 9, 128]));

    cache.save(&field, &primary, &secondary).unwrap();
    assert!(tmp.join(FLOW_FILE).is_file());
    assert!(tmp.join(PRIMARY_IMAGE_FILE).is_file());
    assert!(tmp.join(SECONDARY_IMAGE_FILE).is_file());

    let prior = cache.load().unwrap();
    assert_eq!(prior.field, field);
    assert_eq!(prior.primary, primary);
    assert_eq!(prior.secondary, secondary);

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn frame_cache_load_from_empty_dir_fails_with_path() {
    let tmp = temp_dir("frame_cache_empty");
    let err = FrameCache::new(&tmp).load().unwrap_err();
    assert!(matches!(err, PoleRemovalError::Resource(_)));
    assert!(err.to_string().contains("flow_bottom_secondary.bin"));
}

#[test]
fn frame_cache_rejects_images_that_do_not_match_field() {
    let tmp = temp_dir("frame_cache_mismatch");
    let cache = FrameCache::new(&tmp);
    let field = sample_field(6, 4);
    let primary = RgbaImage::new(6, 4);
    let secondary = RgbaImage::new(6, 5);
    cache.save(&field, &primary, &secondary).unwrap();

    assert!(matches!(
        cache.load(),
        Err(PoleRemovalError::DimensionMismatch(_))
    ));

    std::fs::remove_dir_all(&tmp).ok();
}
