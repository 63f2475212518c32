use super::*;

fn temp_dir(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!(
        "pole_removal_{name}_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ))
}

#[test]
fn write_then_read_keeps_alpha_when_unchanged() {
    let tmp = temp_dir("image_io_roundtrip");
    let path = tmp.join("nested").join("img.png");

    let img = RgbaImage::from_raw(2, 1, vec![10, 20, 30, 40, 50, 60, 70, 255]).unwrap();
    write_image(&path, &img).unwrap();

    let back = read_image(&path, ReadMode::Unchanged).unwrap().into_rgba8();
    assert_eq!(back, img);

    let color = read_image(&path, ReadMode::Color).unwrap();
    assert!(matches!(color, DynamicImage::ImageRgb8(_)));
    assert_eq!(color.into_rgb8().get_pixel(1, 0).0, [50, 60, 70]);

    std::fs::remove_dir_all(&tmp).ok();
}

#[test]
fn read_missing_file_is_resource_error_naming_path() {
    let path = temp_dir("image_io_missing").join("nope.png");
    let err = read_image(&path, ReadMode::Color).unwrap_err();
    assert!(matches!(err, PoleRemovalError::Resource(_)));
    assert!(err.to_string().contains("nope.png"));
}

#[test]
fn read_garbage_bytes_is_resource_error() {
    let tmp = temp_dir("image_io_garbage");
    std::fs::create_dir_all(&tmp).unwrap();
    let path = tmp.join("bad.png");
    std::fs::write(&path, b"not a png").unwrap();

    assert!(matches!(
        read_image(&path, ReadMode::Unchanged),
        Err(PoleRemovalError::Resource(_))
    ));

    std::fs::remove_dir_all(&tmp).ok();
}
