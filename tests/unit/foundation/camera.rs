use super::*;

fn cam(id: &str, role: CameraRole) -> CameraModel {
    CameraModel {
        id: id.to_string(),
        role,
        usable_pixels_radius: 100.0,
        flip180: false,
    }
}

#[test]
fn bottom_pair_picks_bottom_and_bottom2() {
    let rig = CameraRig {
        cameras: vec![
            cam("cam0", CameraRole::Side),
            cam("cam15", CameraRole::Bottom2),
            cam("cam14", CameraRole::Top),
            cam("cam16", CameraRole::Bottom),
        ],
    };
    let (primary, secondary) = rig.bottom_pair().unwrap();
    assert_eq!(primary.id, "cam16");
    assert_eq!(secondary.id, "cam15");
    assert_eq!(primary.image_filename(), "cam16.png");
}

#[test]
fn bottom_pair_requires_exactly_one_of_each_role() {
    let missing = CameraRig {
        cameras: vec![cam("cam16", CameraRole::Bottom)],
    };
    assert!(matches!(
        missing.bottom_pair(),
        Err(PoleRemovalError::Validation(_))
    ));

    let duplicate = CameraRig {
        cameras: vec![
            cam("a", CameraRole::Bottom),
            cam("b", CameraRole::Bottom),
            cam("c", CameraRole::Bottom2),
        ],
    };
    let err = duplicate.bottom_pair().unwrap_err();
    assert!(err.to_string().contains("more than one"));
}

#[test]
fn bottom_pair_rejects_non_positive_radius() {
    let mut bad = cam("b2", CameraRole::Bottom2);
    bad.usable_pixels_radius = 0.0;
    let rig = CameraRig {
        cameras: vec![cam("b", CameraRole::Bottom), bad],
    };
    assert!(rig.bottom_pair().is_err());
}

#[test]
fn rig_json_ignores_unused_calibration_fields() {
    let json = r#"{
        "cameras": [
            {"id": "cam16", "role": "bottom", "usable_pixels_radius": 900.5, "focal": 1234.0},
            {"id": "cam15", "role": "bottom2", "usable_pixels_radius": 880.0, "flip180": true}
        ]
    }"#;
    let rig = CameraRig::from_json_str(json).unwrap();
    let (primary, secondary) = rig.bottom_pair().unwrap();
    assert!(!primary.flip180);
    assert!(secondary.flip180);
    assert_eq!(primary.usable_pixels_radius, 900.5);

    assert!(CameraRig::from_json_str("{").is_err());
}
