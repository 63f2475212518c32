use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        PoleRemovalError::resource("x")
            .to_string()
            .contains("resource error:")
    );
    assert!(
        PoleRemovalError::dimension_mismatch("x")
            .to_string()
            .contains("dimension mismatch:")
    );
    assert!(
        PoleRemovalError::flow("x")
            .to_string()
            .contains("flow computation error:")
    );
    assert!(
        PoleRemovalError::validation("x")
            .to_string()
            .contains("validation error:")
    );
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = PoleRemovalError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}

#[test]
fn same_dimensions_pass_and_mismatch_names_both_sides() {
    ensure_same_dimensions("primary", (100, 100), "secondary", (100, 100)).unwrap();

    let err = ensure_same_dimensions("primary", (100, 100), "secondary", (100, 101)).unwrap_err();
    assert!(matches!(err, PoleRemovalError::DimensionMismatch(_)));
    let msg = err.to_string();
    assert!(msg.contains("primary is 100x100"));
    assert!(msg.contains("secondary is 100x101"));
}
