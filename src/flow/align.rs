use image::RgbaImage;

use crate::flow::cache::PriorFrame;
use crate::flow::field::DisplacementField;
use crate::flow::provider::{DirectionHint, FlowRegistry};
use crate::foundation::error::{PoleRemovalError, PoleRemovalResult, ensure_same_dimensions};

/// Expected motion from the primary to the secondary bottom camera.
pub const BOTTOM_SECONDARY_HINT: DirectionHint = DirectionHint::Down;

/// Compute the field mapping `secondary` onto `primary` with the provider named `algorithm`.
///
/// The provider lives only for this call. Provider errors are returned unchanged; there is no
/// retry.
#[tracing::instrument(
    skip(registry, primary, secondary, prior),
    fields(warm_start = prior.is_some())
)]
pub fn align_secondary(
    registry: &FlowRegistry,
    algorithm: &str,
    primary: &RgbaImage,
    secondary: &RgbaImage,
    prior: Option<&PriorFrame>,
) -> PoleRemovalResult<DisplacementField> {
    ensure_same_dimensions(
        "primary image",
        primary.dimensions(),
        "secondary image",
        secondary.dimensions(),
    )?;

    let mut provider = registry.create(algorithm)?;
    let field = provider.compute_flow(primary, secondary, prior, BOTTOM_SECONDARY_HINT)?;
    drop(provider);

    if field.dimensions() != primary.dimensions() {
        return Err(PoleRemovalError::flow(format!(
            "provider '{algorithm}' returned a {}x{} field for {}x{} images",
            field.width(),
            field.height(),
            primary.width(),
            primary.height()
        )));
    }
    tracing::debug!(max_offset = field.max_magnitude(), "flow computed");
    Ok(field)
}
