/// Convenience result type used across the crate.
pub type PoleRemovalResult<T> = Result<T, PoleRemovalError>;

/// Top-level error taxonomy for bottom-image fusion.
///
/// Every variant is fatal for the frame being processed: there is no partial composite and no
/// retry.
#[derive(thiserror::Error, Debug)]
pub enum PoleRemovalError {
    /// Missing, unreadable, corrupt, or zero-size image, pole mask, or flow cache file.
    #[error("resource error: {0}")]
    Resource(String),

    /// Two buffers that must share pixel dimensions do not.
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Failure reported by a flow provider.
    #[error("flow computation error: {0}")]
    FlowComputation(String),

    /// Invalid caller-provided configuration.
    #[error("validation error: {0}")]
    Validation(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PoleRemovalError {
    /// Build a [`PoleRemovalError::Resource`] value.
    pub fn resource(msg: impl Into<String>) -> Self {
        Self::Resource(msg.into())
    }

    /// Build a [`PoleRemovalError::DimensionMismatch`] value.
    pub fn dimension_mismatch(msg: impl Into<String>) -> Self {
        Self::DimensionMismatch(msg.into())
    }

    /// Build a [`PoleRemovalError::FlowComputation`] value.
    pub fn flow(msg: impl Into<String>) -> Self {
        Self::FlowComputation(msg.into())
    }

    /// Build a [`PoleRemovalError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

/// Fail with [`PoleRemovalError::DimensionMismatch`] unless `a` and `b` have equal `(w, h)`.
pub(crate) fn ensure_same_dimensions(
    a_label: &str,
    a: (u32, u32),
    b_label: &str,
    b: (u32, u32),
) -> PoleRemovalResult<()> {
    if a == b {
        return Ok(());
    }
    Err(PoleRemovalError::dimension_mismatch(format!(
        "{a_label} is {}x{} but {b_label} is {}x{}",
        a.0, a.1, b.0, b.1
    )))
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
