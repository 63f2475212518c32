use std::collections::BTreeMap;

use image::RgbaImage;

use crate::flow::block_match::BlockMatchFlow;
use crate::flow::cache::PriorFrame;
use crate::flow::field::DisplacementField;
use crate::foundation::error::{PoleRemovalError, PoleRemovalResult};

/// Registry name of [`IdentityFlow`].
pub const IDENTITY: &str = "identity";
/// Registry name of [`BlockMatchFlow`].
pub const BLOCK_MATCH: &str = "block_match";

/// Coarse prior on the direction content moves from the first image to the second.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectionHint {
    /// No preferred direction.
    #[default]
    Unknown,
    /// Content moves toward +x.
    Right,
    /// Content moves toward -x.
    Left,
    /// Content moves toward -y.
    Up,
    /// Content moves toward +y.
    Down,
}

impl DirectionHint {
    /// Unit vector of the hinted motion in image coordinates (y grows downward).
    pub fn unit(self) -> Option<[f32; 2]> {
        match self {
            Self::Unknown => None,
            Self::Right => Some([1.0, 0.0]),
            Self::Left => Some([-1.0, 0.0]),
            Self::Up => Some([0.0, -1.0]),
            Self::Down => Some([0.0, 1.0]),
        }
    }
}

/// A dense optical flow algorithm.
///
/// Implementations compute, for every pixel of `primary`, the offset to the matching position in
/// `secondary`. Both inputs are RGBA with alpha marking usable pixels; `prior` is the previous
/// frame's result when temporal mode is active.
pub trait FlowProvider: Send {
    /// Registry name of this algorithm.
    fn name(&self) -> &'static str;

    /// Compute the field. Failures are reported as [`PoleRemovalError::FlowComputation`].
    fn compute_flow(
        &mut self,
        primary: &RgbaImage,
        secondary: &RgbaImage,
        prior: Option<&PriorFrame>,
        hint: DirectionHint,
    ) -> PoleRemovalResult<DisplacementField>;
}

/// Returns the prior field when it fits the inputs, zeros otherwise.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityFlow;

impl FlowProvider for IdentityFlow {
    fn name(&self) -> &'static str {
        IDENTITY
    }

    fn compute_flow(
        &mut self,
        primary: &RgbaImage,
        _secondary: &RgbaImage,
        prior: Option<&PriorFrame>,
        _hint: DirectionHint,
    ) -> PoleRemovalResult<DisplacementField> {
        let (w, h) = primary.dimensions();
        Ok(match prior {
            Some(p) if p.field.dimensions() == (w, h) => p.field.clone(),
            _ => DisplacementField::zeros(w, h),
        })
    }
}

/// Constructor stored in a [`FlowRegistry`].
pub type FlowProviderFactory = fn() -> Box<dyn FlowProvider>;

/// Name-keyed set of flow algorithms.
///
/// `FlowRegistry::default()` contains the built-in [`IDENTITY`] and [`BLOCK_MATCH`] providers.
#[derive(Clone)]
pub struct FlowRegistry {
    factories: BTreeMap<String, FlowProviderFactory>,
}

impl Default for FlowRegistry {
    fn default() -> Self {
        let mut reg = Self::empty();
        reg.register(IDENTITY, identity_provider);
        reg.register(BLOCK_MATCH, block_match_provider);
        reg
    }
}

fn identity_provider() -> Box<dyn FlowProvider> {
    Box::new(IdentityFlow)
}

fn block_match_provider() -> Box<dyn FlowProvider> {
    Box::new(BlockMatchFlow::default())
}

impl std::fmt::Debug for FlowRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}

impl FlowRegistry {
    /// Registry without any provider.
    pub fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Add or replace the provider registered under `name`.
    pub fn register(&mut self, name: impl Into<String>, factory: FlowProviderFactory) {
        self.factories.insert(name.into(), factory);
    }

    /// `true` when `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Instantiate the provider registered under `name`.
    pub fn create(&self, name: &str) -> PoleRemovalResult<Box<dyn FlowProvider>> {
        let factory = self.factories.get(name).ok_or_else(|| {
            PoleRemovalError::validation(format!(
                "unknown flow algorithm '{name}' (known: {})",
                self.names().collect::<Vec<_>>().join(", ")
            ))
        })?;
        Ok(factory())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/flow/provider.rs"]
mod tests;
