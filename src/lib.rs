//! Bottom-image fusion for a multi-camera 360° rig.
//!
//! Two downward-facing cameras each see the rig's support pole in a different place. This crate
//! fills the pole region of the primary bottom image with aligned, color-matched pixels from the
//! secondary one:
//!
//! - Describe the rig with a [`CameraRig`] and the run with [`PoleRemovalOpts`]
//! - Call [`combine_bottom_images`] (or [`combine_bottom_images_with_registry`] to plug in a
//!   custom [`FlowProvider`])
//! - Keep the flow of one frame around with [`FrameCache`] to warm-start the next
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod assets;
mod foundation;
mod flow;
mod mask;
mod pipeline;
mod render;

pub use crate::foundation::camera::{CameraModel, CameraRig, CameraRole};
pub use crate::foundation::error::{PoleRemovalError, PoleRemovalResult};

pub use crate::assets::image_io::{ReadMode, read_image, write_image};
pub use crate::flow::align::{BOTTOM_SECONDARY_HINT, align_secondary};
pub use crate::flow::block_match::BlockMatchFlow;
pub use crate::flow::cache::{
    FLOW_FILE, FrameCache, PRIMARY_IMAGE_FILE, PriorFrame, SECONDARY_IMAGE_FILE, load_field,
    read_field, save_field, write_field,
};
pub use crate::flow::field::DisplacementField;
pub use crate::flow::provider::{
    BLOCK_MATCH, DirectionHint, FlowProvider, FlowProviderFactory, FlowRegistry, IDENTITY,
    IdentityFlow,
};
pub use crate::mask::alpha::{
    PoleMask, build_alpha_image, circle_alpha_cut, cut_pole_mask, feather_alpha, rgb_to_rgba,
};
pub use crate::pipeline::pole_removal::{
    DEBUG_COMBINED_FILE, DEBUG_PRIMARY_FILE, DEBUG_SECONDARY_FILE, DEBUG_WARPED_FILE,
    PoleRemovalOpts, PoleRemovalOutput, PoleRemovalStats, combine_bottom_images,
    combine_bottom_images_with_registry,
};
pub use crate::render::color::{ChannelAdjustment, ColorAdjustmentModel};
pub use crate::render::composite::{Rgba8, composite_fill_gaps, fill_pixel, repair_alpha_hole};
pub use crate::render::warp::warp_with_flow;
