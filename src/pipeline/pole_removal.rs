use std::path::{Path, PathBuf};

use image::{RgbImage, RgbaImage};

use crate::assets::image_io::{ReadMode, read_image, write_image};
use crate::flow::align::align_secondary;
use crate::flow::cache::{FrameCache, PriorFrame};
use crate::flow::provider::{BLOCK_MATCH, FlowRegistry};
use crate::foundation::camera::{CameraModel, CameraRig};
use crate::foundation::error::{PoleRemovalError, PoleRemovalResult, ensure_same_dimensions};
use crate::mask::alpha::{PoleMask, build_alpha_image};
use crate::render::color::ColorAdjustmentModel;
use crate::render::composite::{composite_fill_gaps, repair_alpha_hole};
use crate::render::warp::warp_with_flow;

/// Debug dump of the masked primary image.
pub const DEBUG_PRIMARY_FILE: &str = "bottomImage.png";
/// Debug dump of the masked (and possibly flipped) secondary image.
pub const DEBUG_SECONDARY_FILE: &str = "bottomImage2.png";
/// Debug dump of the secondary after warping onto the primary.
pub const DEBUG_WARPED_FILE: &str = "bottomWarp2.png";
/// Debug dump of the final composite.
pub const DEBUG_COMBINED_FILE: &str = "_bottomCombined.png";

/// Inputs and switches for one bottom-fusion run.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PoleRemovalOpts {
    /// Directory holding `<camera id>.png` for both bottom cameras.
    pub images_dir: PathBuf,
    /// Directory holding the pole mask `<camera id>.png` for both bottom cameras, either
    /// grayscale (nonzero = pole) or red-painted color.
    pub pole_mask_dir: PathBuf,
    /// Output directory of the previous frame, used to warm-start the flow.
    #[serde(default)]
    pub prev_frame_dir: Option<PathBuf>,
    /// Directory receiving the flow cache and debug dumps.
    pub output_data_dir: PathBuf,
    /// Write intermediate images into `output_data_dir`.
    #[serde(default)]
    pub save_debug_images: bool,
    /// Write the field and its source images into `output_data_dir` for the next frame.
    #[serde(default)]
    pub save_flow_for_next_frame: bool,
    /// Registry name of the flow provider.
    #[serde(default = "default_flow_algorithm")]
    pub flow_algorithm: String,
    /// Width in pixels of the alpha ramp along every transparent edge.
    #[serde(default = "default_alpha_feather_px")]
    pub alpha_feather_px: u32,
}

fn default_flow_algorithm() -> String {
    BLOCK_MATCH.to_string()
}

fn default_alpha_feather_px() -> u32 {
    20
}

impl PoleRemovalOpts {
    /// Options with default switches for the given directories.
    pub fn new(
        images_dir: impl Into<PathBuf>,
        pole_mask_dir: impl Into<PathBuf>,
        output_data_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            images_dir: images_dir.into(),
            pole_mask_dir: pole_mask_dir.into(),
            prev_frame_dir: None,
            output_data_dir: output_data_dir.into(),
            save_debug_images: false,
            save_flow_for_next_frame: false,
            flow_algorithm: default_flow_algorithm(),
            alpha_feather_px: default_alpha_feather_px(),
        }
    }

    /// Parse options from JSON.
    pub fn from_json_str(json: &str) -> PoleRemovalResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| PoleRemovalError::validation(format!("invalid options JSON: {e}")))
    }

    /// Check that the options can run against `registry`.
    pub fn validate(&self, registry: &FlowRegistry) -> PoleRemovalResult<()> {
        if !registry.contains(&self.flow_algorithm) {
            let known: Vec<&str> = registry.names().collect();
            return Err(PoleRemovalError::validation(format!(
                "unknown flow algorithm '{}' (known: {})",
                self.flow_algorithm,
                known.join(", ")
            )));
        }
        if (self.save_debug_images || self.save_flow_for_next_frame)
            && self.output_data_dir.as_os_str().is_empty()
        {
            return Err(PoleRemovalError::validation(
                "output_data_dir must be set when saving debug images or flow",
            ));
        }
        Ok(())
    }
}

/// Counters describing one fusion run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PoleRemovalStats {
    /// Whether a previous-frame field was handed to the flow provider.
    pub warm_start: bool,
    /// Largest displacement length in the computed field.
    pub max_flow_magnitude: f32,
    /// Primary pixels changed by gap filling.
    pub pixels_filled: usize,
    /// Color correction applied to the warped secondary.
    pub color_model: ColorAdjustmentModel,
}

/// Result of [`combine_bottom_images`].
#[derive(Clone, Debug)]
pub struct PoleRemovalOutput {
    /// Fused bottom image with a feathered circular alpha.
    pub image: RgbaImage,
    /// The primary bottom camera the image belongs to.
    pub camera: CameraModel,
    /// Run counters.
    pub stats: PoleRemovalStats,
}

/// Fuse the two bottom camera images of `rig` into one pole-free image, using the default
/// flow providers.
pub fn combine_bottom_images(
    opts: &PoleRemovalOpts,
    rig: &CameraRig,
) -> PoleRemovalResult<PoleRemovalOutput> {
    combine_bottom_images_with_registry(opts, rig, &FlowRegistry::default())
}

/// Fuse the two bottom camera images of `rig`, selecting the flow provider from `registry`.
///
/// Steps:
/// 1. read both images and both pole masks
/// 2. build feathered alpha from the usable circle and the pole mask
/// 3. rotate the secondary 180 degrees when its camera requires it
/// 4. compute flow, warm-started from `prev_frame_dir` when set
/// 5. warp, color-match, and fill the primary's gaps from the secondary
/// 6. restore the circular alpha of the primary
///
/// All validation and size checks happen before anything is written.
#[tracing::instrument(skip_all, fields(algorithm = %opts.flow_algorithm))]
pub fn combine_bottom_images_with_registry(
    opts: &PoleRemovalOpts,
    rig: &CameraRig,
    registry: &FlowRegistry,
) -> PoleRemovalResult<PoleRemovalOutput> {
    opts.validate(registry)?;
    let (primary_cam, secondary_cam) = rig.bottom_pair()?;

    let primary_rgb = read_color(&opts.images_dir.join(primary_cam.image_filename()))?;
    let secondary_rgb = read_color(&opts.images_dir.join(secondary_cam.image_filename()))?;
    ensure_same_dimensions(
        "primary image",
        primary_rgb.dimensions(),
        "secondary image",
        secondary_rgb.dimensions(),
    )?;

    let (primary_mask, secondary_mask) = read_pole_masks(
        &opts.pole_mask_dir.join(primary_cam.image_filename()),
        &opts.pole_mask_dir.join(secondary_cam.image_filename()),
    )?;

    let primary = build_alpha_image(
        &primary_rgb,
        primary_cam.usable_pixels_radius,
        &primary_mask,
        opts.alpha_feather_px,
    )?;
    let mut secondary = build_alpha_image(
        &secondary_rgb,
        secondary_cam.usable_pixels_radius,
        &secondary_mask,
        opts.alpha_feather_px,
    )?;
    if secondary_cam.flip180 {
        tracing::debug!(camera = %secondary_cam.id, "rotating secondary 180 degrees");
        image::imageops::rotate180_in_place(&mut secondary);
    }

    let prior = load_prior(opts.prev_frame_dir.as_deref(), primary.dimensions())?;

    tracing::info!(
        primary = %primary_cam.id,
        secondary = %secondary_cam.id,
        "computing flow to merge bottom images"
    );
    let field = align_secondary(
        registry,
        &opts.flow_algorithm,
        &primary,
        &secondary,
        prior.as_ref(),
    )?;

    if opts.save_flow_for_next_frame {
        tracing::debug!("saving bottom-secondary flow and images");
        FrameCache::new(&opts.output_data_dir).save(&field, &primary, &secondary)?;
    }

    let warped = warp_with_flow(&secondary, &field)?;

    if opts.save_debug_images {
        write_image(&opts.output_data_dir.join(DEBUG_PRIMARY_FILE), &primary)?;
        write_image(&opts.output_data_dir.join(DEBUG_SECONDARY_FILE), &secondary)?;
        write_image(&opts.output_data_dir.join(DEBUG_WARPED_FILE), &warped)?;
    }

    let color_model = ColorAdjustmentModel::fit(&primary, &warped)?;
    let adjusted = color_model.apply(&warped);

    let mut combined = primary;
    let pixels_filled = composite_fill_gaps(&mut combined, &adjusted)?;
    repair_alpha_hole(
        &mut combined,
        primary_cam.usable_pixels_radius,
        opts.alpha_feather_px,
    );

    if opts.save_debug_images {
        write_image(&opts.output_data_dir.join(DEBUG_COMBINED_FILE), &combined)?;
    }

    let stats = PoleRemovalStats {
        warm_start: prior.is_some(),
        max_flow_magnitude: field.max_magnitude(),
        pixels_filled,
        color_model,
    };
    tracing::info!(
        pixels_filled,
        max_flow = stats.max_flow_magnitude,
        "bottom images combined"
    );
    Ok(PoleRemovalOutput {
        image: combined,
        camera: primary_cam.clone(),
        stats,
    })
}

fn read_color(path: &Path) -> PoleRemovalResult<RgbImage> {
    Ok(read_image(path, ReadMode::Color)?.into_rgb8())
}

fn read_pole_masks(p1: &Path, p2: &Path) -> PoleRemovalResult<(PoleMask, PoleMask)> {
    let read = |p: &Path| read_image(p, ReadMode::Unchanged).map(|m| PoleMask::from_image(&m));
    match (read(p1), read(p2)) {
        (Ok(m1), Ok(m2)) => Ok((m1, m2)),
        (Err(e), _) | (_, Err(e)) => Err(PoleRemovalError::resource(format!(
            "missing or bad pole mask: {}, {} ({e})",
            p1.display(),
            p2.display()
        ))),
    }
}

fn load_prior(dir: Option<&Path>, dims: (u32, u32)) -> PoleRemovalResult<Option<PriorFrame>> {
    let Some(dir) = dir else {
        tracing::debug!("no previous frame; computing flow cold");
        return Ok(None);
    };
    let prior = FrameCache::new(dir).load()?;
    ensure_same_dimensions(
        "previous-frame flow",
        prior.field.dimensions(),
        "primary image",
        dims,
    )?;
    Ok(Some(prior))
}
