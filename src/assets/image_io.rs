use std::path::Path;

use image::{DynamicImage, ImageFormat, RgbaImage};

use crate::foundation::error::{PoleRemovalError, PoleRemovalResult};

/// How decoded pixels are converted on read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadMode {
    /// Drop any alpha channel and return 8-bit RGB.
    Color,
    /// Keep the decoded layout (channel count and alpha) as stored.
    Unchanged,
}

/// Read and decode an image file.
///
/// Fails with [`PoleRemovalError::Resource`] when the file cannot be opened or decoded, or when it
/// decodes to an image with a zero dimension.
pub fn read_image(path: &Path, mode: ReadMode) -> PoleRemovalResult<DynamicImage> {
    let img = image::open(path).map_err(|e| {
        PoleRemovalError::resource(format!("failed to read image '{}': {e}", path.display()))
    })?;
    if img.width() == 0 || img.height() == 0 {
        return Err(PoleRemovalError::resource(format!(
            "image '{}' has zero size",
            path.display()
        )));
    }
    Ok(match mode {
        ReadMode::Color => DynamicImage::ImageRgb8(img.into_rgb8()),
        ReadMode::Unchanged => img,
    })
}

/// Encode `img` as PNG at `path`, creating parent directories as needed.
pub fn write_image(path: &Path, img: &RgbaImage) -> PoleRemovalResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            PoleRemovalError::resource(format!(
                "failed to create output directory '{}': {e}",
                parent.display()
            ))
        })?;
    }
    img.save_with_format(path, ImageFormat::Png).map_err(|e| {
        PoleRemovalError::resource(format!("failed to write image '{}': {e}", path.display()))
    })
}

#[cfg(test)]
#[path = "../../tests/unit/assets/image_io.rs"]
mod tests;
