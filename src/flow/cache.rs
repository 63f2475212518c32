use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use image::RgbaImage;

use crate::assets::image_io::{ReadMode, read_image, write_image};
use crate::flow::field::DisplacementField;
use crate::foundation::error::{PoleRemovalError, PoleRemovalResult, ensure_same_dimensions};

/// Location of the serialized field, relative to a frame data directory.
pub const FLOW_FILE: &str = "flow/flow_bottom_secondary.bin";
/// Location of the primary image the field was computed from.
pub const PRIMARY_IMAGE_FILE: &str = "flow_images/bottomImage.png";
/// Location of the secondary image the field was computed from.
pub const SECONDARY_IMAGE_FILE: &str = "flow_images/bottomImage2.png";

const MAGIC: &[u8; 4] = b"PRFL";
const VERSION: u32 = 1;

/// A previous frame's field together with the two alpha-masked images it was computed from.
#[derive(Clone, Debug, PartialEq)]
pub struct PriorFrame {
    /// Field mapping `primary` onto `secondary`.
    pub field: DisplacementField,
    /// Primary bottom image (RGBA).
    pub primary: RgbaImage,
    /// Secondary bottom image (RGBA, already flipped if the camera requires it).
    pub secondary: RgbaImage,
}

/// Frame data directory holding one [`PriorFrame`].
#[derive(Clone, Debug)]
pub struct FrameCache {
    dir: PathBuf,
}

impl FrameCache {
    /// Cache rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory of this cache.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the serialized field.
    pub fn flow_path(&self) -> PathBuf {
        self.dir.join(FLOW_FILE)
    }

    /// Read the field and both images. All three must share dimensions.
    #[tracing::instrument(skip(self), fields(dir = %self.dir.display()))]
    pub fn load(&self) -> PoleRemovalResult<PriorFrame> {
        let field = load_field(&self.flow_path())?;
        let primary =
            read_image(&self.dir.join(PRIMARY_IMAGE_FILE), ReadMode::Unchanged)?.into_rgba8();
        let secondary =
            read_image(&self.dir.join(SECONDARY_IMAGE_FILE), ReadMode::Unchanged)?.into_rgba8();
        ensure_same_dimensions(
            "cached field",
            field.dimensions(),
            "cached primary",
            primary.dimensions(),
        )?;
        ensure_same_dimensions(
            "cached field",
            field.dimensions(),
            "cached secondary",
            secondary.dimensions(),
        )?;
        tracing::debug!(
            width = field.width(),
            height = field.height(),
            "loaded previous-frame flow"
        );
        Ok(PriorFrame {
            field,
            primary,
            secondary,
        })
    }

    /// Write the field and both images, creating directories as needed.
    #[tracing::instrument(skip_all, fields(dir = %self.dir.display()))]
    pub fn save(
        &self,
        field: &DisplacementField,
        primary: &RgbaImage,
        secondary: &RgbaImage,
    ) -> PoleRemovalResult<()> {
        save_field(&self.flow_path(), field)?;
        write_image(&self.dir.join(PRIMARY_IMAGE_FILE), primary)?;
        write_image(&self.dir.join(SECONDARY_IMAGE_FILE), secondary)?;
        Ok(())
    }
}

/// Serialize `field`: magic, version, width, height, then little-endian `f32` pairs.
///
/// A field with a zero dimension is rejected, matching [`read_field`].
pub fn write_field<W: Write>(mut w: W, field: &DisplacementField) -> PoleRemovalResult<()> {
    if field.width() == 0 || field.height() == 0 {
        return Err(PoleRemovalError::resource(format!(
            "flow field has zero size ({}x{})",
            field.width(),
            field.height()
        )));
    }
    let mut bytes = Vec::with_capacity(16 + field.as_slice().len() * 8);
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&VERSION.to_le_bytes());
    bytes.extend_from_slice(&field.width().to_le_bytes());
    bytes.extend_from_slice(&field.height().to_le_bytes());
    for [dx, dy] in field.as_slice() {
        bytes.extend_from_slice(&dx.to_le_bytes());
        bytes.extend_from_slice(&dy.to_le_bytes());
    }
    w.write_all(&bytes)
        .and_then(|()| w.flush())
        .map_err(|e| PoleRemovalError::resource(format!("failed to write flow field: {e}")))
}

/// Inverse of [`write_field`].
pub fn read_field<R: Read>(mut r: R) -> PoleRemovalResult<DisplacementField> {
    let mut header = [0u8; 16];
    r.read_exact(&mut header)
        .map_err(|e| PoleRemovalError::resource(format!("truncated flow field header: {e}")))?;
    if &header[0..4] != MAGIC {
        return Err(PoleRemovalError::resource("flow field has bad magic"));
    }
    let version = le_u32(&header[4..8]);
    if version != VERSION {
        return Err(PoleRemovalError::resource(format!(
            "unsupported flow field version {version}"
        )));
    }
    let width = le_u32(&header[8..12]);
    let height = le_u32(&header[12..16]);
    if width == 0 || height == 0 {
        return Err(PoleRemovalError::resource(format!(
            "flow field has zero size ({width}x{height})"
        )));
    }
    let byte_len = u64::from(width) * u64::from(height) * 8;

    // The header is untrusted; grow the buffer only as bytes actually arrive.
    let mut payload = Vec::new();
    r.take(byte_len)
        .read_to_end(&mut payload)
        .map_err(|e| PoleRemovalError::resource(format!("failed to read flow field data: {e}")))?;
    if payload.len() as u64 != byte_len {
        return Err(PoleRemovalError::resource(format!(
            "truncated flow field data: {width}x{height} needs {byte_len} bytes, got {}",
            payload.len()
        )));
    }
    let data = payload
        .chunks_exact(8)
        .map(|c| [le_f32(&c[0..4]), le_f32(&c[4..8])])
        .collect();
    DisplacementField::from_vec(width, height, data)
}

/// Write `field` to `path`, creating parent directories.
pub fn save_field(path: &Path, field: &DisplacementField) -> PoleRemovalResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            PoleRemovalError::resource(format!(
                "failed to create flow directory '{}': {e}",
                parent.display()
            ))
        })?;
    }
    let file = std::fs::File::create(path).map_err(|e| {
        PoleRemovalError::resource(format!("failed to create '{}': {e}", path.display()))
    })?;
    write_field(std::io::BufWriter::new(file), field)
}

/// Read a field written by [`save_field`].
pub fn load_field(path: &Path) -> PoleRemovalResult<DisplacementField> {
    let file = std::fs::File::open(path).map_err(|e| {
        PoleRemovalError::resource(format!("failed to open flow '{}': {e}", path.display()))
    })?;
    read_field(std::io::BufReader::new(file)).map_err(|e| match e {
        PoleRemovalError::Resource(msg) => {
            PoleRemovalError::resource(format!("{msg} ('{}')", path.display()))
        }
        other => other,
    })
}

fn le_u32(b: &[u8]) -> u32 {
    u32::from_le_bytes([b[0], b[1], b[2], b[3]])
}

fn le_f32(b: &[u8]) -> f32 {
    f32::from_le_bytes([b[0], b[1], b[2], b[3]])
}

#[cfg(test)]
#[path = "../../tests/unit/flow/cache.rs"]
mod tests;
