use crate::foundation::error::{PoleRemovalError, PoleRemovalResult};

/// Dense per-pixel `(dx, dy)` offsets, row-major.
///
/// The value stored at a primary-image pixel `(x, y)` names the secondary-image source position
/// `(x + dx, y + dy)` holding the same scene content.
#[derive(Clone, Debug, PartialEq)]
pub struct DisplacementField {
    width: u32,
    height: u32,
    data: Vec<[f32; 2]>,
}

impl DisplacementField {
    /// All-zero field (identity mapping).
    pub fn zeros(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![[0.0, 0.0]; width as usize * height as usize],
        }
    }

    /// Wrap row-major offsets; `data.len()` must equal `width * height`.
    pub fn from_vec(width: u32, height: u32, data: Vec<[f32; 2]>) -> PoleRemovalResult<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .ok_or_else(|| PoleRemovalError::validation("displacement field size overflow"))?;
        if data.len() != expected {
            return Err(PoleRemovalError::validation(format!(
                "displacement field {width}x{height} expects {expected} offsets, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Field width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Field height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// `(width, height)`.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Offset at `(x, y)`.
    pub fn get(&self, x: u32, y: u32) -> [f32; 2] {
        self.data[self.index(x, y)]
    }

    /// Overwrite the offset at `(x, y)`.
    pub fn set(&mut self, x: u32, y: u32, v: [f32; 2]) {
        let idx = self.index(x, y);
        self.data[idx] = v;
    }

    /// Row-major offsets.
    pub fn as_slice(&self) -> &[[f32; 2]] {
        &self.data
    }

    /// Mutable row-major offsets.
    pub fn as_mut_slice(&mut self) -> &mut [[f32; 2]] {
        &mut self.data
    }

    /// Largest offset length in the field.
    pub fn max_magnitude(&self) -> f32 {
        self.data
            .iter()
            .map(|[dx, dy]| (dx * dx + dy * dy).sqrt())
            .fold(0.0, f32::max)
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}
