use crate::foundation::error::{PoleRemovalError, PoleRemovalResult};

/// Position of a camera within the rig.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraRole {
    /// Ring camera looking at the horizon.
    Side,
    /// Upward-facing camera.
    Top,
    /// Primary downward-facing camera.
    Bottom,
    /// Secondary downward-facing camera, mounted to see around the pole.
    Bottom2,
}

/// Calibration record for one rig camera.
///
/// Only the fields used by bottom fusion are modeled; unknown keys in serialized records are
/// ignored.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CameraModel {
    /// Camera identifier; also the basename of its image and pole mask files.
    pub id: String,
    /// Rig position.
    pub role: CameraRole,
    /// Radius in pixels, around the image center, inside which pixels are usable.
    pub usable_pixels_radius: f32,
    /// Whether the image must be rotated 180 degrees to match its counterpart's orientation.
    #[serde(default)]
    pub flip180: bool,
}

impl CameraModel {
    /// Basename of the PNG that holds this camera's image or pole mask.
    pub fn image_filename(&self) -> String {
        format!("{}.png", self.id)
    }
}

/// All cameras of a capture rig.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CameraRig {
    /// Camera records in rig order.
    pub cameras: Vec<CameraModel>,
}

impl CameraRig {
    /// Parse a rig description from JSON.
    pub fn from_json_str(json: &str) -> PoleRemovalResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| PoleRemovalError::validation(format!("invalid camera rig JSON: {e}")))
    }

    /// Return `(primary, secondary)` bottom cameras.
    ///
    /// Exactly one [`CameraRole::Bottom`] and one [`CameraRole::Bottom2`] camera must exist, and
    /// both must carry a finite, positive usable radius.
    pub fn bottom_pair(&self) -> PoleRemovalResult<(&CameraModel, &CameraModel)> {
        let primary = self.unique_role(CameraRole::Bottom)?;
        let secondary = self.unique_role(CameraRole::Bottom2)?;
        for cam in [primary, secondary] {
            if !cam.usable_pixels_radius.is_finite() || cam.usable_pixels_radius <= 0.0 {
                return Err(PoleRemovalError::validation(format!(
                    "camera '{}' usable_pixels_radius must be finite and > 0",
                    cam.id
                )));
            }
        }
        Ok((primary, secondary))
    }

    fn unique_role(&self, role: CameraRole) -> PoleRemovalResult<&CameraModel> {
        let mut found = self.cameras.iter().filter(|c| c.role == role);
        let first = found.next().ok_or_else(|| {
            PoleRemovalError::validation(format!("camera rig has no {role:?} camera"))
        })?;
        if let Some(dup) = found.next() {
            return Err(PoleRemovalError::validation(format!(
                "camera rig has more than one {role:?} camera ('{}', '{}')",
                first.id, dup.id
            )));
        }
        Ok(first)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/camera.rs"]
mod tests;
