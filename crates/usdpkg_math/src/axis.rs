// Stage axis conventions
//
// USD stages declare an up axis and a unit scale in their layer metadata.
// Unity is always Y-up and measured in meters.

use std::f64::consts::FRAC_PI_2;

use glam::{DMat4, DQuat, DVec3};
use serde::{Deserialize, Serialize};

/// Up axis declared by a USD stage (`upAxis` layer metadata).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpAxis {
    #[default]
    Y,
    Z,
}

impl UpAxis {
    /// Parse the token used in USD layer metadata (`"Y"` or `"Z"`).
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "Y" | "y" => Some(UpAxis::Y),
            "Z" | "z" => Some(UpAxis::Z),
            _ => None,
        }
    }

    /// Token written to USD layer metadata.
    pub fn as_token(self) -> &'static str {
        match self {
            UpAxis::Y => "Y",
            UpAxis::Z => "Z",
        }
    }

    /// Rotation that takes this up axis onto +Y.
    ///
    /// For Z-up this is -90 degrees about X, so `+Z` maps to `+Y` and
    /// `+Y` maps to `-Z`.
    pub fn rotation_to_y_up(self) -> DQuat {
        match self {
            UpAxis::Y => DQuat::IDENTITY,
            UpAxis::Z => DQuat::from_rotation_x(-FRAC_PI_2),
        }
    }
}

/// Axis and unit conventions of one stage.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StageBasis {
    pub up_axis: UpAxis,
    pub meters_per_unit: f64,
}

impl Default for StageBasis {
    fn default() -> Self {
        Self::UNITY
    }
}

impl StageBasis {
    /// Unity's fixed convention: Y-up, one unit per meter.
    pub const UNITY: StageBasis = StageBasis {
        up_axis: UpAxis::Y,
        meters_per_unit: 1.0,
    };

    pub fn new(up_axis: UpAxis, meters_per_unit: f64) -> Self {
        Self {
            up_axis,
            meters_per_unit,
        }
    }

    /// Correction that maps a root-level transform from this basis into a
    /// Y-up, meters basis. Applied on the left of the root's local matrix.
    pub fn root_correction(&self) -> DMat4 {
        let scale = if self.meters_per_unit > 0.0 && self.meters_per_unit.is_finite() {
            self.meters_per_unit
        } else {
            1.0
        };
        DMat4::from_scale_rotation_translation(
            DVec3::splat(scale),
            self.up_axis.rotation_to_y_up(),
            DVec3::ZERO,
        )
    }

    /// Inverse of [`StageBasis::root_correction`].
    pub fn root_correction_inverse(&self) -> DMat4 {
        self.root_correction().inverse()
    }

    /// True when no correction is needed.
    pub fn is_unity(&self) -> bool {
        self.up_axis == UpAxis::Y && (self.meters_per_unit - 1.0).abs() < f64::EPSILON
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_z_up_maps_z_onto_y() {
        let basis = StageBasis::new(UpAxis::Z, 1.0);
        let p = basis.root_correction().transform_point3(DVec3::new(0.0, 0.0, 5.0));
        assert!((p - DVec3::new(0.0, 5.0, 0.0)).length() < 1e-9);

        let q = basis.root_correction().transform_point3(DVec3::new(0.0, 2.0, 0.0));
        assert!((q - DVec3::new(0.0, 0.0, -2.0)).length() < 1e-9);
    }

    #[test]
    fn test_units_scale_root() {
        let basis = StageBasis::new(UpAxis::Y, 0.01);
        let p = basis.root_correction().transform_point3(DVec3::new(100.0, 0.0, 0.0));
        assert!((p.x - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_correction_inverse() {
        let basis = StageBasis::new(UpAxis::Z, 0.01);
        let m = basis.root_correction_inverse() * basis.root_correction();
        assert!(m.abs_diff_eq(DMat4::IDENTITY, 1e-12));
    }

    #[test]
    fn test_invalid_units_fall_back_to_meters() {
        let basis = StageBasis::new(UpAxis::Y, 0.0);
        assert!(basis.root_correction().abs_diff_eq(DMat4::IDENTITY, 1e-12));
    }

    #[test]
    fn test_up_axis_tokens() {
        assert_eq!(UpAxis::from_token("Z"), Some(UpAxis::Z));
        assert_eq!(UpAxis::from_token("X"), None);
        assert_eq!(UpAxis::Y.as_token(), "Y");
    }
}
