// Transform utilities for DMat4
//
// Unity serializes local transforms as separate position / rotation / scale
// fields and uses a left-handed frame. USD is right-handed, so everything
// crossing the boundary is mirrored across the X axis.

use glam::{DMat4, DQuat, DVec3, DVec4};

/// Mirror a matrix across the X axis: `F * m * F` with `F = diag(-1, 1, 1, 1)`.
///
/// Mirroring is its own inverse.
pub fn mirror_x(m: DMat4) -> DMat4 {
    let f = DMat4::from_diagonal(DVec4::new(-1.0, 1.0, 1.0, 1.0));
    f * m * f
}

/// A decomposed local transform (translation, rotation, scale).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Trs {
    pub translation: DVec3,
    pub rotation: DQuat,
    pub scale: DVec3,
}

impl Default for Trs {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Trs {
    pub const IDENTITY: Trs = Trs {
        translation: DVec3::ZERO,
        rotation: DQuat::IDENTITY,
        scale: DVec3::ONE,
    };

    /// Decompose an affine matrix. Shear is discarded.
    pub fn from_matrix(m: DMat4) -> Self {
        let (scale, rotation, translation) = m.to_scale_rotation_translation();
        Self {
            translation,
            rotation: rotation.normalize(),
            scale,
        }
    }

    pub fn to_matrix(&self) -> DMat4 {
        DMat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// Extension trait for DMat4 comparisons and checks.
pub trait DMat4Ext {
    /// Component-wise comparison with an absolute tolerance.
    fn approx_eq(&self, other: &DMat4, eps: f64) -> bool;

    /// True when every element is finite.
    fn is_finite_affine(&self) -> bool;
}

impl DMat4Ext for DMat4 {
    fn approx_eq(&self, other: &DMat4, eps: f64) -> bool {
        self.abs_diff_eq(*other, eps)
    }

    fn is_finite_affine(&self) -> bool {
        self.to_cols_array().iter().all(|v| v.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_mirror_is_involution() {
        let m = DMat4::from_scale_rotation_translation(
            DVec3::new(1.0, 2.0, 3.0),
            DQuat::from_rotation_y(0.3),
            DVec3::new(4.0, 5.0, 6.0),
        );
        assert!(mirror_x(mirror_x(m)).approx_eq(&m, 1e-12));
    }

    #[test]
    fn test_mirror_negates_x_translation() {
        let m = DMat4::from_translation(DVec3::new(1.0, 2.0, 3.0));
        let t = Trs::from_matrix(mirror_x(m));
        assert!((t.translation - DVec3::new(-1.0, 2.0, 3.0)).length() < 1e-12);
    }

    #[test]
    fn test_mirror_keeps_rotation_proper() {
        // A rotation conjugated by a reflection is still a rotation
        let m = DMat4::from_rotation_y(FRAC_PI_2);
        let mirrored = mirror_x(m);
        assert!((mirrored.determinant() - 1.0).abs() < 1e-12);

        let t = Trs::from_matrix(mirrored);
        assert!((t.scale - DVec3::ONE).length() < 1e-12);
        // +Z rotates to -X under the mirrored rotation
        let p = mirrored.transform_point3(DVec3::Z);
        assert!((p - DVec3::new(-1.0, 0.0, 0.0)).length() < 1e-12);
    }

    #[test]
    fn test_trs_round_trip() {
        let trs = Trs {
            translation: DVec3::new(1.0, -2.0, 0.5),
            rotation: DQuat::from_rotation_z(0.7),
            scale: DVec3::new(2.0, 2.0, 0.5),
        };
        let back = Trs::from_matrix(trs.to_matrix());
        assert!(back.to_matrix().approx_eq(&trs.to_matrix(), 1e-12));
    }

    #[test]
    fn test_finite_affine() {
        assert!(DMat4::IDENTITY.is_finite_affine());
        assert!(!DMat4::from_translation(DVec3::new(f64::NAN, 0.0, 0.0)).is_finite_affine());
        assert!(!DMat4::from_scale(DVec3::splat(f64::INFINITY)).is_finite_affine());
    }
}
