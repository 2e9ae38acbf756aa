//! Math support for usdpkg.
//!
//! Re-exports glam and adds the coordinate-system conventions needed to
//! move transforms between USD stage space and Unity space.

// Re-export glam for convenience
pub use glam::*;

mod axis;
mod bounds;
mod transform;

pub use axis::{StageBasis, UpAxis};
pub use bounds::Bounds;
pub use transform::{mirror_x, DMat4Ext, Trs};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dvec3_creation() {
        let v = DVec3::new(1.0, 2.0, 3.0);
        assert_eq!(v.x, 1.0);
        assert_eq!(v.y, 2.0);
        assert_eq!(v.z, 3.0);
    }
}
