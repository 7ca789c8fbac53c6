use glam::{Quat, Vec3};

use super::shape::ConvexShape;

/// Collision shape representing a sphere-expanded line segment.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Capsule {
    /// Spherical expansion applied to the internal line segment.
    pub radius: f32,
    /// Half of the length of the internal line segment. Oriented along the local Y axis.
    pub half_length: f32,
}

impl Capsule {
    /// Creates a capsule shape.
    #[inline(always)]
    pub fn new(radius: f32, length: f32) -> Self {
        Self {
            radius,
            half_length: length * 0.5,
        }
    }

    /// Gets the length of the capsule's internal line segment along the local Y axis.
    pub fn length(&self) -> f32 {
        self.half_length * 2.0
    }
}

impl ConvexShape for Capsule {
    #[inline(always)]
    fn compute_bounds(&self, orientation: Quat) -> (Vec3, Vec3) {
        let segment_offset = orientation * Vec3::Y;
        let max = (self.half_length * segment_offset).abs() + Vec3::splat(self.radius);
        (-max, max)
    }

    #[inline(always)]
    fn compute_angular_expansion_data(&self) -> (f32, f32) {
        (self.half_length + self.radius, self.half_length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upright_and_lying_capsule_bounds() {
        let capsule = Capsule::new(0.5, 2.0);
        let (min, max) = capsule.compute_bounds(Quat::IDENTITY);
        assert_eq!(max, Vec3::new(0.5, 1.5, 0.5));
        assert_eq!(min, -max);

        let lying = Quat::from_rotation_z(std::f32::consts::FRAC_PI_2);
        let (_, max) = capsule.compute_bounds(lying);
        assert!((max.x - 1.5).abs() < 1e-5);
        assert!((max.y - 0.5).abs() < 1e-5);
    }
}
