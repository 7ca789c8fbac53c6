use glam::{Quat, Vec3};

use super::shape::ConvexShape;

/// Collision shape representing a sphere.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sphere {
    /// Radius of the sphere.
    pub radius: f32,
}

impl Sphere {
    /// Creates a sphere shape.
    #[inline(always)]
    pub fn new(radius: f32) -> Self {
        Self { radius }
    }
}

impl ConvexShape for Sphere {
    #[inline(always)]
    fn compute_bounds(&self, _orientation: Quat) -> (Vec3, Vec3) {
        let extent = Vec3::splat(self.radius);
        (-extent, extent)
    }

    #[inline(always)]
    fn compute_angular_expansion_data(&self) -> (f32, f32) {
        // Rotating a sphere about its center never changes its bounds.
        (self.radius, 0.0)
    }
}
