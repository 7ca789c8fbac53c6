use glam::{Mat3, Quat, Vec3};

use super::shape::ConvexShape;

/// Collision shape representing a solid cuboid.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoxShape {
    /// Half of the box's width along its local X axis.
    pub half_width: f32,
    /// Half of the box's height along its local Y axis.
    pub half_height: f32,
    /// Half of the box's length along its local Z axis.
    pub half_length: f32,
}

impl BoxShape {
    /// Creates a box shape from its full dimensions.
    #[inline(always)]
    pub fn new(width: f32, height: f32, length: f32) -> Self {
        Self {
            half_width: width * 0.5,
            half_height: height * 0.5,
            half_length: length * 0.5,
        }
    }

    pub fn half_extents(&self) -> Vec3 {
        Vec3::new(self.half_width, self.half_height, self.half_length)
    }
}

impl ConvexShape for BoxShape {
    #[inline(always)]
    fn compute_bounds(&self, orientation: Quat) -> (Vec3, Vec3) {
        let basis = Mat3::from_quat(orientation);
        let x = self.half_width * basis.x_axis;
        let y = self.half_height * basis.y_axis;
        let z = self.half_length * basis.z_axis;
        let max = x.abs() + y.abs() + z.abs();
        (-max, max)
    }

    #[inline(always)]
    fn compute_angular_expansion_data(&self) -> (f32, f32) {
        let maximum_radius = self.half_extents().length();
        let min_half = self.half_extents().min_element();
        (maximum_radius, maximum_radius - min_half)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotated_box_bounds_grow() {
        let shape = BoxShape::new(2.0, 2.0, 2.0);
        let (min, max) = shape.compute_bounds(Quat::IDENTITY);
        assert_eq!((min, max), (Vec3::splat(-1.0), Vec3::splat(1.0)));

        let rotated = Quat::from_rotation_z(std::f32::consts::FRAC_PI_4);
        let (_, max) = shape.compute_bounds(rotated);
        assert!((max.x - std::f32::consts::SQRT_2).abs() < 1e-5);
        assert!((max.y - std::f32::consts::SQRT_2).abs() < 1e-5);
        assert!((max.z - 1.0).abs() < 1e-5);
    }

    #[test]
    fn angular_expansion_data() {
        let shape = BoxShape::new(2.0, 4.0, 6.0);
        let (radius, expansion) = shape.compute_angular_expansion_data();
        assert!((radius - 14f32.sqrt()).abs() < 1e-5);
        assert!((expansion - (14f32.sqrt() - 1.0)).abs() < 1e-5);
    }
}
