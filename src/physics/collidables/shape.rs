use glam::{Quat, Vec3};

/// Defines functions available on all convex shapes.
/// Convex shapes have no hollowed out regions; any line passing through a convex shape
/// will never enter and exit more than once.
pub trait ConvexShape {
    /// Computes the bounding box of the shape relative to its center, given an orientation.
    ///
    /// Returns `(min, max)` offsets from the shape's position.
    fn compute_bounds(&self, orientation: Quat) -> (Vec3, Vec3);

    /// Computes information about how the bounding box should be expanded in response to angular velocity.
    ///
    /// Returns `(maximum_radius, maximum_angular_expansion)`: the distance from the center to the
    /// farthest point of the shape, and the largest growth any axis of the bounds can experience
    /// from rotation alone.
    fn compute_angular_expansion_data(&self) -> (f32, f32);
}
