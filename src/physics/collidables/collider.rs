use super::box_shape::BoxShape;
use super::capsule::Capsule;
use super::shape::ConvexShape;
use super::sphere::Sphere;
use crate::physics::body_properties::RigidPose;
use crate::utilities::bounding_box::BoundingBox;

/// Geometry attached to a body. Bodies share colliders by reference.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Collider {
    Sphere(Sphere),
    Box(BoxShape),
    Capsule(Capsule),
}

impl Collider {
    /// Computes the world space bounding box of the collider placed at `pose`.
    #[inline(always)]
    pub fn compute_bounds(&self, pose: &RigidPose) -> BoundingBox {
        let (min, max) = match self {
            Collider::Sphere(shape) => shape.compute_bounds(pose.orientation),
            Collider::Box(shape) => shape.compute_bounds(pose.orientation),
            Collider::Capsule(shape) => shape.compute_bounds(pose.orientation),
        };
        BoundingBox::new(min + pose.position, max + pose.position)
    }

    /// Gets `(maximum_radius, maximum_angular_expansion)` for the wrapped shape.
    #[inline(always)]
    pub fn angular_expansion_data(&self) -> (f32, f32) {
        match self {
            Collider::Sphere(shape) => shape.compute_angular_expansion_data(),
            Collider::Box(shape) => shape.compute_angular_expansion_data(),
            Collider::Capsule(shape) => shape.compute_angular_expansion_data(),
        }
    }
}

impl From<Sphere> for Collider {
    fn from(shape: Sphere) -> Self {
        Collider::Sphere(shape)
    }
}

impl From<BoxShape> for Collider {
    fn from(shape: BoxShape) -> Self {
        Collider::Box(shape)
    }
}

impl From<Capsule> for Collider {
    fn from(shape: Capsule) -> Self {
        Collider::Capsule(shape)
    }
}
