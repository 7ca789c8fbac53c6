pub mod box_shape;
pub mod capsule;
pub mod collider;
pub mod shape;
pub mod sphere;

pub use box_shape::BoxShape;
pub use capsule::Capsule;
pub use collider::Collider;
pub use shape::ConvexShape;
pub use sphere::Sphere;
