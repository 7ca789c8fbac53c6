use std::fmt;
use std::sync::Arc;

use super::body_properties::RigidPose;
use super::collidables::Collider;
use super::collision_filter::CollisionFilter;

/// Stable identity of a body. Survives reordering of the body array between steps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BodyId(pub u32);

impl BodyId {
    /// Identity reserved for the synthetic static body that stands in for "no body".
    pub const DEFAULT_STATIC: Self = Self(u32::MAX);
}

impl fmt::Display for BodyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A body as consumed by the broad phase.
#[derive(Clone, Debug, PartialEq)]
pub struct Body {
    /// Pose of the body in world space.
    pub world_from_body: RigidPose,
    /// Geometry of the body, if any. Bodies without a collider collapse to a point.
    pub collider: Option<Arc<Collider>>,
    /// Filter applied when no collider overrides it.
    pub filter: CollisionFilter,
    /// Opaque per-body tag bits.
    pub custom_tags: u8,
    /// Stable identity.
    pub id: BodyId,
}

impl Default for Body {
    fn default() -> Self {
        Self {
            world_from_body: RigidPose::IDENTITY,
            collider: None,
            filter: CollisionFilter::DEFAULT,
            custom_tags: 0,
            id: BodyId::default(),
        }
    }
}

impl Body {
    /// Creates a body with the default filter and no tags.
    pub fn new(id: BodyId, world_from_body: RigidPose, collider: Option<Arc<Collider>>) -> Self {
        Self {
            world_from_body,
            collider,
            id,
            ..Self::default()
        }
    }

    /// The synthetic static body appended after every real static body.
    pub fn default_static() -> Self {
        Self {
            id: BodyId::DEFAULT_STATIC,
            ..Self::default()
        }
    }

    pub fn with_filter(mut self, filter: CollisionFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_custom_tags(mut self, custom_tags: u8) -> Self {
        self.custom_tags = custom_tags;
        self
    }

    /// Gets the filter the broad phase stores for the body: its own filter, or a filter that
    /// matches nothing when it has no collider.
    #[inline(always)]
    pub fn effective_filter(&self) -> CollisionFilter {
        if self.collider.is_some() {
            self.filter
        } else {
            CollisionFilter::ZERO
        }
    }

    /// Gets whether two bodies hold the same state as far as bounds and filtering are concerned.
    pub fn broad_phase_state_eq(&self, other: &Self) -> bool {
        let same_collider = match (&self.collider, &other.collider) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b) || a == b,
            (None, None) => true,
            _ => false,
        };
        same_collider && self.world_from_body == other.world_from_body && self.filter == other.filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::collidables::Sphere;
    use glam::Vec3;

    #[test]
    fn colliderless_bodies_filter_nothing() {
        let body = Body::default().with_filter(CollisionFilter::new(1, 1, 0));
        assert_eq!(body.effective_filter(), CollisionFilter::ZERO);
        let sphere = Arc::new(Collider::from(Sphere::new(1.0)));
        let body = Body::new(BodyId(3), RigidPose::IDENTITY, Some(sphere))
            .with_filter(CollisionFilter::new(1, 1, 0));
        assert_eq!(body.effective_filter(), CollisionFilter::new(1, 1, 0));
    }

    #[test]
    fn state_comparison_looks_through_collider_references() {
        let a = Body::new(
            BodyId(1),
            RigidPose::IDENTITY,
            Some(Arc::new(Collider::from(Sphere::new(1.0)))),
        );
        let mut b = a.clone();
        b.collider = Some(Arc::new(Collider::from(Sphere::new(1.0))));
        assert!(a.broad_phase_state_eq(&b));
        b.world_from_body.position = Vec3::X;
        assert!(!a.broad_phase_state_eq(&b));
        b = a.clone().with_custom_tags(9);
        assert!(a.broad_phase_state_eq(&b));
    }
}
