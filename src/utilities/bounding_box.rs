use glam::Vec3;

/// Result of testing how one volume relates to another.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContainmentType {
    /// The objects are separate.
    Disjoint,
    /// One object fully contains the other.
    Contains,
    /// The objects are intersecting, but neither object fully contains the other.
    Intersects,
}

/// Axis-aligned box stored as its two extreme corners.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoundingBox {
    /// Corner with the smallest coordinate on every axis.
    pub min: Vec3,
    /// Corner with the largest coordinate on every axis.
    pub max: Vec3,
}

impl Default for BoundingBox {
    #[inline]
    fn default() -> Self {
        Self::EMPTY
    }
}

impl BoundingBox {
    /// Inverted box that contains nothing and intersects nothing. Merging anything into it yields that thing.
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::MAX),
        max: Vec3::splat(f32::MIN),
    };

    #[inline]
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Creates a degenerate bounding box collapsed onto a single point.
    #[inline]
    pub fn from_point(point: Vec3) -> Self {
        Self {
            min: point,
            max: point,
        }
    }

    /// Gets whether the box has `min <= max` on every axis.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.min.cmple(self.max).all()
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn extents(&self) -> Vec3 {
        self.max - self.min
    }

    /// Gets whether the boxes overlap. Touching faces count as overlap.
    #[inline]
    pub fn intersects(a: &Self, b: &Self) -> bool {
        let separated = a.max.cmplt(b.min) | b.max.cmplt(a.min);
        !separated.any()
    }

    /// Computes a value proportional to the surface area of the box.
    #[inline]
    pub fn compute_bounds_metric(&self) -> f32 {
        if !self.is_valid() {
            return 0.0;
        }
        let offset = self.max - self.min;
        offset.x * offset.y + offset.y * offset.z + offset.x * offset.z
    }

    /// Gets the smallest box holding both `a` and `b`.
    #[inline]
    pub fn create_merged_boxes(a: Self, b: Self) -> Self {
        Self {
            min: a.min.min(b.min),
            max: a.max.max(b.max),
        }
    }

    /// Grows this box to contain `other`.
    #[inline]
    pub fn include(&mut self, other: &Self) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// Grows this box to contain `point`.
    #[inline]
    pub fn include_point(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Returns a copy grown by `margin` on every side.
    #[inline]
    pub fn expanded(&self, margin: f32) -> Self {
        let margin = Vec3::splat(margin);
        Self {
            min: self.min - margin,
            max: self.max + margin,
        }
    }

    /// Classifies how `other` relates to this box.
    #[inline]
    pub fn contains(&self, other: &BoundingBox) -> ContainmentType {
        if !Self::intersects(self, other) {
            ContainmentType::Disjoint
        } else if self.min.cmple(other.min).all() && self.max.cmpge(other.max).all() {
            ContainmentType::Contains
        } else {
            ContainmentType::Intersects
        }
    }

    /// Gets the smallest box holding every point. No points yields [`BoundingBox::EMPTY`].
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        let mut bounds = Self::EMPTY;
        for point in points {
            bounds.include_point(point);
        }
        bounds
    }

    /// Squared distance from `point` to the closest point of the box; zero when inside.
    #[inline]
    pub fn distance_squared_to_point(&self, point: Vec3) -> f32 {
        let closest = point.max(self.min).min(self.max);
        closest.distance_squared(point)
    }

    /// Slab test of a ray against the box.
    ///
    /// Returns the parametric entry time clamped to zero when the ray enters the box within `[0, maximum_t]`.
    /// Axis-parallel rays are handled explicitly so that no NaN can leak into the comparison.
    pub fn intersects_ray(
        &self,
        origin: Vec3,
        inverse_direction: Vec3,
        maximum_t: f32,
    ) -> Option<f32> {
        if !self.is_valid() {
            return None;
        }
        let mut t_entry = 0.0f32;
        let mut t_exit = maximum_t;
        for axis in 0..3 {
            let inverse = inverse_direction[axis];
            if inverse.is_infinite() {
                if origin[axis] < self.min[axis] || origin[axis] > self.max[axis] {
                    return None;
                }
                continue;
            }
            let t0 = (self.min[axis] - origin[axis]) * inverse;
            let t1 = (self.max[axis] - origin[axis]) * inverse;
            t_entry = t_entry.max(t0.min(t1));
            t_exit = t_exit.min(t0.max(t1));
            if t_entry > t_exit {
                return None;
            }
        }
        Some(t_entry)
    }
}

impl std::fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.min, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_box_merges_as_identity() {
        let b = BoundingBox::new(Vec3::new(-1.0, 0.0, 2.0), Vec3::new(1.0, 3.0, 4.0));
        assert_eq!(BoundingBox::create_merged_boxes(BoundingBox::EMPTY, b), b);
        assert!(!BoundingBox::EMPTY.is_valid());
        assert!(!BoundingBox::intersects(&BoundingBox::EMPTY, &b));
    }

    #[test]
    fn containment() {
        let outer = BoundingBox::new(Vec3::splat(-2.0), Vec3::splat(2.0));
        let inner = BoundingBox::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let straddling = BoundingBox::new(Vec3::splat(1.0), Vec3::splat(3.0));
        let far = BoundingBox::new(Vec3::splat(5.0), Vec3::splat(6.0));
        assert_eq!(outer.contains(&inner), ContainmentType::Contains);
        assert_eq!(outer.contains(&straddling), ContainmentType::Intersects);
        assert_eq!(outer.contains(&far), ContainmentType::Disjoint);
    }

    #[test]
    fn ray_slab_test() {
        let b = BoundingBox::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let origin = Vec3::new(-5.0, 0.0, 0.0);
        let direction = Vec3::X;
        let t = b.intersects_ray(origin, direction.recip(), 100.0);
        assert_eq!(t, Some(4.0));
        // Too short.
        assert_eq!(b.intersects_ray(origin, direction.recip(), 3.0), None);
        // Parallel and outside.
        let origin = Vec3::new(-5.0, 2.0, 0.0);
        assert_eq!(b.intersects_ray(origin, direction.recip(), 100.0), None);
        // Starting inside.
        assert_eq!(b.intersects_ray(Vec3::ZERO, Vec3::Y.recip(), 1.0), Some(0.0));
    }

    #[test]
    fn point_distance() {
        let b = BoundingBox::new(Vec3::ZERO, Vec3::ONE);
        assert_eq!(b.distance_squared_to_point(Vec3::splat(0.5)), 0.0);
        assert_eq!(b.distance_squared_to_point(Vec3::new(3.0, 0.5, 0.5)), 4.0);
    }

    #[test]
    fn from_points_and_expansion() {
        let b = BoundingBox::from_points([Vec3::new(1.0, -2.0, 0.0), Vec3::new(-1.0, 2.0, 3.0)]);
        assert_eq!(b.min, Vec3::new(-1.0, -2.0, 0.0));
        assert_eq!(b.max, Vec3::new(1.0, 2.0, 3.0));
        let e = b.expanded(0.5);
        assert_eq!(e.min, Vec3::new(-1.5, -2.5, -0.5));
        assert_eq!(e.max, Vec3::new(1.5, 2.5, 3.5));
        assert_eq!(BoundingBox::from_points([]), BoundingBox::EMPTY);
    }
}
