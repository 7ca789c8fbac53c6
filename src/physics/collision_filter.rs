use std::fmt;

/// Decides which bodies may interact and which bodies a query reports.
///
/// Bodies in the same nonzero group always collide when the group is positive and never collide
/// when it is negative. Otherwise two filters collide when each one's `belongs_to` intersects
/// the other's `collides_with`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CollisionFilter {
    /// Categories this body is a member of.
    pub belongs_to: u32,
    /// Categories this body can collide with.
    pub collides_with: u32,
    /// Group override. Zero means no group.
    pub group_index: i32,
}

impl Default for CollisionFilter {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl CollisionFilter {
    /// A filter that belongs to and collides with everything.
    pub const DEFAULT: Self = Self {
        belongs_to: u32::MAX,
        collides_with: u32::MAX,
        group_index: 0,
    };

    /// A filter that never collides with anything.
    pub const ZERO: Self = Self {
        belongs_to: 0,
        collides_with: 0,
        group_index: 0,
    };

    #[inline(always)]
    pub fn new(belongs_to: u32, collides_with: u32, group_index: i32) -> Self {
        Self {
            belongs_to,
            collides_with,
            group_index,
        }
    }

    /// Combines two filters into one that collides with anything either of them collides with.
    ///
    /// The group index survives only when both filters agree on it.
    #[inline(always)]
    pub fn union(a: Self, b: Self) -> Self {
        Self {
            belongs_to: a.belongs_to | b.belongs_to,
            collides_with: a.collides_with | b.collides_with,
            group_index: if a.group_index == b.group_index {
                a.group_index
            } else {
                0
            },
        }
    }

    /// Unions every filter in `filters`. An empty set yields [`CollisionFilter::ZERO`].
    #[inline(always)]
    pub fn union_all(filters: impl IntoIterator<Item = Self>) -> Self {
        filters.into_iter().reduce(Self::union).unwrap_or(Self::ZERO)
    }

    /// Gets whether bodies with the two filters may collide.
    #[inline(always)]
    pub fn is_collision_enabled(a: Self, b: Self) -> bool {
        if a.group_index > 0 && a.group_index == b.group_index {
            return true;
        }
        if a.group_index < 0 && a.group_index == b.group_index {
            return false;
        }
        (a.belongs_to & b.collides_with) != 0 && (b.belongs_to & a.collides_with) != 0
    }

    /// Gets whether `query` may collide with at least one of the filters that were unioned into `aggregate`.
    ///
    /// Never returns false when some member filter would collide with `query`. A positive query group can match a
    /// member whose group was lost in the union, so such queries are only pruned by an exact group match.
    #[inline(always)]
    pub fn may_collide_with_any(query: Self, aggregate: Self) -> bool {
        if query.group_index > 0 && query.group_index != aggregate.group_index {
            return true;
        }
        Self::is_collision_enabled(query, aggregate)
    }
}

impl fmt::Display for CollisionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "belongs {:#010x}, collides {:#010x}, group {}",
            self.belongs_to, self.collides_with, self.group_index
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_must_agree_both_ways() {
        let a = CollisionFilter::new(0b01, 0b10, 0);
        let b = CollisionFilter::new(0b10, 0b01, 0);
        let c = CollisionFilter::new(0b10, 0b10, 0);
        assert!(CollisionFilter::is_collision_enabled(a, b));
        assert!(!CollisionFilter::is_collision_enabled(a, c));
        assert!(!CollisionFilter::is_collision_enabled(
            CollisionFilter::ZERO,
            CollisionFilter::DEFAULT
        ));
    }

    #[test]
    fn groups_override_masks() {
        let positive = CollisionFilter::new(0, 0, 3);
        assert!(CollisionFilter::is_collision_enabled(positive, positive));
        let negative = CollisionFilter::new(u32::MAX, u32::MAX, -2);
        assert!(!CollisionFilter::is_collision_enabled(negative, negative));
    }

    #[test]
    fn aggregate_test_is_conservative_for_positive_groups() {
        let member = CollisionFilter::new(0, 0, 4);
        let other = CollisionFilter::new(0, 0, 0);
        let aggregate = CollisionFilter::union(member, other);
        let query = CollisionFilter::new(0, 0, 4);
        assert!(CollisionFilter::is_collision_enabled(query, member));
        assert!(!CollisionFilter::is_collision_enabled(query, aggregate));
        assert!(CollisionFilter::may_collide_with_any(query, aggregate));

        let unrelated = CollisionFilter::new(1, 1, 0);
        assert!(!CollisionFilter::may_collide_with_any(unrelated, aggregate));
    }

    #[test]
    fn union_keeps_shared_group_only() {
        let a = CollisionFilter::new(1, 4, 7);
        let b = CollisionFilter::new(2, 8, 7);
        let merged = CollisionFilter::union(a, b);
        assert_eq!(merged, CollisionFilter::new(3, 12, 7));
        let c = CollisionFilter::new(0, 0, 5);
        assert_eq!(CollisionFilter::union(merged, c).group_index, 0);
        assert_eq!(
            CollisionFilter::union(CollisionFilter::ZERO, a),
            CollisionFilter::new(1, 4, 0)
        );
    }
}
