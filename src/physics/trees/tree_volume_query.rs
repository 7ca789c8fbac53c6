use glam::Vec3;

use super::tree_view::TreeView;
use crate::physics::collision_filter::CollisionFilter;
use crate::utilities::bounding_box::BoundingBox;

/// A body within range of a point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DistanceHit {
    /// Tree-local body index.
    pub body_index: i32,
    /// Distance from the query point to the body's bounds. Zero if the point is inside.
    pub distance: f32,
}

impl TreeView<'_> {
    /// Invokes `on_overlap` for every body whose bounds overlap `bounding_box`.
    pub fn get_overlaps(
        &self,
        bounding_box: &BoundingBox,
        query_filter: Option<CollisionFilter>,
        mut on_overlap: impl FnMut(i32),
    ) {
        self.for_each_candidate(
            query_filter,
            |bounds| BoundingBox::intersects(bounds, bounding_box),
            |body_index, _| on_overlap(body_index),
        );
    }

    /// Gets the indices of all bodies whose bounds overlap `bounding_box`, in ascending order.
    pub fn overlap_aabb(&self, bounding_box: &BoundingBox, query_filter: Option<CollisionFilter>) -> Vec<i32> {
        let mut overlaps = Vec::new();
        self.get_overlaps(bounding_box, query_filter, |body_index| overlaps.push(body_index));
        overlaps.sort_unstable();
        overlaps
    }

    /// Gets every body whose bounds lie within `max_distance` of `point`, nearest first.
    pub fn point_distance(
        &self,
        point: Vec3,
        max_distance: f32,
        query_filter: Option<CollisionFilter>,
    ) -> Vec<DistanceHit> {
        let max_distance_squared = max_distance * max_distance;
        let mut hits = Vec::new();
        self.for_each_candidate(
            query_filter,
            |bounds| bounds.distance_squared_to_point(point) <= max_distance_squared,
            |body_index, bounds| {
                hits.push(DistanceHit {
                    body_index,
                    distance: bounds.distance_squared_to_point(point).sqrt(),
                })
            },
        );
        hits.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.body_index.cmp(&b.body_index))
        });
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::trees::tree::Tree;
    use crate::utilities::thread_dispatcher::ThreadDispatcher;

    fn cube_tree(side: usize) -> Tree {
        let mut aabbs = Vec::new();
        for x in 0..side {
            for y in 0..side {
                for z in 0..side {
                    let center = Vec3::new(x as f32, y as f32, z as f32) * 4.0;
                    aabbs.push(BoundingBox::new(center - Vec3::ONE, center + Vec3::ONE));
                }
            }
        }
        let filters = vec![CollisionFilter::DEFAULT; aabbs.len()];
        let mut tree = Tree::new(aabbs.len());
        tree.build_from_bounds(&aabbs, &filters, &ThreadDispatcher::new(4), true);
        tree
    }

    #[test]
    fn overlaps_match_brute_force() {
        let tree = cube_tree(8);
        let query = BoundingBox::new(Vec3::new(3.0, 3.0, 3.0), Vec3::new(9.5, 5.0, 13.0));
        let found = tree.view().overlap_aabb(&query, None);
        let expected: Vec<i32> = (0..512)
            .filter(|&i| {
                let (x, y, z) = (i / 64, (i / 8) % 8, i % 8);
                let center = Vec3::new(x as f32, y as f32, z as f32) * 4.0;
                BoundingBox::intersects(&BoundingBox::new(center - Vec3::ONE, center + Vec3::ONE), &query)
            })
            .collect();
        assert!(!expected.is_empty());
        assert_eq!(found, expected);
    }

    #[test]
    fn distance_query_is_sorted_and_bounded() {
        let tree = cube_tree(5);
        let hits = tree.view().point_distance(Vec3::new(-3.0, 0.0, 0.0), 2.5, None);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].body_index, 0);
        assert!((hits[0].distance - 2.0).abs() < 1e-6);

        let hits = tree.view().point_distance(Vec3::new(2.0, 0.0, 0.0), 1.5, None);
        assert_eq!(hits.len(), 2);
        assert!(hits[0].distance <= hits[1].distance);
    }

    #[test]
    fn excluded_filter_finds_nothing() {
        let tree = cube_tree(4);
        let everything = BoundingBox::new(Vec3::splat(-100.0), Vec3::splat(100.0));
        assert_eq!(tree.view().overlap_aabb(&everything, None).len(), 64);
        assert!(tree
            .view()
            .overlap_aabb(&everything, Some(CollisionFilter::ZERO))
            .is_empty());
    }
}
