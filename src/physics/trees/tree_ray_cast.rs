use glam::Vec3;

use super::tree::ROOT_NODE_INDEX;
use super::tree_view::{TreeView, TRAVERSAL_STACK_CAPACITY};
use crate::physics::collision_filter::CollisionFilter;

/// Ray in the form used by tree traversal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TreeRay {
    pub origin: Vec3,
    pub direction: Vec3,
    /// Componentwise reciprocal of `direction`. Infinite on axes the ray is parallel to.
    pub inverse_direction: Vec3,
    /// Parametric length of the ray in units of `direction`.
    pub maximum_t: f32,
}

impl TreeRay {
    #[inline(always)]
    pub fn new(origin: Vec3, direction: Vec3, maximum_t: f32) -> Self {
        Self {
            origin,
            direction,
            inverse_direction: direction.recip(),
            maximum_t,
        }
    }

    /// Creates a ray covering the segment from `start` to `end`.
    pub fn from_segment(start: Vec3, end: Vec3) -> Self {
        Self::new(start, end - start, 1.0)
    }

    /// Gets the point at parameter `t`.
    #[inline(always)]
    pub fn point_at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// A body whose bounds a ray entered.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit {
    /// Tree-local body index.
    pub body_index: i32,
    /// Parameter at which the ray enters the body's bounds. Zero if it starts inside.
    pub t: f32,
}

fn hit_order(a: &RayHit, b: &RayHit) -> std::cmp::Ordering {
    a.t.total_cmp(&b.t).then(a.body_index.cmp(&b.body_index))
}

impl TreeView<'_> {
    /// Finds every body whose bounds the ray enters, ordered by entry parameter.
    pub fn ray_cast_all(&self, ray: &TreeRay, query_filter: Option<CollisionFilter>) -> Vec<RayHit> {
        let mut hits = Vec::new();
        self.for_each_candidate(
            query_filter,
            |bounds| {
                bounds
                    .intersects_ray(ray.origin, ray.inverse_direction, ray.maximum_t)
                    .is_some()
            },
            |body_index, bounds| {
                if let Some(t) = bounds.intersects_ray(ray.origin, ray.inverse_direction, ray.maximum_t) {
                    hits.push(RayHit { body_index, t });
                }
            },
        );
        hits.sort_by(hit_order);
        hits
    }

    /// Finds the body whose bounds the ray enters first.
    ///
    /// Children are visited nearest first and the ray is shortened at every hit, so distant subtrees are
    /// pruned. Ties go to the lower body index.
    pub fn ray_cast_closest(&self, ray: &TreeRay, query_filter: Option<CollisionFilter>) -> Option<RayHit> {
        let nodes = self.nodes();
        if nodes.len() <= ROOT_NODE_INDEX as usize {
            return None;
        }
        let mut maximum_t = ray.maximum_t;
        let mut closest: Option<RayHit> = None;
        let mut stack: Vec<(i32, f32)> = Vec::with_capacity(TRAVERSAL_STACK_CAPACITY);
        stack.push((ROOT_NODE_INDEX, 0.0));
        while let Some((node_index, entry_t)) = stack.pop() {
            if entry_t > maximum_t {
                continue;
            }
            let node = &nodes[node_index as usize];
            let mut pending = [(0i32, 0.0f32); 4];
            let mut pending_count = 0;
            for (_, data, bounds) in node.children() {
                let Some(t) = bounds.intersects_ray(ray.origin, ray.inverse_direction, maximum_t) else {
                    continue;
                };
                if node.is_leaf() {
                    if !self.body_passes(query_filter, data) {
                        continue;
                    }
                    let hit = RayHit { body_index: data, t };
                    if closest.map_or(true, |best| hit_order(&hit, &best).is_lt()) {
                        closest = Some(hit);
                        maximum_t = t;
                    }
                } else if self.node_passes(query_filter, data) {
                    pending[pending_count] = (data, t);
                    pending_count += 1;
                }
            }
            // Push the farthest first so the nearest child is visited next.
            let pending = &mut pending[..pending_count];
            pending.sort_by(|a, b| b.1.total_cmp(&a.1));
            stack.extend_from_slice(pending);
        }
        closest
    }
}
