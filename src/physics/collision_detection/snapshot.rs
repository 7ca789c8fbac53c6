use std::thread::{self, Scope};

use glam::Vec3;

use crate::physics::collision_filter::CollisionFilter;
use crate::physics::trees::{DistanceHit, RayHit, Tree, TreeRay, TreeView};
use crate::utilities::bounding_box::BoundingBox;
use crate::utilities::task_scheduling::JobHandle;

/// Read-only view of both broad phase trees.
///
/// Body indices reported by the world-index queries address the flat body array: dynamic bodies come first,
/// followed by static bodies. Static hits are therefore offset by the dynamic body count.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BroadPhaseView<'a> {
    static_tree: TreeView<'a>,
    dynamic_tree: TreeView<'a>,
}

impl<'a> BroadPhaseView<'a> {
    pub fn new(static_tree: TreeView<'a>, dynamic_tree: TreeView<'a>) -> Self {
        Self {
            static_tree,
            dynamic_tree,
        }
    }

    #[inline(always)]
    pub fn static_tree(&self) -> TreeView<'a> {
        self.static_tree
    }

    #[inline(always)]
    pub fn dynamic_tree(&self) -> TreeView<'a> {
        self.dynamic_tree
    }

    /// Gets the world index of the first static body.
    #[inline(always)]
    pub fn static_body_base(&self) -> i32 {
        self.dynamic_tree.body_count() as i32
    }

    /// Gets the world space bounds of both trees together.
    pub fn domain(&self) -> BoundingBox {
        BoundingBox::create_merged_boxes(self.static_tree.bounds(), self.dynamic_tree.bounds())
    }

    /// Finds every body whose bounds the ray enters in either tree, ordered by entry parameter.
    pub fn ray_cast_all(&self, ray: &TreeRay, query_filter: Option<CollisionFilter>) -> Vec<RayHit> {
        let mut hits = self.dynamic_tree.ray_cast_all(ray, query_filter);
        hits.extend(
            self.static_tree
                .ray_cast_all(ray, query_filter)
                .into_iter()
                .map(|hit| self.offset_static_ray_hit(hit)),
        );
        hits.sort_by(|a, b| a.t.total_cmp(&b.t).then(a.body_index.cmp(&b.body_index)));
        hits
    }

    /// Finds the body whose bounds the ray enters first in either tree.
    pub fn ray_cast_closest(&self, ray: &TreeRay, query_filter: Option<CollisionFilter>) -> Option<RayHit> {
        let dynamic_hit = self.dynamic_tree.ray_cast_closest(ray, query_filter);
        // Dynamic indices are always lower, so a dynamic hit wins ties.
        let static_ray = TreeRay {
            maximum_t: dynamic_hit.map_or(ray.maximum_t, |hit| hit.t),
            ..*ray
        };
        let static_hit = self
            .static_tree
            .ray_cast_closest(&static_ray, query_filter)
            .map(|hit| self.offset_static_ray_hit(hit));
        match (dynamic_hit, static_hit) {
            (Some(dynamic_hit), Some(static_hit)) if static_hit.t < dynamic_hit.t => Some(static_hit),
            (Some(dynamic_hit), _) => Some(dynamic_hit),
            (None, static_hit) => static_hit,
        }
    }

    /// Gets the world indices of all bodies whose bounds overlap `bounding_box`, in ascending order.
    pub fn overlap_aabb(&self, bounding_box: &BoundingBox, query_filter: Option<CollisionFilter>) -> Vec<i32> {
        let base = self.static_body_base();
        let mut overlaps = self.dynamic_tree.overlap_aabb(bounding_box, query_filter);
        overlaps.extend(
            self.static_tree
                .overlap_aabb(bounding_box, query_filter)
                .into_iter()
                .map(|body_index| body_index + base),
        );
        overlaps
    }

    /// Gets every body in either tree whose bounds lie within `max_distance` of `point`, nearest first.
    pub fn point_distance(
        &self,
        point: Vec3,
        max_distance: f32,
        query_filter: Option<CollisionFilter>,
    ) -> Vec<DistanceHit> {
        let base = self.static_body_base();
        let mut hits = self.dynamic_tree.point_distance(point, max_distance, query_filter);
        hits.extend(
            self.static_tree
                .point_distance(point, max_distance, query_filter)
                .into_iter()
                .map(|hit| DistanceHit {
                    body_index: hit.body_index + base,
                    ..hit
                }),
        );
        hits.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.body_index.cmp(&b.body_index))
        });
        hits
    }

    #[inline(always)]
    fn offset_static_ray_hit(&self, hit: RayHit) -> RayHit {
        RayHit {
            body_index: hit.body_index + self.static_body_base(),
            ..hit
        }
    }

    /// Schedules the copy of both trees into `target`, one job per array.
    ///
    /// The view borrows the trees for `'scope`, so the next build cannot start until the returned handle and
    /// every other reader are gone.
    pub fn schedule_copy_to<'env>(
        self,
        scope: &'a Scope<'a, 'env>,
        target: &'a mut BroadPhaseSnapshot,
    ) -> JobHandle<'a> {
        let BroadPhaseSnapshot {
            static_tree,
            dynamic_tree,
        } = target;
        JobHandle::combine_all(vec![
            static_tree.schedule_copy_from(scope, self.static_tree),
            dynamic_tree.schedule_copy_from(scope, self.dynamic_tree),
        ])
    }

    /// Copies both trees into `target` and waits for the copy.
    pub fn copy_to(&self, target: &mut BroadPhaseSnapshot) {
        target.static_tree.copy_from(&self.static_tree);
        target.dynamic_tree.copy_from(&self.dynamic_tree);
    }
}

/// Owned copy of both broad phase trees, independent of the broad phase that produced it.
///
/// Snapshots can be queried from any thread while the broad phase rebuilds.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BroadPhaseSnapshot {
    static_tree: Tree,
    dynamic_tree: Tree,
}

impl BroadPhaseSnapshot {
    #[inline(always)]
    pub fn static_tree(&self) -> &Tree {
        &self.static_tree
    }

    #[inline(always)]
    pub fn dynamic_tree(&self) -> &Tree {
        &self.dynamic_tree
    }

    pub fn view(&self) -> BroadPhaseView<'_> {
        BroadPhaseView::new(self.static_tree.view(), self.dynamic_tree.view())
    }

    /// Replaces the contents of this snapshot with `view`, copying every array on its own thread.
    pub fn copy_from_view(&mut self, view: BroadPhaseView<'_>) {
        thread::scope(|scope| view.schedule_copy_to(scope, self).complete());
    }
}

fn schedule_copy<'scope, 'env, T>(
    scope: &'scope Scope<'scope, 'env>,
    target: &'scope mut Vec<T>,
    source: &'scope [T],
) -> JobHandle<'scope>
where
    T: Clone + Send + Sync,
{
    JobHandle::schedule(scope, move || {
        target.clear();
        target.extend_from_slice(source);
    })
}

impl Tree {
    /// Schedules the copy of `view` into this tree. Every array is copied by an independent job; the returned
    /// handle completes once all of them have.
    pub fn schedule_copy_from<'scope, 'env>(
        &'scope mut self,
        scope: &'scope Scope<'scope, 'env>,
        view: TreeView<'scope>,
    ) -> JobHandle<'scope> {
        self.set_counts_from(&view);
        let Tree {
            nodes,
            node_filters,
            body_filters,
            ranges,
            ..
        } = self;
        JobHandle::combine_all(vec![
            schedule_copy(scope, nodes, view.nodes()),
            schedule_copy(scope, node_filters, view.node_filters()),
            schedule_copy(scope, body_filters, view.body_filters()),
            schedule_copy(scope, ranges, view.ranges()),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::collision_detection::broad_phase::{BroadPhase, BuildInput};
    use crate::physics::body::{Body, BodyId};
    use crate::physics::body_properties::{MotionVelocity, RigidPose};
    use crate::physics::collidables::{BoxShape, Collider, Sphere};
    use crate::physics::settings::{BroadPhaseSettings, StepInput};
    use crate::physics::trees::BuildMode;
    use crate::utilities::thread_dispatcher::ThreadDispatcher;
    use std::sync::Arc;

    fn body(id: u32, position: Vec3, collider: Collider) -> Body {
        Body::new(BodyId(id), RigidPose::from_position(position), Some(Arc::new(collider)))
    }

    /// Two dynamic spheres on the x axis and a static floor below them.
    fn built_broad_phase() -> BroadPhase {
        let dynamic_bodies = vec![
            body(0, Vec3::new(0.0, 2.0, 0.0), Sphere::new(0.5).into()),
            body(1, Vec3::new(10.0, 2.0, 0.0), Sphere::new(0.5).into()),
        ];
        let motion_velocities = vec![MotionVelocity::ZERO; 2];
        let static_bodies = vec![body(2, Vec3::ZERO, BoxShape::new(40.0, 1.0, 40.0).into())];
        let mut broad_phase = BroadPhase::default();
        broad_phase.build(
            BuildInput {
                static_bodies: &static_bodies,
                dynamic_bodies: &dynamic_bodies,
                motion_velocities: &motion_velocities,
                step: StepInput::new(Vec3::ZERO, 1.0 / 60.0),
                build_static_tree: BuildMode::Rebuild,
            },
            &BroadPhaseSettings::default().with_thread_count_hint(2),
            &ThreadDispatcher::new(2),
        );
        broad_phase
    }

    #[test]
    fn static_hits_use_world_indices() {
        let broad_phase = built_broad_phase();
        let view = broad_phase.view();
        assert_eq!(view.static_body_base(), 2);

        let down = TreeRay::from_segment(Vec3::new(0.0, 5.0, 0.0), Vec3::new(0.0, -5.0, 0.0));
        let hits: Vec<i32> = view.ray_cast_all(&down, None).iter().map(|hit| hit.body_index).collect();
        assert_eq!(hits, vec![0, 2]);
        assert_eq!(view.ray_cast_closest(&down, None).map(|hit| hit.body_index), Some(0));

        let floor_only = TreeRay::from_segment(Vec3::new(5.0, 5.0, 0.0), Vec3::new(5.0, -5.0, 0.0));
        assert_eq!(view.ray_cast_closest(&floor_only, None).map(|hit| hit.body_index), Some(2));

        let query = BoundingBox::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(11.0, 3.0, 1.0));
        assert_eq!(view.overlap_aabb(&query, None), vec![0, 1, 2]);

        let near = view.point_distance(Vec3::new(10.0, 2.0, 0.0), 0.1, None);
        assert_eq!(near.len(), 1);
        assert_eq!(near[0].body_index, 1);
    }

    #[test]
    fn query_filters_prune_both_trees() {
        let broad_phase = built_broad_phase();
        let nothing = CollisionFilter::ZERO;
        let query = BoundingBox::new(Vec3::splat(-100.0), Vec3::splat(100.0));
        assert!(broad_phase.view().overlap_aabb(&query, Some(nothing)).is_empty());
        assert_eq!(
            broad_phase.view().overlap_aabb(&query, Some(CollisionFilter::DEFAULT)).len(),
            3
        );
    }

    #[test]
    fn scheduled_and_blocking_copies_agree() {
        let broad_phase = built_broad_phase();
        let mut scheduled = BroadPhaseSnapshot::default();
        scheduled.copy_from_view(broad_phase.view());
        let mut blocking = BroadPhaseSnapshot::default();
        broad_phase.copy_to(&mut blocking);

        assert_eq!(scheduled, blocking);
        assert_eq!(scheduled.view(), broad_phase.view());
        assert_eq!(scheduled.view().domain(), broad_phase.domain());
    }

    #[test]
    fn snapshot_outlives_the_next_build() {
        let mut broad_phase = built_broad_phase();
        let mut snapshot = BroadPhaseSnapshot::default();
        broad_phase.copy_to(&mut snapshot);
        let before = snapshot.clone();

        broad_phase.reset(0, 0);
        assert_eq!(broad_phase.view().dynamic_tree().body_count(), 0);
        assert_eq!(snapshot, before);
        assert_eq!(snapshot.view().dynamic_tree().body_count(), 2);
    }

    #[test]
    fn snapshot_tree_can_be_rebuilt() {
        let broad_phase = built_broad_phase();
        let mut snapshot = BroadPhaseSnapshot::default();
        broad_phase.copy_to(&mut snapshot);
        let mut tree = snapshot.dynamic_tree().clone();
        tree.reset(300);
        assert_eq!(tree.node_count(), 2);
        assert!(tree.body_capacity() >= 300);
    }
}
