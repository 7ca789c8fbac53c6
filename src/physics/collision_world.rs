use glam::Vec3;
use tracing::{debug, instrument};

use super::body::Body;
use super::body_properties::MotionVelocity;
use super::collision_detection::{BroadPhase, BroadPhaseSnapshot, BroadPhaseView, BuildInput};
use super::collision_filter::CollisionFilter;
use super::settings::{BroadPhaseSettings, SettingsError, StepInput};
use super::trees::{BuildMode, DistanceHit, RayHit, TreeRay};
use crate::utilities::bounding_box::BoundingBox;
use crate::utilities::thread_dispatcher::ThreadDispatcher;

/// Decides whether the static tree must be rebuilt by comparing the static bodies against the ones
/// the tree was last built from.
#[derive(Debug)]
struct StaticChangeDetector {
    previous: Vec<Body>,
    force_rebuild: bool,
}

impl Default for StaticChangeDetector {
    fn default() -> Self {
        Self {
            previous: Vec::new(),
            force_rebuild: true,
        }
    }
}

impl StaticChangeDetector {
    fn detect(&mut self, static_bodies: &[Body]) -> BuildMode {
        let changed = self.force_rebuild
            || self.previous.len() != static_bodies.len()
            || self
                .previous
                .iter()
                .zip(static_bodies)
                .any(|(previous, current)| !previous.broad_phase_state_eq(current));
        if changed {
            self.previous.clear();
            self.previous.extend_from_slice(static_bodies);
            self.force_rebuild = false;
        }
        BuildMode::from(changed)
    }
}

/// Owns the bodies of a world and the broad phase built over them.
///
/// Bodies live in one flat array: dynamic bodies first, then static bodies, then a synthetic default
/// static body. Every query reports indices into that array.
#[derive(Debug)]
pub struct CollisionWorld {
    settings: BroadPhaseSettings,
    bodies: Vec<Body>,
    dynamic_body_count: usize,
    motion_velocities: Vec<MotionVelocity>,
    broad_phase: BroadPhase,
    dispatcher: ThreadDispatcher,
    static_change: StaticChangeDetector,
    last_static_build_mode: Option<BuildMode>,
}

impl CollisionWorld {
    /// Creates an empty world. Only the default static body is present.
    pub fn new(settings: BroadPhaseSettings) -> Result<Self, SettingsError> {
        settings.validate()?;
        Ok(Self {
            settings,
            bodies: vec![Body::default_static()],
            dynamic_body_count: 0,
            motion_velocities: Vec::new(),
            broad_phase: BroadPhase::default(),
            dispatcher: ThreadDispatcher::new(settings.thread_count_hint),
            static_change: StaticChangeDetector::default(),
            last_static_build_mode: None,
        })
    }

    #[inline(always)]
    pub fn settings(&self) -> &BroadPhaseSettings {
        &self.settings
    }

    /// Replaces the settings. Changing whether filters are aggregated rebuilds the static tree.
    pub fn set_settings(&mut self, settings: BroadPhaseSettings) -> Result<(), SettingsError> {
        settings.validate()?;
        if settings.enable_collision_filters != self.settings.enable_collision_filters
            || settings.collision_tolerance != self.settings.collision_tolerance
        {
            self.mark_static_bodies_changed();
        }
        self.dispatcher = ThreadDispatcher::new(settings.thread_count_hint);
        self.settings = settings;
        Ok(())
    }

    /// Replaces every body in the world.
    ///
    /// # Panics
    ///
    /// Panics if `motion_velocities` is not aligned 1:1 with `dynamic_bodies`.
    pub fn set_bodies(
        &mut self,
        dynamic_bodies: Vec<Body>,
        static_bodies: Vec<Body>,
        motion_velocities: Vec<MotionVelocity>,
    ) {
        assert_eq!(
            dynamic_bodies.len(),
            motion_velocities.len(),
            "Every dynamic body needs a motion velocity."
        );
        self.dynamic_body_count = dynamic_bodies.len();
        self.bodies = dynamic_bodies;
        self.bodies.extend(static_bodies);
        self.bodies.push(Body::default_static());
        self.motion_velocities = motion_velocities;
    }

    /// Gets every body, dynamic bodies first.
    #[inline(always)]
    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    /// Gets the body at a world index as reported by queries.
    pub fn body(&self, world_index: i32) -> Option<&Body> {
        usize::try_from(world_index).ok().and_then(|index| self.bodies.get(index))
    }

    #[inline(always)]
    pub fn dynamic_bodies(&self) -> &[Body] {
        &self.bodies[..self.dynamic_body_count]
    }

    #[inline(always)]
    pub fn dynamic_bodies_mut(&mut self) -> &mut [Body] {
        &mut self.bodies[..self.dynamic_body_count]
    }

    /// Gets the static bodies, including the trailing default static body.
    #[inline(always)]
    pub fn static_bodies(&self) -> &[Body] {
        &self.bodies[self.dynamic_body_count..]
    }

    /// Gets the static bodies for editing. Edits are picked up by the next build's change detection.
    #[inline(always)]
    pub fn static_bodies_mut(&mut self) -> &mut [Body] {
        &mut self.bodies[self.dynamic_body_count..]
    }

    #[inline(always)]
    pub fn motion_velocities(&self) -> &[MotionVelocity] {
        &self.motion_velocities
    }

    #[inline(always)]
    pub fn motion_velocities_mut(&mut self) -> &mut [MotionVelocity] {
        &mut self.motion_velocities
    }

    /// Forces the next build to rebuild the static tree.
    pub fn mark_static_bodies_changed(&mut self) {
        self.static_change.force_rebuild = true;
    }

    #[inline(always)]
    pub fn broad_phase(&self) -> &BroadPhase {
        &self.broad_phase
    }

    /// Gets whether the last build rebuilt or kept the static tree. `None` before the first build.
    #[inline(always)]
    pub fn last_static_build_mode(&self) -> Option<BuildMode> {
        self.last_static_build_mode
    }

    /// Validates `step`, detects static changes and rebuilds the broad phase.
    ///
    /// Nothing is modified when validation fails.
    #[instrument(
        level = "debug",
        skip_all,
        fields(dynamic_bodies = self.dynamic_body_count, static_bodies = self.bodies.len() - self.dynamic_body_count)
    )]
    pub fn build_broad_phase(&mut self, step: &StepInput) -> Result<(), SettingsError> {
        self.settings.validate()?;
        step.validate()?;

        let (dynamic_bodies, static_bodies) = self.bodies.split_at(self.dynamic_body_count);
        let build_static_tree = self.static_change.detect(static_bodies);
        debug!(?build_static_tree, "static change detection");
        self.broad_phase.build(
            BuildInput {
                static_bodies,
                dynamic_bodies,
                motion_velocities: &self.motion_velocities,
                step: *step,
                build_static_tree,
            },
            &self.settings,
            &self.dispatcher,
        );
        self.last_static_build_mode = Some(build_static_tree);
        Ok(())
    }

    /// Borrows both trees for queries.
    #[inline(always)]
    pub fn view(&self) -> BroadPhaseView<'_> {
        self.broad_phase.view()
    }

    /// Copies the broad phase into an owned snapshot.
    pub fn snapshot(&self) -> BroadPhaseSnapshot {
        let mut snapshot = BroadPhaseSnapshot::default();
        snapshot.copy_from_view(self.view());
        snapshot
    }

    /// Finds the body whose bounds the ray enters first and that collides with `filter`.
    pub fn cast_ray(&self, ray: &TreeRay, filter: CollisionFilter) -> Option<RayHit> {
        self.view().ray_cast_closest(ray, Some(filter))
    }

    /// Finds every body whose bounds the ray enters and that collides with `filter`, nearest first.
    pub fn cast_ray_all(&self, ray: &TreeRay, filter: CollisionFilter) -> Vec<RayHit> {
        self.view().ray_cast_all(ray, Some(filter))
    }

    pub fn overlap_aabb(&self, bounding_box: &BoundingBox, filter: CollisionFilter) -> Vec<i32> {
        self.view().overlap_aabb(bounding_box, Some(filter))
    }

    pub fn point_distance(
        &self,
        point: Vec3,
        max_distance: f32,
        filter: CollisionFilter,
    ) -> Vec<DistanceHit> {
        self.view().point_distance(point, max_distance, Some(filter))
    }
}
