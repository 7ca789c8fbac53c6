use std::thread::{self, Scope};

use tracing::{debug, instrument};

use super::body_summarizer::{summarize_dynamic_bodies, summarize_static_bodies, BuildScratch};
use super::snapshot::{BroadPhaseSnapshot, BroadPhaseView};
use crate::physics::body::Body;
use crate::physics::body_properties::MotionVelocity;
use crate::physics::collision_filter::CollisionFilter;
use crate::physics::settings::{BroadPhaseSettings, StepInput};
use crate::physics::trees::{BuildMode, Tree};
use crate::utilities::bounding_box::BoundingBox;
use crate::utilities::task_scheduling::JobHandle;
use crate::utilities::thread_dispatcher::ThreadDispatcher;

/// Bodies and per-step state consumed by one broad phase build.
#[derive(Clone, Copy, Debug)]
pub struct BuildInput<'a> {
    /// Bodies that rarely change. Stored in the static tree.
    pub static_bodies: &'a [Body],
    /// Bodies that move every step. Stored in the dynamic tree.
    pub dynamic_bodies: &'a [Body],
    /// Motion of each dynamic body, aligned 1:1 with `dynamic_bodies`.
    pub motion_velocities: &'a [MotionVelocity],
    pub step: StepInput,
    /// Whether the static bodies changed since the last build. A changed static body count, or a static tree
    /// that was reset since its last build, always rebuilds.
    pub build_static_tree: BuildMode,
}

/// Manages the two trees that index every body: one over static bodies and one over dynamic bodies.
///
/// The trees are rebuilt independently and concurrently. The dynamic tree is rebuilt on every build; the static
/// tree only when its bodies changed.
#[derive(Clone, Debug, PartialEq)]
pub struct BroadPhase {
    /// Tree containing bodies that rarely change.
    static_tree: Tree,
    /// Tree containing bodies that move every step.
    dynamic_tree: Tree,
}

impl Default for BroadPhase {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

impl BroadPhase {
    /// Creates a broad phase with room for the given body counts.
    pub fn new(static_capacity: usize, dynamic_capacity: usize) -> Self {
        Self {
            static_tree: Tree::new(static_capacity),
            dynamic_tree: Tree::new(dynamic_capacity),
        }
    }

    #[inline(always)]
    pub fn static_tree(&self) -> &Tree {
        &self.static_tree
    }

    #[inline(always)]
    pub fn dynamic_tree(&self) -> &Tree {
        &self.dynamic_tree
    }

    /// Gets the world space bounds of both trees together.
    pub fn domain(&self) -> BoundingBox {
        BoundingBox::create_merged_boxes(self.static_tree.bounds(), self.dynamic_tree.bounds())
    }

    /// Empties both trees and ensures they can hold the given body counts.
    pub fn reset(&mut self, static_count: usize, dynamic_count: usize) {
        self.static_tree.reset(static_count);
        self.dynamic_tree.reset(dynamic_count);
    }

    /// Releases the memory held by both trees.
    pub fn dispose(&mut self) {
        self.static_tree.dispose();
        self.dynamic_tree.dispose();
    }

    /// Borrows both trees for queries.
    pub fn view(&self) -> BroadPhaseView<'_> {
        BroadPhaseView::new(self.static_tree.view(), self.dynamic_tree.view())
    }

    /// Duplicates both trees into `target`.
    pub fn copy_to(&self, target: &mut BroadPhaseSnapshot) {
        self.view().copy_to(target);
    }

    /// Schedules the build of both trees in `scope`.
    ///
    /// Each tree runs summarize, partition, branch build and finalize as a chain of jobs; the two chains run
    /// concurrently. The returned handle completes once both trees are built and yields a read-only view of
    /// them, so readers can only be created after the build and the next build can only start once every
    /// reader is gone.
    #[instrument(
        level = "debug",
        skip_all,
        fields(
            static_bodies = input.static_bodies.len(),
            dynamic_bodies = input.dynamic_bodies.len()
        )
    )]
    pub fn schedule_build_jobs<'scope, 'env>(
        &'scope mut self,
        scope: &'scope Scope<'scope, 'env>,
        input: BuildInput<'scope>,
        settings: &BroadPhaseSettings,
        dispatcher: &'scope ThreadDispatcher,
    ) -> JobHandle<'scope, BroadPhaseView<'scope>> {
        let static_mode = if input.static_bodies.len() != self.static_tree.body_count()
            || !self.static_tree.is_built()
        {
            BuildMode::Rebuild
        } else {
            input.build_static_tree
        };
        debug!(
            ?static_mode,
            static_bodies = input.static_bodies.len(),
            dynamic_bodies = input.dynamic_bodies.len(),
            "scheduling broad phase build"
        );

        let settings = *settings;
        let aabb_margin = settings.aabb_margin();
        let static_bodies = input.static_bodies;
        let static_handle = schedule_tree_build(
            scope,
            TreeBuild {
                label: "static",
                tree: &mut self.static_tree,
                body_count: static_bodies.len(),
                mode: static_mode,
                settings,
                dispatcher,
            },
            move |body_filters, scratch| {
                summarize_static_bodies(static_bodies, aabb_margin, body_filters, scratch, dispatcher)
            },
        );

        let dynamic_bodies = input.dynamic_bodies;
        let motion_velocities = input.motion_velocities;
        let step = input.step;
        let dynamic_handle = schedule_tree_build(
            scope,
            TreeBuild {
                label: "dynamic",
                tree: &mut self.dynamic_tree,
                body_count: dynamic_bodies.len(),
                mode: BuildMode::Rebuild,
                settings,
                dispatcher,
            },
            move |body_filters, scratch| {
                summarize_dynamic_bodies(
                    dynamic_bodies,
                    motion_velocities,
                    &step,
                    aabb_margin,
                    body_filters,
                    scratch,
                    dispatcher,
                )
            },
        );

        static_handle
            .join(dynamic_handle)
            .map(|(static_tree, dynamic_tree)| BroadPhaseView::new(static_tree.view(), dynamic_tree.view()))
    }

    /// Builds both trees and waits for them.
    pub fn build(&mut self, input: BuildInput<'_>, settings: &BroadPhaseSettings, dispatcher: &ThreadDispatcher) {
        thread::scope(move |scope| {
            self.schedule_build_jobs(scope, input, settings, dispatcher).complete();
        });
    }
}

/// One tree's share of a build.
struct TreeBuild<'scope> {
    label: &'static str,
    tree: &'scope mut Tree,
    body_count: usize,
    mode: BuildMode,
    settings: BroadPhaseSettings,
    dispatcher: &'scope ThreadDispatcher,
}

/// Chains the four build stages of one tree. The per-build scratch buffers travel along the chain and are
/// dropped when the finalizer completes.
fn schedule_tree_build<'scope, 'env, S>(
    scope: &'scope Scope<'scope, 'env>,
    build: TreeBuild<'scope>,
    summarize: S,
) -> JobHandle<'scope, &'scope Tree>
where
    S: FnOnce(&mut [CollisionFilter], &mut BuildScratch) + Send + 'scope,
{
    let TreeBuild {
        label,
        tree,
        body_count,
        mode,
        settings,
        dispatcher,
    } = build;
    let enable_filters = settings.enable_collision_filters;

    let summarized = JobHandle::schedule(scope, move || {
        let scratch = match mode {
            BuildMode::Rebuild => {
                tree.reset(body_count);
                let mut scratch = BuildScratch::with_body_count(body_count);
                summarize(&mut tree.body_filters[..body_count], &mut scratch);
                scratch
            }
            BuildMode::Skip => {
                debug_assert_eq!(
                    tree.body_count(),
                    body_count,
                    "A skipped build requires an unchanged body count."
                );
                BuildScratch::default()
            }
        };
        (tree, scratch)
    });

    let partitioned = summarized.then(scope, move |(tree, mut scratch)| {
        let state = tree.build_first_n_levels(&mut scratch.points, settings.thread_count_hint, mode);
        (tree, scratch, state)
    });

    let branched = partitioned.then(scope, move |(tree, mut scratch, state)| {
        let BuildScratch { points, aabbs } = &mut scratch;
        tree.build_branches(points, aabbs, dispatcher, enable_filters);
        (tree, scratch, state)
    });

    branched.then(scope, move |(tree, scratch, state)| {
        tree.finalize(state, enable_filters);
        drop(scratch);
        debug!(
            tree = label,
            ?mode,
            body_count = tree.body_count(),
            branch_count = tree.branch_count(),
            node_count = tree.node_count(),
            "tree ready"
        );
        &*tree
    })
}
