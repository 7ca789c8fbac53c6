//! Turns bodies into the per-build inputs of a tree: padded bounds, filters and sort keys.

use tracing::trace;

use crate::physics::body::Body;
use crate::physics::body_properties::MotionVelocity;
use crate::physics::bounding_box_helpers::BoundingBoxHelpers;
use crate::physics::collision_filter::CollisionFilter;
use crate::physics::settings::StepInput;
use crate::physics::trees::PointAndIndex;
use crate::utilities::bounding_box::BoundingBox;
use crate::utilities::thread_dispatcher::ThreadDispatcher;

/// Bodies per summarizing work item. Smaller inputs are summarized on one worker.
const MINIMUM_BODIES_PER_CHUNK: usize = 256;

/// Buffers that live for one build of one tree.
#[derive(Debug, Default)]
pub struct BuildScratch {
    /// Sort keys, permuted in place by the partitioner and branch builder.
    pub points: Vec<PointAndIndex>,
    /// Bounds of every body, indexed by tree-local body index.
    pub aabbs: Vec<BoundingBox>,
}

impl BuildScratch {
    pub fn with_body_count(body_count: usize) -> Self {
        Self {
            points: vec![PointAndIndex::default(); body_count],
            aabbs: vec![BoundingBox::EMPTY; body_count],
        }
    }

    pub fn body_count(&self) -> usize {
        self.aabbs.len()
    }
}

/// Motion applied to dynamic bodies while summarizing.
#[derive(Clone, Copy)]
struct Motion<'a> {
    velocities: &'a [MotionVelocity],
    step: StepInput,
}

/// Computes the bounds and filter of one body.
///
/// A body without a collider collapses onto its position with a filter that matches nothing. It keeps its slot
/// so body indices stay dense.
#[inline(always)]
pub fn summarize_body(
    body: &Body,
    motion: Option<(&MotionVelocity, &StepInput)>,
    aabb_margin: f32,
) -> (BoundingBox, CollisionFilter) {
    let filter = body.effective_filter();
    let Some(collider) = body.collider.as_deref() else {
        return (BoundingBox::from_point(body.world_from_body.position), filter);
    };
    let mut bounds = collider.compute_bounds(&body.world_from_body);
    if let Some((motion, step)) = motion {
        let velocity = motion.with_gravity(step.gravity, step.time_step);
        let (maximum_radius, maximum_angular_expansion) = collider.angular_expansion_data();
        bounds = BoundingBoxHelpers::get_motion_expansion(
            &velocity,
            step.time_step,
            maximum_radius,
            maximum_angular_expansion,
        )
        .expand(&bounds);
    }
    (bounds.expanded(aabb_margin), filter)
}

/// Summarizes bodies that are not expected to move. Only the margin pads their bounds.
///
/// `body_filters` and `scratch` must hold exactly one entry per body.
pub fn summarize_static_bodies(
    bodies: &[Body],
    aabb_margin: f32,
    body_filters: &mut [CollisionFilter],
    scratch: &mut BuildScratch,
    dispatcher: &ThreadDispatcher,
) {
    summarize(bodies, None, aabb_margin, body_filters, scratch, dispatcher);
}

/// Summarizes moving bodies. Their bounds additionally cover the motion of one step, with gravity applied.
///
/// `motion_velocities` is aligned 1:1 with `bodies`.
pub fn summarize_dynamic_bodies(
    bodies: &[Body],
    motion_velocities: &[MotionVelocity],
    step: &StepInput,
    aabb_margin: f32,
    body_filters: &mut [CollisionFilter],
    scratch: &mut BuildScratch,
    dispatcher: &ThreadDispatcher,
) {
    assert_eq!(
        bodies.len(),
        motion_velocities.len(),
        "Every dynamic body needs a motion velocity."
    );
    let motion = Motion {
        velocities: motion_velocities,
        step: *step,
    };
    summarize(bodies, Some(motion), aabb_margin, body_filters, scratch, dispatcher);
}

struct Chunk<'a> {
    first_body: usize,
    bodies: &'a [Body],
    points: &'a mut [PointAndIndex],
    aabbs: &'a mut [BoundingBox],
    filters: &'a mut [CollisionFilter],
}

fn summarize(
    bodies: &[Body],
    motion: Option<Motion<'_>>,
    aabb_margin: f32,
    body_filters: &mut [CollisionFilter],
    scratch: &mut BuildScratch,
    dispatcher: &ThreadDispatcher,
) {
    let body_count = bodies.len();
    assert_eq!(body_filters.len(), body_count, "Every body needs a filter slot.");
    assert_eq!(scratch.body_count(), body_count, "Scratch must be sized to the body count.");
    if body_count == 0 {
        return;
    }

    let chunk_size = body_count
        .div_ceil(dispatcher.thread_count())
        .max(MINIMUM_BODIES_PER_CHUNK);
    let chunks: Vec<Chunk<'_>> = bodies
        .chunks(chunk_size)
        .zip(scratch.points.chunks_mut(chunk_size))
        .zip(scratch.aabbs.chunks_mut(chunk_size))
        .zip(body_filters.chunks_mut(chunk_size))
        .enumerate()
        .map(|(i, (((bodies, points), aabbs), filters))| Chunk {
            first_body: i * chunk_size,
            bodies,
            points,
            aabbs,
            filters,
        })
        .collect();
    trace!(body_count, chunk_count = chunks.len(), "summarizing bodies");

    dispatcher.dispatch(
        chunks,
        |chunk| chunk.bodies.len(),
        |mut chunk| {
            for (i, body) in chunk.bodies.iter().enumerate() {
                let index = chunk.first_body + i;
                let body_motion = motion.as_ref().map(|motion| (&motion.velocities[index], &motion.step));
                let (bounds, filter) = summarize_body(body, body_motion, aabb_margin);
                chunk.aabbs[i] = bounds;
                chunk.filters[i] = filter;
                chunk.points[i] = PointAndIndex {
                    position: bounds.center(),
                    index: index as i32,
                };
            }
        },
    );
}
