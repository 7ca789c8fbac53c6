//! A parallel 4-ary bounding volume hierarchy broad phase.
//!
//! Bodies are split into a static tree and a dynamic tree. Each build runs four stages per tree: the body
//! summarizer computes padded bounds and filters, the partitioner splits the sorted bodies into up to
//! [`MAX_NUM_TREE_BRANCHES`](physics::trees::MAX_NUM_TREE_BRANCHES) branches, the branches are built
//! concurrently, and the finalizer refits the nodes above them. The static tree is skipped when its bodies
//! did not change.
//!
//! Built trees are read through [`BroadPhaseView`], or copied into an owned [`BroadPhaseSnapshot`] that
//! stays valid while the next build runs.

pub mod physics;
pub mod utilities;

pub use physics::body::{Body, BodyId};
pub use physics::body_properties::{BodyVelocity, MotionVelocity, RigidPose};
pub use physics::collidables::{BoxShape, Capsule, Collider, Sphere};
pub use physics::collision_detection::{BroadPhase, BroadPhaseSnapshot, BroadPhaseView, BuildInput};
pub use physics::collision_filter::CollisionFilter;
pub use physics::collision_world::CollisionWorld;
pub use physics::settings::{BroadPhaseSettings, SettingsError, StepInput};
pub use physics::trees::{BuildMode, Tree, TreeRay, TreeView};
pub use utilities::bounding_box::BoundingBox;
pub use utilities::task_scheduling::JobHandle;
pub use utilities::thread_dispatcher::ThreadDispatcher;
