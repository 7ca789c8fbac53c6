pub mod node;
pub mod tree;
pub mod tree_builder;
mod tree_diagnostics;
pub mod tree_ray_cast;
mod tree_refit;
pub mod tree_view;
pub mod tree_volume_query;

pub use node::{Node, NodeKind};
pub use tree::{Range, Tree, MAX_NUM_TREE_BRANCHES, ROOT_NODE_INDEX, SMALL_RANGE_SIZE};
pub use tree_builder::{BuildMode, PartitionState, PointAndIndex};
pub use tree_ray_cast::{RayHit, TreeRay};
pub use tree_view::TreeView;
pub use tree_volume_query::DistanceHit;
