use tracing::trace;

use super::node::Node;
use super::tree_view::TreeView;
use crate::physics::collision_filter::CollisionFilter;
use crate::utilities::bounding_box::BoundingBox;

/// Maximum number of branches a single build may produce.
pub const MAX_NUM_TREE_BRANCHES: usize = 64;

/// Bodies per range below which the partitioner stops splitting.
pub const SMALL_RANGE_SIZE: usize = 32;

/// Index of the reserved node that is never referenced by any other node.
pub const INVALID_NODE_INDEX: i32 = 0;

/// Index of the root node.
pub const ROOT_NODE_INDEX: i32 = 1;

/// A contiguous run of sorted bodies that is built into one subtree.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Range {
    /// First entry of the run in the sorted point array.
    pub start: usize,
    /// Number of bodies in the run.
    pub length: usize,
    /// Node holding the root of the run's subtree.
    pub root: i32,
    /// First node index reserved for the rest of the subtree.
    pub node_offset: i32,
}

impl Default for Range {
    fn default() -> Self {
        Self {
            start: 0,
            length: 0,
            root: INVALID_NODE_INDEX,
            node_offset: 0,
        }
    }
}

/// A 4-ary bounding volume hierarchy rebuilt from scratch every time its bodies change.
///
/// Nodes 0 and 1 are always present. Node 0 is never referenced; node 1 is the root. A tree with no
/// bodies consists of just those two nodes, both empty, so traversals need no special case for it.
///
/// The tree is extended with `impl` blocks in sibling modules for building, refitting and diagnostics.
/// Queries live on [`TreeView`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Tree {
    pub(crate) nodes: Vec<Node>,
    /// Aggregate filter of each node's subtree, parallel to `nodes`.
    pub(crate) node_filters: Vec<CollisionFilter>,
    /// Filter of each body, indexed by the tree-local body index.
    pub(crate) body_filters: Vec<CollisionFilter>,
    /// Branch decomposition of the last build. Only the first `branch_count` entries are meaningful.
    pub(crate) ranges: Vec<Range>,
    pub(crate) branch_count: usize,
    pub(crate) node_count: usize,
    pub(crate) body_count: usize,
    /// Whether the nodes describe the current bodies. Cleared by [`Tree::reset`] and set once a rebuild is finalized.
    pub(crate) is_built: bool,
}

impl Tree {
    /// Gets the number of nodes needed to hold a tree over `body_count` bodies.
    ///
    /// Every subtree built over `n > 4` bodies uses fewer than `2n` nodes besides its root, and the
    /// partitioner allocates at most four nodes per split.
    #[inline(always)]
    pub fn node_capacity_for(body_count: usize) -> usize {
        2 * body_count + 2 * MAX_NUM_TREE_BRANCHES + 2
    }

    /// Constructs an empty tree with room for `initial_body_capacity` bodies.
    pub fn new(initial_body_capacity: usize) -> Self {
        let mut tree = Self {
            ranges: vec![Range::default(); MAX_NUM_TREE_BRANCHES],
            ..Self::default()
        };
        tree.resize(initial_body_capacity);
        tree.clear_root_region();
        tree.is_built = true;
        tree
    }

    fn resize(&mut self, body_capacity: usize) {
        let body_capacity = body_capacity.max(self.body_filters.len());
        let node_capacity = Self::node_capacity_for(body_capacity);
        trace!(body_capacity, node_capacity, "resizing tree");
        self.nodes.resize(node_capacity, Node::EMPTY);
        self.node_filters.resize(node_capacity, CollisionFilter::DEFAULT);
        self.body_filters.resize(body_capacity, CollisionFilter::DEFAULT);
    }

    fn clear_root_region(&mut self) {
        self.nodes[0] = Node::EMPTY;
        self.nodes[1] = Node::EMPTY;
        self.node_filters[0] = CollisionFilter::DEFAULT;
        self.node_filters[1] = CollisionFilter::DEFAULT;
        self.node_count = 2;
    }

    /// Prepares the tree for a build over `body_count` bodies.
    ///
    /// Storage is reallocated only when `body_count` exceeds the current capacity. The previous contents are
    /// discarded; the tree reads as empty and [`Tree::is_built`] is false until the next build finishes.
    pub fn reset(&mut self, body_count: usize) {
        if body_count > self.body_capacity() || self.nodes.len() < Self::node_capacity_for(body_count) {
            self.resize(body_count);
        }
        if self.ranges.len() != MAX_NUM_TREE_BRANCHES {
            self.ranges = vec![Range::default(); MAX_NUM_TREE_BRANCHES];
        }
        self.body_count = body_count;
        self.branch_count = 0;
        self.is_built = false;
        self.clear_root_region();
    }

    /// Releases all backing storage. The tree can be reused after a [`Tree::reset`].
    pub fn dispose(&mut self) {
        *self = Self::default();
    }

    /// Gets the number of bodies the tree can hold without reallocating.
    #[inline(always)]
    pub fn body_capacity(&self) -> usize {
        self.body_filters.len()
    }

    /// Gets whether the tree holds a finished build over its `body_count` bodies.
    ///
    /// Only a built tree can keep its contents through a skipped build.
    #[inline(always)]
    pub fn is_built(&self) -> bool {
        self.is_built
    }

    #[inline(always)]
    pub fn body_count(&self) -> usize {
        self.body_count
    }

    #[inline(always)]
    pub fn branch_count(&self) -> usize {
        self.branch_count
    }

    /// Gets the highest used node index plus one. Exactly 2 for an empty tree.
    #[inline(always)]
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Gets the bounds of everything in the tree.
    #[inline(always)]
    pub fn bounds(&self) -> BoundingBox {
        self.nodes
            .get(ROOT_NODE_INDEX as usize)
            .map_or(BoundingBox::EMPTY, Node::bounds_union)
    }

    /// Borrows the tree's arrays for queries.
    #[inline(always)]
    pub fn view(&self) -> TreeView<'_> {
        TreeView::new(
            &self.nodes[..self.node_count.min(self.nodes.len())],
            &self.node_filters[..self.node_count.min(self.node_filters.len())],
            &self.body_filters[..self.body_count],
            &self.ranges[..self.branch_count.min(self.ranges.len())],
            self.body_count,
        )
    }

    /// Copies the contents of `view` into this tree, growing storage as needed.
    pub fn copy_from(&mut self, view: &TreeView<'_>) {
        self.nodes.clear();
        self.nodes.extend_from_slice(view.nodes());
        self.node_filters.clear();
        self.node_filters.extend_from_slice(view.node_filters());
        self.body_filters.clear();
        self.body_filters.extend_from_slice(view.body_filters());
        self.ranges.clear();
        self.ranges.extend_from_slice(view.ranges());
        self.set_counts_from(view);
    }

    pub(crate) fn set_counts_from(&mut self, view: &TreeView<'_>) {
        self.node_count = view.nodes().len();
        self.body_count = view.body_count();
        self.branch_count = view.ranges().len();
        self.is_built = view.nodes().len() > ROOT_NODE_INDEX as usize
            && (view.body_count() == 0 || view.nodes()[ROOT_NODE_INDEX as usize].child_count() > 0);
    }
}
