use super::node::Node;
use super::tree::{Range, ROOT_NODE_INDEX};
use crate::physics::collision_filter::CollisionFilter;
use crate::utilities::bounding_box::BoundingBox;

/// Initial capacity of traversal stacks. Stacks grow past it when needed.
pub const TRAVERSAL_STACK_CAPACITY: usize = 256;

/// Read-only borrow of a tree's arrays.
///
/// Holding a view proves the tree is not being built: the build stages need the tree mutably. Any number of
/// views may be read concurrently.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TreeView<'a> {
    nodes: &'a [Node],
    node_filters: &'a [CollisionFilter],
    body_filters: &'a [CollisionFilter],
    ranges: &'a [Range],
    body_count: usize,
}

impl<'a> TreeView<'a> {
    pub fn new(
        nodes: &'a [Node],
        node_filters: &'a [CollisionFilter],
        body_filters: &'a [CollisionFilter],
        ranges: &'a [Range],
        body_count: usize,
    ) -> Self {
        debug_assert_eq!(nodes.len(), node_filters.len(), "Node filters are parallel to nodes.");
        debug_assert_eq!(body_filters.len(), body_count, "Every body has a filter.");
        Self {
            nodes,
            node_filters,
            body_filters,
            ranges,
            body_count,
        }
    }

    /// Gets the used nodes, starting with the two reserved ones.
    #[inline(always)]
    pub fn nodes(&self) -> &'a [Node] {
        self.nodes
    }

    #[inline(always)]
    pub fn node_filters(&self) -> &'a [CollisionFilter] {
        self.node_filters
    }

    #[inline(always)]
    pub fn body_filters(&self) -> &'a [CollisionFilter] {
        self.body_filters
    }

    /// Gets the branch decomposition of the last build.
    #[inline(always)]
    pub fn ranges(&self) -> &'a [Range] {
        self.ranges
    }

    #[inline(always)]
    pub fn body_count(&self) -> usize {
        self.body_count
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.body_count == 0
    }

    /// Gets the bounds of everything in the tree.
    pub fn bounds(&self) -> BoundingBox {
        self.nodes
            .get(ROOT_NODE_INDEX as usize)
            .map_or(BoundingBox::EMPTY, Node::bounds_union)
    }

    /// Visits every body whose bounds pass `test`, descending only into children whose bounds pass `test`
    /// and, when `query_filter` is set, whose aggregate filter may collide with it.
    pub(crate) fn for_each_candidate(
        &self,
        query_filter: Option<CollisionFilter>,
        mut test: impl FnMut(&BoundingBox) -> bool,
        mut on_body: impl FnMut(i32, &BoundingBox),
    ) {
        if self.nodes.len() <= ROOT_NODE_INDEX as usize {
            return;
        }
        let mut stack = Vec::with_capacity(TRAVERSAL_STACK_CAPACITY);
        stack.push(ROOT_NODE_INDEX);
        while let Some(node_index) = stack.pop() {
            let node = &self.nodes[node_index as usize];
            for (_, data, bounds) in node.children() {
                if !test(bounds) {
                    continue;
                }
                if node.is_leaf() {
                    if self.body_passes(query_filter, data) {
                        on_body(data, bounds);
                    }
                } else if self.node_passes(query_filter, data) {
                    stack.push(data);
                }
            }
        }
    }

    #[inline(always)]
    pub(crate) fn body_passes(&self, query_filter: Option<CollisionFilter>, body_index: i32) -> bool {
        query_filter.map_or(true, |filter| {
            CollisionFilter::is_collision_enabled(filter, self.body_filters[body_index as usize])
        })
    }

    #[inline(always)]
    pub(crate) fn node_passes(&self, query_filter: Option<CollisionFilter>, node_index: i32) -> bool {
        query_filter.map_or(true, |filter| {
            CollisionFilter::may_collide_with_any(filter, self.node_filters[node_index as usize])
        })
    }
}
