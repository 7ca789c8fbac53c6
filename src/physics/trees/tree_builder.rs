use glam::Vec3;
use tracing::trace;

use super::node::Node;
use super::tree::{Range, Tree, MAX_NUM_TREE_BRANCHES, ROOT_NODE_INDEX, SMALL_RANGE_SIZE};
use crate::physics::collision_filter::CollisionFilter;
use crate::utilities::bounding_box::BoundingBox;
use crate::utilities::thread_dispatcher::ThreadDispatcher;

/// Whether a tree is rebuilt this cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BuildMode {
    /// Inputs changed; rebuild from scratch.
    #[default]
    Rebuild,
    /// Inputs are unchanged; keep the tree from the previous cycle.
    Skip,
}

impl From<bool> for BuildMode {
    /// `true` means the tree must be rebuilt.
    fn from(should_build: bool) -> Self {
        if should_build {
            BuildMode::Rebuild
        } else {
            BuildMode::Skip
        }
    }
}

/// Sort key of a body: the center of its bounds and its tree-local index.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PointAndIndex {
    pub position: Vec3,
    pub index: i32,
}

/// What the partitioner did, carried to the finalizer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PartitionState {
    /// Top levels were rebuilt. Nodes `1..top_node_count` belong to the top levels.
    Built { top_node_count: usize },
    /// The build was skipped; the finalizer restores this branch count.
    Skipped { previous_branch_count: usize },
}

/// Number of nodes a branch over `body_count` bodies needs in addition to its root.
#[inline(always)]
pub fn branch_node_capacity(body_count: usize) -> usize {
    if body_count <= 4 {
        0
    } else {
        2 * body_count
    }
}

fn centroid_domain(points: &[PointAndIndex]) -> BoundingBox {
    BoundingBox::from_points(points.iter().map(|point| point.position))
}

fn longest_axis(extents: Vec3) -> usize {
    if extents.x >= extents.y && extents.x >= extents.z {
        0
    } else if extents.y >= extents.z {
        1
    } else {
        2
    }
}

/// Moves the `pivot` smallest points (along the longest axis of their centers) to the front.
fn median_split(points: &mut [PointAndIndex], pivot: usize) {
    if pivot == 0 || pivot >= points.len() {
        return;
    }
    let axis = longest_axis(centroid_domain(points).extents());
    points.select_nth_unstable_by(pivot, |a, b| {
        a.position[axis]
            .total_cmp(&b.position[axis])
            .then(a.index.cmp(&b.index))
    });
}

/// Splits `points` into four spatially coherent quarters in place. Returns the five quarter boundaries.
///
/// Every quarter is nonempty when there are at least four points.
fn partition_quarters(points: &mut [PointAndIndex]) -> [usize; 5] {
    let length = points.len();
    let half = length / 2;
    median_split(points, half);
    let (low, high) = points.split_at_mut(half);
    let low_half = low.len() / 2;
    median_split(low, low_half);
    let high_half = high.len() / 2;
    median_split(high, high_half);
    [0, low_half, half, half + high_half, length]
}

impl Tree {
    /// Builds the top levels of the tree and decides the branch decomposition.
    ///
    /// Ranges are split four ways until no range holds more than `body_count / thread_count_hint`
    /// bodies (but never below [`SMALL_RANGE_SIZE`]) or the branch limit is reached. Child bounds of the
    /// top-level nodes are left empty until [`Tree::finalize`].
    ///
    /// With [`BuildMode::Skip`] nothing is touched except the branch count, which drops to zero so that
    /// [`Tree::build_branches`] has no work.
    pub fn build_first_n_levels(
        &mut self,
        points: &mut [PointAndIndex],
        thread_count_hint: usize,
        mode: BuildMode,
    ) -> PartitionState {
        if mode == BuildMode::Skip {
            let previous_branch_count = self.branch_count;
            self.branch_count = 0;
            return PartitionState::Skipped {
                previous_branch_count,
            };
        }
        assert_eq!(
            points.len(),
            self.body_count,
            "The tree must be reset to the number of bodies being built."
        );
        assert!(
            self.ranges.len() >= MAX_NUM_TREE_BRANCHES,
            "The tree must be reset before building."
        );

        self.nodes[0] = Node::EMPTY;
        self.nodes[ROOT_NODE_INDEX as usize] = Node::EMPTY;
        self.node_filters[0] = CollisionFilter::DEFAULT;
        self.node_filters[ROOT_NODE_INDEX as usize] = CollisionFilter::DEFAULT;
        self.node_count = 2;
        self.branch_count = 0;
        if points.is_empty() {
            return PartitionState::Built { top_node_count: 2 };
        }

        let body_count = points.len();
        let thread_count = thread_count_hint.max(1);
        let largest_allowed = (body_count / thread_count).max(SMALL_RANGE_SIZE);
        // While any range is still above `largest_allowed`, ranges above this finer threshold keep splitting
        // alongside it so that sibling branches end up of comparable size.
        let small_threshold = (largest_allowed / thread_count).max(SMALL_RANGE_SIZE);

        let mut level = vec![Range {
            start: 0,
            length: body_count,
            root: ROOT_NODE_INDEX,
            node_offset: 0,
        }];
        let mut free = ROOT_NODE_INDEX + 1;
        let mut largest_in_level = body_count;
        while largest_in_level > largest_allowed {
            let mut next = Vec::with_capacity(MAX_NUM_TREE_BRANCHES);
            let mut any_split = false;
            largest_in_level = 0;
            for (i, range) in level.iter().enumerate() {
                let remaining = level.len() - i - 1;
                let room_for_split = next.len() + 4 + remaining <= MAX_NUM_TREE_BRANCHES;
                if range.length <= small_threshold || !room_for_split {
                    largest_in_level = largest_in_level.max(range.length);
                    next.push(*range);
                    continue;
                }

                any_split = true;
                let range_points = &mut points[range.start..range.start + range.length];
                let bounds = partition_quarters(range_points);
                let node = &mut self.nodes[range.root as usize];
                node.clear_internal();
                for slot in 0..4 {
                    let quarter = &range_points[bounds[slot]..bounds[slot + 1]];
                    let root = free;
                    free += 1;
                    // Child bounds are filled in by the finalizer once the branches exist.
                    node.data[slot] = root;
                    largest_in_level = largest_in_level.max(quarter.len());
                    next.push(Range {
                        start: range.start + bounds[slot],
                        length: quarter.len(),
                        root,
                        node_offset: 0,
                    });
                }
            }
            level = next;
            if !any_split {
                break;
            }
        }

        let mut node_offset = free;
        for range in &mut level {
            range.node_offset = node_offset;
            node_offset += branch_node_capacity(range.length) as i32;
        }
        assert!(
            node_offset as usize <= self.nodes.len(),
            "Branch node offsets must stay within the allocated nodes."
        );
        self.ranges[..level.len()].copy_from_slice(&level);
        self.branch_count = level.len();
        self.node_count = free as usize;
        trace!(
            body_count,
            branch_count = level.len(),
            top_node_count = free,
            "built top levels"
        );
        PartitionState::Built {
            top_node_count: free as usize,
        }
    }

    /// Builds every branch produced by [`Tree::build_first_n_levels`], in parallel across `dispatcher`.
    ///
    /// Each branch writes only to its own node slice; branch roots are written back once all branches finish.
    /// `aabbs` is indexed by tree-local body index.
    pub fn build_branches(
        &mut self,
        points: &mut [PointAndIndex],
        aabbs: &[BoundingBox],
        dispatcher: &ThreadDispatcher,
        enable_filters: bool,
    ) {
        let branch_count = self.branch_count;
        if branch_count == 0 {
            return;
        }
        assert!(
            branch_count <= MAX_NUM_TREE_BRANCHES,
            "Branch count exceeds the maximum number of branches."
        );
        assert_eq!(aabbs.len(), self.body_count, "Every body needs bounds.");
        let ranges = self.ranges[..branch_count].to_vec();
        assert_eq!(ranges[0].start, 0, "Branches must start at the first body.");
        for pair in ranges.windows(2) {
            assert_eq!(
                pair[0].start + pair[0].length,
                pair[1].start,
                "Branch body ranges must be contiguous."
            );
            assert!(
                pair[0].node_offset as usize + branch_node_capacity(pair[0].length)
                    <= pair[1].node_offset as usize,
                "Branch node offsets must be increasing and disjoint."
            );
        }

        let first_offset = ranges[0].node_offset as usize;
        let body_filters = &self.body_filters[..self.body_count];
        let mut nodes_rest = &mut self.nodes[first_offset..];
        let mut filters_rest = &mut self.node_filters[first_offset..];
        let mut points_rest = points;
        let mut cursor = first_offset;
        let mut work = Vec::with_capacity(branch_count);
        for range in &ranges {
            let gap = range.node_offset as usize - cursor;
            let capacity = branch_node_capacity(range.length);
            let (_, rest) = std::mem::take(&mut nodes_rest).split_at_mut(gap);
            let (branch_nodes, rest) = rest.split_at_mut(capacity);
            nodes_rest = rest;
            let (_, rest) = std::mem::take(&mut filters_rest).split_at_mut(gap);
            let (branch_filters, rest) = rest.split_at_mut(capacity);
            filters_rest = rest;
            let (branch_points, rest) = std::mem::take(&mut points_rest).split_at_mut(range.length);
            points_rest = rest;
            cursor = range.node_offset as usize + capacity;
            work.push(BranchWork {
                range: *range,
                points: branch_points,
                nodes: branch_nodes,
                node_filters: branch_filters,
            });
        }

        let results = dispatcher.dispatch(
            work,
            |branch| branch.range.length,
            |branch| build_branch(branch, aabbs, body_filters, enable_filters),
        );

        let mut node_count = self.node_count;
        for (range, result) in ranges.iter().zip(results) {
            self.nodes[range.root as usize] = result.root;
            self.node_filters[range.root as usize] = result.root_filter;
            node_count = node_count.max(range.node_offset as usize + result.used);
        }
        self.node_count = node_count;
    }

    /// Builds the whole tree over `aabbs` on the calling thread plus `dispatcher`'s workers.
    ///
    /// Convenience for callers that already hold bounds and filters; the broad phase schedules the same
    /// stages as separate jobs.
    pub fn build_from_bounds(
        &mut self,
        aabbs: &[BoundingBox],
        body_filters: &[CollisionFilter],
        dispatcher: &ThreadDispatcher,
        enable_filters: bool,
    ) {
        assert_eq!(aabbs.len(), body_filters.len(), "Every body needs a filter.");
        self.reset(aabbs.len());
        self.body_filters[..aabbs.len()].copy_from_slice(body_filters);
        let mut points: Vec<PointAndIndex> = aabbs
            .iter()
            .enumerate()
            .map(|(index, bounds)| PointAndIndex {
                position: bounds.center(),
                index: index as i32,
            })
            .collect();
        let state =
            self.build_first_n_levels(&mut points, dispatcher.thread_count(), BuildMode::Rebuild);
        self.build_branches(&mut points, aabbs, dispatcher, enable_filters);
        self.finalize(state, enable_filters);
    }
}

struct BranchWork<'a> {
    range: Range,
    points: &'a mut [PointAndIndex],
    nodes: &'a mut [Node],
    node_filters: &'a mut [CollisionFilter],
}

struct BranchResult {
    root: Node,
    root_filter: CollisionFilter,
    used: usize,
}

fn build_branch(
    branch: BranchWork<'_>,
    aabbs: &[BoundingBox],
    body_filters: &[CollisionFilter],
    enable_filters: bool,
) -> BranchResult {
    let BranchWork {
        range,
        points,
        nodes,
        node_filters,
    } = branch;
    trace!(
        start = range.start,
        length = range.length,
        node_offset = range.node_offset,
        "building branch"
    );
    let mut builder = BranchBuilder {
        nodes,
        node_filters,
        node_offset: range.node_offset,
        used: 0,
        aabbs,
        body_filters,
        enable_filters,
    };
    let (root, root_filter) = builder.build_node(points);
    let used = builder.used;
    // Reserved but unused slots are cleared so the node array only depends on the input.
    builder.nodes[used..].fill(Node::EMPTY);
    builder.node_filters[used..].fill(CollisionFilter::DEFAULT);
    BranchResult {
        root,
        root_filter,
        used,
    }
}

struct BranchBuilder<'a> {
    nodes: &'a mut [Node],
    node_filters: &'a mut [CollisionFilter],
    node_offset: i32,
    used: usize,
    aabbs: &'a [BoundingBox],
    body_filters: &'a [CollisionFilter],
    enable_filters: bool,
}

impl BranchBuilder<'_> {
    fn allocate(&mut self) -> usize {
        let local = self.used;
        assert!(
            local < self.nodes.len(),
            "A branch must not overrun its reserved node range."
        );
        self.used += 1;
        local
    }

    fn build_leaf(&self, points: &[PointAndIndex]) -> (Node, CollisionFilter) {
        let mut node = Node::EMPTY;
        node.clear_leaf();
        for (slot, point) in points.iter().enumerate() {
            node.set_child(slot, point.index, self.aabbs[point.index as usize]);
        }
        let filter = if self.enable_filters {
            CollisionFilter::union_all(points.iter().map(|point| self.body_filters[point.index as usize]))
        } else {
            CollisionFilter::DEFAULT
        };
        (node, filter)
    }

    fn build_node(&mut self, points: &mut [PointAndIndex]) -> (Node, CollisionFilter) {
        if points.len() <= 4 {
            return self.build_leaf(points);
        }
        let bounds = partition_quarters(points);
        let mut node = Node::EMPTY;
        let mut child_filters = [CollisionFilter::ZERO; 4];
        for slot in 0..4 {
            let quarter = &mut points[bounds[slot]..bounds[slot + 1]];
            // Children are allocated before their own children, so parents always precede them.
            let local = self.allocate();
            let (child, child_filter) = self.build_node(quarter);
            node.set_child(slot, self.node_offset + local as i32, child.bounds_union());
            self.nodes[local] = child;
            self.node_filters[local] = child_filter;
            child_filters[slot] = child_filter;
        }
        (node, CollisionFilter::union_all(child_filters))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_bounds(count: usize) -> Vec<BoundingBox> {
        (0..count)
            .map(|i| {
                let center = Vec3::new((i % 10) as f32, ((i / 10) % 10) as f32, (i / 100) as f32) * 3.0;
                BoundingBox::new(center - Vec3::splat(0.5), center + Vec3::splat(0.5))
            })
            .collect()
    }

    fn points_for(aabbs: &[BoundingBox]) -> Vec<PointAndIndex> {
        aabbs
            .iter()
            .enumerate()
            .map(|(i, b)| PointAndIndex {
                position: b.center(),
                index: i as i32,
            })
            .collect()
    }

    #[test]
    fn build_mode_from_flag() {
        assert_eq!(BuildMode::from(true), BuildMode::Rebuild);
        assert_eq!(BuildMode::from(false), BuildMode::Skip);
    }

    #[test]
    fn quarters_are_nonempty_and_ordered() {
        let aabbs = grid_bounds(9);
        let mut points = points_for(&aabbs);
        let bounds = partition_quarters(&mut points);
        assert_eq!(bounds, [0, 2, 4, 6, 9]);
        let split_x = points[..4].iter().map(|p| p.position.x).fold(f32::MIN, f32::max);
        assert!(points[4..].iter().all(|p| p.position.x >= split_x));
    }

    #[test]
    fn small_inputs_form_a_single_branch() {
        let aabbs = grid_bounds(20);
        let mut tree = Tree::new(20);
        tree.reset(20);
        let mut points = points_for(&aabbs);
        let state = tree.build_first_n_levels(&mut points, 8, BuildMode::Rebuild);
        assert_eq!(state, PartitionState::Built { top_node_count: 2 });
        assert_eq!(tree.branch_count(), 1);
        assert_eq!(tree.ranges[0].root, ROOT_NODE_INDEX);
        assert_eq!(tree.ranges[0].node_offset, 2);
        assert_eq!(tree.ranges[0].length, 20);
    }

    #[test]
    fn large_inputs_are_split_into_bounded_branches() {
        let aabbs = grid_bounds(1000);
        let mut tree = Tree::new(1000);
        tree.reset(1000);
        let mut points = points_for(&aabbs);
        let state = tree.build_first_n_levels(&mut points, 8, BuildMode::Rebuild);
        let PartitionState::Built { top_node_count } = state else {
            panic!("expected a build");
        };
        let ranges = &tree.ranges[..tree.branch_count()];
        assert!(ranges.len() > 1 && ranges.len() <= MAX_NUM_TREE_BRANCHES);
        assert_eq!(ranges.iter().map(|r| r.length).sum::<usize>(), 1000);
        assert!(ranges.iter().all(|r| r.length <= 1000 / 8));
        assert!(ranges.iter().all(|r| (r.root as usize) < top_node_count));
        assert_eq!(ranges[0].node_offset as usize, top_node_count);
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].start + pair[0].length, pair[1].start);
            assert!(pair[0].node_offset < pair[1].node_offset);
        }
    }

    #[test]
    fn single_thread_hint_never_splits() {
        let aabbs = grid_bounds(500);
        let mut tree = Tree::new(500);
        tree.reset(500);
        let mut points = points_for(&aabbs);
        tree.build_first_n_levels(&mut points, 1, BuildMode::Rebuild);
        assert_eq!(tree.branch_count(), 1);
    }

    #[test]
    fn skipped_partition_hides_branches_until_finalized() {
        let aabbs = grid_bounds(200);
        let filters = vec![CollisionFilter::DEFAULT; 200];
        let dispatcher = ThreadDispatcher::new(4);
        let mut tree = Tree::new(200);
        tree.build_from_bounds(&aabbs, &filters, &dispatcher, true);
        let before = tree.clone();

        let mut points: Vec<PointAndIndex> = Vec::new();
        let state = tree.build_first_n_levels(&mut points, 4, BuildMode::Skip);
        assert_eq!(
            state,
            PartitionState::Skipped {
                previous_branch_count: before.branch_count()
            }
        );
        assert_eq!(tree.branch_count(), 0);
        tree.build_branches(&mut points, &aabbs, &dispatcher, true);
        tree.finalize(state, true);
        assert_eq!(tree, before);
    }

    #[test]
    fn zero_bodies_leave_only_reserved_nodes() {
        let mut tree = Tree::new(0);
        tree.build_from_bounds(&[], &[], &ThreadDispatcher::new(2), true);
        assert_eq!(tree.node_count(), 2);
        assert_eq!(tree.branch_count(), 0);
        assert_eq!(tree.view().nodes(), &[Node::EMPTY, Node::EMPTY]);
    }

    #[test]
    fn leaves_hold_every_body_once() {
        let aabbs = grid_bounds(347);
        let filters = vec![CollisionFilter::DEFAULT; 347];
        let mut tree = Tree::new(16);
        tree.build_from_bounds(&aabbs, &filters, &ThreadDispatcher::new(3), true);
        let mut bodies = tree.view().leaf_body_indices();
        bodies.sort_unstable();
        assert_eq!(bodies, (0..347).collect::<Vec<i32>>());
        assert!(tree.node_count() <= Tree::node_capacity_for(347));
    }

    #[test]
    #[should_panic(expected = "reset to the number of bodies")]
    fn partitioning_requires_a_point_per_body() {
        let aabbs = grid_bounds(4);
        let mut tree = Tree::new(8);
        tree.reset(5);
        let mut points = points_for(&aabbs);
        tree.build_first_n_levels(&mut points, 2, BuildMode::Rebuild);
    }

    #[test]
    #[should_panic(expected = "Branch node offsets must be increasing and disjoint.")]
    fn overlapping_branch_nodes_are_rejected() {
        let aabbs = grid_bounds(1000);
        let mut tree = Tree::new(1000);
        tree.reset(1000);
        let mut points = points_for(&aabbs);
        tree.build_first_n_levels(&mut points, 8, BuildMode::Rebuild);
        assert!(tree.branch_count() > 1);
        tree.ranges[1].node_offset = tree.ranges[0].node_offset;
        tree.build_branches(&mut points, &aabbs, &ThreadDispatcher::new(2), true);
    }
}
