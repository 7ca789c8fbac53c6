use super::tree::ROOT_NODE_INDEX;
use super::tree_view::TreeView;
use crate::physics::collision_filter::CollisionFilter;
use crate::utilities::bounding_box::ContainmentType;

impl TreeView<'_> {
    /// Gets the body index of every leaf entry reachable from the root, in traversal order.
    pub fn leaf_body_indices(&self) -> Vec<i32> {
        let mut bodies = Vec::with_capacity(self.body_count());
        self.for_each_candidate(None, |_| true, |body_index, _| bodies.push(body_index));
        bodies
    }

    /// Gets the number of levels below the root. Zero for an empty tree or a root leaf.
    pub fn compute_max_depth(&self) -> usize {
        let nodes = self.nodes();
        if nodes.len() <= ROOT_NODE_INDEX as usize {
            return 0;
        }
        let mut max_depth = 0;
        let mut stack = vec![(ROOT_NODE_INDEX, 0usize)];
        while let Some((node_index, depth)) = stack.pop() {
            max_depth = max_depth.max(depth);
            let node = &nodes[node_index as usize];
            if node.is_internal() {
                stack.extend(node.children().map(|(_, child, _)| (child, depth + 1)));
            }
        }
        max_depth
    }

    /// Measures the surface area heuristic cost of the tree relative to its root bounds. Lower is better.
    pub fn measure_cost_metric(&self) -> f32 {
        let root_metric = self.bounds().compute_bounds_metric();
        if root_metric <= 0.0 {
            return 0.0;
        }
        let nodes = self.nodes();
        let mut total_cost = 0.0f32;
        let mut stack = vec![ROOT_NODE_INDEX];
        while let Some(node_index) = stack.pop() {
            let node = &nodes[node_index as usize];
            for (_, child, bounds) in node.children() {
                total_cost += bounds.compute_bounds_metric();
                if node.is_internal() {
                    stack.push(child);
                }
            }
        }
        total_cost / root_metric
    }

    /// Walks the tree from the root and panics if it is malformed.
    ///
    /// Checks that reserved node 0 is unreferenced, that every child index points past its parent and inside
    /// the used nodes, that every child bound contains its subtree, that every body appears in exactly one leaf
    /// slot, and, when `check_filters` is set, that every node filter is the union of its children's filters.
    pub fn validate(&self, check_filters: bool) {
        let nodes = self.nodes();
        assert!(nodes.len() >= 2, "The reserved nodes must be present.");
        let body_count = self.body_count();
        let mut seen = vec![false; body_count];
        let mut stack = vec![ROOT_NODE_INDEX];
        while let Some(node_index) = stack.pop() {
            let node = &nodes[node_index as usize];
            let mut child_filters = Vec::with_capacity(4);
            for (slot, child, bounds) in node.children() {
                if node.is_leaf() {
                    assert!(
                        child >= 0 && (child as usize) < body_count,
                        "Leaf {node_index} slot {slot} references body {child} outside the tree."
                    );
                    assert!(
                        !seen[child as usize],
                        "Body {child} appears in more than one leaf slot."
                    );
                    seen[child as usize] = true;
                    child_filters.push(self.body_filters()[child as usize]);
                } else {
                    assert!(
                        child > node_index && (child as usize) < nodes.len(),
                        "Node {node_index} slot {slot} references invalid node {child}."
                    );
                    let child_bounds = nodes[child as usize].bounds_union();
                    assert_eq!(
                        bounds.contains(&child_bounds),
                        ContainmentType::Contains,
                        "Node {node_index} slot {slot} does not contain node {child}."
                    );
                    child_filters.push(self.node_filters()[child as usize]);
                    stack.push(child);
                }
            }
            if check_filters && !child_filters.is_empty() {
                assert_eq!(
                    self.node_filters()[node_index as usize],
                    CollisionFilter::union_all(child_filters),
                    "Node {node_index} filter is not the union of its children."
                );
            }
        }
        let missing = seen.iter().filter(|&&found| !found).count();
        assert_eq!(missing, 0, "{missing} bodies are not reachable from the root.");
    }
}
