use tracing::trace;

use super::tree::{Tree, ROOT_NODE_INDEX};
use super::tree_builder::PartitionState;
use crate::physics::collision_filter::CollisionFilter;

impl Tree {
    /// Completes a build once every branch has been built.
    ///
    /// For a rebuilt tree, the top-level nodes above the branches get their child bounds and aggregate filters
    /// from the finished branch roots. For a skipped build the branch count hidden by the partitioner is restored
    /// and nothing else changes.
    pub fn finalize(&mut self, state: PartitionState, enable_filters: bool) {
        match state {
            PartitionState::Skipped {
                previous_branch_count,
            } => {
                self.branch_count = previous_branch_count;
            }
            PartitionState::Built { top_node_count } => {
                self.is_built = true;
                let branch_count = self.branch_count;
                let Some(min_branch_node_index) = self.ranges[..branch_count]
                    .iter()
                    .map(|range| range.node_offset - 1)
                    .min()
                else {
                    return;
                };
                debug_assert_eq!(
                    min_branch_node_index as usize + 1,
                    top_node_count,
                    "Branches start right after the top levels."
                );
                trace!(min_branch_node_index, "refitting top levels");
                // Top-level children always have larger indices than their parents.
                for node_index in (ROOT_NODE_INDEX..=min_branch_node_index).rev() {
                    let is_branch_root = self.ranges[..branch_count]
                        .iter()
                        .any(|range| range.root == node_index);
                    if !is_branch_root {
                        self.refit_node(node_index as usize, enable_filters);
                    }
                }
            }
        }
    }

    /// Recomputes an internal node's child bounds and its aggregate filter from its children.
    fn refit_node(&mut self, node_index: usize, enable_filters: bool) {
        let mut node = self.nodes[node_index];
        debug_assert!(node.is_internal(), "Only internal nodes are refit.");
        let mut filters = [CollisionFilter::ZERO; 4];
        let mut filter_count = 0;
        for slot in 0..4 {
            if !node.is_child_valid(slot) {
                continue;
            }
            let child = node.data[slot] as usize;
            node.bounds[slot] = self.nodes[child].bounds_union();
            filters[filter_count] = self.node_filters[child];
            filter_count += 1;
        }
        self.nodes[node_index] = node;
        self.node_filters[node_index] = if enable_filters {
            CollisionFilter::union_all(filters[..filter_count].iter().copied())
        } else {
            CollisionFilter::DEFAULT
        };
    }

    /// Updates the bounds and aggregate filters of every internal node in the tree from the leaves up.
    ///
    /// Useful after leaf bounds were edited in place. A freshly built tree is already fit.
    pub fn refit(&mut self, enable_filters: bool) {
        for node_index in (ROOT_NODE_INDEX as usize..self.node_count).rev() {
            if self.nodes[node_index].is_leaf() {
                if enable_filters {
                    let body_filters = &self.body_filters;
                    self.node_filters[node_index] = CollisionFilter::union_all(
                        self.nodes[node_index]
                            .children()
                            .map(|(_, body, _)| body_filters[body as usize]),
                    );
                }
            } else if self.nodes[node_index].child_count() > 0 {
                self.refit_node(node_index, enable_filters);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::trees::tree_builder::{BuildMode, PointAndIndex};
    use crate::utilities::bounding_box::BoundingBox;
    use crate::utilities::thread_dispatcher::ThreadDispatcher;
    use glam::Vec3;

    fn line_of_boxes(count: usize) -> Vec<BoundingBox> {
        (0..count)
            .map(|i| {
                let center = Vec3::new(i as f32 * 2.0, 0.0, 0.0);
                BoundingBox::new(center - Vec3::splat(0.5), center + Vec3::splat(0.5))
            })
            .collect()
    }

    #[test]
    fn finalize_fills_top_level_bounds() {
        let aabbs = line_of_boxes(600);
        let filters: Vec<CollisionFilter> = (0..600)
            .map(|i| CollisionFilter::new(1 << (i % 8), 1, 0))
            .collect();
        let mut tree = Tree::new(600);
        tree.build_from_bounds(&aabbs, &filters, &ThreadDispatcher::new(4), true);
        assert!(tree.branch_count() > 1);

        let bounds = tree.bounds();
        assert_eq!(bounds.min, Vec3::new(-0.5, -0.5, -0.5));
        assert_eq!(bounds.max, Vec3::new(1198.5, 0.5, 0.5));
        assert_eq!(tree.node_filters[ROOT_NODE_INDEX as usize].belongs_to, 0xFF);
        tree.view().validate(true);
    }

    #[test]
    fn full_refit_matches_build() {
        let aabbs = line_of_boxes(300);
        let filters = vec![CollisionFilter::new(2, 3, 0); 300];
        let mut tree = Tree::new(300);
        tree.build_from_bounds(&aabbs, &filters, &ThreadDispatcher::new(2), true);
        let built = tree.clone();
        tree.refit(true);
        assert_eq!(tree, built);
    }

    #[test]
    fn skipped_finalize_restores_branch_count() {
        let mut tree = Tree::new(4);
        tree.branch_count = 7;
        let state = tree.build_first_n_levels(&mut Vec::<PointAndIndex>::new(), 4, BuildMode::Skip);
        assert_eq!(tree.branch_count(), 0);
        tree.finalize(state, true);
        assert_eq!(tree.branch_count(), 7);
    }
}
