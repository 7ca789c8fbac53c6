use crate::utilities::bounding_box::BoundingBox;

/// Whether a node's children are other nodes or bodies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Children are node indices.
    #[default]
    Internal,
    /// Children are body indices local to the tree.
    Leaf,
}

/// 4-wide tree node.
///
/// The node stores the bounds of its children, not its own. The bounds of node 1 (the root)
/// are therefore the union of its child bounds and are never tested directly during traversal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Node {
    /// Bounds of each child. Unused slots hold [`BoundingBox::EMPTY`].
    pub bounds: [BoundingBox; 4],
    /// Child node indices for internal nodes, body indices for leaves. Unused slots hold [`Node::INVALID_CHILD`].
    pub data: [i32; 4],
    pub kind: NodeKind,
}

impl Default for Node {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Node {
    /// Marks an unused child slot.
    pub const INVALID_CHILD: i32 = -1;

    /// Internal node without any children.
    pub const EMPTY: Self = Self {
        bounds: [BoundingBox::EMPTY; 4],
        data: [Self::INVALID_CHILD; 4],
        kind: NodeKind::Internal,
    };

    #[inline(always)]
    pub fn is_leaf(&self) -> bool {
        self.kind == NodeKind::Leaf
    }

    #[inline(always)]
    pub fn is_internal(&self) -> bool {
        self.kind == NodeKind::Internal
    }

    #[inline(always)]
    pub fn is_child_valid(&self, child_index: usize) -> bool {
        self.data[child_index] != Self::INVALID_CHILD
    }

    /// Gets the number of occupied child slots.
    pub fn child_count(&self) -> usize {
        (0..4).filter(|&i| self.is_child_valid(i)).count()
    }

    /// Iterates `(child slot, data, bounds)` over occupied slots.
    #[inline(always)]
    pub fn children(&self) -> impl Iterator<Item = (usize, i32, &BoundingBox)> + '_ {
        (0..4)
            .filter(move |&i| self.is_child_valid(i))
            .map(move |i| (i, self.data[i], &self.bounds[i]))
    }

    /// Computes the bounds of all occupied children together.
    #[inline(always)]
    pub fn bounds_union(&self) -> BoundingBox {
        let mut merged = BoundingBox::EMPTY;
        for (_, _, bounds) in self.children() {
            merged.include(bounds);
        }
        merged
    }

    /// Turns the node into an internal node with no children.
    #[inline(always)]
    pub fn clear_internal(&mut self) {
        *self = Self::EMPTY;
    }

    /// Turns the node into a leaf with no bodies.
    #[inline(always)]
    pub fn clear_leaf(&mut self) {
        *self = Self {
            kind: NodeKind::Leaf,
            ..Self::EMPTY
        };
    }

    /// Sets a child slot to a node or body index with its bounds.
    #[inline(always)]
    pub fn set_child(&mut self, child_index: usize, data: i32, bounds: BoundingBox) {
        debug_assert!(data != Self::INVALID_CHILD, "Occupied slots need valid data.");
        self.data[child_index] = data;
        self.bounds[child_index] = bounds;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn empty_node_has_no_children() {
        let node = Node::EMPTY;
        assert!(node.is_internal());
        assert_eq!(node.child_count(), 0);
        assert_eq!(node.bounds_union(), BoundingBox::EMPTY);
    }

    #[test]
    fn union_skips_vacant_slots() {
        let mut node = Node::default();
        node.clear_leaf();
        node.set_child(0, 7, BoundingBox::new(Vec3::ZERO, Vec3::ONE));
        node.set_child(2, 3, BoundingBox::new(Vec3::splat(-1.0), Vec3::ZERO));
        assert!(node.is_leaf());
        assert_eq!(node.child_count(), 2);
        assert_eq!(
            node.bounds_union(),
            BoundingBox::new(Vec3::splat(-1.0), Vec3::ONE)
        );
        let data: Vec<i32> = node.children().map(|(_, data, _)| data).collect();
        assert_eq!(data, vec![7, 3]);
    }
}
