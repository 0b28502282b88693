//! Binary split tree for tiling panes.
//!
//! Geometry is never stored in the tree: every call to
//! [`LayoutTree::calculate_layout`] derives it top-down from the root area.

use thiserror::Error;

pub type PaneId = u32;

pub const DEFAULT_RATIO: f32 = 0.5;
pub const MIN_RATIO: f32 = 0.1;
pub const MAX_RATIO: f32 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bounds {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl Bounds {
    pub const fn new(x: u16, y: u16, width: u16, height: u16) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn center(&self) -> (i32, i32) {
        (
            i32::from(self.x) + i32::from(self.width) / 2,
            i32::from(self.y) + i32::from(self.height) / 2,
        )
    }
}

/// `Horizontal` places children side by side (left | right);
/// `Vertical` stacks them (top / bottom).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitDirection {
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LayoutNode {
    Leaf(PaneId),
    Split {
        direction: SplitDirection,
        ratio: f32,
        left: Box<LayoutNode>,
        right: Box<LayoutNode>,
    },
}

impl LayoutNode {
    pub fn is_leaf(&self) -> bool {
        matches!(self, LayoutNode::Leaf(_))
    }

    pub fn contains(&self, pane: PaneId) -> bool {
        match self {
            LayoutNode::Leaf(id) => *id == pane,
            LayoutNode::Split { left, right, .. } => left.contains(pane) || right.contains(pane),
        }
    }

    fn is_leaf_for(&self, pane: PaneId) -> bool {
        matches!(self, LayoutNode::Leaf(id) if *id == pane)
    }

    fn collect_leaves(&self, out: &mut Vec<PaneId>) {
        match self {
            LayoutNode::Leaf(id) => out.push(*id),
            LayoutNode::Split { left, right, .. } => {
                left.collect_leaves(out);
                right.collect_leaves(out);
            }
        }
    }
}

/// A rectangle produced by layout: either a pane's area or the one-cell
/// divider between the two halves of a split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Pane { id: PaneId, bounds: Bounds },
    Divider {
        direction: SplitDirection,
        bounds: Bounds,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("pane {0} is not in the layout")]
    PaneNotFound(PaneId),
    #[error("pane {0} is already in the layout")]
    DuplicatePane(PaneId),
    #[error("the last pane cannot be removed")]
    RootLeaf,
    #[error("pane {0} is not inside a split")]
    NoEnclosingSplit(PaneId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutTree {
    root: LayoutNode,
}

impl LayoutTree {
    pub fn new(pane: PaneId) -> Self {
        Self {
            root: LayoutNode::Leaf(pane),
        }
    }

    pub fn root(&self) -> &LayoutNode {
        &self.root
    }

    /// Regions in depth-first order (left subtree, divider, right subtree).
    pub fn calculate_layout(&self, area: Bounds) -> Vec<Region> {
        let mut out = Vec::with_capacity(self.count_leaves() * 2);
        layout_node(&self.root, area, &mut out);
        out
    }

    pub fn pane_bounds(&self, area: Bounds) -> Vec<(PaneId, Bounds)> {
        self.calculate_layout(area)
            .into_iter()
            .filter_map(|region| match region {
                Region::Pane { id, bounds } => Some((id, bounds)),
                Region::Divider { .. } => None,
            })
            .collect()
    }

    /// Turns the leaf holding `pane` into a split of `pane` and `new_pane`.
    pub fn split_leaf(
        &mut self,
        pane: PaneId,
        direction: SplitDirection,
        new_pane: PaneId,
    ) -> Result<(), LayoutError> {
        if self.root.contains(new_pane) {
            return Err(LayoutError::DuplicatePane(new_pane));
        }
        if split_in(&mut self.root, pane, direction, new_pane) {
            Ok(())
        } else {
            Err(LayoutError::PaneNotFound(pane))
        }
    }

    /// Removes the leaf holding `pane`; its parent split is replaced by the
    /// sibling subtree.
    pub fn remove_leaf(&mut self, pane: PaneId) -> Result<(), LayoutError> {
        if self.root.is_leaf_for(pane) {
            return Err(LayoutError::RootLeaf);
        }
        if remove_in(&mut self.root, pane) {
            Ok(())
        } else {
            Err(LayoutError::PaneNotFound(pane))
        }
    }

    /// Grows (positive `delta`) or shrinks the pane's share of its
    /// innermost enclosing split.
    pub fn adjust_ratio(&mut self, pane: PaneId, delta: f32) -> Result<(), LayoutError> {
        if adjust_in(&mut self.root, pane, delta) {
            Ok(())
        } else if self.root.contains(pane) {
            Err(LayoutError::NoEnclosingSplit(pane))
        } else {
            Err(LayoutError::PaneNotFound(pane))
        }
    }

    pub fn count_leaves(&self) -> usize {
        fn count(node: &LayoutNode) -> usize {
            match node {
                LayoutNode::Leaf(_) => 1,
                LayoutNode::Split { left, right, .. } => count(left) + count(right),
            }
        }
        count(&self.root)
    }

    pub fn all_leaf_ids(&self) -> Vec<PaneId> {
        let mut out = Vec::new();
        self.root.collect_leaves(&mut out);
        out
    }

    pub fn find_node_for_pane(&self, pane: PaneId) -> Option<&LayoutNode> {
        fn find(node: &LayoutNode, pane: PaneId) -> Option<&LayoutNode> {
            match node {
                LayoutNode::Leaf(id) if *id == pane => Some(node),
                LayoutNode::Leaf(_) => None,
                LayoutNode::Split { left, right, .. } => {
                    find(left, pane).or_else(|| find(right, pane))
                }
            }
        }
        find(&self.root, pane)
    }
}

fn layout_node(node: &LayoutNode, area: Bounds, out: &mut Vec<Region>) {
    match node {
        LayoutNode::Leaf(id) => out.push(Region::Pane {
            id: *id,
            bounds: area,
        }),
        LayoutNode::Split {
            direction,
            ratio,
            left,
            right,
        } => {
            let (first, divider, second) = split_area(area, *direction, *ratio);
            layout_node(left, first, out);
            out.push(Region::Divider {
                direction: *direction,
                bounds: divider,
            });
            layout_node(right, second, out);
        }
    }
}

fn split_area(area: Bounds, direction: SplitDirection, ratio: f32) -> (Bounds, Bounds, Bounds) {
    if area.is_empty() {
        let empty = Bounds::new(area.x, area.y, 0, 0);
        return (empty, empty, empty);
    }

    match direction {
        SplitDirection::Horizontal => {
            let (a, b) = split_span(area.width, ratio);
            let divider_x = area.x.saturating_add(a);
            (
                Bounds::new(area.x, area.y, a, area.height),
                Bounds::new(divider_x, area.y, 1, area.height),
                Bounds::new(divider_x.saturating_add(1), area.y, b, area.height),
            )
        }
        SplitDirection::Vertical => {
            let (a, b) = split_span(area.height, ratio);
            let divider_y = area.y.saturating_add(a);
            (
                Bounds::new(area.x, area.y, area.width, a),
                Bounds::new(area.x, divider_y, area.width, 1),
                Bounds::new(area.x, divider_y.saturating_add(1), area.width, b),
            )
        }
    }
}

/// Splits `total` cells into two spans with one divider cell between them.
/// Each span gets at least one cell, even when that overflows `total`.
fn split_span(total: u16, ratio: f32) -> (u16, u16) {
    let wanted = (f32::from(total) * ratio).floor() as u16;
    let first = if total >= 3 {
        wanted.clamp(1, total - 2)
    } else {
        1
    };
    let second = total.saturating_sub(first).saturating_sub(1).max(1);
    (first, second)
}

fn split_in(node: &mut LayoutNode, pane: PaneId, direction: SplitDirection, new_pane: PaneId) -> bool {
    match node {
        LayoutNode::Leaf(id) if *id == pane => {
            *node = LayoutNode::Split {
                direction,
                ratio: DEFAULT_RATIO,
                left: Box::new(LayoutNode::Leaf(pane)),
                right: Box::new(LayoutNode::Leaf(new_pane)),
            };
            true
        }
        LayoutNode::Leaf(_) => false,
        LayoutNode::Split { left, right, .. } => {
            split_in(left, pane, direction, new_pane) || split_in(right, pane, direction, new_pane)
        }
    }
}

fn remove_in(node: &mut LayoutNode, pane: PaneId) -> bool {
    let sibling = match node {
        LayoutNode::Leaf(_) => return false,
        LayoutNode::Split { left, right, .. } => {
            if left.is_leaf_for(pane) {
                std::mem::replace(right.as_mut(), LayoutNode::Leaf(pane))
            } else if right.is_leaf_for(pane) {
                std::mem::replace(left.as_mut(), LayoutNode::Leaf(pane))
            } else {
                return remove_in(left, pane) || remove_in(right, pane);
            }
        }
    };
    *node = sibling;
    true
}

fn adjust_in(node: &mut LayoutNode, pane: PaneId, delta: f32) -> bool {
    let LayoutNode::Split {
        ratio, left, right, ..
    } = node
    else {
        return false;
    };

    let (child, signed) = if left.contains(pane) {
        (left, delta)
    } else if right.contains(pane) {
        (right, -delta)
    } else {
        return false;
    };

    if !child.is_leaf() && adjust_in(child, pane, delta) {
        return true;
    }
    *ratio = (*ratio + signed).clamp(MIN_RATIO, MAX_RATIO);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn screen() -> Bounds {
        Bounds::new(0, 0, 80, 24)
    }

    #[test]
    fn single_leaf_fills_area() {
        let tree = LayoutTree::new(0);
        assert_eq!(tree.pane_bounds(screen()), vec![(0, screen())]);
        assert_eq!(tree.count_leaves(), 1);
    }

    #[test]
    fn horizontal_split_reserves_one_divider_column() {
        let mut tree = LayoutTree::new(0);
        tree.split_leaf(0, SplitDirection::Horizontal, 1).unwrap();

        let regions = tree.calculate_layout(screen());
        assert_eq!(regions.len(), 3);

        let panes = tree.pane_bounds(screen());
        let (_, a) = panes[0];
        let (_, b) = panes[1];
        assert_eq!(a.width + b.width, 79);
        assert!(a.width >= 1 && b.width >= 1);
        assert_eq!(b.x, a.width + 1);
        assert_eq!(a.height, 24);

        assert!(matches!(
            regions[1],
            Region::Divider { direction: SplitDirection::Horizontal, bounds } if bounds.x == a.width && bounds.width == 1 && bounds.height == 24
        ));
    }

    #[test]
    fn vertical_split_reserves_one_divider_row() {
        let mut tree = LayoutTree::new(0);
        tree.split_leaf(0, SplitDirection::Vertical, 1).unwrap();
        let panes = tree.pane_bounds(screen());
        assert_eq!(panes[0].1.height + panes[1].1.height, 23);
        assert_eq!(panes[1].1.y, panes[0].1.height + 1);
        assert_eq!(panes[0].1.width, 80);
    }

    #[test]
    fn tiny_area_still_gives_each_child_a_cell() {
        let mut tree = LayoutTree::new(0);
        tree.split_leaf(0, SplitDirection::Horizontal, 1).unwrap();
        let panes = tree.pane_bounds(Bounds::new(0, 0, 2, 5));
        assert_eq!(panes[0].1.width, 1);
        assert_eq!(panes[1].1.width, 1);

        let panes = tree.pane_bounds(Bounds::new(0, 0, 3, 5));
        assert_eq!(panes[0].1.width, 1);
        assert_eq!(panes[1].1.width, 1);
    }

    #[test]
    fn empty_area_yields_empty_panes() {
        let mut tree = LayoutTree::new(0);
        tree.split_leaf(0, SplitDirection::Horizontal, 1).unwrap();
        for (_, bounds) in tree.pane_bounds(Bounds::new(0, 0, 0, 10)) {
            assert!(bounds.is_empty());
        }
    }

    #[test]
    fn nested_splits_compose() {
        let mut tree = LayoutTree::new(0);
        tree.split_leaf(0, SplitDirection::Horizontal, 1).unwrap();
        tree.split_leaf(1, SplitDirection::Vertical, 2).unwrap();

        assert_eq!(tree.all_leaf_ids(), vec![0, 1, 2]);
        let panes = tree.pane_bounds(screen());
        let right_top = panes[1].1;
        let right_bottom = panes[2].1;
        assert_eq!(right_top.x, right_bottom.x);
        assert_eq!(right_top.height + right_bottom.height, 23);
        assert_eq!(right_bottom.y, right_top.height + 1);
    }

    #[test]
    fn split_unknown_or_duplicate_pane_is_rejected() {
        let mut tree = LayoutTree::new(0);
        assert_eq!(
            tree.split_leaf(7, SplitDirection::Horizontal, 1),
            Err(LayoutError::PaneNotFound(7))
        );
        assert_eq!(
            tree.split_leaf(0, SplitDirection::Horizontal, 0),
            Err(LayoutError::DuplicatePane(0))
        );
        assert_eq!(tree, LayoutTree::new(0));
    }

    #[test]
    fn remove_collapses_parent_into_sibling_subtree() {
        let mut tree = LayoutTree::new(0);
        tree.split_leaf(0, SplitDirection::Horizontal, 1).unwrap();
        tree.split_leaf(1, SplitDirection::Vertical, 2).unwrap();

        tree.remove_leaf(0).unwrap();
        assert!(matches!(
            tree.root(),
            LayoutNode::Split { direction: SplitDirection::Vertical, .. }
        ));
        assert_eq!(tree.all_leaf_ids(), vec![1, 2]);

        tree.remove_leaf(2).unwrap();
        assert_eq!(tree.root(), &LayoutNode::Leaf(1));
    }

    #[test]
    fn remove_keeps_structure_above_parent() {
        let mut tree = LayoutTree::new(0);
        tree.split_leaf(0, SplitDirection::Horizontal, 1).unwrap();
        tree.split_leaf(1, SplitDirection::Vertical, 2).unwrap();

        tree.remove_leaf(2).unwrap();
        let LayoutNode::Split {
            direction,
            left,
            right,
            ..
        } = tree.root()
        else {
            panic!("expected split root");
        };
        assert_eq!(*direction, SplitDirection::Horizontal);
        assert_eq!(**left, LayoutNode::Leaf(0));
        assert_eq!(**right, LayoutNode::Leaf(1));
    }

    #[test]
    fn root_leaf_and_missing_pane_removal_fail() {
        let mut tree = LayoutTree::new(0);
        assert_eq!(tree.remove_leaf(0), Err(LayoutError::RootLeaf));
        assert_eq!(tree.remove_leaf(3), Err(LayoutError::PaneNotFound(3)));
        assert_eq!(tree.count_leaves(), 1);
    }

    #[test]
    fn find_node_for_pane_returns_leaf() {
        let mut tree = LayoutTree::new(0);
        tree.split_leaf(0, SplitDirection::Vertical, 4).unwrap();
        assert_eq!(tree.find_node_for_pane(4), Some(&LayoutNode::Leaf(4)));
        assert_eq!(tree.find_node_for_pane(9), None);
    }

    #[test]
    fn adjust_ratio_grows_pane_and_clamps() {
        let mut tree = LayoutTree::new(0);
        tree.split_leaf(0, SplitDirection::Horizontal, 1).unwrap();

        tree.adjust_ratio(1, 0.1).unwrap();
        let LayoutNode::Split { ratio, .. } = tree.root() else {
            panic!("expected split");
        };
        assert!((*ratio - 0.4).abs() < 1e-6);

        tree.adjust_ratio(0, 5.0).unwrap();
        let LayoutNode::Split { ratio, .. } = tree.root() else {
            panic!("expected split");
        };
        assert!((*ratio - MAX_RATIO).abs() < 1e-6);

        assert_eq!(
            tree.adjust_ratio(9, 0.1),
            Err(LayoutError::PaneNotFound(9))
        );
    }

    #[test]
    fn adjust_ratio_on_lone_pane_has_no_split() {
        let mut tree = LayoutTree::new(0);
        assert_eq!(
            tree.adjust_ratio(0, 0.1),
            Err(LayoutError::NoEnclosingSplit(0))
        );
        assert_eq!(tree.adjust_ratio(1, 0.1), Err(LayoutError::PaneNotFound(1)));
        assert_eq!(tree.root(), &LayoutNode::Leaf(0));
    }

    #[test]
    fn extreme_ratio_never_overflows_area() {
        let mut tree = LayoutTree::new(0);
        tree.split_leaf(0, SplitDirection::Horizontal, 1).unwrap();
        tree.adjust_ratio(0, 1.0).unwrap();
        let panes = tree.pane_bounds(Bounds::new(0, 0, 10, 4));
        assert_eq!(panes[0].1.width + 1 + panes[1].1.width, 10);
    }
}
