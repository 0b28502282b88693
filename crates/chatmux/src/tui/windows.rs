//! Tiled panes over a [`LayoutTree`].
//!
//! The tree's leaves and the pane map always hold the same ids, and exactly
//! one pane is focused.

use std::collections::BTreeMap;

use chatmux_core::layout::{Bounds, LayoutTree, PaneId, Region, SplitDirection};

use super::chat::ChatView;
use super::editor::Editor;
use super::theme::{INPUT_HEIGHT, TITLE_HEIGHT};

/// Share of the enclosing split moved by one resize keypress.
pub const RESIZE_STEP: f32 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusDirection {
    Left,
    Right,
    Up,
    Down,
}

#[derive(Debug, Clone)]
pub struct Pane {
    pub id: PaneId,
    pub conversation: Option<String>,
    pub title: String,
    pub bounds: Bounds,
    pub focused: bool,
    pub view: ChatView,
    pub editor: Editor,
}

impl Pane {
    fn new(id: PaneId) -> Self {
        Self {
            id,
            conversation: None,
            title: String::new(),
            bounds: Bounds::default(),
            focused: false,
            view: ChatView::new(),
            editor: Editor::new(),
        }
    }

    /// Width and height of the message area inside the pane.
    pub fn viewport(&self) -> (usize, usize) {
        let width = self.bounds.width.saturating_sub(2);
        let height = self
            .bounds
            .height
            .saturating_sub(TITLE_HEIGHT + INPUT_HEIGHT);
        (usize::from(width), usize::from(height))
    }
}

#[derive(Debug, Clone)]
pub struct WindowManager {
    tree: LayoutTree,
    panes: BTreeMap<PaneId, Pane>,
    focused: PaneId,
    next_id: PaneId,
    max_panes: usize,
    area: Bounds,
}

impl WindowManager {
    pub fn new(max_panes: usize) -> Self {
        let mut first = Pane::new(0);
        first.focused = true;
        Self {
            tree: LayoutTree::new(0),
            panes: BTreeMap::from([(0, first)]),
            focused: 0,
            next_id: 1,
            max_panes: max_panes.max(1),
            area: Bounds::default(),
        }
    }

    pub fn count(&self) -> usize {
        self.panes.len()
    }

    pub fn max_panes(&self) -> usize {
        self.max_panes
    }

    pub fn focused_id(&self) -> PaneId {
        self.focused
    }

    pub fn focused_pane(&self) -> Option<&Pane> {
        self.panes.get(&self.focused)
    }

    pub fn focused_pane_mut(&mut self) -> Option<&mut Pane> {
        self.panes.get_mut(&self.focused)
    }

    pub fn pane(&self, id: PaneId) -> Option<&Pane> {
        self.panes.get(&id)
    }

    pub fn pane_mut(&mut self, id: PaneId) -> Option<&mut Pane> {
        self.panes.get_mut(&id)
    }

    pub fn panes(&self) -> impl Iterator<Item = &Pane> {
        self.panes.values()
    }

    pub fn pane_ids(&self) -> Vec<PaneId> {
        self.panes.keys().copied().collect()
    }

    /// Panes currently showing `conversation`, in id order.
    pub fn panes_showing(&self, conversation: &str) -> Vec<PaneId> {
        self.panes
            .values()
            .filter(|p| p.conversation.as_deref() == Some(conversation))
            .map(|p| p.id)
            .collect()
    }

    /// Regions to draw, in depth-first tree order.
    pub fn regions(&self) -> Vec<Region> {
        self.tree.calculate_layout(self.area)
    }

    pub fn set_area(&mut self, area: Bounds) {
        self.area = area;
        self.recalculate();
    }

    fn recalculate(&mut self) {
        for (id, bounds) in self.tree.pane_bounds(self.area) {
            if let Some(pane) = self.panes.get_mut(&id) {
                pane.bounds = bounds;
            }
        }
    }

    /// Splits the focused pane; the new empty pane takes focus. Returns
    /// `false` without changes at the pane limit.
    pub fn split_focused(&mut self, direction: SplitDirection) -> bool {
        if self.panes.len() >= self.max_panes {
            return false;
        }
        let id = self.next_id;
        if self.tree.split_leaf(self.focused, direction, id).is_err() {
            return false;
        }
        self.next_id += 1;
        self.panes.insert(id, Pane::new(id));
        self.set_focus(id);
        self.recalculate();
        true
    }

    /// Closes the focused pane and focuses the lowest remaining id. The
    /// last pane cannot be closed.
    pub fn close_focused(&mut self) -> bool {
        if self.panes.len() <= 1 {
            return false;
        }
        let closing = self.focused;
        let Some(next) = self.panes.keys().copied().find(|id| *id != closing) else {
            return false;
        };
        if self.tree.remove_leaf(closing).is_err() {
            return false;
        }
        self.panes.remove(&closing);
        self.set_focus(next);
        self.recalculate();
        true
    }

    /// Moves focus to the nearest pane whose center lies strictly in
    /// `direction` from the focused pane's center, by Manhattan distance.
    /// Ties go to the lower pane id. Returns `false` if nothing qualifies.
    pub fn focus_direction(&mut self, direction: FocusDirection) -> bool {
        let Some(current) = self.panes.get(&self.focused) else {
            return false;
        };
        let (cx, cy) = current.bounds.center();

        let mut best: Option<(PaneId, i32)> = None;
        for pane in self.panes.values() {
            if pane.id == self.focused {
                continue;
            }
            let (px, py) = pane.bounds.center();
            let qualifies = match direction {
                FocusDirection::Left => px < cx,
                FocusDirection::Right => px > cx,
                FocusDirection::Up => py < cy,
                FocusDirection::Down => py > cy,
            };
            if !qualifies {
                continue;
            }
            let dist = (px - cx).abs() + (py - cy).abs();
            if best.map_or(true, |(_, d)| dist < d) {
                best = Some((pane.id, dist));
            }
        }

        match best {
            Some((id, _)) => {
                self.set_focus(id);
                true
            }
            None => false,
        }
    }

    /// Focuses the next pane in id order. Returns `false`, leaving focus
    /// unchanged, when the focused pane is already the last.
    pub fn cycle_focus(&mut self) -> bool {
        let next = self
            .panes
            .range(self.focused.saturating_add(1)..)
            .next()
            .map(|(id, _)| *id);
        match next {
            Some(id) if id != self.focused => {
                self.set_focus(id);
                true
            }
            _ => false,
        }
    }

    /// Focuses the lowest pane id.
    pub fn focus_first(&mut self) {
        if let Some(id) = self.panes.keys().next().copied() {
            self.set_focus(id);
        }
    }

    /// Points a pane at a conversation, dropping whatever it showed before.
    pub fn set_conversation(&mut self, id: PaneId, conversation: &str, title: &str) -> bool {
        let Some(pane) = self.panes.get_mut(&id) else {
            return false;
        };
        if pane.conversation.as_deref() != Some(conversation) {
            pane.view.clear();
        }
        pane.conversation = Some(conversation.to_owned());
        pane.title = title.to_owned();
        true
    }

    pub fn resize_focused(&mut self, delta: f32) -> bool {
        if self.tree.adjust_ratio(self.focused, delta).is_err() {
            return false;
        }
        self.recalculate();
        true
    }

    fn set_focus(&mut self, id: PaneId) {
        if let Some(old) = self.panes.get_mut(&self.focused) {
            old.focused = false;
        }
        if let Some(new) = self.panes.get_mut(&id) {
            new.focused = true;
            self.focused = id;
        }
    }

    #[cfg(test)]
    pub fn validate(&self) -> Result<(), String> {
        let mut leaves = self.tree.all_leaf_ids();
        leaves.sort_unstable();
        let ids = self.pane_ids();
        if leaves != ids {
            return Err(format!("tree leaves {leaves:?} != panes {ids:?}"));
        }
        let focused: Vec<PaneId> = self.panes().filter(|p| p.focused).map(|p| p.id).collect();
        if focused != vec![self.focused] {
            return Err(format!("focused flags {focused:?}, expected [{}]", self.focused));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(max: usize) -> WindowManager {
        let mut wm = WindowManager::new(max);
        wm.set_area(Bounds::new(0, 0, 100, 40));
        wm
    }

    #[test]
    fn split_focuses_new_pane_until_limit() {
        let mut wm = manager(3);
        assert!(wm.split_focused(SplitDirection::Horizontal));
        assert_eq!(wm.focused_id(), 1);
        assert!(wm.split_focused(SplitDirection::Vertical));
        assert_eq!(wm.count(), 3);
        assert!(!wm.split_focused(SplitDirection::Vertical));
        assert_eq!(wm.count(), 3);
        wm.validate().unwrap();
    }

    #[test]
    fn last_pane_cannot_close() {
        let mut wm = manager(4);
        assert!(!wm.close_focused());
        assert_eq!(wm.count(), 1);
        wm.validate().unwrap();
    }

    #[test]
    fn close_refocuses_and_reclaims_space() {
        let mut wm = manager(4);
        wm.split_focused(SplitDirection::Horizontal);
        assert!(wm.close_focused());
        assert_eq!(wm.count(), 1);
        assert_eq!(wm.focused_id(), 0);
        assert_eq!(wm.pane(0).map(|p| p.bounds), Some(Bounds::new(0, 0, 100, 40)));
        wm.validate().unwrap();
    }

    struct Lcg {
        state: u64,
    }

    impl Lcg {
        fn new(seed: u64) -> Self {
            Self {
                state: seed ^ 0x9E37_79B9_7F4A_7C15,
            }
        }

        fn next_u64(&mut self) -> u64 {
            self.state = self.state.wrapping_mul(6364136223846793005).wrapping_add(1);
            self.state
        }

        fn choose_index(&mut self, len: usize) -> usize {
            (self.next_u64() % len as u64) as usize
        }

        fn choose_bool(&mut self) -> bool {
            (self.next_u64() & 1) == 0
        }
    }

    const DIRECTIONS: [FocusDirection; 4] = [
        FocusDirection::Left,
        FocusDirection::Right,
        FocusDirection::Up,
        FocusDirection::Down,
    ];

    /// Applies `steps` random operations, checking the pane invariants
    /// after each, and returns the final `(id, bounds, focused)` snapshot.
    fn run_random_ops(seed: u64, steps: usize) -> Vec<(PaneId, Bounds, bool)> {
        let mut rng = Lcg::new(seed);
        let max = 1 + rng.choose_index(6);
        let mut wm = manager(max);

        for step in 0..steps {
            let before = wm.count();
            match rng.choose_index(6) {
                0 | 1 => {
                    let direction = if rng.choose_bool() {
                        SplitDirection::Horizontal
                    } else {
                        SplitDirection::Vertical
                    };
                    let split = wm.split_focused(direction);
                    assert_eq!(split, before < max, "seed {seed} step {step}");
                    assert_eq!(wm.count(), before + usize::from(split));
                }
                2 => {
                    let closed = wm.close_focused();
                    assert_eq!(closed, before > 1, "seed {seed} step {step}");
                    assert_eq!(wm.count(), before - usize::from(closed));
                }
                3 => {
                    wm.focus_direction(DIRECTIONS[rng.choose_index(DIRECTIONS.len())]);
                }
                4 => {
                    wm.cycle_focus();
                }
                _ => {
                    let delta = if rng.choose_bool() {
                        RESIZE_STEP
                    } else {
                        -RESIZE_STEP
                    };
                    let resized = wm.resize_focused(delta);
                    assert_eq!(resized, wm.count() > 1, "seed {seed} step {step}");
                }
            }

            if let Err(err) = wm.validate() {
                panic!("seed {seed} step {step}: {err}");
            }
            assert_eq!(wm.count(), wm.tree.count_leaves());
            assert!((1..=max).contains(&wm.count()), "seed {seed} step {step}");
            for pane in wm.panes() {
                let b = pane.bounds;
                assert!(
                    b.x + b.width <= 100 && b.y + b.height <= 40,
                    "seed {seed} step {step}: pane {} at {b:?}",
                    pane.id
                );
            }
        }

        wm.panes().map(|p| (p.id, p.bounds, p.focused)).collect()
    }

    #[test]
    fn pane_count_matches_leaves_across_random_operations() {
        for seed in 0..64u64 {
            let first = run_random_ops(seed, 200);
            assert_eq!(first, run_random_ops(seed, 200), "seed {seed} did not replay");
        }
    }

    #[test]
    fn directional_focus_picks_nearest_strictly_in_direction() {
        let mut wm = manager(4);
        for id in 0..4 {
            wm.panes.entry(id).or_insert_with(|| Pane::new(id));
        }
        wm.panes.get_mut(&0).unwrap().bounds = Bounds::new(8, 3, 4, 4); // center (10,5)
        wm.panes.get_mut(&1).unwrap().bounds = Bounds::new(13, 3, 4, 4); // center (15,5)
        wm.panes.get_mut(&2).unwrap().bounds = Bounds::new(18, 3, 4, 4); // center (20,5)
        wm.panes.get_mut(&3).unwrap().bounds = Bounds::new(3, 3, 4, 4); // center (5,5)

        assert!(wm.focus_direction(FocusDirection::Right));
        assert_eq!(wm.focused_id(), 1);

        wm.set_focus(0);
        assert!(wm.focus_direction(FocusDirection::Left));
        assert_eq!(wm.focused_id(), 3);

        wm.set_focus(0);
        assert!(!wm.focus_direction(FocusDirection::Up));
        assert_eq!(wm.focused_id(), 0);
    }

    #[test]
    fn directional_focus_in_a_real_split() {
        let mut wm = manager(4);
        wm.split_focused(SplitDirection::Horizontal);
        assert!(wm.focus_direction(FocusDirection::Left));
        assert_eq!(wm.focused_id(), 0);
        assert!(!wm.focus_direction(FocusDirection::Left));
        assert!(wm.focus_direction(FocusDirection::Right));
        assert_eq!(wm.focused_id(), 1);
    }

    #[test]
    fn cycle_focus_reports_wrap() {
        let mut wm = manager(4);
        wm.split_focused(SplitDirection::Horizontal);
        wm.focus_first();
        assert!(wm.cycle_focus());
        assert_eq!(wm.focused_id(), 1);
        assert!(!wm.cycle_focus());
        assert_eq!(wm.focused_id(), 1);
    }

    #[test]
    fn switching_conversation_clears_the_view() {
        let mut wm = manager(4);
        wm.set_conversation(0, "a", "A");
        wm.pane_mut(0).unwrap().view.loading = true;
        wm.set_conversation(0, "a", "A");
        assert!(wm.pane(0).unwrap().view.loading);
        wm.set_conversation(0, "b", "B");
        assert!(!wm.pane(0).unwrap().view.loading);
        assert_eq!(wm.panes_showing("b"), vec![0]);
        assert!(wm.panes_showing("a").is_empty());
    }

    #[test]
    fn resize_moves_the_divider() {
        let mut wm = manager(4);
        wm.split_focused(SplitDirection::Horizontal);
        let before = wm.pane(1).unwrap().bounds.width;
        assert!(wm.resize_focused(RESIZE_STEP * 2.0));
        assert!(wm.pane(1).unwrap().bounds.width > before);
        wm.focus_first();
        let single = manager(4).resize_focused(RESIZE_STEP);
        assert!(!single);
    }
}
