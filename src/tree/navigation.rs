//! Keyboard focus/expansion state machine.
//!
//! The [`Navigator`] owns the focused key and the expanded set. Every
//! transition takes the current forest and re-flattens it, so the visible
//! order is always derived fresh. After any transition the focus is either
//! `None` or a key present in the visible rows.

use std::collections::HashSet;
use std::sync::Arc;

use crate::models::Issue;
use crate::models::hierarchy::TreeNode;

use super::{FlatNode, KeyMode, expandable_keys, flatten_visible, locate};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Navigator {
    mode: KeyMode,
    focused: Option<String>,
    expanded: HashSet<String>,
    /// Bumped whenever the expanded set changes
    revision: u64,
}

impl Navigator {
    pub fn new(mode: KeyMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn mode(&self) -> KeyMode {
        self.mode
    }

    pub fn focused(&self) -> Option<&str> {
        self.focused.as_deref()
    }

    pub fn expanded(&self) -> &HashSet<String> {
        &self.expanded
    }

    pub fn is_expanded(&self, key: &str) -> bool {
        self.expanded.contains(key)
    }

    /// Expansion revision, for memoizing derived rows.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Rows visible under the current expansion.
    pub fn visible(&self, forest: &[TreeNode]) -> Vec<FlatNode> {
        flatten_visible(forest, &self.expanded, self.mode)
    }

    /// Index of the focused row in `rows`.
    pub fn focused_index(&self, rows: &[FlatNode]) -> Option<usize> {
        let focused = self.focused.as_deref()?;
        rows.iter().position(|row| row.key == focused)
    }

    /// Focus `key` if it is visible. Returns whether focus moved there.
    pub fn focus(&mut self, forest: &[TreeNode], key: &str) -> bool {
        if self.visible(forest).iter().any(|row| row.key == key) {
            self.focused = Some(key.to_string());
            true
        } else {
            false
        }
    }

    pub fn move_next(&mut self, forest: &[TreeNode]) {
        let rows = self.visible(forest);
        let target = match self.focused_index(&rows) {
            Some(index) => rows.get(index + 1).or(rows.get(index)),
            None => rows.first(),
        };
        self.focused = target.map(|row| row.key.clone());
    }

    pub fn move_previous(&mut self, forest: &[TreeNode]) {
        let rows = self.visible(forest);
        let target = match self.focused_index(&rows) {
            Some(index) => rows.get(index.saturating_sub(1)),
            None => rows.last(),
        };
        self.focused = target.map(|row| row.key.clone());
    }

    pub fn move_first(&mut self, forest: &[TreeNode]) {
        self.focused = self.visible(forest).first().map(|row| row.key.clone());
    }

    pub fn move_last(&mut self, forest: &[TreeNode]) {
        self.focused = self.visible(forest).last().map(|row| row.key.clone());
    }

    /// Expand a collapsed parent, or step into the first child of an
    /// expanded one. No-op on leaves and without focus.
    pub fn expand_or_descend(&mut self, forest: &[TreeNode]) {
        let rows = self.visible(forest);
        let Some(index) = self.focused_index(&rows) else {
            return;
        };
        let row = &rows[index];
        if !row.has_children {
            return;
        }
        if !row.is_expanded {
            let key = row.key.clone();
            self.set_expanded(key, true);
        } else if let Some(child) = rows.get(index + 1) {
            self.focused = Some(child.key.clone());
        }
    }

    /// Collapse an expanded node, or step out to the parent of a collapsed
    /// one.
    pub fn collapse_or_ascend(&mut self, forest: &[TreeNode]) {
        let rows = self.visible(forest);
        let Some(index) = self.focused_index(&rows) else {
            return;
        };
        let row = &rows[index];
        if row.is_expanded {
            let key = row.key.clone();
            self.set_expanded(key, false);
        } else if let Some(parent) = &row.parent_key {
            self.focused = Some(parent.clone());
        }
    }

    /// Flip expansion of `key`. Collapsing a node that contains the focus
    /// moves focus onto that node.
    pub fn toggle_expand(&mut self, forest: &[TreeNode], key: &str) {
        let expand = !self.expanded.contains(key);
        self.set_expanded(key.to_string(), expand);
        if !expand {
            self.reconcile(forest);
        }
    }

    /// Toggle the focused node.
    pub fn toggle_focused(&mut self, forest: &[TreeNode]) {
        if let Some(key) = self.focused.clone() {
            self.toggle_expand(forest, &key);
        }
    }

    /// Hand the focused item to `callback`. Navigation state is unchanged.
    pub fn select<R>(
        &self,
        forest: &[TreeNode],
        callback: impl FnOnce(&Arc<Issue>) -> R,
    ) -> Option<R> {
        let rows = self.visible(forest);
        let index = self.focused_index(&rows)?;
        Some(callback(&rows[index].item))
    }

    /// Restore the focus invariant after the forest changed.
    ///
    /// A focus that is no longer visible moves to its closest visible
    /// ancestor, or to `None`. Returns whether the focus changed.
    pub fn reconcile(&mut self, forest: &[TreeNode]) -> bool {
        let Some(focused) = self.focused.clone() else {
            return false;
        };
        let rows = self.visible(forest);
        if rows.iter().any(|row| row.key == focused) {
            return false;
        }
        let fallback = self
            .mode
            .ancestor_keys(&focused)
            .into_iter()
            .find(|ancestor| rows.iter().any(|row| &row.key == ancestor));
        self.focused = fallback;
        true
    }

    pub fn expand_all(&mut self, forest: &[TreeNode]) {
        let keys = expandable_keys(forest, self.mode);
        let before = self.expanded.len();
        self.expanded.extend(keys);
        if self.expanded.len() != before {
            self.revision += 1;
        }
    }

    /// Collapse everything; the focus moves to its root row.
    pub fn collapse_all(&mut self, forest: &[TreeNode]) {
        if !self.expanded.is_empty() {
            self.expanded.clear();
            self.revision += 1;
        }
        self.reconcile(forest);
    }

    /// Expand the ancestors of `key` and focus it. Returns `false` when no
    /// node has that key.
    pub fn reveal(&mut self, forest: &[TreeNode], key: &str) -> bool {
        let Some(ancestors) = locate(forest, key, self.mode) else {
            return false;
        };
        for ancestor in ancestors {
            self.set_expanded(ancestor, true);
        }
        self.focused = Some(key.to_string());
        true
    }

    /// Drop expansion keys that no longer name a node.
    pub fn retain_existing(&mut self, forest: &[TreeNode]) {
        let existing: HashSet<String> = expandable_keys(forest, self.mode).into_iter().collect();
        let before = self.expanded.len();
        self.expanded.retain(|key| existing.contains(key));
        if self.expanded.len() != before {
            self.revision += 1;
        }
    }

    fn set_expanded(&mut self, key: String, expand: bool) {
        let changed = if expand {
            self.expanded.insert(key)
        } else {
            self.expanded.remove(&key)
        };
        if changed {
            self.revision += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::hierarchy::build_tree;

    fn forest(ids: &[&str]) -> Vec<TreeNode> {
        let items: Vec<Arc<Issue>> = ids.iter().map(|id| Arc::new(Issue::new(*id, *id))).collect();
        build_tree(&items)
    }

    fn assert_focus_visible(nav: &Navigator, forest: &[TreeNode]) {
        if let Some(focused) = nav.focused() {
            assert!(
                nav.visible(forest).iter().any(|row| row.key == focused),
                "focus {} not visible",
                focused
            );
        }
    }

    #[test]
    fn test_move_next_without_focus_picks_first() {
        let forest = forest(&["a", "b"]);
        let mut nav = Navigator::new(KeyMode::Id);
        nav.move_next(&forest);
        assert_eq!(nav.focused(), Some("a"));
    }

    #[test]
    fn test_move_previous_without_focus_picks_last() {
        let forest = forest(&["a", "b"]);
        let mut nav = Navigator::new(KeyMode::Id);
        nav.move_previous(&forest);
        assert_eq!(nav.focused(), Some("b"));
    }

    #[test]
    fn test_moves_do_not_wrap() {
        let forest = forest(&["a", "b"]);
        let mut nav = Navigator::new(KeyMode::Id);
        nav.move_last(&forest);
        nav.move_next(&forest);
        assert_eq!(nav.focused(), Some("b"));
        nav.move_first(&forest);
        nav.move_previous(&forest);
        assert_eq!(nav.focused(), Some("a"));
    }

    #[test]
    fn test_moves_on_empty_forest() {
        let mut nav = Navigator::new(KeyMode::Id);
        nav.move_next(&[]);
        nav.move_last(&[]);
        nav.expand_or_descend(&[]);
        nav.collapse_or_ascend(&[]);
        assert_eq!(nav.focused(), None);
    }

    #[test]
    fn test_expand_then_descend() {
        let forest = forest(&["a", "a.1", "a.2"]);
        let mut nav = Navigator::new(KeyMode::Id);
        nav.move_first(&forest);

        nav.expand_or_descend(&forest);
        assert!(nav.is_expanded("a"));
        assert_eq!(nav.focused(), Some("a"));

        nav.expand_or_descend(&forest);
        assert_eq!(nav.focused(), Some("a.1"));

        // Leaf: no-op
        nav.expand_or_descend(&forest);
        assert_eq!(nav.focused(), Some("a.1"));
    }

    #[test]
    fn test_collapse_then_ascend() {
        let forest = forest(&["a", "a.1", "a.1.1"]);
        let mut nav = Navigator::new(KeyMode::Id);
        assert!(nav.reveal(&forest, "a.1.1"));
        assert_eq!(nav.focused(), Some("a.1.1"));

        nav.collapse_or_ascend(&forest);
        assert_eq!(nav.focused(), Some("a.1"));

        nav.collapse_or_ascend(&forest);
        assert!(!nav.is_expanded("a.1"));
        assert_eq!(nav.focused(), Some("a.1"));

        nav.collapse_or_ascend(&forest);
        assert_eq!(nav.focused(), Some("a"));

        nav.collapse_or_ascend(&forest);
        nav.collapse_or_ascend(&forest);
        assert_eq!(nav.focused(), Some("a"));
        assert!(!nav.is_expanded("a"));
    }

    #[test]
    fn test_collapsing_ancestor_moves_focus_to_it() {
        let forest = forest(&["a", "a.1", "a.1.1", "b"]);
        let mut nav = Navigator::new(KeyMode::Id);
        nav.reveal(&forest, "a.1.1");

        nav.toggle_expand(&forest, "a");
        assert_eq!(nav.focused(), Some("a"));
        assert_focus_visible(&nav, &forest);

        // Re-expanding keeps focus where it is
        nav.toggle_expand(&forest, "a");
        assert_eq!(nav.focused(), Some("a"));
    }

    #[test]
    fn test_toggle_unrelated_keeps_focus() {
        let forest = forest(&["a", "a.1", "b", "b.1"]);
        let mut nav = Navigator::new(KeyMode::Id);
        nav.reveal(&forest, "a.1");
        nav.toggle_expand(&forest, "b");
        nav.toggle_expand(&forest, "b");
        assert_eq!(nav.focused(), Some("a.1"));
    }

    #[test]
    fn test_select_reports_focused_item() {
        let forest = forest(&["a", "b"]);
        let mut nav = Navigator::new(KeyMode::Id);
        assert_eq!(nav.select(&forest, |item| item.id.clone()), None);
        nav.move_last(&forest);
        let before = nav.clone();
        assert_eq!(
            nav.select(&forest, |item| item.id.clone()),
            Some("b".to_string())
        );
        assert_eq!(nav, before);
    }

    #[test]
    fn test_reconcile_after_item_removed() {
        let mut nav = Navigator::new(KeyMode::Id);
        let full = forest(&["a", "a.1", "a.1.1"]);
        nav.reveal(&full, "a.1.1");

        let shrunk = forest(&["a", "a.1"]);
        assert!(nav.reconcile(&shrunk));
        assert_eq!(nav.focused(), Some("a.1"));

        let gone = forest(&["b"]);
        assert!(nav.reconcile(&gone));
        assert_eq!(nav.focused(), None);
    }

    #[test]
    fn test_expand_all_and_collapse_all() {
        let forest = forest(&["a", "a.1", "a.1.1", "b"]);
        let mut nav = Navigator::new(KeyMode::Id);
        nav.expand_all(&forest);
        assert_eq!(nav.visible(&forest).len(), 4);

        nav.focus(&forest, "a.1.1");
        let revision = nav.revision();
        nav.collapse_all(&forest);
        assert!(nav.revision() > revision);
        assert_eq!(nav.focused(), Some("a"));
        assert_eq!(nav.visible(&forest).len(), 2);
    }

    #[test]
    fn test_focus_rejects_hidden_key() {
        let forest = forest(&["a", "a.1"]);
        let mut nav = Navigator::new(KeyMode::Id);
        assert!(!nav.focus(&forest, "a.1"));
        assert!(nav.focus(&forest, "a"));
    }

    #[test]
    fn test_path_mode_expands_per_branch() {
        // Same id under two filtered roots is keyed by path
        let shared = Arc::new(Issue::new("x.1", "shared"));
        let forest = vec![
            TreeNode {
                item: Arc::new(Issue::new("p", "p")),
                children: vec![TreeNode::new(Arc::clone(&shared))],
            },
            TreeNode {
                item: Arc::new(Issue::new("q", "q")),
                children: vec![TreeNode::new(shared)],
            },
        ];
        let mut nav = Navigator::new(KeyMode::Path);
        nav.toggle_expand(&forest, "p");
        let keys: Vec<String> = nav.visible(&forest).into_iter().map(|r| r.key).collect();
        assert_eq!(keys, vec!["p", "p/x.1", "q"]);
    }

    #[test]
    fn test_retain_existing_drops_vanished_keys() {
        let mut nav = Navigator::new(KeyMode::Id);
        nav.expand_all(&forest(&["a", "a.1", "b", "b.1"]));
        nav.retain_existing(&forest(&["a", "a.1"]));
        assert_eq!(nav.expanded().len(), 1);
        assert!(nav.is_expanded("a"));
    }

    #[test]
    fn test_focus_stays_visible_through_sequence() {
        let forest = forest(&["a", "a.1", "a.1.1", "a.2", "b", "b.1"]);
        let mut nav = Navigator::new(KeyMode::Id);
        let toggles = ["a", "a.1", "b", "a", "a.1", "b", "a"];
        for (step, key) in toggles.iter().enumerate() {
            match step % 3 {
                0 => nav.move_next(&forest),
                1 => nav.move_previous(&forest),
                _ => nav.expand_or_descend(&forest),
            }
            nav.toggle_expand(&forest, key);
            assert_focus_visible(&nav, &forest);
            nav.move_next(&forest);
            assert_focus_visible(&nav, &forest);
        }
    }
}
