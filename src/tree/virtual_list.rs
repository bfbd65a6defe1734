//! Windowed tree rows for painting.
//!
//! [`TreeView`] turns an issue list into rows ready for a renderer: it
//! rebuilds the forest only when the list `Arc` changes, memoizes the
//! visible rows on (list identity, expansion revision), and computes the
//! row window for the current viewport plus overscan.
//!
//! Small trees render in [`RenderMode::Full`]: every row, variable height,
//! with description preview. Large trees render in
//! [`RenderMode::Virtual`]: fixed one-line rows, only the window. The mode
//! is chosen from the tree size when the items are set and applies to the
//! whole view.

use std::cmp::Ordering;
use std::ops::Range;
use std::sync::Arc;

use tracing::debug;

use crate::models::hierarchy::{TreeNode, build_tree, count_nodes, sort_forest};
use crate::models::{Issue, ItemList};

use super::{FlatNode, KeyMode, Navigator};

/// Rows rendered above and below the viewport.
pub const DEFAULT_OVERSCAN: usize = 5;

/// Largest tree rendered without virtualization.
pub const DEFAULT_FULL_RENDER_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// All rows, variable height
    Full,
    /// Windowed, fixed-height rows
    Virtual,
}

/// A row prepared for painting.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibleRow {
    pub node: FlatNode,
    pub focused: bool,
    pub recent: bool,
}

struct RowMemo {
    items: ItemList<Issue>,
    revision: u64,
    rows: Arc<Vec<FlatNode>>,
}

pub struct TreeView {
    navigator: Navigator,
    items: ItemList<Issue>,
    forest: Vec<TreeNode>,
    order: Option<fn(&Issue, &Issue) -> Ordering>,
    memo: Option<RowMemo>,
    mode: RenderMode,
    viewport_height: usize,
    scroll_offset: usize,
    overscan: usize,
    full_render_limit: usize,
}

impl Default for TreeView {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeView {
    pub fn new() -> Self {
        Self {
            navigator: Navigator::new(KeyMode::Path),
            items: Arc::new(Vec::new()),
            forest: Vec::new(),
            order: None,
            memo: None,
            mode: RenderMode::Full,
            viewport_height: 0,
            scroll_offset: 0,
            overscan: DEFAULT_OVERSCAN,
            full_render_limit: DEFAULT_FULL_RENDER_LIMIT,
        }
    }

    pub fn with_overscan(mut self, overscan: usize) -> Self {
        self.overscan = overscan;
        self
    }

    pub fn with_full_render_limit(mut self, limit: usize) -> Self {
        self.full_render_limit = limit;
        self
    }

    /// Sort siblings with `order` whenever the forest is rebuilt.
    pub fn with_order(mut self, order: fn(&Issue, &Issue) -> Ordering) -> Self {
        self.order = Some(order);
        self
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn forest(&self) -> &[TreeNode] {
        &self.forest
    }

    pub fn items(&self) -> &ItemList<Issue> {
        &self.items
    }

    pub fn render_mode(&self) -> RenderMode {
        self.mode
    }

    pub fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }

    pub fn viewport_height(&self) -> usize {
        self.viewport_height
    }

    /// Replace the source list. A list with the same `Arc` identity as the
    /// current one is a no-op.
    pub fn set_items(&mut self, items: ItemList<Issue>) {
        if Arc::ptr_eq(&self.items, &items) {
            return;
        }
        let mut forest = build_tree(&items);
        if let Some(order) = self.order {
            sort_forest(&mut forest, &order);
        }
        let total = count_nodes(&forest);
        self.mode = if total <= self.full_render_limit {
            RenderMode::Full
        } else {
            RenderMode::Virtual
        };
        debug!(total, mode = ?self.mode, "tree source replaced");

        self.items = items;
        self.forest = forest;
        self.navigator.retain_existing(&self.forest);
        self.navigator.reconcile(&self.forest);
        self.clamp_scroll();
    }

    /// Visible rows, recomputed only when the source list or the expanded
    /// set changed since the last call.
    pub fn rows(&mut self) -> Arc<Vec<FlatNode>> {
        let revision = self.navigator.revision();
        if let Some(memo) = &self.memo {
            if Arc::ptr_eq(&memo.items, &self.items) && memo.revision == revision {
                return Arc::clone(&memo.rows);
            }
        }
        let rows = Arc::new(self.navigator.visible(&self.forest));
        self.memo = Some(RowMemo {
            items: Arc::clone(&self.items),
            revision,
            rows: Arc::clone(&rows),
        });
        rows
    }

    pub fn set_viewport_height(&mut self, height: usize) {
        self.viewport_height = height;
        self.ensure_focus_visible();
    }

    /// Row range to render: the viewport plus overscan on both sides,
    /// clamped to the row count. Full mode always covers every row.
    pub fn window(&mut self) -> Range<usize> {
        let len = self.rows().len();
        match self.mode {
            RenderMode::Full => 0..len,
            RenderMode::Virtual => {
                let start = self.scroll_offset.saturating_sub(self.overscan).min(len);
                let end = (self.scroll_offset + self.viewport_height + self.overscan).min(len);
                start..end
            }
        }
    }

    /// Rows inside [`window`](Self::window), flagged for focus and recent
    /// update highlighting.
    pub fn visible_rows(&mut self, is_recent: impl Fn(&str) -> bool) -> Vec<VisibleRow> {
        let rows = self.rows();
        let window = self.window();
        let focused = self.navigator.focused();
        rows[window]
            .iter()
            .map(|node| VisibleRow {
                focused: focused == Some(node.key.as_str()),
                recent: is_recent(node.id()),
                node: node.clone(),
            })
            .collect()
    }

    /// Scroll so the focused row lies inside the viewport.
    pub fn ensure_focus_visible(&mut self) {
        let rows = self.rows();
        if let Some(index) = self.navigator.focused_index(&rows) {
            if index < self.scroll_offset {
                self.scroll_offset = index;
            } else if self.viewport_height > 0 && index >= self.scroll_offset + self.viewport_height
            {
                self.scroll_offset = index + 1 - self.viewport_height;
            }
        }
        self.clamp_scroll();
    }

    fn clamp_scroll(&mut self) {
        let len = self.rows().len();
        let max_offset = len.saturating_sub(self.viewport_height.max(1));
        self.scroll_offset = self.scroll_offset.min(max_offset);
    }

    pub fn move_next(&mut self) {
        self.navigator.move_next(&self.forest);
        self.ensure_focus_visible();
    }

    pub fn move_previous(&mut self) {
        self.navigator.move_previous(&self.forest);
        self.ensure_focus_visible();
    }

    pub fn move_first(&mut self) {
        self.navigator.move_first(&self.forest);
        self.ensure_focus_visible();
    }

    pub fn move_last(&mut self) {
        self.navigator.move_last(&self.forest);
        self.ensure_focus_visible();
    }

    pub fn expand_or_descend(&mut self) {
        self.navigator.expand_or_descend(&self.forest);
        self.ensure_focus_visible();
    }

    pub fn collapse_or_ascend(&mut self) {
        self.navigator.collapse_or_ascend(&self.forest);
        self.ensure_focus_visible();
    }

    pub fn toggle_focused(&mut self) {
        self.navigator.toggle_focused(&self.forest);
        self.ensure_focus_visible();
    }

    pub fn expand_all(&mut self) {
        self.navigator.expand_all(&self.forest);
        self.ensure_focus_visible();
    }

    pub fn collapse_all(&mut self) {
        self.navigator.collapse_all(&self.forest);
        self.ensure_focus_visible();
    }

    /// Expand down to the row at `path` and focus it.
    pub fn reveal(&mut self, path: &str) -> bool {
        let found = self.navigator.reveal(&self.forest, path);
        self.ensure_focus_visible();
        found
    }

    /// Focused issue, if any.
    pub fn selected(&self) -> Option<Arc<Issue>> {
        self.navigator.select(&self.forest, Arc::clone)
    }
}
