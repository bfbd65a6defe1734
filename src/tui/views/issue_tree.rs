//! Issue Tree View - hierarchical issue list for the selected rig
//!
//! Paints a [`TreeView`]. Small trees are drawn as a full list with
//! description previews; large trees are drawn one line per row from the
//! virtualized window.

use std::sync::Arc;

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
};

use crate::models::hierarchy::{by_closed_at_ascending, completed};
use crate::models::{Issue, IssueStatus, ItemList};
use crate::source::{DataOrigin, Resource};
use crate::tree::{RenderMode, TreeView, VisibleRow};

/// Description lines shown under a row in full mode.
const PREVIEW_LINES: usize = 2;

type ItemFilter = fn(&[Arc<Issue>]) -> Vec<Arc<Issue>>;

/// State for an issue tree panel
pub struct IssueTreeView {
    tree: TreeView,
    title: &'static str,
    /// Applied to the source list before building the tree
    filter: Option<ItemFilter>,
    /// Unfiltered list last handed to `set_items`
    source: Option<ItemList<Issue>>,
    origin: Option<DataOrigin>,
    error: Option<String>,
    stale: bool,
    list_state: ListState,
}

impl IssueTreeView {
    /// All issues of the rig.
    pub fn issues(overscan: usize, full_render_limit: usize) -> Self {
        Self::with_tree(
            "Issues",
            None,
            TreeView::new()
                .with_overscan(overscan)
                .with_full_render_limit(full_render_limit),
        )
    }

    /// Closed issues, oldest closure first.
    pub fn completed(overscan: usize, full_render_limit: usize) -> Self {
        Self::with_tree(
            "Completed",
            Some(completed),
            TreeView::new()
                .with_overscan(overscan)
                .with_full_render_limit(full_render_limit)
                .with_order(by_closed_at_ascending),
        )
    }

    fn with_tree(title: &'static str, filter: Option<ItemFilter>, tree: TreeView) -> Self {
        Self {
            tree,
            title,
            filter,
            source: None,
            origin: None,
            error: None,
            stale: false,
            list_state: ListState::default(),
        }
    }

    pub fn tree(&self) -> &TreeView {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut TreeView {
        &mut self.tree
    }

    pub fn origin(&self) -> Option<DataOrigin> {
        self.origin
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Feed a push-buffer list.
    pub fn set_live(&mut self, items: ItemList<Issue>) {
        self.origin = Some(DataOrigin::Live);
        self.error = None;
        self.stale = false;
        self.set_items(items);
    }

    /// Feed the result of a fallback load. A failed load without data keeps
    /// the rows already shown.
    pub fn set_resource(&mut self, resource: Resource<ItemList<Issue>>) {
        self.origin = Some(resource.origin);
        self.error = resource.error;
        self.stale = resource.stale;
        if let Some(items) = resource.data {
            self.set_items(items);
        }
    }

    /// Forget everything (rig switch).
    pub fn reset(&mut self) {
        self.source = None;
        self.origin = None;
        self.error = None;
        self.stale = false;
        self.tree.set_items(Arc::new(Vec::new()));
    }

    fn set_items(&mut self, items: ItemList<Issue>) {
        if let Some(source) = &self.source {
            if Arc::ptr_eq(source, &items) {
                return;
            }
        }
        self.source = Some(Arc::clone(&items));
        let list = match self.filter {
            Some(filter) => Arc::new(filter(&items)),
            None => items,
        };
        self.tree.set_items(list);
    }

    fn banner(&self) -> Option<Line<'static>> {
        let error = self.error.as_ref()?;
        let (style, text) = if self.stale {
            (
                Style::default().fg(Color::Yellow),
                format!(" ⚠ Showing cached data. {}  (r: retry)", error),
            )
        } else {
            (
                Style::default().fg(Color::Red),
                format!(" ✗ {}  (r: retry)", error),
            )
        };
        Some(Line::from(Span::styled(text, style)))
    }

    /// Render the view
    pub fn render(&mut self, frame: &mut Frame, area: Rect, is_recent: impl Fn(&str) -> bool) {
        let origin = match self.origin {
            Some(DataOrigin::Live) => "live",
            Some(DataOrigin::Fallback) => "polled",
            None => "loading",
        };
        let total = self.tree.items().len();
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!(" {} ({}) [{}] ", self.title, total, origin));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let mut body = inner;
        if let Some(banner) = self.banner() {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Length(1), Constraint::Min(1)])
                .split(inner);
            frame.render_widget(Paragraph::new(banner), chunks[0]);
            body = chunks[1];
        }

        self.tree.set_viewport_height(body.height as usize);
        let rows = self.tree.visible_rows(&is_recent);
        if rows.is_empty() {
            let text = if self.origin.is_none() {
                "Loading..."
            } else {
                "No issues"
            };
            let empty = Paragraph::new(text).style(Style::default().fg(Color::DarkGray));
            frame.render_widget(empty, body);
            return;
        }

        let title_width = body.width.saturating_sub(36) as usize;
        match self.tree.render_mode() {
            RenderMode::Full => {
                let items: Vec<ListItem> = rows
                    .iter()
                    .map(|row| full_item(row, title_width))
                    .collect();
                let focused = rows.iter().position(|row| row.focused);
                self.list_state.select(focused);
                frame.render_stateful_widget(List::new(items), body, &mut self.list_state);
            }
            RenderMode::Virtual => {
                // The window starts up to `overscan` rows above the viewport
                let skip = self.tree.scroll_offset() - self.tree.window().start;
                let lines: Vec<Line> = rows
                    .iter()
                    .skip(skip)
                    .take(body.height as usize)
                    .map(|row| row_line(row, title_width).style(row_style(row)))
                    .collect();
                frame.render_widget(Paragraph::new(lines), body);
            }
        }
    }
}

fn status_style(status: IssueStatus) -> Style {
    match status {
        IssueStatus::Open => Style::default().fg(Color::White),
        IssueStatus::InProgress => Style::default().fg(Color::Green),
        IssueStatus::Blocked => Style::default().fg(Color::Red),
        IssueStatus::Deferred => Style::default().fg(Color::DarkGray),
        IssueStatus::Closed => Style::default().fg(Color::Cyan),
        IssueStatus::Tombstone => Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::CROSSED_OUT),
    }
}

fn row_style(row: &VisibleRow) -> Style {
    let mut style = Style::default();
    if row.recent {
        style = style.fg(Color::LightYellow).add_modifier(Modifier::BOLD);
    }
    if row.focused {
        style = style.bg(Color::DarkGray);
    }
    style
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() > width {
        let kept: String = text.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        text.to_string()
    }
}

fn row_line(row: &VisibleRow, title_width: usize) -> Line<'static> {
    let node = &row.node;
    let issue = &node.item;
    let marker = match (node.has_children, node.is_expanded) {
        (true, true) => "▾ ",
        (true, false) => "▸ ",
        (false, _) => "  ",
    };
    Line::from(vec![
        Span::raw(format!(" {}{}", "  ".repeat(node.depth), marker)),
        Span::styled(issue.id.clone(), Style::default().fg(Color::Blue)),
        Span::raw(" "),
        Span::styled(
            format!("[{}]", issue.status.as_str()),
            status_style(issue.status),
        ),
        Span::raw(format!(" [P{}] ", issue.priority)),
        Span::raw(truncate(&issue.title, title_width)),
        Span::styled(
            format!("  {}", issue.display_assignee()),
            Style::default().fg(Color::DarkGray),
        ),
    ])
}

fn full_item(row: &VisibleRow, title_width: usize) -> ListItem<'static> {
    let mut lines = vec![row_line(row, title_width)];
    if let Some(description) = &row.node.item.description {
        let indent = "  ".repeat(row.node.depth + 2);
        lines.extend(
            description
                .lines()
                .filter(|line| !line.trim().is_empty())
                .take(PREVIEW_LINES)
                .map(|line| {
                    Line::from(Span::styled(
                        format!(" {}{}", indent, truncate(line.trim(), title_width + 20)),
                        Style::default().fg(Color::DarkGray),
                    ))
                }),
        );
    }
    ListItem::new(lines).style(row_style(row))
}
