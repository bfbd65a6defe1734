//! Flattening of issue forests into visible rows.
//!
//! A [`FlatNode`] is one row of the tree as currently expanded. Rows carry a
//! `path` (the `/`-joined ids from the root) so that the same id appearing in
//! two filtered contexts still gets two distinct row identities.
//!
//! Expansion is tracked by key. In [`KeyMode::Id`] the key is the issue id;
//! in [`KeyMode::Path`] it is the path, so identical ids in different
//! branches expand independently.

pub mod navigation;
pub mod virtual_list;

use std::collections::HashSet;
use std::sync::Arc;

use crate::models::Issue;
use crate::models::hierarchy::{self, TreeNode};

pub use navigation::Navigator;
pub use virtual_list::{RenderMode, TreeView, VisibleRow};

/// Separator between ids in a row path.
pub const PATH_SEPARATOR: char = '/';

/// How rows are identified for focus and expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyMode {
    #[default]
    Id,
    Path,
}

impl KeyMode {
    fn key_for(self, id: &str, path: &str) -> String {
        match self {
            KeyMode::Id => id.to_string(),
            KeyMode::Path => path.to_string(),
        }
    }

    /// Candidate ancestor keys of `key`, nearest first.
    ///
    /// Derived from the key text alone, so it works for nodes that have
    /// since disappeared from the tree.
    pub fn ancestor_keys(self, key: &str) -> Vec<String> {
        let mut ancestors = Vec::new();
        let mut current = key;
        loop {
            let parent = match self {
                KeyMode::Id => hierarchy::parent_id(current),
                KeyMode::Path => current
                    .rsplit_once(PATH_SEPARATOR)
                    .map(|(parent, _)| parent)
                    .filter(|parent| !parent.is_empty()),
            };
            match parent {
                Some(parent) => {
                    ancestors.push(parent.to_string());
                    current = parent;
                }
                None => return ancestors,
            }
        }
    }
}

/// One visible row.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatNode {
    pub item: Arc<Issue>,
    pub depth: usize,
    pub has_children: bool,
    pub is_expanded: bool,
    pub path: String,
    /// Focus/expansion key (id or path depending on [`KeyMode`])
    pub key: String,
    /// Key of the tree parent row, `None` for roots
    pub parent_key: Option<String>,
}

impl FlatNode {
    pub fn id(&self) -> &str {
        &self.item.id
    }
}

/// Flatten the rows visible under `expanded`, in pre-order.
pub fn flatten_visible(
    forest: &[TreeNode],
    expanded: &HashSet<String>,
    mode: KeyMode,
) -> Vec<FlatNode> {
    let mut rows = Vec::new();
    walk(forest, mode, &mut |node, _| {
        let open = expanded.contains(&node.key);
        rows.push(FlatNode {
            is_expanded: open && node.has_children,
            ..node
        });
        open
    });
    rows
}

/// Flatten every node regardless of expansion.
pub fn flatten_all(forest: &[TreeNode], mode: KeyMode) -> Vec<FlatNode> {
    let mut rows = Vec::new();
    walk(forest, mode, &mut |node, _| {
        rows.push(node);
        true
    });
    rows
}

/// Keys of every node that has children.
pub fn expandable_keys(forest: &[TreeNode], mode: KeyMode) -> Vec<String> {
    flatten_all(forest, mode)
        .into_iter()
        .filter(|node| node.has_children)
        .map(|node| node.key)
        .collect()
}

/// Ancestor keys of the node with `key`, root first, if the node exists.
pub fn locate(forest: &[TreeNode], key: &str, mode: KeyMode) -> Option<Vec<String>> {
    let mut found = None;
    walk(forest, mode, &mut |node, ancestors| {
        if found.is_none() && node.key == key {
            found = Some(ancestors.to_vec());
        }
        found.is_none()
    });
    found
}

/// Depth-first walk. `visit` receives each row and its ancestor keys and
/// returns whether to descend into its children.
fn walk<F>(forest: &[TreeNode], mode: KeyMode, visit: &mut F)
where
    F: FnMut(FlatNode, &[String]) -> bool,
{
    let mut ancestors = Vec::new();
    for node in forest {
        walk_node(node, 0, "", None, mode, &mut ancestors, visit);
    }
}

fn walk_node<F>(
    node: &TreeNode,
    depth: usize,
    parent_path: &str,
    parent_key: Option<&str>,
    mode: KeyMode,
    ancestors: &mut Vec<String>,
    visit: &mut F,
) where
    F: FnMut(FlatNode, &[String]) -> bool,
{
    let path = if parent_path.is_empty() {
        node.id().to_string()
    } else {
        format!("{}{}{}", parent_path, PATH_SEPARATOR, node.id())
    };
    let key = mode.key_for(node.id(), &path);
    let row = FlatNode {
        item: Arc::clone(&node.item),
        depth,
        has_children: node.has_children(),
        is_expanded: node.has_children(),
        path: path.clone(),
        key: key.clone(),
        parent_key: parent_key.map(str::to_string),
    };
    if !visit(row, ancestors) {
        return;
    }
    ancestors.push(key.clone());
    for child in &node.children {
        walk_node(child, depth + 1, &path, Some(&key), mode, ancestors, visit);
    }
    ancestors.pop();
}
