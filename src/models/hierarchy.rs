//! Hierarchy utilities for dot-segmented issue IDs.
//!
//! Parentage is encoded in the ID itself: `gt-1.2` is a child of `gt-1`.
//! These functions derive trees from flat issue lists without any parent
//! pointer field. Everything here is pure and synchronous.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::{Issue, IssueStatus};

/// Return the parent ID of `id`, or `None` if `id` has no dot-segment.
///
/// IDs with an empty leading or trailing segment (`".1"`, `"a."`) are
/// treated as roots.
pub fn parent_id(id: &str) -> Option<&str> {
    let (parent, last) = id.rsplit_once('.')?;
    if parent.is_empty() || last.is_empty() {
        return None;
    }
    Some(parent)
}

/// Whether `id` is `ancestor` itself or lies below it in the dot chain.
///
/// Follows [`parent_id`], so an ID that is a root there (`"a."`) is never
/// counted under another ID.
pub fn is_same_or_descendant(id: &str, ancestor: &str) -> bool {
    let mut current = Some(id);
    while let Some(candidate) = current {
        if candidate == ancestor {
            return true;
        }
        if candidate.len() <= ancestor.len() {
            return false;
        }
        current = parent_id(candidate);
    }
    false
}

/// A node in a materialized issue tree.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    pub item: Arc<Issue>,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn new(item: Arc<Issue>) -> Self {
        Self {
            item,
            children: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.item.id
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Number of nodes in this subtree, including this one.
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(TreeNode::subtree_len).sum::<usize>()
    }
}

/// Total number of nodes in a forest.
pub fn count_nodes(forest: &[TreeNode]) -> usize {
    forest.iter().map(TreeNode::subtree_len).sum()
}

/// Build a forest from a flat list of issues.
///
/// Roots are the issues whose derived parent ID is not present in `items`,
/// so an orphaned child becomes a root instead of being dropped. Children
/// keep their input order; sorting is left to the caller. When an ID
/// appears more than once the first occurrence wins.
pub fn build_tree(items: &[Arc<Issue>]) -> Vec<TreeNode> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(items.len());
    let unique: Vec<&Arc<Issue>> = items
        .iter()
        .filter(|item| seen.insert(item.id.as_str()))
        .collect();

    let mut children_of: HashMap<&str, Vec<&Arc<Issue>>> = HashMap::new();
    let mut roots: Vec<&Arc<Issue>> = Vec::new();

    for item in &unique {
        match parent_id(&item.id).filter(|parent| seen.contains(parent)) {
            Some(parent) => children_of.entry(parent).or_default().push(item),
            None => roots.push(item),
        }
    }

    roots
        .into_iter()
        .map(|root| attach_children(root, &mut children_of))
        .collect()
}

fn attach_children<'a>(
    item: &'a Arc<Issue>,
    children_of: &mut HashMap<&'a str, Vec<&'a Arc<Issue>>>,
) -> TreeNode {
    let children = children_of.remove(item.id.as_str()).unwrap_or_default();
    TreeNode {
        item: Arc::clone(item),
        children: children
            .into_iter()
            .map(|child| attach_children(child, children_of))
            .collect(),
    }
}

/// All issues whose ID equals `root_id` or derives from it through the dot
/// chain.
///
/// The chain is walked on IDs alone, so missing intermediate levels do not
/// hide deeper descendants.
pub fn descendants(items: &[Arc<Issue>], root_id: &str) -> Vec<Arc<Issue>> {
    items
        .iter()
        .filter(|item| is_same_or_descendant(&item.id, root_id))
        .cloned()
        .collect()
}

/// Build a single tree rooted at `root_id`.
///
/// If the root issue is absent a placeholder node is synthesized for it and
/// the descendant forest is attached as its children. Descendants that end
/// up as separate roots because an intermediate level is missing are
/// attached directly under the root. Returns `None` when neither the root
/// nor any descendant is present.
pub fn rooted_tree(items: &[Arc<Issue>], root_id: &str) -> Option<TreeNode> {
    let subset = descendants(items, root_id);
    if subset.is_empty() {
        return None;
    }

    let forest = build_tree(&subset);
    let (mut roots, rest): (Vec<TreeNode>, Vec<TreeNode>) =
        forest.into_iter().partition(|node| node.id() == root_id);

    let mut root = match roots.pop() {
        Some(node) => node,
        None => TreeNode::new(Arc::new(Issue::new(root_id, root_id))),
    };
    root.children.extend(rest);
    Some(root)
}

/// Pre-order traversal yielding each node with its traversal parent's ID.
pub fn preorder(forest: &[TreeNode]) -> Preorder<'_> {
    Preorder {
        stack: forest.iter().rev().map(|node| (node, None)).collect(),
    }
}

/// Iterator returned by [`preorder`].
pub struct Preorder<'a> {
    stack: Vec<(&'a TreeNode, Option<&'a str>)>,
}

impl<'a> Iterator for Preorder<'a> {
    type Item = (&'a TreeNode, Option<&'a str>);

    fn next(&mut self) -> Option<Self::Item> {
        let (node, parent) = self.stack.pop()?;
        for child in node.children.iter().rev() {
            self.stack.push((child, Some(node.id())));
        }
        Some((node, parent))
    }
}

/// Recursively sort every level of a forest with a stable sort.
pub fn sort_forest<F>(forest: &mut [TreeNode], cmp: &F)
where
    F: Fn(&Issue, &Issue) -> Ordering,
{
    forest.sort_by(|a, b| cmp(&a.item, &b.item));
    for node in forest.iter_mut() {
        sort_forest(&mut node.children, cmp);
    }
}

/// Order by `closed_at` ascending; issues that were never closed go last.
pub fn by_closed_at_ascending(a: &Issue, b: &Issue) -> Ordering {
    match (a.closed_at, b.closed_at) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Order by priority, then ID.
pub fn by_priority(a: &Issue, b: &Issue) -> Ordering {
    a.priority.cmp(&b.priority).then_with(|| a.id.cmp(&b.id))
}

/// Issues whose status is one of `statuses`.
pub fn filter_by_status(items: &[Arc<Issue>], statuses: &[IssueStatus]) -> Vec<Arc<Issue>> {
    items
        .iter()
        .filter(|item| statuses.contains(&item.status))
        .cloned()
        .collect()
}

/// Completed work: closed issues only.
pub fn completed(items: &[Arc<Issue>]) -> Vec<Arc<Issue>> {
    filter_by_status(items, &[IssueStatus::Closed])
}
