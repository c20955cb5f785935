//! Immutable tree editing with structural sharing
//!
//! Every edit walks from the root to the target, copies only the nodes on that
//! path and re-links all other subtrees by `Arc` identity. An edit that finds
//! nothing returns the input root itself, so callers can detect no-ops with
//! [`Arc::ptr_eq`].

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use super::error::{SceneError, TreeError};
use super::node::GameObject;

/// Outcome of a recursive edit below one node
enum Edit {
    NotFound,
    Unchanged,
    Replaced(Arc<GameObject>),
}

/// Copy `node` with the child at `index` replaced (or removed when `None`)
fn relink(node: &GameObject, index: usize, replacement: Option<Arc<GameObject>>) -> Arc<GameObject> {
    let mut children = Vec::with_capacity(node.children.len());
    for (i, child) in node.children.iter().enumerate() {
        if i != index {
            children.push(Arc::clone(child));
        } else if let Some(replacement) = &replacement {
            children.push(Arc::clone(replacement));
        }
    }

    Arc::new(GameObject {
        id: node.id.clone(),
        disabled: node.disabled,
        hidden: node.hidden,
        components: node.components.clone(),
        children,
    })
}

/// Depth-first search, children visited in order
#[must_use]
pub fn find_node<'a>(root: &'a Arc<GameObject>, id: &str) -> Option<&'a Arc<GameObject>> {
    if root.id == id {
        return Some(root);
    }
    root.children.iter().find_map(|child| find_node(child, id))
}

/// Find the parent of the node with the given id
#[must_use]
pub fn find_parent<'a>(root: &'a Arc<GameObject>, id: &str) -> Option<&'a Arc<GameObject>> {
    if root.children.iter().any(|child| child.id == id) {
        return Some(root);
    }
    root.children.iter().find_map(|child| find_parent(child, id))
}

fn edit_first<P, F>(node: &Arc<GameObject>, predicate: &P, transform: &mut Option<F>) -> Edit
where
    P: Fn(&GameObject) -> bool,
    F: FnOnce(&Arc<GameObject>) -> Arc<GameObject>,
{
    if predicate(node) {
        let Some(transform) = transform.take() else {
            return Edit::NotFound;
        };
        let next = transform(node);
        return if Arc::ptr_eq(&next, node) {
            Edit::Unchanged
        } else {
            Edit::Replaced(next)
        };
    }

    for (index, child) in node.children.iter().enumerate() {
        match edit_first(child, predicate, transform) {
            Edit::NotFound => {}
            Edit::Unchanged => return Edit::Unchanged,
            Edit::Replaced(new_child) => {
                return Edit::Replaced(relink(node, index, Some(new_child)));
            }
        }
    }

    Edit::NotFound
}

/// Replace the first node (pre-order) matching `predicate` with `transform(node)`.
///
/// Returns `root` itself when nothing matches or when `transform` hands back
/// the very same `Arc` it was given.
#[must_use]
pub fn update_node<P, F>(root: &Arc<GameObject>, predicate: P, transform: F) -> Arc<GameObject>
where
    P: Fn(&GameObject) -> bool,
    F: FnOnce(&Arc<GameObject>) -> Arc<GameObject>,
{
    let mut transform = Some(transform);
    match edit_first(root, &predicate, &mut transform) {
        Edit::Replaced(new_root) => new_root,
        Edit::NotFound | Edit::Unchanged => Arc::clone(root),
    }
}

/// [`update_node`] keyed by node id
#[must_use]
pub fn update_node_by_id<F>(root: &Arc<GameObject>, id: &str, transform: F) -> Arc<GameObject>
where
    F: FnOnce(&Arc<GameObject>) -> Arc<GameObject>,
{
    update_node(root, |node| node.id == id, transform)
}

/// Copy-on-write convenience: clone the target node, mutate the copy in place.
///
/// The copy shares its children with the original.
#[must_use]
pub fn modify_node_by_id<F>(root: &Arc<GameObject>, id: &str, modify: F) -> Arc<GameObject>
where
    F: FnOnce(&mut GameObject),
{
    update_node_by_id(root, id, |node| {
        let mut copy = GameObject::clone(node);
        modify(&mut copy);
        if copy == **node {
            Arc::clone(node)
        } else {
            Arc::new(copy)
        }
    })
}

fn remove_below(node: &Arc<GameObject>, id: &str) -> Option<Arc<GameObject>> {
    if let Some(index) = node.children.iter().position(|child| child.id == id) {
        return Some(relink(node, index, None));
    }

    node.children
        .iter()
        .enumerate()
        .find_map(|(index, child)| {
            remove_below(child, id).map(|new_child| relink(node, index, Some(new_child)))
        })
}

/// Remove the node with `id` and its whole subtree.
///
/// A miss returns `root` unchanged. Deleting the root itself is rejected.
pub fn delete_node(root: &Arc<GameObject>, id: &str) -> Result<Arc<GameObject>, TreeError> {
    if root.id == id {
        return Err(TreeError::RootDeletion(id.to_string()));
    }
    Ok(remove_below(root, id).unwrap_or_else(|| Arc::clone(root)))
}

/// Insert `child` under `parent_id` at `index` (appended when `None` or out of range)
pub fn insert_child(
    root: &Arc<GameObject>,
    parent_id: &str,
    child: Arc<GameObject>,
    index: Option<usize>,
) -> Result<Arc<GameObject>, TreeError> {
    if find_node(root, parent_id).is_none() {
        return Err(TreeError::ParentNotFound(parent_id.to_string()));
    }

    let existing: FxHashSet<String> = collect_ids(root).into_iter().collect();
    let mut incoming = FxHashSet::default();
    for id in collect_ids(&child) {
        if existing.contains(&id) || !incoming.insert(id.clone()) {
            return Err(TreeError::DuplicateId(id));
        }
    }

    Ok(update_node_by_id(root, parent_id, move |parent| {
        let mut copy = GameObject::clone(parent);
        let at = index.map_or(copy.children.len(), |i| i.min(copy.children.len()));
        copy.children.insert(at, child);
        Arc::new(copy)
    }))
}

fn deep_copy<R>(node: &GameObject, rename: &mut R) -> Arc<GameObject>
where
    R: FnMut(&str) -> String,
{
    let id = rename(&node.id);
    let children = node
        .children
        .iter()
        .map(|child| deep_copy(child, rename))
        .collect();

    Arc::new(GameObject {
        id,
        disabled: node.disabled,
        hidden: node.hidden,
        components: node.components.clone(),
        children,
    })
}

/// Deep-copy a subtree, giving every node the id chosen by `rename`
#[must_use]
pub fn clone_node_with<R>(node: &GameObject, mut rename: R) -> Arc<GameObject>
where
    R: FnMut(&str) -> String,
{
    deep_copy(node, &mut rename)
}

/// Strip a trailing `-<digits>` so clones of clones stay readable
fn base_id(id: &str) -> &str {
    match id.rsplit_once('-') {
        Some((base, suffix))
            if !base.is_empty() && !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()) =>
        {
            base
        }
        _ => id,
    }
}

/// Deep-copy a subtree for duplication into `target`.
///
/// Every copied node receives `<base>-<n>` with the smallest `n >= 1` that is
/// free in both `target` and the ids already assigned to the copy. The result
/// depends only on the two trees, so repeated calls agree.
#[must_use]
pub fn clone_node(node: &GameObject, target: &Arc<GameObject>) -> Arc<GameObject> {
    let mut taken: FxHashSet<String> = collect_ids(target).into_iter().collect();
    clone_node_with(node, |old| {
        let base = base_id(old).to_string();
        let mut n = 1_u32;
        loop {
            let candidate = format!("{base}-{n}");
            if !taken.contains(&candidate) {
                taken.insert(candidate.clone());
                return candidate;
            }
            n += 1;
        }
    })
}

/// Visit every node in pre-order together with its depth
pub fn walk<V>(root: &Arc<GameObject>, visitor: &mut V)
where
    V: FnMut(&Arc<GameObject>, usize),
{
    fn visit<V>(node: &Arc<GameObject>, depth: usize, visitor: &mut V)
    where
        V: FnMut(&Arc<GameObject>, usize),
    {
        visitor(node, depth);
        for child in &node.children {
            visit(child, depth + 1, visitor);
        }
    }
    visit(root, 0, visitor);
}

/// All ids in pre-order
#[must_use]
pub fn collect_ids(root: &Arc<GameObject>) -> Vec<String> {
    let mut ids = Vec::new();
    walk(root, &mut |node, _| ids.push(node.id.clone()));
    ids
}

/// Number of nodes in the tree
#[must_use]
pub fn count_nodes(root: &Arc<GameObject>) -> usize {
    1 + root.children.iter().map(count_nodes).sum::<usize>()
}

/// Check the per-snapshot id invariants
pub fn validate_ids(root: &Arc<GameObject>) -> Result<(), SceneError> {
    let mut seen = FxHashSet::default();
    for id in collect_ids(root) {
        if id.is_empty() {
            return Err(SceneError::EmptyId);
        }
        if !seen.insert(id.clone()) {
            return Err(SceneError::DuplicateId(id));
        }
    }
    Ok(())
}

/// Nodes whose identity differs between two versions of a tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeDiff {
    /// Ids present in the new tree whose node was rebuilt or added
    pub changed: Vec<String>,
    /// Ids present in the old tree that are gone
    pub removed: Vec<String>,
}

impl TreeDiff {
    /// Check if both versions are identical
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty() && self.removed.is_empty()
    }
}

/// Compare two tree versions, descending only into subtrees whose identity changed
#[must_use]
pub fn changed_subtrees(old: &Arc<GameObject>, new: &Arc<GameObject>) -> TreeDiff {
    fn diff(old: &Arc<GameObject>, new: &Arc<GameObject>, out: &mut TreeDiff) {
        if Arc::ptr_eq(old, new) {
            return;
        }
        out.changed.push(new.id.clone());

        let old_children: FxHashMap<&str, &Arc<GameObject>> = old
            .children
            .iter()
            .map(|child| (child.id.as_str(), child))
            .collect();
        let mut matched = FxHashSet::default();

        for child in &new.children {
            match old_children.get(child.id.as_str()) {
                Some(previous) => {
                    matched.insert(child.id.as_str());
                    diff(previous, child, out);
                }
                None => out.changed.extend(collect_ids(child)),
            }
        }

        for child in &old.children {
            if !matched.contains(child.id.as_str()) {
                out.removed.extend(collect_ids(child));
            }
        }
    }

    let mut out = TreeDiff::default();
    diff(old, new, &mut out);
    out
}
