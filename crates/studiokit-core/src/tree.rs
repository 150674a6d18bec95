//! Ordered container tree behind the Studio container page.
//!
//! A container holds groups and items; the order of each `children` list is
//! the rendering and grading order. [`ContainerTree`] owns the root and
//! implements the page's drag (move), add, duplicate and delete actions.
//! Every mutation is validated up front, so a failed call leaves the tree
//! exactly as it was.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::TreeError;

/// Stable identifier of a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A new random identifier.
    pub fn fresh() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Whether a node is a grouping unit or a leaf component.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Group,
    #[default]
    Item,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Group => write!(f, "group"),
            NodeKind::Item => write!(f, "item"),
        }
    }
}

/// A node of the container tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerNode {
    pub id: NodeId,
    pub label: String,
    #[serde(default)]
    pub kind: NodeKind,
    #[serde(default)]
    pub children: Vec<ContainerNode>,
}

impl ContainerNode {
    pub fn group(
        id: impl Into<NodeId>,
        label: impl Into<String>,
        children: Vec<ContainerNode>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind: NodeKind::Group,
            children,
        }
    }

    pub fn item(id: impl Into<NodeId>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind: NodeKind::Item,
            children: Vec::new(),
        }
    }

    /// Labels of the direct children, in order.
    pub fn child_labels(&self) -> Vec<&str> {
        self.children.iter().map(|c| c.label.as_str()).collect()
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(ContainerNode::subtree_len).sum::<usize>()
    }

    /// Copy of this subtree labelled as a duplicate, with fresh ids throughout.
    fn duplicated(&self) -> ContainerNode {
        let mut copy = self.clone();
        copy.label = duplicate_label(&self.label);
        refresh_ids(&mut copy);
        copy
    }
}

/// Label given to the copy of a node called `label`.
pub fn duplicate_label(label: &str) -> String {
    format!("Duplicate of '{label}'")
}

fn refresh_ids(node: &mut ContainerNode) {
    node.id = NodeId::fresh();
    for child in &mut node.children {
        refresh_ids(child);
    }
}

/// Anything that exposes an ordered list of children can be reordered.
pub trait Reorderable: Sized {
    fn node_id(&self) -> &NodeId;
    fn ordered_children(&self) -> &[Self];
    fn ordered_children_mut(&mut self) -> &mut Vec<Self>;

    /// Index path from `self` to the node `id` (empty when `self` is that node).
    fn path_to(&self, id: &NodeId) -> Option<Vec<usize>> {
        if self.node_id() == id {
            return Some(Vec::new());
        }
        for (idx, child) in self.ordered_children().iter().enumerate() {
            if let Some(mut rest) = child.path_to(id) {
                rest.insert(0, idx);
                return Some(rest);
            }
        }
        None
    }

    fn at_path(&self, path: &[usize]) -> Option<&Self> {
        match path.split_first() {
            None => Some(self),
            Some((&idx, rest)) => self.ordered_children().get(idx)?.at_path(rest),
        }
    }

    fn at_path_mut(&mut self, path: &[usize]) -> Option<&mut Self> {
        match path.split_first() {
            None => Some(self),
            Some((&idx, rest)) => self.ordered_children_mut().get_mut(idx)?.at_path_mut(rest),
        }
    }

    /// Visit every node below `self` in pre-order.
    fn for_each_descendant<'a>(&'a self, visit: &mut dyn FnMut(&'a Self)) {
        for child in self.ordered_children() {
            visit(child);
            child.for_each_descendant(visit);
        }
    }
}

impl Reorderable for ContainerNode {
    fn node_id(&self) -> &NodeId {
        &self.id
    }

    fn ordered_children(&self) -> &[Self] {
        &self.children
    }

    fn ordered_children_mut(&mut self) -> &mut Vec<Self> {
        &mut self.children
    }
}

/// A container and its nested groups and items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ContainerNode", into = "ContainerNode")]
pub struct ContainerTree {
    root: ContainerNode,
}

impl TryFrom<ContainerNode> for ContainerTree {
    type Error = TreeError;

    fn try_from(root: ContainerNode) -> Result<Self, Self::Error> {
        ContainerTree::new(root)
    }
}

impl From<ContainerTree> for ContainerNode {
    fn from(tree: ContainerTree) -> Self {
        tree.root
    }
}

impl ContainerTree {
    /// Wrap `root`, rejecting trees in which an id appears twice.
    pub fn new(root: ContainerNode) -> Result<Self, TreeError> {
        let mut seen = HashSet::new();
        seen.insert(root.id.clone());
        let mut duplicate = None;
        root.for_each_descendant(&mut |node| {
            if !seen.insert(node.id.clone()) && duplicate.is_none() {
                duplicate = Some(node.id.clone());
            }
        });
        match duplicate {
            Some(id) => Err(TreeError::DuplicateId(id)),
            None => Ok(Self { root }),
        }
    }

    pub fn root(&self) -> &ContainerNode {
        &self.root
    }

    pub fn into_root(self) -> ContainerNode {
        self.root
    }

    /// Total number of nodes, including the root.
    pub fn len(&self) -> usize {
        self.root.subtree_len()
    }

    /// Whether the root holds no children. The root itself always counts
    /// towards [`len`](Self::len), so an empty tree still has `len() == 1`.
    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.root.path_to(id).is_some()
    }

    pub fn find(&self, id: &NodeId) -> Option<&ContainerNode> {
        let path = self.root.path_to(id)?;
        self.root.at_path(&path)
    }

    /// Parent of `id`; `None` for the root or an unknown id.
    pub fn parent_of(&self, id: &NodeId) -> Option<&ContainerNode> {
        let path = self.root.path_to(id)?;
        let (_, parent_path) = path.split_last()?;
        self.root.at_path(parent_path)
    }

    /// First node in pre-order (root included) carrying `label`.
    pub fn find_by_label(&self, label: &str) -> Option<&ContainerNode> {
        if self.root.label == label {
            return Some(&self.root);
        }
        self.handles().into_iter().find(|n| n.label == label)
    }

    /// Every non-root node in pre-order, the order of the page's drag handles.
    pub fn handles(&self) -> Vec<&ContainerNode> {
        let mut out = Vec::with_capacity(self.len().saturating_sub(1));
        self.root.for_each_descendant(&mut |node| out.push(node));
        out
    }

    pub fn node_at_handle(&self, handle: usize) -> Option<&ContainerNode> {
        self.handles().into_iter().nth(handle)
    }

    /// Labels of the children of `id`.
    pub fn children_labels(&self, id: &NodeId) -> Option<Vec<&str>> {
        self.find(id).map(ContainerNode::child_labels)
    }

    /// `(label, child labels)` for the root and every group, in pre-order.
    pub fn ordering(&self) -> Vec<(String, Vec<String>)> {
        let owned = |n: &ContainerNode| {
            (
                n.label.clone(),
                n.children.iter().map(|c| c.label.clone()).collect::<Vec<_>>(),
            )
        };
        let mut out = vec![owned(&self.root)];
        self.root.for_each_descendant(&mut |node| {
            if node.kind == NodeKind::Group {
                out.push(owned(node));
            }
        });
        out
    }

    /// Locate a parented node: `(parent path, index in parent)`.
    fn locate_parented(&self, id: &NodeId) -> Result<(Vec<usize>, usize), TreeError> {
        let mut path = self
            .root
            .path_to(id)
            .ok_or_else(|| TreeError::NotFound(id.clone()))?;
        match path.pop() {
            Some(idx) => Ok((path, idx)),
            None => Err(TreeError::NotFound(id.clone())),
        }
    }

    /// Move `source` (with its subtree) to sit immediately before `target`.
    pub fn move_before(&mut self, source: &NodeId, target: &NodeId) -> Result<(), TreeError> {
        let invalid = |reason: &str| TreeError::InvalidMove {
            source_id: source.clone(),
            target_id: target.clone(),
            reason: reason.to_string(),
        };

        let source_path = self
            .root
            .path_to(source)
            .ok_or_else(|| TreeError::NotFound(source.clone()))?;
        let mut target_path = self
            .root
            .path_to(target)
            .ok_or_else(|| TreeError::NotFound(target.clone()))?;

        if source == target {
            return Err(invalid("a node cannot be moved before itself"));
        }
        if source_path.is_empty() {
            return Err(invalid("the root cannot be moved"));
        }
        if target_path.is_empty() {
            return Err(invalid("nothing can be placed before the root"));
        }
        if target_path.starts_with(&source_path) {
            return Err(invalid("target lies inside the moved subtree"));
        }

        let depth = source_path.len() - 1;
        let (source_parent, source_idx) = (&source_path[..depth], source_path[depth]);

        // Removing the source shifts later siblings (and their subtrees) left.
        if target_path.len() > depth
            && &target_path[..depth] == source_parent
            && target_path[depth] > source_idx
        {
            target_path[depth] -= 1;
        }

        let node = self
            .root
            .at_path_mut(source_parent)
            .map(|parent| parent.children.remove(source_idx))
            .ok_or_else(|| TreeError::NotFound(source.clone()))?;

        let (target_idx, target_parent) = match target_path.split_last() {
            Some((&idx, parent)) => (idx, parent),
            None => return Err(invalid("nothing can be placed before the root")),
        };
        let rejected = match self.root.at_path_mut(target_parent) {
            Some(parent) if target_idx <= parent.children.len() => {
                parent.children.insert(target_idx, node);
                None
            }
            _ => Some(node),
        };
        if let Some(node) = rejected {
            // Unreachable after validation; put the node back regardless.
            if let Some(parent) = self.root.at_path_mut(source_parent) {
                parent.children.insert(source_idx, node);
            }
            return Err(TreeError::NotFound(target.clone()));
        }

        debug!(source = %source, target = %target, "moved node");
        Ok(())
    }

    /// Append a new item labelled `label` under `parent`.
    pub fn add(&mut self, parent: &NodeId, label: impl Into<String>) -> Result<NodeId, TreeError> {
        self.add_node(parent, label, NodeKind::Item)
    }

    /// Append a new node of any kind under `parent`.
    pub fn add_node(
        &mut self,
        parent: &NodeId,
        label: impl Into<String>,
        kind: NodeKind,
    ) -> Result<NodeId, TreeError> {
        let path = self
            .root
            .path_to(parent)
            .ok_or_else(|| TreeError::NotFound(parent.clone()))?;
        let holder = self
            .root
            .at_path_mut(&path)
            .ok_or_else(|| TreeError::NotFound(parent.clone()))?;

        let id = NodeId::fresh();
        holder.children.push(ContainerNode {
            id: id.clone(),
            label: label.into(),
            kind,
            children: Vec::new(),
        });

        debug!(parent = %parent, id = %id, %kind, "added node");
        Ok(id)
    }

    /// Insert a deep copy of `id` right after it; returns the copy's id.
    pub fn duplicate(&mut self, id: &NodeId) -> Result<NodeId, TreeError> {
        let (parent_path, idx) = self.locate_parented(id)?;
        let parent = self
            .root
            .at_path_mut(&parent_path)
            .ok_or_else(|| TreeError::NotFound(id.clone()))?;

        let copy = parent.children[idx].duplicated();
        let copy_id = copy.id.clone();
        parent.children.insert(idx + 1, copy);

        debug!(source = %id, copy = %copy_id, "duplicated node");
        Ok(copy_id)
    }

    /// Remove `id` and its whole subtree; returns the removed subtree.
    pub fn delete(&mut self, id: &NodeId) -> Result<ContainerNode, TreeError> {
        let (parent_path, idx) = self.locate_parented(id)?;
        let parent = self
            .root
            .at_path_mut(&parent_path)
            .ok_or_else(|| TreeError::NotFound(id.clone()))?;

        let removed = parent.children.remove(idx);
        debug!(id = %id, removed = removed.subtree_len(), "deleted node");
        Ok(removed)
    }
}
