//! Arena-backed composite trees.

use std::fmt;
use std::sync::Arc;

use generational_arena::{Arena, Index};
use tracing::{debug, instrument};

use crate::domain::component::{Component, ComponentId, ComponentRef};
use crate::domain::contract::{Contract, OperationSpec};
use crate::domain::error::{ContractError, ContractResult};
use crate::domain::leaf::Payload;
use crate::domain::value::Value;

/// Handle to a node inside one [`ComponentTree`]. Stale handles are detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(Index);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (slot, generation) = self.0.into_raw_parts();
        write!(f, "#{}v{}", slot, generation)
    }
}

/// What a tree node contributes.
#[derive(Debug)]
pub enum NodeBody {
    /// Container with an optional own contribution.
    Group { own: Payload },
    /// Any other component: a leaf, a decorator chain, an adapter, a bridge, a nested tree.
    Item(ComponentRef),
}

/// Tree node in the arena-based hierarchy structure.
#[derive(Debug)]
pub struct TreeNode {
    pub name: String,
    pub body: NodeBody,
    /// Index of parent node in the arena, None for the root and detached nodes
    pub parent: Option<NodeId>,
    /// Child nodes in insertion order
    pub children: Vec<NodeId>,
}

impl TreeNode {
    pub fn is_group(&self) -> bool {
        matches!(self.body, NodeBody::Group { .. })
    }
}

/// Composite component backed by a generational arena.
///
/// The root is always a group. Further nodes are created detached and attached with
/// [`ComponentTree::add_child`], which enforces the tree shape: a node has at most one
/// parent and never becomes its own ancestor. Evaluation folds each group's own payload
/// and its children, in insertion order, with the operation's reducer.
#[derive(Debug)]
pub struct ComponentTree {
    id: ComponentId,
    contract: Arc<Contract>,
    arena: Arena<TreeNode>,
    root: NodeId,
    max_depth: Option<usize>,
}

impl ComponentTree {
    pub fn new(name: impl Into<String>, contract: Arc<Contract>) -> Self {
        Self::with_root_payload(name, contract, Payload::empty())
    }

    /// Tree whose root group contributes `own` to every evaluation.
    pub fn with_root_payload(
        name: impl Into<String>,
        contract: Arc<Contract>,
        own: Payload,
    ) -> Self {
        let mut arena = Arena::new();
        let root = NodeId(arena.insert(TreeNode {
            name: name.into(),
            body: NodeBody::Group { own },
            parent: None,
            children: Vec::new(),
        }));
        Self {
            id: ComponentId::new(),
            contract,
            arena,
            root,
            max_depth: None,
        }
    }

    /// Limit the number of levels below and including the root.
    pub fn with_max_depth(mut self, limit: Option<usize>) -> Self {
        self.max_depth = limit;
        self
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Live nodes in the arena, including the root and detached nodes.
    pub fn node_count(&self) -> usize {
        self.arena.len()
    }

    /// Whether anything is attached below the root.
    pub fn has_children(&self) -> bool {
        self.node(self.root)
            .map(|n| !n.children.is_empty())
            .unwrap_or(false)
    }

    /// Create a detached group node.
    #[instrument(level = "trace", skip(self, own))]
    pub fn insert_group(&mut self, name: &str, own: Payload) -> ContractResult<NodeId> {
        own.ensure_within(&self.contract)?;
        Ok(self.insert_node(name.to_string(), NodeBody::Group { own }))
    }

    /// Create a detached node holding `component`, which must share the tree's contract.
    #[instrument(level = "trace", skip(self, component), fields(label = %component.label()))]
    pub fn insert_component(&mut self, component: ComponentRef) -> ContractResult<NodeId> {
        self.contract.ensure_same(component.contract())?;
        let name = component.label();
        Ok(self.insert_node(name, NodeBody::Item(component)))
    }

    /// Create `component` and attach it to `parent` in one step.
    pub fn push_component(
        &mut self,
        parent: NodeId,
        component: ComponentRef,
    ) -> ContractResult<NodeId> {
        let name = component.label();
        self.push_named_component(parent, &name, component)
    }

    /// Like [`ComponentTree::push_component`], but the node is named `name`
    /// instead of the component's label.
    pub fn push_named_component(
        &mut self,
        parent: NodeId,
        name: &str,
        component: ComponentRef,
    ) -> ContractResult<NodeId> {
        self.contract.ensure_same(component.contract())?;
        let idx = self.insert_node(name.to_string(), NodeBody::Item(component));
        if let Err(e) = self.add_child(parent, idx) {
            self.arena.remove(idx.0);
            return Err(e);
        }
        Ok(idx)
    }

    /// Create a group and attach it to `parent` in one step.
    pub fn push_group(&mut self, parent: NodeId, name: &str, own: Payload) -> ContractResult<NodeId> {
        let idx = self.insert_group(name, own)?;
        if let Err(e) = self.add_child(parent, idx) {
            self.arena.remove(idx.0);
            return Err(e);
        }
        Ok(idx)
    }

    fn insert_node(&mut self, name: String, body: NodeBody) -> NodeId {
        NodeId(self.arena.insert(TreeNode {
            name,
            body,
            parent: None,
            children: Vec::new(),
        }))
    }

    pub fn get_node(&self, idx: NodeId) -> Option<&TreeNode> {
        self.arena.get(idx.0)
    }

    fn node(&self, idx: NodeId) -> ContractResult<&TreeNode> {
        self.arena.get(idx.0).ok_or(ContractError::NodeNotFound(idx))
    }

    fn node_mut(&mut self, idx: NodeId) -> ContractResult<&mut TreeNode> {
        self.arena
            .get_mut(idx.0)
            .ok_or(ContractError::NodeNotFound(idx))
    }

    /// Attach a detached `child` (and its subtree) as the last child of `parent`.
    ///
    /// The tree is left unchanged on error.
    #[instrument(level = "debug", skip(self))]
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> ContractResult<()> {
        let parent_node = self.node(parent)?;
        let child_node = self.node(child)?;

        if !parent_node.is_group() {
            return Err(ContractError::NotComposite(parent));
        }
        // only a node with children can sit above `parent`
        if child == parent
            || (!child_node.children.is_empty() && self.ancestors(parent).any(|a| a == child))
        {
            return Err(ContractError::CycleDetected { parent, child });
        }
        if child_node.parent.is_some() || child == self.root {
            return Err(ContractError::AlreadyAttached(child));
        }
        if let Some(limit) = self.max_depth {
            let depth = self.ancestors(parent).count() + 1 + self.calculate_depth(child);
            if depth > limit {
                return Err(ContractError::DepthExceeded { limit });
            }
        }

        self.node_mut(child)?.parent = Some(parent);
        self.node_mut(parent)?.children.push(child);
        debug!(%parent, %child, "attached");
        Ok(())
    }

    /// Detach `child` from `parent`. The child keeps its own subtree and can be re-attached
    /// or pruned.
    #[instrument(level = "debug", skip(self))]
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> ContractResult<NodeId> {
        let parent_node = self.node_mut(parent)?;
        let pos = parent_node
            .children
            .iter()
            .position(|&c| c == child)
            .ok_or(ContractError::ChildNotFound { parent, child })?;
        parent_node.children.remove(pos);
        self.node_mut(child)?.parent = None;
        debug!(%parent, %child, "detached");
        Ok(child)
    }

    /// Destroy a detached node together with its subtree.
    #[instrument(level = "debug", skip(self))]
    pub fn prune(&mut self, idx: NodeId) -> ContractResult<usize> {
        let node = self.node(idx)?;
        if node.parent.is_some() || idx == self.root {
            return Err(ContractError::AlreadyAttached(idx));
        }
        let doomed: Vec<NodeId> = self.iter_postorder_from(idx).map(|(id, _)| id).collect();
        for id in &doomed {
            self.arena.remove(id.0);
        }
        debug!(%idx, removed = doomed.len(), "pruned");
        Ok(doomed.len())
    }

    /// Parent chain of `idx`, nearest first.
    pub fn ancestors(&self, idx: NodeId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: self.get_node(idx).and_then(|n| n.parent),
        }
    }

    /// First node (pre-order from the root) with the given name.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.iter()
            .find(|(_, node, _)| node.name == name)
            .map(|(id, _, _)| id)
    }

    /// Evaluate `operation` on the subtree rooted at `idx`.
    pub fn evaluate_at(&self, idx: NodeId, operation: &str) -> ContractResult<Value> {
        let spec = self.contract.get(operation)?;
        self.evaluate_node(idx, spec)
    }

    fn evaluate_node(&self, idx: NodeId, spec: &OperationSpec) -> ContractResult<Value> {
        self.fold(idx, |_, node, children| Self::combine(node, spec, children))
    }

    /// Value of one node given the values of its children, left to right.
    pub(crate) fn combine(
        node: &TreeNode,
        spec: &OperationSpec,
        children: Vec<Value>,
    ) -> ContractResult<Value> {
        match &node.body {
            NodeBody::Item(component) => component.evaluate(&spec.name),
            NodeBody::Group { own } => {
                let mut parts = Vec::with_capacity(children.len() + 1);
                parts.extend(own.get(&spec.name).cloned());
                parts.extend(children);
                spec.reducer.reduce(&spec.name, parts)
            }
        }
    }

    /// Bottom-up fold over the subtree at `from`.
    ///
    /// `f` sees every node after all of its children, together with their results in
    /// insertion order. Runs on an explicit stack, so depth is limited by memory only.
    pub fn fold<T, F>(&self, from: NodeId, mut f: F) -> ContractResult<T>
    where
        F: FnMut(NodeId, &TreeNode, Vec<T>) -> ContractResult<T>,
    {
        self.node(from)?;
        // one entry per finished subtree; a parent takes the last `children.len()`
        let mut done: Vec<T> = Vec::new();
        for (id, node) in self.iter_postorder_from(from) {
            let children = done.split_off(done.len().saturating_sub(node.children.len()));
            done.push(f(id, node, children)?);
        }
        done.pop().ok_or(ContractError::NodeNotFound(from))
    }

    /// Pre-order, depth-first visit of the subtree at `from`; depth is relative to `from`.
    pub fn walk<F>(&self, from: NodeId, mut visitor: F) -> ContractResult<()>
    where
        F: FnMut(NodeId, &TreeNode, usize),
    {
        self.node(from)?;
        for (id, node, depth) in self.iter_from(from) {
            visitor(id, node, depth);
        }
        Ok(())
    }

    pub fn iter(&self) -> TreeIterator<'_> {
        self.iter_from(self.root)
    }

    fn iter_from(&self, from: NodeId) -> TreeIterator<'_> {
        TreeIterator {
            tree: self,
            stack: vec![(from, 0)],
        }
    }

    pub fn iter_postorder(&self) -> PostOrderIterator<'_> {
        self.iter_postorder_from(self.root)
    }

    fn iter_postorder_from(&self, from: NodeId) -> PostOrderIterator<'_> {
        PostOrderIterator {
            tree: self,
            stack: vec![(from, false)],
        }
    }

    /// Number of levels, counting the root.
    pub fn depth(&self) -> usize {
        self.calculate_depth(self.root)
    }

    fn calculate_depth(&self, idx: NodeId) -> usize {
        self.iter_from(idx)
            .map(|(_, _, depth)| depth + 1)
            .max()
            .unwrap_or(0)
    }

    /// Names of the attached nodes without children, left to right.
    pub fn leaf_nodes(&self) -> Vec<String> {
        self.iter()
            .filter(|(_, node, _)| node.children.is_empty())
            .map(|(_, node, _)| node.name.clone())
            .collect()
    }
}

impl Component for ComponentTree {
    fn id(&self) -> ComponentId {
        self.id
    }

    fn label(&self) -> String {
        self.get_node(self.root)
            .map(|n| n.name.clone())
            .unwrap_or_default()
    }

    fn contract(&self) -> &Arc<Contract> {
        &self.contract
    }

    fn evaluate(&self, operation: &str) -> ContractResult<Value> {
        self.evaluate_at(self.root, operation)
    }
}

pub struct Ancestors<'a> {
    tree: &'a ComponentTree,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.tree.get_node(current).and_then(|n| n.parent);
        Some(current)
    }
}

/// Pre-order iterator yielding each node with its depth.
pub struct TreeIterator<'a> {
    tree: &'a ComponentTree,
    stack: Vec<(NodeId, usize)>,
}

impl<'a> Iterator for TreeIterator<'a> {
    type Item = (NodeId, &'a TreeNode, usize);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((current, depth)) = self.stack.pop() {
            if let Some(node) = self.tree.get_node(current) {
                // Push children in reverse order for left-to-right traversal
                for &child in node.children.iter().rev() {
                    self.stack.push((child, depth + 1));
                }
                return Some((current, node, depth));
            }
        }
        None
    }
}

pub struct PostOrderIterator<'a> {
    tree: &'a ComponentTree,
    stack: Vec<(NodeId, bool)>,
}

impl<'a> Iterator for PostOrderIterator<'a> {
    type Item = (NodeId, &'a TreeNode);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((current, visited)) = self.stack.pop() {
            if let Some(node) = self.tree.get_node(current) {
                if !visited {
                    self.stack.push((current, true));
                    for &child in node.children.iter().rev() {
                        self.stack.push((child, false));
                    }
                } else {
                    return Some((current, node));
                }
            }
        }
        None
    }
}
