//! Tree builder for assembling composites from named nodes and parent links.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::instrument;

use crate::domain::arena::{ComponentTree, NodeId};
use crate::domain::component::ComponentRef;
use crate::domain::contract::Contract;
use crate::domain::error::{ContractError, ContractResult};
use crate::domain::leaf::Payload;

/// Result type for tree operations.
pub type TreeResult<T> = ContractResult<T>;

/// A node declared to the builder.
#[derive(Debug)]
pub enum NodeSpec {
    Group(Payload),
    Component(ComponentRef),
}

/// Constructs composite trees from declared nodes and `parent -> child` links.
///
/// Every declared node that is nobody's child becomes the root of one tree, so a single
/// build can produce a forest. Children keep the order in which they were linked.
pub struct TreeBuilder {
    contract: Arc<Contract>,
    declared: Vec<String>,
    nodes: HashMap<String, NodeSpec>,
    relationship_cache: HashMap<String, Vec<String>>,
    max_depth: Option<usize>,
}

impl TreeBuilder {
    pub fn new(contract: Arc<Contract>) -> Self {
        Self {
            contract,
            declared: Vec::new(),
            nodes: HashMap::new(),
            relationship_cache: HashMap::new(),
            max_depth: None,
        }
    }

    pub fn max_depth(mut self, limit: Option<usize>) -> Self {
        self.max_depth = limit;
        self
    }

    /// Declare a group without an own contribution.
    pub fn group(self, name: &str) -> TreeResult<Self> {
        self.node(name, NodeSpec::Group(Payload::empty()))
    }

    pub fn group_with(self, name: &str, own: Payload) -> TreeResult<Self> {
        self.node(name, NodeSpec::Group(own))
    }

    pub fn component(self, name: &str, component: ComponentRef) -> TreeResult<Self> {
        self.node(name, NodeSpec::Component(component))
    }

    pub fn node(mut self, name: &str, spec: NodeSpec) -> TreeResult<Self> {
        if self.nodes.contains_key(name) {
            return Err(ContractError::DuplicateNode(name.to_string()));
        }
        self.declared.push(name.to_string());
        self.nodes.insert(name.to_string(), spec);
        Ok(self)
    }

    /// Record that `child` belongs under `parent`. Both must be declared by build time.
    pub fn link(mut self, parent: &str, child: &str) -> Self {
        self.relationship_cache
            .entry(parent.to_string())
            .or_default()
            .push(child.to_string());
        self
    }

    /// Build one tree per root node.
    #[instrument(level = "debug", skip(self), fields(contract = %self.contract.name()))]
    pub fn build(mut self) -> TreeResult<Vec<ComponentTree>> {
        self.check_links()?;

        let root_names = self.find_root_nodes();

        let mut trees = Vec::new();
        for root in root_names {
            trees.push(self.build_tree(&root)?);
        }

        // Every node has at most one parent, so anything no root reached hangs on a cycle
        if let Some(name) = self.declared.iter().find(|n| self.nodes.contains_key(*n)) {
            return Err(ContractError::CyclicLinks(name.clone()));
        }

        Ok(trees)
    }

    fn check_links(&self) -> TreeResult<()> {
        let mut parent_of: HashMap<&str, &str> = HashMap::new();
        for (parent, children) in &self.relationship_cache {
            match self.nodes.get(parent) {
                None => return Err(ContractError::UnknownNode(parent.clone())),
                Some(NodeSpec::Component(_)) => {
                    return Err(ContractError::NotAGroup(parent.clone()))
                }
                Some(NodeSpec::Group(_)) => {}
            }
            for child in children {
                if !self.nodes.contains_key(child) {
                    return Err(ContractError::UnknownNode(child.clone()));
                }
                if parent_of.insert(child, parent).is_some() {
                    return Err(ContractError::MultipleParents(child.clone()));
                }
            }
        }
        Ok(())
    }

    fn find_root_nodes(&self) -> Vec<String> {
        let children: HashSet<&String> = self.relationship_cache.values().flatten().collect();
        self.declared
            .iter()
            .filter(|name| !children.contains(name))
            .cloned()
            .collect()
    }

    fn build_tree(&mut self, root_name: &str) -> TreeResult<ComponentTree> {
        let mut tree = match self.nodes.remove(root_name) {
            Some(NodeSpec::Group(own)) => {
                own.ensure_within(&self.contract)?;
                ComponentTree::with_root_payload(root_name, self.contract.clone(), own)
            }
            Some(NodeSpec::Component(component)) => {
                let mut tree = ComponentTree::new(root_name, self.contract.clone());
                let root = tree.root();
                tree.push_named_component(root, root_name, component)?;
                tree
            }
            None => return Err(ContractError::UnknownNode(root_name.to_string())),
        }
        .with_max_depth(self.max_depth);

        let mut visited_paths: HashSet<String> = HashSet::new();
        visited_paths.insert(root_name.to_string());
        let mut stack: Vec<(String, NodeId)> = vec![(root_name.to_string(), tree.root())];

        while let Some((current, current_idx)) = stack.pop() {
            let Some(children) = self.relationship_cache.get(&current).cloned() else {
                continue;
            };
            for child in children {
                // Cycle detection
                if !visited_paths.insert(child.clone()) {
                    return Err(ContractError::CyclicLinks(child));
                }
                let spec = self
                    .nodes
                    .remove(&child)
                    .ok_or_else(|| ContractError::UnknownNode(child.clone()))?;
                let child_idx = match spec {
                    NodeSpec::Group(own) => tree.push_group(current_idx, &child, own)?,
                    NodeSpec::Component(component) => {
                        tree.push_named_component(current_idx, &child, component)?
                    }
                };
                stack.push((child, child_idx));
            }
        }

        Ok(tree)
    }
}
