use termtree::Tree;
use tracing::instrument;

use crate::domain::arena::ComponentTree;
use crate::domain::component::Component;
use crate::domain::error::ContractResult;
use crate::domain::value::Value;

/// Conversion of a composite into a printable `termtree`.
///
/// Building is iterative, but `termtree` renders and drops recursively, so only print
/// trees of moderate depth.
pub trait TreeNodeConvert {
    /// Tree of node names.
    fn to_tree_string(&self) -> Tree<String>;

    /// Tree of `name: value` lines for one operation.
    fn to_value_tree(&self, operation: &str) -> ContractResult<Tree<String>>;
}

impl TreeNodeConvert for ComponentTree {
    #[instrument(level = "debug", skip(self))]
    fn to_tree_string(&self) -> Tree<String> {
        self.fold(self.root(), |_, node, leaves: Vec<Tree<String>>| {
            Ok(Tree::new(node.name.clone()).with_leaves(leaves))
        })
        .unwrap_or_else(|_| Tree::new(String::new()))
    }

    #[instrument(level = "debug", skip(self))]
    fn to_value_tree(&self, operation: &str) -> ContractResult<Tree<String>> {
        let spec = self.contract().get(operation)?;
        let (_, tree) = self.fold(self.root(), |_, node, children: Vec<(Value, Tree<String>)>| {
            let (values, leaves): (Vec<_>, Vec<_>) = children.into_iter().unzip();
            let value = ComponentTree::combine(node, spec, values)?;
            let line = format!("{}: {}", node.name, value);
            Ok((value, Tree::new(line).with_leaves(leaves)))
        })?;
        Ok(tree)
    }
}
