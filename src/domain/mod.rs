//! Domain layer: the component contract and the structural primitives
//!
//! This layer is independent of external concerns (no config loading, no subscriber setup).

pub mod adapter;
pub mod arena;
pub mod bridge;
pub mod builder;
pub mod component;
pub mod contract;
pub mod decorator;
pub mod error;
pub mod leaf;
pub mod tree_traits;
pub mod value;

pub use adapter::{Adapter, AdapterCache, CacheStats, TranslationTable};
pub use arena::{ComponentTree, NodeBody, NodeId, TreeNode};
pub use bridge::{invoke_primitive, Backend, Bridge, Control, PrimitiveTable};
pub use builder::{NodeSpec, TreeBuilder};
pub use component::{chain_depth, same_component, Component, ComponentId, ComponentRef};
pub use contract::{Contract, OperationSpec, Reducer};
pub use decorator::{
    Augment, Decorator, DecoratorChain, FnAugment, Instrumented, Offset, Prefix, Scale, Suffix,
};
pub use error::{BoxError, ContractError, ContractResult};
pub use leaf::{Leaf, Payload};
pub use tree_traits::TreeNodeConvert;
pub use value::{Value, ValueKind};
