//! The capability every composable node implements.

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::domain::contract::Contract;
use crate::domain::error::ContractResult;
use crate::domain::value::Value;

/// Opaque identity of a component, stable for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(Uuid);

impl ComponentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ComponentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Uniform operation contract shared by leaves, trees, decorators, adapters and bridges.
///
/// Callers only ever `evaluate` by operation name; they never need to know which
/// kind of component they hold.
pub trait Component: fmt::Debug + Send + Sync {
    fn id(&self) -> ComponentId;

    /// Human-readable label, used for outlines and log fields.
    fn label(&self) -> String;

    fn contract(&self) -> &Arc<Contract>;

    fn evaluate(&self, operation: &str) -> ContractResult<Value>;

    /// The component this one wraps, if it is a wrapper.
    fn wrapped(&self) -> Option<&ComponentRef> {
        None
    }
}

/// Shared handle to any component.
pub type ComponentRef = Arc<dyn Component>;

/// Number of wrappers between `component` and the core it decorates.
pub fn chain_depth(component: &dyn Component) -> usize {
    let mut depth = 0;
    let mut current = component.wrapped();
    while let Some(inner) = current {
        depth += 1;
        current = inner.wrapped();
    }
    depth
}

/// Identity comparison of two component handles.
pub fn same_component(a: &dyn Component, b: &dyn Component) -> bool {
    a.id() == b.id()
}
