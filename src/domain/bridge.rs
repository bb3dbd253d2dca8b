//! Bridges: a control axis (policy) combined with a backend axis (primitives).
//!
//! Controls implement every contract operation in terms of a handful of named
//! primitives; backends only provide those primitives. Neither side names the other's
//! concrete types, so adding a control or a backend never touches the other axis.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, instrument};

use crate::domain::component::{Component, ComponentId};
use crate::domain::contract::{Contract, OperationSpec};
use crate::domain::error::{ContractError, ContractResult};
use crate::domain::value::Value;

/// Implementation side: platform-specific primitives.
pub trait Backend: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    fn supports(&self, primitive: &str) -> bool;

    fn invoke(&self, primitive: &str, args: &[Value]) -> ContractResult<Value>;
}

/// Control side: policy expressed through backend primitives.
pub trait Control: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Primitives this control calls; checked against every backend it is bound to.
    fn required_primitives(&self) -> &[&'static str];

    fn allows_swap(&self) -> bool {
        true
    }

    fn evaluate(&self, operation: &OperationSpec, backend: &dyn Backend) -> ContractResult<Value>;
}

/// Call `primitive` on `backend`, failing with `UnsupportedOperation` when it is absent.
pub fn invoke_primitive(
    backend: &dyn Backend,
    primitive: &str,
    args: &[Value],
) -> ContractResult<Value> {
    if !backend.supports(primitive) {
        return Err(unsupported(backend, primitive));
    }
    backend.invoke(primitive, args)
}

fn unsupported(backend: &dyn Backend, primitive: &str) -> ContractError {
    ContractError::UnsupportedOperation {
        backend: backend.name().to_string(),
        primitive: primitive.to_string(),
    }
}

fn ensure_primitives(control: &dyn Control, backend: &dyn Backend) -> ContractResult<()> {
    match control
        .required_primitives()
        .iter()
        .find(|p| !backend.supports(p))
    {
        Some(missing) => Err(unsupported(backend, missing)),
        None => Ok(()),
    }
}

/// One control bound to one replaceable backend.
#[derive(Debug)]
pub struct Bridge {
    id: ComponentId,
    name: String,
    contract: Arc<Contract>,
    control: Box<dyn Control>,
    backend: RwLock<Arc<dyn Backend>>,
}

impl Bridge {
    pub fn new(
        name: impl Into<String>,
        contract: Arc<Contract>,
        control: impl Control + 'static,
        backend: Arc<dyn Backend>,
    ) -> ContractResult<Self> {
        ensure_primitives(&control, backend.as_ref())?;
        Ok(Self {
            id: ComponentId::new(),
            name: name.into(),
            contract,
            control: Box::new(control),
            backend: RwLock::new(backend),
        })
    }

    pub fn control(&self) -> &dyn Control {
        self.control.as_ref()
    }

    pub fn backend(&self) -> Arc<dyn Backend> {
        self.backend.read().clone()
    }

    /// Rebind to `backend`, keeping the control as is. Returns the previous backend.
    #[instrument(level = "debug", skip(self, backend), fields(bridge = %self.name, backend = %backend.name()))]
    pub fn swap_backend(&self, backend: Arc<dyn Backend>) -> ContractResult<Arc<dyn Backend>> {
        if !self.control.allows_swap() {
            return Err(ContractError::SwapNotPermitted {
                control: self.control.name().to_string(),
            });
        }
        ensure_primitives(self.control.as_ref(), backend.as_ref())?;
        let previous = std::mem::replace(&mut *self.backend.write(), backend);
        debug!(previous = %previous.name(), "backend swapped");
        Ok(previous)
    }
}

impl Component for Bridge {
    fn id(&self) -> ComponentId {
        self.id
    }

    fn label(&self) -> String {
        format!("{}[{}+{}]", self.name, self.control.name(), self.backend().name())
    }

    fn contract(&self) -> &Arc<Contract> {
        &self.contract
    }

    fn evaluate(&self, operation: &str) -> ContractResult<Value> {
        let spec = self.contract.get(operation)?;
        let backend = self.backend();
        let value = self.control.evaluate(spec, backend.as_ref())?;
        self.contract.check(operation, &value)?;
        Ok(value)
    }
}

type Primitive = Arc<dyn Fn(&[Value]) -> ContractResult<Value> + Send + Sync>;

/// Backend assembled from closures, one per primitive.
#[derive(Clone)]
pub struct PrimitiveTable {
    name: String,
    primitives: BTreeMap<String, Primitive>,
}

impl PrimitiveTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primitives: BTreeMap::new(),
        }
    }

    pub fn primitive<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&[Value]) -> ContractResult<Value> + Send + Sync + 'static,
    {
        self.primitives.insert(name.to_string(), Arc::new(f));
        self
    }
}

impl fmt::Debug for PrimitiveTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrimitiveTable")
            .field("name", &self.name)
            .field("primitives", &self.primitives.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Backend for PrimitiveTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, primitive: &str) -> bool {
        self.primitives.contains_key(primitive)
    }

    fn invoke(&self, primitive: &str, args: &[Value]) -> ContractResult<Value> {
        match self.primitives.get(primitive) {
            Some(f) => f(args),
            None => Err(unsupported(self, primitive)),
        }
    }
}
