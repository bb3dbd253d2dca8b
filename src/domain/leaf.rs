//! Terminal components and the validated payloads they carry.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::domain::component::{Component, ComponentId};
use crate::domain::contract::Contract;
use crate::domain::error::ContractResult;
use crate::domain::value::Value;

/// Intrinsic values per operation, checked against a contract.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    values: BTreeMap<String, Value>,
}

impl Payload {
    /// An empty payload contributes nothing to any operation.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a payload; every entry must name a contract operation and carry its kind.
    pub fn new<S, V>(
        contract: &Contract,
        entries: impl IntoIterator<Item = (S, V)>,
    ) -> ContractResult<Self>
    where
        S: Into<String>,
        V: Into<Value>,
    {
        let mut values = BTreeMap::new();
        for (name, value) in entries {
            let name = name.into();
            let value = value.into();
            contract.check(&name, &value)?;
            values.insert(name, value);
        }
        Ok(Self { values })
    }

    pub fn get(&self, operation: &str) -> Option<&Value> {
        self.values.get(operation)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub(crate) fn ensure_within(&self, contract: &Contract) -> ContractResult<()> {
        for (name, value) in &self.values {
            contract.check(name, value)?;
        }
        Ok(())
    }
}

/// A component with no children: its value per operation is its payload entry,
/// or the reducer identity when the payload has none.
#[derive(Debug)]
pub struct Leaf {
    id: ComponentId,
    name: String,
    contract: Arc<Contract>,
    payload: Payload,
}

impl Leaf {
    pub fn new<S, V>(
        name: impl Into<String>,
        contract: Arc<Contract>,
        entries: impl IntoIterator<Item = (S, V)>,
    ) -> ContractResult<Self>
    where
        S: Into<String>,
        V: Into<Value>,
    {
        let payload = Payload::new(&contract, entries)?;
        Ok(Self {
            id: ComponentId::new(),
            name: name.into(),
            contract,
            payload,
        })
    }

    /// Wrap an already validated payload.
    pub fn with_payload(
        name: impl Into<String>,
        contract: Arc<Contract>,
        payload: Payload,
    ) -> ContractResult<Self> {
        payload.ensure_within(&contract)?;
        Ok(Self {
            id: ComponentId::new(),
            name: name.into(),
            contract,
            payload,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }
}

impl Component for Leaf {
    fn id(&self) -> ComponentId {
        self.id
    }

    fn label(&self) -> String {
        self.name.clone()
    }

    fn contract(&self) -> &Arc<Contract> {
        &self.contract
    }

    fn evaluate(&self, operation: &str) -> ContractResult<Value> {
        let spec = self.contract.get(operation)?;
        Ok(self
            .payload
            .get(operation)
            .cloned()
            .unwrap_or_else(|| spec.reducer.identity()))
    }
}
