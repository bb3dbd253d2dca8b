//! Decorators: wrappers that keep the full contract and transform selected results.
//!
//! A wrapper owns one inner [`ComponentRef`]. Operations its [`Augment`] does not declare
//! pass through untouched; declared ones see the inner result and may rewrite it. Chains
//! evaluate inner to outer, so the outermost wrapper's transform runs last. Wrapping order
//! is therefore observable whenever two transforms do not commute (a prefix and a suffix,
//! two prefixes), while additive offsets commute.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use crate::domain::component::{Component, ComponentId, ComponentRef};
use crate::domain::contract::Contract;
use crate::domain::error::{ContractError, ContractResult};
use crate::domain::value::{Value, ValueKind};

/// Result-level transformation applied by a [`Decorator`].
pub trait Augment: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    /// Operations this augment transforms.
    fn operations(&self) -> &[String];

    /// Result kind the transform accepts and returns. `None` accepts any kind.
    fn kind(&self) -> Option<ValueKind> {
        None
    }

    fn augments(&self, operation: &str) -> bool {
        self.operations().iter().any(|op| op == operation)
    }

    fn apply(&self, operation: &str, value: Value) -> ContractResult<Value>;
}

fn number(operation: &str, value: &Value) -> ContractResult<f64> {
    value.as_number().ok_or_else(|| ContractError::KindMismatch {
        operation: operation.to_string(),
        expected: ValueKind::Number,
        found: value.kind(),
    })
}

fn text(operation: &str, value: Value) -> ContractResult<String> {
    match value {
        Value::Text(s) => Ok(s),
        other => Err(ContractError::KindMismatch {
            operation: operation.to_string(),
            expected: ValueKind::Text,
            found: other.kind(),
        }),
    }
}

/// Adds a constant to a numeric operation.
#[derive(Debug, Clone)]
pub struct Offset {
    operations: Vec<String>,
    amount: f64,
}

impl Offset {
    pub fn new(operation: impl Into<String>, amount: f64) -> Self {
        Self {
            operations: vec![operation.into()],
            amount,
        }
    }
}

impl Augment for Offset {
    fn name(&self) -> &str {
        "offset"
    }

    fn kind(&self) -> Option<ValueKind> {
        Some(ValueKind::Number)
    }

    fn operations(&self) -> &[String] {
        &self.operations
    }

    fn apply(&self, operation: &str, value: Value) -> ContractResult<Value> {
        Ok(Value::Number(number(operation, &value)? + self.amount))
    }
}

/// Multiplies a numeric operation by a constant.
#[derive(Debug, Clone)]
pub struct Scale {
    operations: Vec<String>,
    factor: f64,
}

impl Scale {
    pub fn new(operation: impl Into<String>, factor: f64) -> Self {
        Self {
            operations: vec![operation.into()],
            factor,
        }
    }
}

impl Augment for Scale {
    fn name(&self) -> &str {
        "scale"
    }

    fn kind(&self) -> Option<ValueKind> {
        Some(ValueKind::Number)
    }

    fn operations(&self) -> &[String] {
        &self.operations
    }

    fn apply(&self, operation: &str, value: Value) -> ContractResult<Value> {
        Ok(Value::Number(number(operation, &value)? * self.factor))
    }
}

/// Puts text in front of a text operation.
#[derive(Debug, Clone)]
pub struct Prefix {
    operations: Vec<String>,
    text: String,
}

impl Prefix {
    pub fn new(operation: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            operations: vec![operation.into()],
            text: text.into(),
        }
    }
}

impl Augment for Prefix {
    fn name(&self) -> &str {
        "prefix"
    }

    fn kind(&self) -> Option<ValueKind> {
        Some(ValueKind::Text)
    }

    fn operations(&self) -> &[String] {
        &self.operations
    }

    fn apply(&self, operation: &str, value: Value) -> ContractResult<Value> {
        Ok(Value::Text(format!("{}{}", self.text, text(operation, value)?)))
    }
}

/// Appends text to a text operation.
#[derive(Debug, Clone)]
pub struct Suffix {
    operations: Vec<String>,
    text: String,
}

impl Suffix {
    pub fn new(operation: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            operations: vec![operation.into()],
            text: text.into(),
        }
    }
}

impl Augment for Suffix {
    fn name(&self) -> &str {
        "suffix"
    }

    fn kind(&self) -> Option<ValueKind> {
        Some(ValueKind::Text)
    }

    fn operations(&self) -> &[String] {
        &self.operations
    }

    fn apply(&self, operation: &str, value: Value) -> ContractResult<Value> {
        Ok(Value::Text(format!("{}{}", text(operation, value)?, self.text)))
    }
}

type Transform = Arc<dyn Fn(&str, Value) -> ContractResult<Value> + Send + Sync>;

/// Augment backed by a closure.
#[derive(Clone)]
pub struct FnAugment {
    name: String,
    operations: Vec<String>,
    transform: Transform,
}

impl FnAugment {
    pub fn new<F>(
        name: impl Into<String>,
        operations: impl IntoIterator<Item = impl Into<String>>,
        transform: F,
    ) -> Self
    where
        F: Fn(&str, Value) -> ContractResult<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            operations: operations.into_iter().map(Into::into).collect(),
            transform: Arc::new(transform),
        }
    }
}

impl fmt::Debug for FnAugment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnAugment")
            .field("name", &self.name)
            .field("operations", &self.operations)
            .finish_non_exhaustive()
    }
}

impl Augment for FnAugment {
    fn name(&self) -> &str {
        &self.name
    }

    fn operations(&self) -> &[String] {
        &self.operations
    }

    fn apply(&self, operation: &str, value: Value) -> ContractResult<Value> {
        (self.transform)(operation, value)
    }
}

/// Wraps exactly one component and augments the operations its [`Augment`] declares.
#[derive(Debug)]
pub struct Decorator {
    id: ComponentId,
    inner: ComponentRef,
    augment: Box<dyn Augment>,
}

impl Decorator {
    /// Fails when the augment names an operation the inner contract lacks, or one whose
    /// result kind the augment cannot transform.
    pub fn wrap(inner: ComponentRef, augment: impl Augment + 'static) -> ContractResult<Self> {
        Self::wrap_boxed(inner, Box::new(augment))
    }

    pub fn wrap_boxed(inner: ComponentRef, augment: Box<dyn Augment>) -> ContractResult<Self> {
        let contract = inner.contract();
        for op in augment.operations() {
            let spec = contract.get(op)?;
            if let Some(kind) = augment.kind().filter(|&k| k != spec.kind()) {
                return Err(ContractError::KindMismatch {
                    operation: op.clone(),
                    expected: spec.kind(),
                    found: kind,
                });
            }
        }
        Ok(Self {
            id: ComponentId::new(),
            inner,
            augment,
        })
    }

    pub fn inner(&self) -> &ComponentRef {
        &self.inner
    }

    pub fn augment(&self) -> &dyn Augment {
        self.augment.as_ref()
    }
}

impl Component for Decorator {
    fn id(&self) -> ComponentId {
        self.id
    }

    fn label(&self) -> String {
        format!("{}({})", self.augment.name(), self.inner.label())
    }

    fn contract(&self) -> &Arc<Contract> {
        self.inner.contract()
    }

    fn evaluate(&self, operation: &str) -> ContractResult<Value> {
        let value = self.inner.evaluate(operation)?;
        if !self.augment.augments(operation) {
            return Ok(value);
        }
        let augmented = self.augment.apply(operation, value)?;
        self.contract().check(operation, &augmented)?;
        Ok(augmented)
    }

    fn wrapped(&self) -> Option<&ComponentRef> {
        Some(&self.inner)
    }
}

/// Pass-through wrapper that reports how long each evaluation of the inner component takes.
#[derive(Debug)]
pub struct Instrumented {
    id: ComponentId,
    inner: ComponentRef,
}

impl Instrumented {
    pub fn new(inner: ComponentRef) -> Self {
        Self {
            id: ComponentId::new(),
            inner,
        }
    }
}

impl Component for Instrumented {
    fn id(&self) -> ComponentId {
        self.id
    }

    fn label(&self) -> String {
        format!("timed({})", self.inner.label())
    }

    fn contract(&self) -> &Arc<Contract> {
        self.inner.contract()
    }

    fn evaluate(&self, operation: &str) -> ContractResult<Value> {
        let start = Instant::now();
        let result = self.inner.evaluate(operation);
        debug!(
            component = %self.inner.label(),
            operation,
            elapsed_us = start.elapsed().as_micros() as u64,
            ok = result.is_ok(),
            "evaluated"
        );
        result
    }

    fn wrapped(&self) -> Option<&ComponentRef> {
        Some(&self.inner)
    }
}

/// Fluent construction of decorator chains; each `wrap` becomes the new outermost layer.
pub struct DecoratorChain {
    current: ComponentRef,
}

impl DecoratorChain {
    pub fn on(inner: ComponentRef) -> Self {
        Self { current: inner }
    }

    pub fn wrap(self, augment: impl Augment + 'static) -> ContractResult<Self> {
        let decorator = Decorator::wrap(self.current, augment)?;
        Ok(Self {
            current: Arc::new(decorator),
        })
    }

    pub fn timed(self) -> Self {
        Self {
            current: Arc::new(Instrumented::new(self.current)),
        }
    }

    pub fn build(self) -> ComponentRef {
        self.current
    }
}
