//! Component contracts: the fixed operation set every node exposes.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::error::{ContractError, ContractResult};
use crate::domain::value::{Value, ValueKind};

/// How a composite folds its own contribution and its children's results.
///
/// The reducer fixes the operation's result kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Reducer {
    Sum,
    Product,
    Min,
    Max,
    /// Text concatenation in insertion order.
    Concat { separator: String },
    All,
    Any,
    /// Keeps every contribution as a list, in insertion order.
    Collect,
}

impl Reducer {
    pub fn kind(&self) -> ValueKind {
        match self {
            Reducer::Sum | Reducer::Product | Reducer::Min | Reducer::Max => ValueKind::Number,
            Reducer::Concat { .. } => ValueKind::Text,
            Reducer::All | Reducer::Any => ValueKind::Flag,
            Reducer::Collect => ValueKind::List,
        }
    }

    /// Result of reducing zero contributions.
    pub fn identity(&self) -> Value {
        match self {
            Reducer::Sum => Value::Number(0.0),
            Reducer::Product => Value::Number(1.0),
            Reducer::Min => Value::Number(f64::INFINITY),
            Reducer::Max => Value::Number(f64::NEG_INFINITY),
            Reducer::Concat { .. } => Value::Text(String::new()),
            Reducer::All => Value::Flag(true),
            Reducer::Any => Value::Flag(false),
            Reducer::Collect => Value::List(Vec::new()),
        }
    }

    /// Folds `parts` left to right. Every part must already carry the reducer's kind,
    /// except for `Collect` which accepts anything. Empty text parts are skipped by `Concat`.
    pub fn reduce(&self, operation: &str, parts: Vec<Value>) -> ContractResult<Value> {
        let expected = self.kind();
        let checked = !matches!(self, Reducer::Collect);
        if let Some(bad) = parts.iter().find(|p| checked && p.kind() != expected) {
            return Err(ContractError::KindMismatch {
                operation: operation.to_string(),
                expected,
                found: bad.kind(),
            });
        }

        let value = match self {
            Reducer::Sum => Value::Number(
                parts
                    .iter()
                    .filter_map(Value::as_number)
                    .fold(0.0, |acc, n| acc + n),
            ),
            Reducer::Product => Value::Number(
                parts
                    .iter()
                    .filter_map(Value::as_number)
                    .fold(1.0, |acc, n| acc * n),
            ),
            Reducer::Min => Value::Number(
                parts
                    .iter()
                    .filter_map(Value::as_number)
                    .fold(f64::INFINITY, f64::min),
            ),
            Reducer::Max => Value::Number(
                parts
                    .iter()
                    .filter_map(Value::as_number)
                    .fold(f64::NEG_INFINITY, f64::max),
            ),
            Reducer::Concat { separator } => Value::Text(
                parts
                    .iter()
                    .filter_map(Value::as_text)
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
                    .join(separator),
            ),
            Reducer::All => Value::Flag(parts.iter().filter_map(Value::as_flag).all(|b| b)),
            Reducer::Any => Value::Flag(parts.iter().filter_map(Value::as_flag).any(|b| b)),
            Reducer::Collect => Value::List(parts),
        };
        Ok(value)
    }
}

/// A named operation and its reducer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationSpec {
    pub name: String,
    pub reducer: Reducer,
}

impl OperationSpec {
    pub fn new(name: impl Into<String>, reducer: Reducer) -> Self {
        Self {
            name: name.into(),
            reducer,
        }
    }

    pub fn sum(name: impl Into<String>) -> Self {
        Self::new(name, Reducer::Sum)
    }

    pub fn concat(name: impl Into<String>, separator: impl Into<String>) -> Self {
        Self::new(
            name,
            Reducer::Concat {
                separator: separator.into(),
            },
        )
    }

    pub fn collect(name: impl Into<String>) -> Self {
        Self::new(name, Reducer::Collect)
    }

    pub fn kind(&self) -> ValueKind {
        self.reducer.kind()
    }
}

/// The operation set shared by every component of one composition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    name: String,
    operations: Vec<OperationSpec>,
}

impl Contract {
    /// Create a contract; operation names must be unique.
    pub fn new(
        name: impl Into<String>,
        operations: impl IntoIterator<Item = OperationSpec>,
    ) -> ContractResult<Arc<Self>> {
        let mut specs: Vec<OperationSpec> = Vec::new();
        for op in operations {
            if specs.iter().any(|s| s.name == op.name) {
                return Err(ContractError::DuplicateOperation(op.name));
            }
            specs.push(op);
        }
        Ok(Arc::new(Self {
            name: name.into(),
            operations: specs,
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn operations(&self) -> &[OperationSpec] {
        &self.operations
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.operations.iter().map(|op| op.name.as_str())
    }

    pub fn contains(&self, operation: &str) -> bool {
        self.operations.iter().any(|op| op.name == operation)
    }

    pub fn get(&self, operation: &str) -> ContractResult<&OperationSpec> {
        self.operations
            .iter()
            .find(|op| op.name == operation)
            .ok_or_else(|| self.unknown(operation))
    }

    /// Verify that `value` has the kind declared for `operation`.
    pub fn check(&self, operation: &str, value: &Value) -> ContractResult<()> {
        let expected = self.get(operation)?.kind();
        if value.kind() != expected {
            return Err(ContractError::KindMismatch {
                operation: operation.to_string(),
                expected,
                found: value.kind(),
            });
        }
        Ok(())
    }

    /// Fail unless `other` declares exactly the same operations.
    pub fn ensure_same(&self, other: &Contract) -> ContractResult<()> {
        if self != other {
            return Err(ContractError::ContractMismatch {
                expected: self.name.clone(),
                found: other.name.clone(),
            });
        }
        Ok(())
    }

    pub(crate) fn unknown(&self, operation: &str) -> ContractError {
        ContractError::UnknownOperation {
            contract: self.name.clone(),
            operation: operation.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_duplicate_operation_when_creating_contract_then_fails() {
        let result = Contract::new("shape", [OperationSpec::sum("area"), OperationSpec::sum("area")]);
        assert!(matches!(result, Err(ContractError::DuplicateOperation(name)) if name == "area"));
    }

    #[test]
    fn given_concat_reducer_when_reducing_then_skips_empty_parts_and_keeps_order() {
        let reducer = Reducer::Concat {
            separator: "/".into(),
        };
        let value = reducer
            .reduce("path", vec!["a".into(), "".into(), "b".into()])
            .unwrap();
        assert_eq!(value, Value::from("a/b"));
    }

    #[test]
    fn given_mixed_kinds_when_summing_then_reports_kind_mismatch() {
        let result = Reducer::Sum.reduce("price", vec![1.0.into(), "x".into()]);
        assert!(matches!(
            result,
            Err(ContractError::KindMismatch {
                expected: ValueKind::Number,
                found: ValueKind::Text,
                ..
            })
        ));
    }

    #[test]
    fn given_no_parts_when_reducing_then_returns_identity() {
        for reducer in [Reducer::Sum, Reducer::Product, Reducer::Max, Reducer::All, Reducer::Collect] {
            assert_eq!(reducer.reduce("op", vec![]).unwrap(), reducer.identity());
        }
    }

    #[test]
    fn given_wrong_kind_when_checking_then_fails() {
        let contract = Contract::new("c", [OperationSpec::sum("value")]).unwrap();
        assert!(contract.check("value", &Value::from(2.0)).is_ok());
        assert!(contract.check("value", &Value::from("2")).is_err());
        assert!(matches!(
            contract.check("missing", &Value::from(2.0)),
            Err(ContractError::UnknownOperation { .. })
        ));
    }
}
