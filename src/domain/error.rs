//! Domain-level errors (no external dependencies)

use itertools::Itertools;
use thiserror::Error;

use crate::domain::arena::NodeId;
use crate::domain::value::ValueKind;

/// Boxed error raised by a foreign object behind an adapter.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Contract errors represent construction and composition mistakes.
/// They are local and synchronous; none of them is retryable.
#[derive(Error, Debug)]
pub enum ContractError {
    #[error("cycle detected: {child} is {parent} or one of its ancestors")]
    CycleDetected { parent: NodeId, child: NodeId },

    #[error("node already attached: {0}")]
    AlreadyAttached(NodeId),

    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("{child} is not a child of {parent}")]
    ChildNotFound { parent: NodeId, child: NodeId },

    #[error("unknown node: {0}")]
    UnknownNode(String),

    #[error("duplicate node name: {0}")]
    DuplicateNode(String),

    #[error("multiple parents declared for: {0}")]
    MultipleParents(String),

    #[error("cycle detected in links through: {0}")]
    CyclicLinks(String),

    #[error("only groups can hold children: {0}")]
    NotAGroup(String),

    #[error("node cannot hold children: {0}")]
    NotComposite(NodeId),

    #[error("tree depth would exceed limit of {limit}")]
    DepthExceeded { limit: usize },

    #[error("contract '{contract}' has no translation for: {}", .missing.iter().join(", "))]
    IncompleteContract {
        contract: String,
        missing: Vec<String>,
    },

    #[error("contract '{contract}' has no operation '{operation}'")]
    UnknownOperation { contract: String, operation: String },

    #[error("operation declared twice: {0}")]
    DuplicateOperation(String),

    #[error("operation '{operation}' expects {expected}, got {found}")]
    KindMismatch {
        operation: String,
        expected: ValueKind,
        found: ValueKind,
    },

    #[error("contract mismatch: expected '{expected}', got '{found}'")]
    ContractMismatch { expected: String, found: String },

    #[error("backend '{backend}' does not provide primitive '{primitive}'")]
    UnsupportedOperation { backend: String, primitive: String },

    #[error("control '{control}' does not permit backend swaps")]
    SwapNotPermitted { control: String },

    #[error("external call failed for '{operation}'")]
    External {
        operation: String,
        #[source]
        source: BoxError,
    },
}

/// Result type for component operations.
pub type ContractResult<T> = Result<T, ContractError>;
