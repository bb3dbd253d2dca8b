//! Registry-level errors

use thiserror::Error;

/// Errors raised while resolving registry entries.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("registry entry '{key}' holds a different type than {expected}")]
    TypeMismatch { key: String, expected: &'static str },

    #[error("factory for '{key}' failed")]
    Factory {
        key: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("factory for '{key}' panicked")]
    FactoryPanicked { key: String },
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;
