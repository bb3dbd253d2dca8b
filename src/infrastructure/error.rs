//! Toolkit-level errors (wraps domain and registry errors)

use thiserror::Error;

use crate::domain::error::ContractError;
use crate::registry::error::RegistryError;

/// Toolkit errors wrap the lower layers and add configuration and I/O concerns.
#[derive(Error, Debug)]
pub enum ToolkitError {
    #[error("{0}")]
    Contract(#[from] ContractError),

    #[error("{0}")]
    Registry(#[from] RegistryError),

    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("I/O error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl ToolkitError {
    /// Create an I/O error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// Result type for toolkit-level operations.
pub type ToolkitResult<T> = Result<T, ToolkitError>;
