//! Infrastructure layer: toolkit-level errors and the composition root
//!
//! This layer wires domain primitives and registries from settings.

pub mod di;
pub mod error;

pub use di::Toolkit;
pub use error::{ToolkitError, ToolkitResult};
