//! compkit: structural composition primitives.
//!
//! - [`domain::ComponentTree`]: trees of components aggregated through a shared contract
//! - [`domain::Decorator`]: ordered result-level wrappers
//! - [`domain::Adapter`]: foreign objects translated onto the contract
//! - [`domain::Bridge`]: a control bound to a replaceable backend
//! - [`registry`]: keyed singletons and monostate shared state
//!
//! [`Toolkit`] wires the registries from layered [`config::Settings`].

pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod registry;
pub mod util;

pub use infrastructure::{Toolkit, ToolkitError, ToolkitResult};
