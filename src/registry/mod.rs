//! Instance registries: keyed singletons and monostate shared state.

pub mod error;
pub mod key;
pub mod monostate;
pub mod singleton;

pub use error::{RegistryError, RegistryResult};
pub use key::RegistryKey;
pub use monostate::{FieldScope, InstanceId, Monostate, MonostateRegistry, StateBag};
pub use singleton::SingletonRegistry;
