use std::any::{type_name, Any, TypeId};
use std::fmt;

/// Default registry key: either a type tag or a free-form name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RegistryKey {
    Type { id: TypeId, name: &'static str },
    Name(String),
}

impl RegistryKey {
    /// Key identifying the type `T` itself.
    pub fn of<T: Any>() -> Self {
        RegistryKey::Type {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        RegistryKey::Name(name.into())
    }
}

impl fmt::Display for RegistryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryKey::Type { name, .. } => write!(f, "type:{}", name),
            RegistryKey::Name(name) => f.write_str(name),
        }
    }
}

impl From<&str> for RegistryKey {
    fn from(name: &str) -> Self {
        RegistryKey::Name(name.to_string())
    }
}

impl From<String> for RegistryKey {
    fn from(name: String) -> Self {
        RegistryKey::Name(name)
    }
}
