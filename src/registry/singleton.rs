//! Keyed singletons: at most one physical instance per key.

use std::any::{type_name, Any};
use std::convert::Infallible;
use std::fmt;
use std::hash::Hash;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, instrument, trace};

use crate::registry::error::{RegistryError, RegistryResult};
use crate::registry::key::RegistryKey;

type Instance = Arc<dyn Any + Send + Sync>;

/// One key's entry: the instance once created, plus the lock that serializes creation.
#[derive(Default)]
struct Slot {
    value: OnceLock<Instance>,
    init: Mutex<()>,
}

/// Lazily creates and caches one instance per key.
///
/// Reads of created instances are lock-free. The first requests for a key race for that
/// key's slot lock only, so factories for independent keys run in parallel. A failing or
/// panicking factory leaves the key absent and a later request retries; a panic is
/// reported as [`RegistryError::FactoryPanicked`].
pub struct SingletonRegistry<K = RegistryKey>
where
    K: Eq + Hash,
{
    slots: DashMap<K, Arc<Slot>>,
}

impl<K> Default for SingletonRegistry<K>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> fmt::Debug for SingletonRegistry<K>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingletonRegistry")
            .field("instances", &self.len())
            .finish()
    }
}

impl<K> SingletonRegistry<K>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
        }
    }

    /// # Panics
    /// If `shard_amount` is not a power of two greater than one.
    pub fn with_shard_amount(shard_amount: usize) -> Self {
        Self {
            slots: DashMap::with_shard_amount(shard_amount),
        }
    }

    /// Return the instance for `key`, creating it with `factory` on first use.
    pub fn get_or_create<T, F>(&self, key: K, factory: F) -> RegistryResult<Arc<T>>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> T,
    {
        self.try_get_or_create(key, || Ok::<T, Infallible>(factory()))
    }

    /// Like [`SingletonRegistry::get_or_create`] with a fallible factory.
    ///
    /// Under concurrent calls for one key the factory runs exactly once and every caller
    /// receives the same `Arc`.
    #[instrument(level = "debug", skip(self, factory), fields(instance = type_name::<T>()))]
    pub fn try_get_or_create<T, E, F>(&self, key: K, factory: F) -> RegistryResult<Arc<T>>
    where
        T: Any + Send + Sync,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
        F: FnOnce() -> Result<T, E>,
    {
        // check
        let slot = self.slot(&key);
        if let Some(instance) = slot.value.get() {
            trace!("hit");
            return Self::downcast(&key, instance.clone());
        }

        // lock, re-check
        let _creating = slot.init.lock();
        if let Some(instance) = slot.value.get() {
            trace!("created concurrently");
            return Self::downcast(&key, instance.clone());
        }

        // create
        debug!("invoking factory");
        let value = catch_unwind(AssertUnwindSafe(factory))
            .map_err(|_| RegistryError::FactoryPanicked {
                key: format!("{:?}", key),
            })?
            .map_err(|e| RegistryError::Factory {
                key: format!("{:?}", key),
                source: e.into(),
            })?;
        let instance: Instance = Arc::new(value);
        let _ = slot.value.set(instance.clone());
        Self::downcast(&key, instance)
    }

    fn slot(&self, key: &K) -> Arc<Slot> {
        let existing = self.slots.get(key).map(|s| Arc::clone(s.value()));
        match existing {
            Some(slot) => slot,
            None => Arc::clone(self.slots.entry(key.clone()).or_default().value()),
        }
    }

    fn downcast<T>(key: &K, instance: Instance) -> RegistryResult<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        instance
            .downcast::<T>()
            .map_err(|_| RegistryError::TypeMismatch {
                key: format!("{:?}", key),
                expected: type_name::<T>(),
            })
    }

    /// The instance for `key`, if it has been created.
    pub fn get<T>(&self, key: &K) -> RegistryResult<Option<Arc<T>>>
    where
        T: Any + Send + Sync,
    {
        let instance = self
            .slots
            .get(key)
            .and_then(|slot| slot.value.get().cloned());
        instance.map(|i| Self::downcast(key, i)).transpose()
    }

    pub fn contains(&self, key: &K) -> bool {
        self.slots
            .get(key)
            .map(|slot| slot.value.get().is_some())
            .unwrap_or(false)
    }

    /// Number of created instances.
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.value().value.get().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget the instance for `key`; the next request runs the factory again.
    ///
    /// Waits for a factory already running for `key`, so the instance it produces is the
    /// one forgotten. Handles obtained earlier stay valid but are no longer canonical.
    /// Calling this from inside the same key's factory deadlocks.
    #[instrument(level = "debug", skip(self))]
    pub fn reset(&self, key: &K) -> bool {
        let Some(slot) = self.slots.get(key).map(|s| Arc::clone(s.value())) else {
            return false;
        };
        let _creating = slot.init.lock();
        let removed = self
            .slots
            .remove_if(key, |_, current| Arc::ptr_eq(current, &slot))
            .is_some();
        debug!(removed, "reset");
        removed && slot.value.get().is_some()
    }

    /// Reset every key.
    pub fn clear(&self) {
        let keys: Vec<K> = self.slots.iter().map(|entry| entry.key().clone()).collect();
        for key in &keys {
            self.reset(key);
        }
    }
}

impl SingletonRegistry<RegistryKey> {
    /// The instance of `T` keyed by its type.
    pub fn instance<T, F>(&self, factory: F) -> RegistryResult<Arc<T>>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> T,
    {
        self.get_or_create(RegistryKey::of::<T>(), factory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Database {
        connection: String,
    }

    #[test]
    fn given_second_request_when_getting_then_ignores_new_arguments() {
        let registry: SingletonRegistry = SingletonRegistry::new();
        let db1 = registry
            .instance(|| Database {
                connection: "conn_1".into(),
            })
            .unwrap();
        let db2 = registry
            .instance(|| Database {
                connection: "conn_2".into(),
            })
            .unwrap();

        assert!(Arc::ptr_eq(&db1, &db2));
        assert_eq!(db2.connection, "conn_1");
    }

    #[test]
    fn given_existing_key_when_requesting_other_type_then_reports_mismatch() {
        let registry: SingletonRegistry = SingletonRegistry::new();
        registry.get_or_create("answer".into(), || 42u32).unwrap();

        let result = registry.get_or_create::<String, _>("answer".into(), String::new);
        assert!(matches!(result, Err(RegistryError::TypeMismatch { .. })));
    }
}
