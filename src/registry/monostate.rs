//! Monostate: many instances, one shared state bag per key.
//!
//! The first `bind` for a key seeds the bag. Fields present at seeding are shared: a write
//! through any instance is visible through all of them. Fields an instance sets later stay
//! local to that instance until it promotes them.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::domain::value::Value;
use crate::registry::key::RegistryKey;

pub type StateBag = BTreeMap<String, Value>;

#[derive(Debug, Default)]
struct SharedBag {
    fields: StateBag,
    seeded: bool,
}

type SharedHandle = Arc<RwLock<SharedBag>>;

/// Where a write through [`Monostate::set`] landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldScope {
    Shared,
    Local,
}

/// Identity of one monostate instance; distinct even when the state is shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(Uuid);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Owns the shared bags, one per key.
pub struct MonostateRegistry<K = RegistryKey>
where
    K: Eq + Hash,
{
    bags: DashMap<K, SharedHandle>,
}

impl<K> Default for MonostateRegistry<K>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> fmt::Debug for MonostateRegistry<K>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonostateRegistry")
            .field("keys", &self.len())
            .finish()
    }
}

impl<K> MonostateRegistry<K>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    pub fn new() -> Self {
        Self {
            bags: DashMap::new(),
        }
    }

    /// # Panics
    /// If `shard_amount` is not a power of two greater than one.
    pub fn with_shard_amount(shard_amount: usize) -> Self {
        Self {
            bags: DashMap::with_shard_amount(shard_amount),
        }
    }

    /// Create a new instance bound to `key`'s bag.
    ///
    /// `initial` seeds the bag when nothing has been seeded yet; otherwise it is ignored
    /// and the new instance observes the existing state.
    #[instrument(level = "debug", skip(self, initial))]
    pub fn bind(&self, key: K, initial: StateBag) -> Monostate<K> {
        let shared = Arc::clone(self.bags.entry(key.clone()).or_default().value());
        {
            let mut bag = shared.write();
            if !bag.seeded {
                debug!(fields = initial.len(), "seeding shared state");
                bag.fields = initial;
                bag.seeded = true;
            }
        }
        Monostate {
            id: InstanceId(Uuid::new_v4()),
            key,
            shared,
            local: StateBag::new(),
        }
    }

    /// Clear `key`'s bag in place. Live instances see empty shared state and the next
    /// `bind` seeds again.
    #[instrument(level = "debug", skip(self))]
    pub fn reset(&self, key: &K) -> bool {
        let shared = self.bags.get(key).map(|b| Arc::clone(b.value()));
        match shared {
            Some(shared) => {
                let mut bag = shared.write();
                bag.fields.clear();
                bag.seeded = false;
                true
            }
            None => false,
        }
    }

    /// Copy of the shared fields for `key`.
    pub fn snapshot(&self, key: &K) -> Option<StateBag> {
        self.bags.get(key).map(|b| b.read().fields.clone())
    }

    pub fn len(&self) -> usize {
        self.bags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bags.is_empty()
    }

    /// Reset every bag.
    pub fn clear(&self) {
        for entry in self.bags.iter() {
            let mut bag = entry.value().write();
            bag.fields.clear();
            bag.seeded = false;
        }
    }
}

/// One instance of a monostate class.
pub struct Monostate<K = RegistryKey> {
    id: InstanceId,
    key: K,
    shared: SharedHandle,
    local: StateBag,
}

impl<K: fmt::Debug> fmt::Debug for Monostate<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Monostate")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("local", &self.local)
            .finish_non_exhaustive()
    }
}

impl<K> Monostate<K> {
    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    /// Shared value first, then this instance's local value.
    pub fn get(&self, field: &str) -> Option<Value> {
        self.shared
            .read()
            .fields
            .get(field)
            .cloned()
            .or_else(|| self.local.get(field).cloned())
    }

    pub fn is_shared(&self, field: &str) -> bool {
        self.shared.read().fields.contains_key(field)
    }

    /// Write `field`. Shared fields update every instance; anything else stays local.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> FieldScope {
        let value = value.into();
        {
            let mut bag = self.shared.write();
            if let Some(slot) = bag.fields.get_mut(field) {
                *slot = value;
                return FieldScope::Shared;
            }
        }
        self.local.insert(field.to_string(), value);
        FieldScope::Local
    }

    /// Move a local field into the shared bag. Returns `false` if `field` is not local.
    pub fn promote(&mut self, field: &str) -> bool {
        match self.local.remove(field) {
            Some(value) => {
                self.shared.write().fields.insert(field.to_string(), value);
                true
            }
            None => false,
        }
    }

    /// Shared fields overlaid on local ones.
    pub fn state(&self) -> StateBag {
        let mut merged = self.local.clone();
        merged.extend(
            self.shared
                .read()
                .fields
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        merged
    }

    pub fn shared_state(&self) -> StateBag {
        self.shared.read().fields.clone()
    }

    pub fn local_state(&self) -> &StateBag {
        &self.local
    }

    /// Identity comparison; two instances over one bag are still distinct.
    pub fn same_instance(&self, other: &Monostate<K>) -> bool {
        self.id == other.id
    }

    /// Whether both instances observe the same shared bag.
    pub fn shares_state_with(&self, other: &Monostate<K>) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed() -> StateBag {
        StateBag::from([("x".to_string(), Value::from(1.0))])
    }

    #[test]
    fn given_two_instances_when_setting_shared_field_then_both_observe_it() {
        let registry: MonostateRegistry = MonostateRegistry::new();
        let mut a = registry.bind("cfg".into(), seed());
        let b = registry.bind("cfg".into(), StateBag::new());

        assert_eq!(a.set("x", 2.0), FieldScope::Shared);
        assert_eq!(b.get("x"), Some(Value::Number(2.0)));
        assert!(!a.same_instance(&b));
        assert!(a.shares_state_with(&b));
    }

    #[test]
    fn given_undeclared_field_when_setting_then_stays_local_until_promoted() {
        let registry: MonostateRegistry = MonostateRegistry::new();
        let mut a = registry.bind("cfg".into(), seed());
        let b = registry.bind("cfg".into(), StateBag::new());

        assert_eq!(a.set("y", "local"), FieldScope::Local);
        assert_eq!(b.get("y"), None);

        assert!(a.promote("y"));
        assert_eq!(b.get("y"), Some(Value::from("local")));
        assert!(!a.promote("y"));
    }

    #[test]
    fn given_reset_when_binding_again_then_reseeds() {
        let registry: MonostateRegistry = MonostateRegistry::new();
        let a = registry.bind("cfg".into(), seed());
        assert!(registry.reset(&"cfg".into()));
        assert_eq!(a.get("x"), None);

        let b = registry.bind(
            "cfg".into(),
            StateBag::from([("x".to_string(), Value::from(5.0))]),
        );
        assert_eq!(a.get("x"), Some(Value::Number(5.0)));
        assert_eq!(b.get("x"), Some(Value::Number(5.0)));
    }
}
