//! Adapters: contract-conforming views over foreign objects.
//!
//! The translation table is resolved once, when the adapter is built. Every contract
//! operation must have an entry, so an adapter that exists can always answer every
//! operation. Evaluation re-invokes the foreign object each time unless a shared
//! [`AdapterCache`] is attached explicitly.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, trace};

use crate::domain::component::{Component, ComponentId};
use crate::domain::contract::Contract;
use crate::domain::error::{BoxError, ContractError, ContractResult};
use crate::domain::value::Value;

type ExternalCall<T> = Arc<dyn Fn(&T) -> Result<Value, BoxError> + Send + Sync>;
type Conversion = Arc<dyn Fn(Value) -> ContractResult<Value> + Send + Sync>;
type CacheKey<T> = Arc<dyn Fn(&T) -> String + Send + Sync>;

/// How one contract operation maps onto the foreign object.
pub struct Translation<T> {
    call: ExternalCall<T>,
    convert: Option<Conversion>,
}

impl<T> Clone for Translation<T> {
    fn clone(&self) -> Self {
        Self {
            call: self.call.clone(),
            convert: self.convert.clone(),
        }
    }
}

/// Operation name to translation.
pub struct TranslationTable<T> {
    entries: BTreeMap<String, Translation<T>>,
}

impl<T> Default for TranslationTable<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<T> TranslationTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `operation` to an infallible call on the foreign object.
    pub fn map<F, V>(self, operation: &str, call: F) -> Self
    where
        F: Fn(&T) -> V + Send + Sync + 'static,
        V: Into<Value>,
    {
        self.try_map(operation, move |ext| Ok(call(ext).into()))
    }

    /// Map `operation` to a fallible call; errors surface as [`ContractError::External`].
    pub fn try_map<F>(mut self, operation: &str, call: F) -> Self
    where
        F: Fn(&T) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        self.entries.insert(
            operation.to_string(),
            Translation {
                call: Arc::new(call),
                convert: None,
            },
        );
        self
    }

    /// Map `operation` and convert the raw result (units, data shape) before returning it.
    pub fn map_with<F, V, C>(self, operation: &str, call: F, convert: C) -> Self
    where
        F: Fn(&T) -> V + Send + Sync + 'static,
        V: Into<Value>,
        C: Fn(Value) -> ContractResult<Value> + Send + Sync + 'static,
    {
        let mut table = self.map(operation, call);
        if let Some(entry) = table.entries.get_mut(operation) {
            entry.convert = Some(Arc::new(convert));
        }
        table
    }

    pub fn operations(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// Generation and hit counters of an [`AdapterCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub generated: usize,
    pub hits: usize,
}

/// Translation results shared across adapters, keyed by `(object key, operation)`.
///
/// Adapters over equal objects (same key) reuse each other's results.
#[derive(Debug, Default)]
pub struct AdapterCache {
    entries: DashMap<(String, String), Value>,
    generated: AtomicUsize,
    hits: AtomicUsize,
}

impl AdapterCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn get_or_generate(
        &self,
        key: String,
        operation: &str,
        generate: impl FnOnce() -> ContractResult<Value>,
    ) -> ContractResult<Value> {
        let slot = (key, operation.to_string());
        if let Some(value) = self.entries.get(&slot) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            trace!(key = %slot.0, operation, "adapter cache hit");
            return Ok(value.clone());
        }
        let value = generate()?;
        let count = self.generated.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(key = %slot.0, operation, count, "adapter cache generated");
        self.entries.insert(slot, value.clone());
        Ok(value)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            generated: self.generated.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

struct CacheBinding<T> {
    cache: Arc<AdapterCache>,
    key: CacheKey<T>,
}

/// A foreign object seen through the component contract.
pub struct Adapter<T> {
    id: ComponentId,
    name: String,
    contract: Arc<Contract>,
    external: Arc<T>,
    table: TranslationTable<T>,
    cache: Option<CacheBinding<T>>,
}

impl<T> Adapter<T>
where
    T: Send + Sync + 'static,
{
    /// Fails with `IncompleteContract` when an operation has no translation and with
    /// `UnknownOperation` when the table translates something the contract lacks.
    pub fn adapt(
        name: impl Into<String>,
        contract: Arc<Contract>,
        external: Arc<T>,
        table: TranslationTable<T>,
    ) -> ContractResult<Self> {
        if let Some(extra) = table.operations().find(|op| !contract.contains(op)) {
            return Err(contract.unknown(extra));
        }
        let missing: Vec<String> = contract
            .names()
            .filter(|op| !table.entries.contains_key(*op))
            .map(String::from)
            .collect();
        if !missing.is_empty() {
            return Err(ContractError::IncompleteContract {
                contract: contract.name().to_string(),
                missing,
            });
        }
        Ok(Self {
            id: ComponentId::new(),
            name: name.into(),
            contract,
            external,
            table,
            cache: None,
        })
    }

    /// Memoize translated results in `cache`, keyed by `key(external)` and operation.
    pub fn with_cache<K>(mut self, cache: Arc<AdapterCache>, key: K) -> Self
    where
        K: Fn(&T) -> String + Send + Sync + 'static,
    {
        self.cache = Some(CacheBinding {
            cache,
            key: Arc::new(key),
        });
        self
    }

    pub fn external(&self) -> &Arc<T> {
        &self.external
    }

    fn translate(&self, operation: &str) -> ContractResult<Value> {
        let translation = self
            .table
            .entries
            .get(operation)
            .ok_or_else(|| self.contract.unknown(operation))?;
        let raw = (translation.call)(self.external.as_ref()).map_err(|source| {
            ContractError::External {
                operation: operation.to_string(),
                source,
            }
        })?;
        let value = match &translation.convert {
            Some(convert) => convert(raw)?,
            None => raw,
        };
        self.contract.check(operation, &value)?;
        Ok(value)
    }
}

impl<T> fmt::Debug for Adapter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Adapter")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("contract", &self.contract.name())
            .field("cached", &self.cache.is_some())
            .finish_non_exhaustive()
    }
}

impl<T> Component for Adapter<T>
where
    T: Send + Sync + 'static,
{
    fn id(&self) -> ComponentId {
        self.id
    }

    fn label(&self) -> String {
        self.name.clone()
    }

    fn contract(&self) -> &Arc<Contract> {
        &self.contract
    }

    fn evaluate(&self, operation: &str) -> ContractResult<Value> {
        self.contract.get(operation)?;
        match &self.cache {
            Some(binding) => binding.cache.get_or_generate(
                (binding.key)(self.external.as_ref()),
                operation,
                || self.translate(operation),
            ),
            None => self.translate(operation),
        }
    }
}
