//! Composition root
//!
//! Wires the registries and tree defaults from one `Settings` value.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::config::Settings;
use crate::domain::arena::ComponentTree;
use crate::domain::contract::Contract;
use crate::infrastructure::error::ToolkitResult;
use crate::registry::{MonostateRegistry, SingletonRegistry};

/// Settings plus the registries built from them.
///
/// Cloning is cheap and clones share the registries.
#[derive(Debug, Clone)]
pub struct Toolkit {
    pub settings: Arc<Settings>,
    pub singletons: Arc<SingletonRegistry>,
    pub monostates: Arc<MonostateRegistry>,
}

impl Toolkit {
    /// Validate `settings` and build the registries.
    pub fn new(settings: Settings) -> ToolkitResult<Self> {
        settings.validate()?;
        let (singletons, monostates) = match settings.registry.shard_amount {
            Some(shards) => (
                SingletonRegistry::with_shard_amount(shards),
                MonostateRegistry::with_shard_amount(shards),
            ),
            None => (SingletonRegistry::new(), MonostateRegistry::new()),
        };
        debug!(?settings, "toolkit wired");
        Ok(Self {
            settings: Arc::new(settings),
            singletons: Arc::new(singletons),
            monostates: Arc::new(monostates),
        })
    }

    /// Load layered settings (see [`Settings::load`]) and wire them.
    pub fn load(local: Option<&Path>) -> ToolkitResult<Self> {
        Self::new(Settings::load(local)?)
    }

    /// Empty tree honoring the configured depth limit.
    pub fn tree(&self, name: impl Into<String>, contract: Arc<Contract>) -> ComponentTree {
        ComponentTree::new(name, contract).with_max_depth(self.settings.composite.max_depth)
    }

    /// Drop every singleton and monostate bag.
    #[instrument(level = "debug", skip(self))]
    pub fn reset(&self) {
        self.singletons.clear();
        self.monostates.clear();
    }
}

impl Default for Toolkit {
    fn default() -> Self {
        let settings = Settings::default();
        Self {
            settings: Arc::new(settings),
            singletons: Arc::new(SingletonRegistry::new()),
            monostates: Arc::new(MonostateRegistry::new()),
        }
    }
}
