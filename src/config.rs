//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/compkit/compkit.toml`
//! 3. Local config: a file passed explicitly by the host application
//! 4. Environment variables: `COMPKIT_*` prefix, `__` between section and key

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::infrastructure::error::{ToolkitError, ToolkitResult};

pub const ENV_PREFIX: &str = "COMPKIT";

/// Structural limits for trees created through the container.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CompositeSettings {
    /// Maximum number of levels, counting the root. `None` means unlimited.
    pub max_depth: Option<usize>,
}

/// Sizing of the registry tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RegistrySettings {
    /// Shard count for the concurrent maps; power of two greater than one.
    pub shard_amount: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive, e.g. `"warn"` or `"compkit=debug"`
    pub filter: String,
    /// Log span enter/close events
    pub span_events: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "warn".into(),
            span_events: false,
        }
    }
}

/// Raw settings for intermediate parsing (`None` means "not specified, inherit").
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub composite: RawCompositeSettings,
    pub registry: RawRegistrySettings,
    pub logging: RawLoggingSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawCompositeSettings {
    pub max_depth: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawRegistrySettings {
    pub shard_amount: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawLoggingSettings {
    pub filter: Option<String>,
    pub span_events: Option<bool>,
}

/// Unified configuration for compkit.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub composite: CompositeSettings,
    pub registry: RegistrySettings,
    pub logging: LoggingSettings,
}

/// Get the XDG config directory for compkit.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "compkit").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("compkit.toml"))
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> ToolkitResult<RawSettings> {
    let content = std::fs::read_to_string(path).map_err(|e| ToolkitError::Io {
        context: format!("read {}", path.display()),
        source: e,
    })?;
    toml::from_str(&content).map_err(|e| ToolkitError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl Settings {
    /// Overlay wins where it specifies a value.
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        Self {
            composite: CompositeSettings {
                max_depth: overlay.composite.max_depth.or(self.composite.max_depth),
            },
            registry: RegistrySettings {
                shard_amount: overlay
                    .registry
                    .shard_amount
                    .or(self.registry.shard_amount),
            },
            logging: LoggingSettings {
                filter: overlay
                    .logging
                    .filter
                    .clone()
                    .unwrap_or_else(|| self.logging.filter.clone()),
                span_events: overlay
                    .logging
                    .span_events
                    .unwrap_or(self.logging.span_events),
            },
        }
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `local` - Optional config file; it must exist when given
    ///
    /// # Precedence (lowest to highest)
    /// 1. Compiled defaults
    /// 2. Global config: `$XDG_CONFIG_HOME/compkit/compkit.toml` (skipped when absent)
    /// 3. Local config
    /// 4. Environment variables: `COMPKIT_*`
    pub fn load(local: Option<&Path>) -> ToolkitResult<Self> {
        let global = global_config_path().filter(|p| p.exists());
        let current = Self::load_layers(global.as_deref(), local)?;
        let current = Self::apply_env_overrides(current, Environment::with_prefix(ENV_PREFIX))?;
        current.validate()?;
        Ok(current)
    }

    /// Defaults, then `global`, then `local`. No environment lookup.
    pub fn load_layers(global: Option<&Path>, local: Option<&Path>) -> ToolkitResult<Self> {
        let mut current = Self::default();
        for path in [global, local].into_iter().flatten() {
            let raw = load_raw_settings(path)?;
            current = current.merge_with(&raw);
        }
        Ok(current)
    }

    /// Apply variables from an explicit map as if they came from the environment.
    ///
    /// Keys use the environment spelling, e.g. `COMPKIT_LOGGING__FILTER`.
    pub fn with_env_vars(self, vars: HashMap<String, String>) -> ToolkitResult<Self> {
        let settings =
            Self::apply_env_overrides(self, Environment::with_prefix(ENV_PREFIX).source(Some(vars)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Env vars replace values; they are explicit user overrides.
    fn apply_env_overrides(mut settings: Self, env: Environment) -> ToolkitResult<Self> {
        let config = Config::builder()
            .add_source(env.prefix_separator("_").separator("__"))
            .build()
            .map_err(config_err)?;

        if let Some(val) = lookup::<usize>(&config, "composite.max_depth")? {
            settings.composite.max_depth = Some(val);
        }
        if let Some(val) = lookup::<usize>(&config, "registry.shard_amount")? {
            settings.registry.shard_amount = Some(val);
        }
        if let Some(val) = lookup::<String>(&config, "logging.filter")? {
            settings.logging.filter = val;
        }
        if let Some(val) = lookup::<bool>(&config, "logging.span_events")? {
            settings.logging.span_events = val;
        }

        Ok(settings)
    }

    /// Reject values the registries cannot be built with.
    pub fn validate(&self) -> ToolkitResult<()> {
        if let Some(shards) = self.registry.shard_amount {
            if shards < 2 || !shards.is_power_of_two() {
                return Err(ToolkitError::Config {
                    message: format!(
                        "registry.shard_amount must be a power of two greater than one, got {shards}"
                    ),
                });
            }
        }
        Ok(())
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> ToolkitResult<String> {
        toml::to_string_pretty(self).map_err(|e| ToolkitError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# compkit configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/compkit/compkit.toml
#   Local:  file passed by the application
#   Env:    COMPKIT_* environment variables, e.g. COMPKIT_LOGGING__FILTER=debug

[composite]
# Maximum number of tree levels, counting the root
# max_depth = 16

[registry]
# Shard count of the registry maps (power of two > 1)
# shard_amount = 32

[logging]
# tracing EnvFilter directive
# filter = "warn"

# Log span enter/close events
# span_events = false
"#
        .to_string()
    }
}

/// A missing key is `None`; a present but unparsable one is an error.
fn lookup<T>(config: &Config, key: &str) -> ToolkitResult<Option<T>>
where
    T: for<'de> Deserialize<'de>,
{
    match config.get::<T>(key) {
        Ok(val) => Ok(Some(val)),
        Err(ConfigError::NotFound(_)) => Ok(None),
        Err(e) => Err(config_err(e)),
    }
}

fn config_err(e: ConfigError) -> ToolkitError {
    ToolkitError::Config {
        message: e.to_string(),
    }
}
