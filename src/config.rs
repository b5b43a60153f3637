//! Bridge configuration.
//!
//! # Configuration Precedence
//!
//! Settings are resolved in this order (highest priority first):
//!
//! 1. **Programmatic**: values set with the `with_*` methods after loading
//! 2. **Environment variables**: `CANCEL_BRIDGE_*`
//! 3. **Config file**: a TOML file (requires the `config-file` feature)
//! 4. **Defaults**: [`BridgeConfig::default()`]
//!
//! # Supported Environment Variables
//!
//! | Variable | Type | Maps to |
//! |----------|------|---------|
//! | `CANCEL_BRIDGE_DEFAULT_PRIORITY` | [`Priority`] name | `default_priority` |
//! | `CANCEL_BRIDGE_DOWNLOAD_DIR` | path | `download_dir` |
//! | `CANCEL_BRIDGE_THREAD_NAME_PREFIX` | `String` | `thread_name_prefix` |

use crate::types::{ParsePriorityError, Priority};
#[cfg(feature = "config-file")]
use std::path::Path;
use std::path::PathBuf;

/// Environment variable name for the default task priority.
pub const ENV_DEFAULT_PRIORITY: &str = "CANCEL_BRIDGE_DEFAULT_PRIORITY";
/// Environment variable name for the download relocation directory.
pub const ENV_DOWNLOAD_DIR: &str = "CANCEL_BRIDGE_DOWNLOAD_DIR";
/// Environment variable name for the spawner thread name prefix.
pub const ENV_THREAD_NAME_PREFIX: &str = "CANCEL_BRIDGE_THREAD_NAME_PREFIX";

/// Default thread name prefix for [`ThreadSpawner`](crate::runtime::ThreadSpawner).
pub const DEFAULT_THREAD_NAME_PREFIX: &str = "cancel-bridge";

/// Error raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable held an unusable value.
    #[error("invalid value for {var}: {reason}")]
    InvalidValue {
        /// The variable name.
        var: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
    /// A priority name did not parse.
    #[error("invalid value for {var}: {source}")]
    Priority {
        /// The variable name.
        var: &'static str,
        /// The parse failure.
        #[source]
        source: ParsePriorityError,
    },
    /// The config file could not be read.
    #[error("failed to read config file {}: {source}", path.display())]
    Io {
        /// The file path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The config file is not valid TOML for this schema.
    #[error("failed to parse TOML config: {0}")]
    Toml(String),
}

/// Settings shared by the spawner, lifecycle runner, and download session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Priority for lifecycle tasks that do not set one.
    pub default_priority: Priority,
    /// Where downloaded artifacts are relocated. `None` means the system
    /// temporary directory.
    pub download_dir: Option<PathBuf>,
    /// Name prefix for spawner threads.
    pub thread_name_prefix: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            default_priority: Priority::default(),
            download_dir: None,
            thread_name_prefix: DEFAULT_THREAD_NAME_PREFIX.to_string(),
        }
    }
}

impl BridgeConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        apply_env_overrides(&mut config)?;
        Ok(config)
    }

    /// Defaults, then the TOML file at `path`, then the environment.
    #[cfg(feature = "config-file")]
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        apply_toml_config(&mut config, &parse_toml_file(path)?)?;
        apply_env_overrides(&mut config)?;
        Ok(config)
    }

    /// Sets the default lifecycle task priority.
    #[must_use]
    pub const fn with_default_priority(mut self, priority: Priority) -> Self {
        self.default_priority = priority;
        self
    }

    /// Sets the download relocation directory.
    #[must_use]
    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = Some(dir.into());
        self
    }

    /// Sets the spawner thread name prefix.
    #[must_use]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Returns the effective download directory.
    #[must_use]
    pub fn resolved_download_dir(&self) -> PathBuf {
        self.download_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Apply environment variable overrides to a [`BridgeConfig`].
///
/// Only variables that are set are applied. Returns an error if a variable
/// is set but holds an unusable value.
pub fn apply_env_overrides(config: &mut BridgeConfig) -> Result<(), ConfigError> {
    apply_env_overrides_from(config, read_env)
}

/// Like [`apply_env_overrides`], reading variables through `lookup`.
pub fn apply_env_overrides_from<L>(config: &mut BridgeConfig, lookup: L) -> Result<(), ConfigError>
where
    L: Fn(&str) -> Option<String>,
{
    if let Some(val) = lookup(ENV_DEFAULT_PRIORITY) {
        config.default_priority = val.parse().map_err(|source| ConfigError::Priority {
            var: ENV_DEFAULT_PRIORITY,
            source,
        })?;
    }
    if let Some(val) = lookup(ENV_DOWNLOAD_DIR) {
        config.download_dir = Some(parse_dir(ENV_DOWNLOAD_DIR, &val)?);
    }
    if let Some(val) = lookup(ENV_THREAD_NAME_PREFIX) {
        config.thread_name_prefix = parse_prefix(ENV_THREAD_NAME_PREFIX, &val)?;
    }
    Ok(())
}

fn read_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn parse_dir(var: &'static str, val: &str) -> Result<PathBuf, ConfigError> {
    let trimmed = val.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::InvalidValue {
            var,
            reason: "expected a directory path, got an empty string".to_string(),
        });
    }
    Ok(PathBuf::from(trimmed))
}

fn parse_prefix(var: &'static str, val: &str) -> Result<String, ConfigError> {
    let trimmed = val.trim();
    if trimmed.is_empty() || trimmed.contains('\0') {
        return Err(ConfigError::InvalidValue {
            var,
            reason: format!("expected a non-empty thread name prefix, got {val:?}"),
        });
    }
    Ok(trimmed.to_string())
}

// =========================================================================
// TOML config file support (feature-gated)
// =========================================================================

/// TOML-deserializable bridge configuration.
///
/// ```toml
/// [tasks]
/// default_priority = "utility"
/// thread_name_prefix = "myapp-bridge"
///
/// [downloads]
/// dir = "/var/cache/myapp"
/// ```
#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Default, Debug)]
pub struct BridgeTomlConfig {
    /// Task settings.
    #[serde(default)]
    pub tasks: TasksToml,
    /// Download settings.
    #[serde(default)]
    pub downloads: DownloadsToml,
}

/// Task section of the TOML config.
#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Default, Debug)]
pub struct TasksToml {
    /// Default lifecycle task priority.
    pub default_priority: Option<String>,
    /// Spawner thread name prefix.
    pub thread_name_prefix: Option<String>,
}

/// Download section of the TOML config.
#[cfg(feature = "config-file")]
#[derive(serde::Deserialize, Default, Debug)]
pub struct DownloadsToml {
    /// Download relocation directory.
    pub dir: Option<PathBuf>,
}

/// Apply a parsed TOML config to a [`BridgeConfig`].
///
/// Only fields present in the file override the config.
#[cfg(feature = "config-file")]
pub fn apply_toml_config(config: &mut BridgeConfig, toml: &BridgeTomlConfig) -> Result<(), ConfigError> {
    if let Some(ref v) = toml.tasks.default_priority {
        config.default_priority = v.parse().map_err(|source| ConfigError::Priority {
            var: "tasks.default_priority",
            source,
        })?;
    }
    if let Some(ref v) = toml.tasks.thread_name_prefix {
        config.thread_name_prefix = parse_prefix("tasks.thread_name_prefix", v)?;
    }
    if let Some(ref v) = toml.downloads.dir {
        config.download_dir = Some(v.clone());
    }
    Ok(())
}

/// Parse a TOML string into a [`BridgeTomlConfig`].
#[cfg(feature = "config-file")]
pub fn parse_toml_str(toml_str: &str) -> Result<BridgeTomlConfig, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::Toml(e.to_string()))
}

/// Read and parse a TOML file into a [`BridgeTomlConfig`].
#[cfg(feature = "config-file")]
pub fn parse_toml_file(path: &Path) -> Result<BridgeTomlConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_toml_str(&content)
}

// =========================================================================
// Tests
// =========================================================================
