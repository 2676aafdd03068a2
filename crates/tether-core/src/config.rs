//! Configuration for tether.
//!
//! [`TetherConfig`] is read from `~/.tether/config.yaml` (or an explicit
//! path). Every section is optional:
//!
//! ```yaml
//! storage:
//!   backend: file        # or `memory`
//!   path: data           # relative to this file
//! directory: entities.yaml
//! search:
//!   limit: 30
//!   per_kind_limit: 20
//! connections:
//!   see_also:
//!     from_kind: item
//!     from_subtypes: [article, page]
//!     to_kind: item
//!     to_subtypes: [article, page]
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tether_db::{AttributeBackendKind, AttributeStoreConfig};

use crate::constants::{CONFIG_FILENAME, DATA_DIR, TETHER_HOME_DIR};
use crate::errors::TetherError;
use crate::manager::SearchSettings;
use crate::registry::{is_valid_connection_name, ConnectionArgs, ConnectionRegistry, TargetKind};

/// Searches returning more than this many results are probably a mistake.
const LARGE_SEARCH_LIMIT: usize = 200;

// ============================================================================
// StorageConfig
// ============================================================================

/// Where connection attributes are persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: AttributeBackendKind,

    /// Data directory for the file backend. Defaults to `~/.tether/data`.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl StorageConfig {
    /// Attribute store settings with the default data directory filled in.
    pub fn to_store_config(&self) -> AttributeStoreConfig {
        match self.backend {
            AttributeBackendKind::Memory => AttributeStoreConfig::memory(),
            AttributeBackendKind::File => AttributeStoreConfig {
                backend: AttributeBackendKind::File,
                path: self
                    .path
                    .clone()
                    .or_else(|| TetherConfig::default_dir().map(|d| d.join(DATA_DIR))),
            },
        }
    }
}

// ============================================================================
// TetherConfig
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TetherConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    /// Entity directory snapshot (YAML or JSON).
    #[serde(default)]
    pub directory: Option<PathBuf>,

    #[serde(default)]
    pub search: SearchSettings,

    /// Connection types registered at startup.
    #[serde(default)]
    pub connections: BTreeMap<String, ConnectionArgs>,
}

impl TetherConfig {
    /// Load the configuration from `~/.tether/config.yaml`.
    ///
    /// Falls back to defaults when the home directory cannot be determined
    /// or the file does not exist.
    pub fn load_default() -> Result<Self, TetherError> {
        match Self::default_path() {
            Some(path) => Self::from_path(&path),
            None => {
                tracing::debug!("Could not determine home directory, using default config");
                Ok(Self::default())
            }
        }
    }

    /// Load the configuration from a specific path.
    ///
    /// A missing file yields the defaults. Relative paths inside the file are
    /// resolved against the file's directory.
    ///
    /// # Errors
    ///
    /// Returns [`TetherError::InvalidConfig`] if the file cannot be read or
    /// parsed, and [`TetherError::InvalidConfiguration`] if validation fails.
    pub fn from_path(path: &Path) -> Result<Self, TetherError> {
        if !path.exists() {
            tracing::debug!("Config not found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            TetherError::InvalidConfig(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let mut config: Self = serde_yaml::from_str(&content).map_err(|e| {
            TetherError::InvalidConfig(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        if let Some(base) = path.parent() {
            config.resolve_relative_paths(base);
        }

        for warning in config.validate()? {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok(config)
    }

    /// `~/.tether`
    pub fn default_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(TETHER_HOME_DIR))
    }

    /// `~/.tether/config.yaml`
    pub fn default_path() -> Option<PathBuf> {
        Self::default_dir().map(|d| d.join(CONFIG_FILENAME))
    }

    /// In-memory storage, no directory, no connection types.
    pub fn default_for_testing() -> Self {
        Self {
            storage: StorageConfig {
                backend: AttributeBackendKind::Memory,
                path: None,
            },
            ..Self::default()
        }
    }

    fn resolve_relative_paths(&mut self, base: &Path) {
        if let Some(path) = self.storage.path.as_mut() {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
        if let Some(path) = self.directory.as_mut() {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }

    /// Build a registry holding every configured connection type.
    pub fn registry(&self) -> ConnectionRegistry {
        let mut registry = ConnectionRegistry::new();
        for (name, args) in &self.connections {
            registry.register(name, args.clone());
        }
        registry
    }

    /// Check the configuration.
    ///
    /// Fatal problems are returned as [`TetherError::InvalidConfiguration`];
    /// anything merely suspicious comes back as a warning string.
    pub fn validate(&self) -> Result<Vec<String>, TetherError> {
        let mut warnings = Vec::new();

        if self.search.limit == 0 {
            return Err(TetherError::InvalidConfiguration {
                message: "search.limit cannot be 0".to_string(),
                hint: "Set search.limit to at least 1 (default: 30)".to_string(),
            });
        }
        if self.search.per_kind_limit == 0 {
            return Err(TetherError::InvalidConfiguration {
                message: "search.per_kind_limit cannot be 0".to_string(),
                hint: "Set search.per_kind_limit to at least 1 (default: 20)".to_string(),
            });
        }
        if self.search.limit > LARGE_SEARCH_LIMIT {
            warnings.push(format!(
                "search.limit={} is very large; searches may be slow",
                self.search.limit
            ));
        }

        for (name, args) in &self.connections {
            if !is_valid_connection_name(name) {
                return Err(TetherError::InvalidConfiguration {
                    message: format!("connection type name `{}` is invalid", name),
                    hint: "Use lowercase letters, digits, `_` and `-` only".to_string(),
                });
            }
            if args.to_kind != TargetKind::Any && args.to_subtypes.clone().into_vec().is_empty() {
                warnings.push(format!(
                    "connections.{} targets {} entities but lists no to_subtypes; search will find nothing",
                    name, args.to_kind
                ));
            }
        }

        if let Some(path) = &self.directory {
            if !path.exists() {
                warnings.push(format!(
                    "directory snapshot {} does not exist",
                    path.display()
                ));
            }
        }

        Ok(warnings)
    }
}
