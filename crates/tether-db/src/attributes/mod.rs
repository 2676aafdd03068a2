//! Attribute storage for tether-db.
//!
//! Each entity kind owns a separate attribute store. The store is addressed by
//! `(entity id, key)` and holds arbitrary JSON values, mirroring the key-value
//! "meta" tables content platforms attach to their items, terms and accounts.
//!
//! - [`AttributeScope`] - which kind of entity an attribute belongs to
//! - [`AttributeBackend`] - trait implemented by one store for one scope
//! - [`AttributeStores`] - the three backends bundled behind one surface
//!
//! ## Sync Design
//!
//! Backends are synchronous and guard their state with `RwLock`, so they are
//! `Send + Sync`. A single `get` or `set` is atomic; a read-modify-write done
//! by a caller across two calls is not.

pub mod file;
pub mod memory;

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DbError, DbResult};

pub use file::JsonlAttributeBackend;
pub use memory::MemoryAttributeBackend;

// ============================================================================
// AttributeScope
// ============================================================================

/// The entity kind an attribute store belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeScope {
    /// Content items (articles, pages, events...).
    Item,
    /// Taxonomy terms.
    Term,
    /// Principals (user accounts).
    Principal,
}

impl AttributeScope {
    /// All scopes, in a stable order.
    pub const ALL: [AttributeScope; 3] = [Self::Item, Self::Term, Self::Principal];

    /// Short lowercase name, used for file names and logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Item => "item",
            Self::Term => "term",
            Self::Principal => "principal",
        }
    }
}

impl fmt::Display for AttributeScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// AttributeBackend Trait
// ============================================================================

/// Key-value attribute storage for the entities of one scope.
pub trait AttributeBackend: Send + Sync {
    /// Read the value stored under `key` for entity `id`.
    fn get(&self, id: u64, key: &str) -> DbResult<Option<Value>>;

    /// Store `value` under `key` for entity `id`, replacing any previous value.
    fn set(&self, id: u64, key: &str, value: Value) -> DbResult<()>;

    /// Delete `key` for entity `id`. Returns `true` if a value was removed.
    fn delete(&self, id: u64, key: &str) -> DbResult<bool>;

    /// Ids of every entity that currently holds `key`, ascending.
    fn ids_with_key(&self, key: &str) -> DbResult<Vec<u64>>;

    /// Flush pending writes to persistent storage.
    fn flush(&self) -> DbResult<()>;
}

// ============================================================================
// Configuration
// ============================================================================

/// Which backend implementation to open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeBackendKind {
    /// In-memory maps, lost when the process exits.
    Memory,
    /// One JSONL file per scope under the configured directory.
    #[default]
    File,
}

impl std::str::FromStr for AttributeBackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "file" | "jsonl" => Ok(Self::File),
            _ => Err(format!(
                "Unknown attribute backend: '{}'. Use 'memory' or 'file'.",
                s
            )),
        }
    }
}

/// Configuration for opening the attribute stores.
#[derive(Debug, Clone)]
pub struct AttributeStoreConfig {
    /// Backend implementation.
    pub backend: AttributeBackendKind,

    /// Data directory for file-backed stores.
    pub path: Option<PathBuf>,
}

impl AttributeStoreConfig {
    /// In-memory configuration.
    pub fn memory() -> Self {
        Self {
            backend: AttributeBackendKind::Memory,
            path: None,
        }
    }

    /// File-backed configuration rooted at `path`.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            backend: AttributeBackendKind::File,
            path: Some(path.into()),
        }
    }
}

// ============================================================================
// AttributeStores
// ============================================================================

/// The three per-kind attribute backends behind a single surface.
pub struct AttributeStores {
    items: Box<dyn AttributeBackend>,
    terms: Box<dyn AttributeBackend>,
    principals: Box<dyn AttributeBackend>,
}

impl AttributeStores {
    /// Bundle three backends, one per scope.
    pub fn new(
        items: Box<dyn AttributeBackend>,
        terms: Box<dyn AttributeBackend>,
        principals: Box<dyn AttributeBackend>,
    ) -> Self {
        Self {
            items,
            terms,
            principals,
        }
    }

    /// Three fresh in-memory backends.
    pub fn in_memory() -> Self {
        Self::new(
            Box::new(MemoryAttributeBackend::new(AttributeScope::Item)),
            Box::new(MemoryAttributeBackend::new(AttributeScope::Term)),
            Box::new(MemoryAttributeBackend::new(AttributeScope::Principal)),
        )
    }

    /// The backend for `scope`.
    pub fn backend(&self, scope: AttributeScope) -> &dyn AttributeBackend {
        match scope {
            AttributeScope::Item => self.items.as_ref(),
            AttributeScope::Term => self.terms.as_ref(),
            AttributeScope::Principal => self.principals.as_ref(),
        }
    }

    pub fn get(&self, scope: AttributeScope, id: u64, key: &str) -> DbResult<Option<Value>> {
        self.backend(scope).get(id, key)
    }

    pub fn set(&self, scope: AttributeScope, id: u64, key: &str, value: Value) -> DbResult<()> {
        self.backend(scope).set(id, key, value)
    }

    pub fn delete(&self, scope: AttributeScope, id: u64, key: &str) -> DbResult<bool> {
        self.backend(scope).delete(id, key)
    }

    pub fn ids_with_key(&self, scope: AttributeScope, key: &str) -> DbResult<Vec<u64>> {
        self.backend(scope).ids_with_key(key)
    }

    /// Flush every backend.
    pub fn flush(&self) -> DbResult<()> {
        for scope in AttributeScope::ALL {
            self.backend(scope).flush()?;
        }
        Ok(())
    }
}

/// Open the attribute stores described by `config`.
///
/// # Errors
///
/// Returns [`DbError::Config`] when a file backend has no path, or an I/O /
/// parse error when an existing data file cannot be loaded.
pub fn open_attribute_stores(config: &AttributeStoreConfig) -> DbResult<AttributeStores> {
    match config.backend {
        AttributeBackendKind::Memory => Ok(AttributeStores::in_memory()),
        AttributeBackendKind::File => {
            let dir = config
                .path
                .as_ref()
                .ok_or_else(|| DbError::config("file backend requires a data directory"))?;
            std::fs::create_dir_all(dir)
                .map_err(|e| DbError::attribute_io(dir, format!("Failed to create directory: {}", e)))?;

            Ok(AttributeStores::new(
                Box::new(JsonlAttributeBackend::open(dir, AttributeScope::Item)?),
                Box::new(JsonlAttributeBackend::open(dir, AttributeScope::Term)?),
                Box::new(JsonlAttributeBackend::open(dir, AttributeScope::Principal)?),
            ))
        }
    }
}
