//! In-memory attribute backend.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use serde_json::Value;
use tracing::trace;

use super::{AttributeBackend, AttributeScope};
use crate::error::{DbError, DbResult};

type Rows = HashMap<u64, BTreeMap<String, Value>>;

/// Attribute backend that keeps everything in process memory.
pub struct MemoryAttributeBackend {
    scope: AttributeScope,
    rows: RwLock<Rows>,
}

impl MemoryAttributeBackend {
    pub fn new(scope: AttributeScope) -> Self {
        Self {
            scope,
            rows: RwLock::new(HashMap::new()),
        }
    }

    /// Seed the backend from existing rows (used when loading from disk).
    pub(crate) fn with_rows(scope: AttributeScope, rows: Rows) -> Self {
        Self {
            scope,
            rows: RwLock::new(rows),
        }
    }

    /// Snapshot every `(id, key, value)` triple, ordered by id then key.
    pub(crate) fn entries(&self) -> DbResult<Vec<(u64, String, Value)>> {
        let rows = self
            .rows
            .read()
            .map_err(|e| DbError::internal(format!("Failed to acquire read lock: {}", e)))?;

        let mut ids: Vec<_> = rows.keys().copied().collect();
        ids.sort_unstable();

        let mut out = Vec::new();
        for id in ids {
            if let Some(attrs) = rows.get(&id) {
                for (key, value) in attrs {
                    out.push((id, key.clone(), value.clone()));
                }
            }
        }
        Ok(out)
    }
}

impl AttributeBackend for MemoryAttributeBackend {
    fn get(&self, id: u64, key: &str) -> DbResult<Option<Value>> {
        let rows = self
            .rows
            .read()
            .map_err(|e| DbError::internal(format!("Failed to acquire read lock: {}", e)))?;
        Ok(rows.get(&id).and_then(|attrs| attrs.get(key)).cloned())
    }

    fn set(&self, id: u64, key: &str, value: Value) -> DbResult<()> {
        trace!("{}#{} set {}", self.scope, id, key);
        let mut rows = self
            .rows
            .write()
            .map_err(|e| DbError::internal(format!("Failed to acquire write lock: {}", e)))?;
        rows.entry(id).or_default().insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&self, id: u64, key: &str) -> DbResult<bool> {
        trace!("{}#{} delete {}", self.scope, id, key);
        let mut rows = self
            .rows
            .write()
            .map_err(|e| DbError::internal(format!("Failed to acquire write lock: {}", e)))?;

        let Some(attrs) = rows.get_mut(&id) else {
            return Ok(false);
        };
        let removed = attrs.remove(key).is_some();
        if attrs.is_empty() {
            rows.remove(&id);
        }
        Ok(removed)
    }

    fn ids_with_key(&self, key: &str) -> DbResult<Vec<u64>> {
        let rows = self
            .rows
            .read()
            .map_err(|e| DbError::internal(format!("Failed to acquire read lock: {}", e)))?;
        let mut ids: Vec<u64> = rows
            .iter()
            .filter(|(_, attrs)| attrs.contains_key(key))
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    fn flush(&self) -> DbResult<()> {
        Ok(())
    }
}
