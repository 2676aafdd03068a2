//! JSONL file attribute backend.
//!
//! Stores one scope's attributes in `<dir>/<scope>.jsonl`, one
//! `{"id", "key", "value"}` record per line. The file is loaded into memory on
//! open and rewritten after every change, which keeps the format trivially
//! inspectable and is plenty for the small attribute sets this tool manages.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::memory::MemoryAttributeBackend;
use super::{AttributeBackend, AttributeScope};
use crate::error::{DbError, DbResult};

/// A single stored attribute record.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredAttribute {
    id: u64,
    key: String,
    value: Value,
}

/// File-backed attribute store for one scope.
pub struct JsonlAttributeBackend {
    path: PathBuf,
    inner: MemoryAttributeBackend,
}

impl JsonlAttributeBackend {
    /// Open or create the data file for `scope` inside `dir`.
    pub fn open(dir: &Path, scope: AttributeScope) -> DbResult<Self> {
        let path = dir.join(format!("{}.jsonl", scope.as_str()));
        debug!("Opening JsonlAttributeBackend at {:?}", path);

        let rows = if path.exists() {
            Self::load_from_file(&path)?
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            inner: MemoryAttributeBackend::with_rows(scope, rows),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_from_file(path: &Path) -> DbResult<HashMap<u64, BTreeMap<String, Value>>> {
        let file = File::open(path)
            .map_err(|e| DbError::attribute_io(path, format!("Failed to open: {}", e)))?;
        let reader = BufReader::new(file);

        let mut rows: HashMap<u64, BTreeMap<String, Value>> = HashMap::new();
        let mut loaded = 0usize;
        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<StoredAttribute>(&line) {
                Ok(stored) => {
                    rows.entry(stored.id)
                        .or_default()
                        .insert(stored.key, stored.value);
                    loaded += 1;
                }
                Err(e) => {
                    debug!("Skipping invalid line {} in {:?}: {}", line_num + 1, path, e);
                }
            }
        }

        debug!("Loaded {} attributes from {:?}", loaded, path);
        Ok(rows)
    }

    fn save_to_file(&self) -> DbResult<()> {
        let entries = self.inner.entries()?;

        let mut file = File::create(&self.path)
            .map_err(|e| DbError::attribute_io(&self.path, format!("Failed to create: {}", e)))?;
        for (id, key, value) in entries {
            let line = serde_json::to_string(&StoredAttribute { id, key, value })?;
            writeln!(file, "{}", line)?;
        }
        Ok(())
    }
}

impl AttributeBackend for JsonlAttributeBackend {
    fn get(&self, id: u64, key: &str) -> DbResult<Option<Value>> {
        self.inner.get(id, key)
    }

    fn set(&self, id: u64, key: &str, value: Value) -> DbResult<()> {
        self.inner.set(id, key, value)?;
        self.save_to_file()
    }

    fn delete(&self, id: u64, key: &str) -> DbResult<bool> {
        let removed = self.inner.delete(id, key)?;
        if removed {
            self.save_to_file()?;
        }
        Ok(removed)
    }

    fn ids_with_key(&self, key: &str) -> DbResult<Vec<u64>> {
        self.inner.ids_with_key(key)
    }

    fn flush(&self) -> DbResult<()> {
        self.save_to_file()
    }
}
