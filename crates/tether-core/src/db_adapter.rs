//! Adapter layer for tether-db infrastructure.
//!
//! Bridges the tether-db attribute backends with tether-core's domain types:
//!
//! - Error conversion from `DbError` to `TetherError`
//! - `AttributeStore` implemented for `tether_db::AttributeStores`
//!
//! ```text
//! tether-core domain code (store, migrate, facade)
//!        ↓
//!   db_adapter (this module)
//!        ↓
//!     tether-db backends (memory, JSONL files)
//! ```

use serde_json::Value;

use crate::errors::TetherError;
use crate::types::{AttributeStore, EntityId, EntityKind};

// ============================================================================
// Error Conversion
// ============================================================================

/// Convert a tether-db error to a tether-core error.
pub fn from_db_error(err: tether_db::DbError) -> TetherError {
    use tether_db::DbError;

    match err {
        DbError::Io(io_err) => TetherError::Io(io_err),
        DbError::Json(json_err) => TetherError::Json(json_err),
        DbError::AttributeIo { path, message } => TetherError::AttributeStoreIo { path, message },
        DbError::AttributeParse { path, message } => {
            TetherError::AttributeStoreParse { path, message }
        }
        DbError::Config { message } => TetherError::InvalidConfiguration {
            message,
            hint: "Check the `storage` section of the tether config".to_string(),
        },
        DbError::Internal { message } => TetherError::AttributeStore(message),
    }
}

/// Extension trait for converting `DbResult` to `Result<T, TetherError>`.
pub trait IntoTetherResult<T> {
    fn into_tether_result(self) -> Result<T, TetherError>;
}

impl<T> IntoTetherResult<T> for tether_db::DbResult<T> {
    fn into_tether_result(self) -> Result<T, TetherError> {
        self.map_err(from_db_error)
    }
}

// ============================================================================
// AttributeStore for AttributeStores
// ============================================================================

impl AttributeStore for tether_db::AttributeStores {
    fn get(&self, kind: EntityKind, id: EntityId, key: &str) -> Result<Option<Value>, TetherError> {
        tether_db::AttributeStores::get(self, kind.scope(), id, key).into_tether_result()
    }

    fn set(&self, kind: EntityKind, id: EntityId, key: &str, value: Value) -> Result<(), TetherError> {
        tether_db::AttributeStores::set(self, kind.scope(), id, key, value).into_tether_result()
    }

    fn delete(&self, kind: EntityKind, id: EntityId, key: &str) -> Result<bool, TetherError> {
        tether_db::AttributeStores::delete(self, kind.scope(), id, key).into_tether_result()
    }

    fn ids_with_key(&self, kind: EntityKind, key: &str) -> Result<Vec<EntityId>, TetherError> {
        tether_db::AttributeStores::ids_with_key(self, kind.scope(), key).into_tether_result()
    }

    fn flush(&self) -> Result<(), TetherError> {
        tether_db::AttributeStores::flush(self).into_tether_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;
    use tether_db::{AttributeStores, DbError};

    #[test]
    fn test_from_db_error_keeps_paths() {
        let err = from_db_error(DbError::attribute_io(PathBuf::from("/tmp/item.jsonl"), "denied"));
        match err {
            TetherError::AttributeStoreIo { path, message } => {
                assert_eq!(path, PathBuf::from("/tmp/item.jsonl"));
                assert_eq!(message, "denied");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_config_error_carries_hint() {
        let err = from_db_error(DbError::config("missing path"));
        assert!(err.to_string().contains("storage"));
    }

    #[test]
    fn test_stores_route_by_kind() {
        let stores = AttributeStores::in_memory();
        let store: &dyn AttributeStore = &stores;

        store
            .set(EntityKind::Term, 30, "_conn_x", json!([{"id": 1, "type": "post"}]))
            .unwrap();

        assert!(store.get(EntityKind::Item, 30, "_conn_x").unwrap().is_none());
        assert!(store.get(EntityKind::Term, 30, "_conn_x").unwrap().is_some());
        assert_eq!(store.ids_with_key(EntityKind::Term, "_conn_x").unwrap(), vec![30]);
        assert!(store.delete(EntityKind::Term, 30, "_conn_x").unwrap());
        assert!(!store.delete(EntityKind::Term, 30, "_conn_x").unwrap());
    }
}
