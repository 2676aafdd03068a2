//! # tether-db
//!
//! Storage layer for tether - per-kind attribute stores.
//!
//! Every entity kind on the content platform (content items, taxonomy terms,
//! principals) keeps its own key-value attribute storage. This crate gives all
//! three a uniform get/set/delete-by-key surface so that `tether-core` never
//! branches on the kind of storage it is talking to.
//!
//! ## Architecture
//!
//! ```text
//! tether-cli → tether-core → (AttributeStore trait)
//!                   ↑
//!              tether-db (one AttributeBackend per scope)
//! ```
//!
//! ## Backends
//!
//! - `memory`: in-process maps, used by tests and embedders
//! - `file`: one JSONL file per scope, loaded on open and rewritten on change
//!
//! ## Usage
//!
//! ```ignore
//! use tether_db::attributes::{AttributeScope, AttributeStoreConfig, open_attribute_stores};
//!
//! let stores = open_attribute_stores(&AttributeStoreConfig::file("/path/to/data"))?;
//! stores.set(AttributeScope::Item, 42, "_conn_see_also", serde_json::json!([]))?;
//! let value = stores.get(AttributeScope::Item, 42, "_conn_see_also")?;
//! ```

pub mod attributes;
pub mod error;

pub use attributes::{
    open_attribute_stores, AttributeBackend, AttributeBackendKind, AttributeScope,
    AttributeStoreConfig, AttributeStores,
};
pub use error::{DbError, DbResult};
