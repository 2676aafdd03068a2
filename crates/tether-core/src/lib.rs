//! # tether-core
//!
//! Typed, optionally bidirectional connections between content items,
//! taxonomy nodes and principals.
//!
//! A connection type is a named schema ("see_also", "related_people") saying
//! which kinds and subtypes may be joined. Edges are stored as attributes on
//! the source entity, with an inverse index on the target for bidirectional
//! types, so both "what does this point at" and "who points at this" are a
//! single attribute read.
//!
//! ## Main Types
//!
//! - [`Connections`] – the facade most callers want
//! - [`ConnectionRegistry`] – connection type schemas
//! - [`ConnectionStore`] – forward and reverse edge persistence
//! - [`ConnectionManager`] – enrichment and cross-kind search
//! - [`ConnectionApi`] – request handlers with authorization
//! - [`TetherError`] – domain-specific error type
//!
//! ## Modules
//!
//! - [`config`] – `TetherConfig` loaded from `~/.tether/config.yaml`
//! - [`directory`] – the live entity view (`EntityDirectory`)
//! - [`legacy`] – decoding of old stored layouts
//! - [`cleanup`] – deletion hooks
//! - [`migrate`] – one-shot legacy migration
//!
//! ## Example
//!
//! ```ignore
//! use tether_core::{Connections, EntityKind, EntityRef, TetherConfig};
//!
//! let config = TetherConfig::load_default()?;
//! let connections = Connections::from_config(&config)?;
//!
//! connections.add_connection(EntityRef::item(12), "article", 40, "see_also");
//! for summary in connections.get_connections_full(EntityKind::Item, 12, "see_also") {
//!     println!("{} ({})", summary.title, summary.link);
//! }
//! ```

// Modules
pub mod api;
pub mod cleanup;
pub mod config;
pub mod constants;
pub mod db_adapter;
pub mod directory;
pub mod errors;
pub mod events;
pub mod facade;
pub mod legacy;
pub mod manager;
pub mod migrate;
pub mod registry;
pub mod store;
pub mod types;

#[cfg(test)]
mod test_support;

// Re-exports for convenience
pub use api::{
    AddResponse, AddedTarget, AllowAll, ApiError, Authorizer, ConnectionApi, ConnectionList,
    ConnectionRequest, RemoveResponse, SearchRequest,
};
pub use cleanup::{CleanupHook, DeletionEvent, DeletionHooks, DeletionTrigger};
pub use config::{StorageConfig, TetherConfig};
pub use directory::{
    DirectorySnapshot, EntityDirectory, ItemRecord, ItemStatus, MemoryDirectory, PrincipalRecord,
    SearchQuery, SubtypeLabels, TermRecord,
};
pub use errors::TetherError;
pub use events::{ConnectionAction, ConnectionEvent, ConnectionListener, EventBus, TracingListener};
pub use facade::Connections;
pub use legacy::{disambiguate_bare_id, StoredEntry};
pub use manager::{ConnectionManager, SearchSettings, SearchableTypes, TypeOption};
pub use migrate::{migrate_connections, LegacyKeys, MigrationOptions, MigrationReport};
pub use registry::{
    Cardinality, ConnectionArgs, ConnectionLabels, ConnectionRegistry, ConnectionSchema,
    LabelOverrides, TargetKind,
};
pub use store::{CleanupSummary, ConnectionStore};
pub use types::{AttributeStore, ConnectionTuple, EntityId, EntityKind, EntityRef, EntitySummary};
