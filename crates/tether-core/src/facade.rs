//! The `Connections` facade.
//!
//! One entry point over the registry, store and manager for hosts that just
//! want answers. Storage failures never escape from here: they are logged
//! with `warn!` and turn into `false` or an empty result. Callers that need
//! the error use [`Connections::store`] directly.

use std::sync::Arc;

use tether_db::open_attribute_stores;
use tracing::{debug, info, warn};

use crate::cleanup::{CleanupHook, DeletionEvent, DeletionHooks};
use crate::config::TetherConfig;
use crate::db_adapter::IntoTetherResult;
use crate::directory::{EntityDirectory, MemoryDirectory};
use crate::errors::TetherError;
use crate::events::ConnectionListener;
use crate::manager::{ConnectionManager, SearchSettings, SearchableTypes};
use crate::registry::ConnectionRegistry;
use crate::store::{CleanupSummary, ConnectionStore};
use crate::types::{AttributeStore, ConnectionTuple, EntityId, EntityKind, EntityRef, EntitySummary};

pub struct Connections {
    store: Arc<ConnectionStore>,
    manager: ConnectionManager,
    hooks: DeletionHooks,
}

impl Connections {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        attributes: Arc<dyn AttributeStore>,
        directory: Arc<dyn EntityDirectory>,
        settings: SearchSettings,
    ) -> Self {
        let store = Arc::new(ConnectionStore::new(registry, attributes, directory));
        let manager = ConnectionManager::new(store.clone(), settings);
        Self {
            store,
            manager,
            hooks: DeletionHooks::new(),
        }
    }

    /// Open storage, load the directory snapshot and register every
    /// configured connection type along with its cleanup hook.
    pub fn from_config(config: &TetherConfig) -> Result<Self, TetherError> {
        let store_config = config.storage.to_store_config();
        let attributes = open_attribute_stores(&store_config).into_tether_result()?;

        let directory = match &config.directory {
            Some(path) if path.exists() => MemoryDirectory::from_path(path)?,
            Some(path) => {
                warn!("Directory snapshot {} not found, starting empty", path.display());
                MemoryDirectory::new()
            }
            None => MemoryDirectory::new(),
        };

        let connections = Self::new(
            Arc::new(config.registry()),
            Arc::new(attributes),
            Arc::new(directory),
            config.search,
        );
        let names: Vec<String> = connections
            .registry()
            .get_all()
            .map(|schema| schema.name.clone())
            .collect();
        for name in &names {
            connections.register_connection_cleanup(name);
        }
        info!(
            "Opened {} connection types ({:?} storage)",
            names.len(),
            store_config.backend
        );
        Ok(connections)
    }

    pub fn store(&self) -> &ConnectionStore {
        &self.store
    }

    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        self.store.registry()
    }

    pub fn hooks(&self) -> &DeletionHooks {
        &self.hooks
    }

    pub fn subscribe(&self, listener: Arc<dyn ConnectionListener>) {
        self.store.subscribe(listener);
    }

    /// Persist buffered attribute changes.
    pub fn flush(&self) -> Result<(), TetherError> {
        self.store.attributes().flush()
    }

    /// Registered direction of a type; unknown types count as bidirectional.
    fn is_bidirectional(&self, name: &str) -> bool {
        self.registry()
            .get(name)
            .map(|schema| schema.bidirectional)
            .unwrap_or(true)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn get_connections(&self, kind: EntityKind, id: EntityId, name: &str) -> Vec<ConnectionTuple> {
        self.store
            .get_connections(kind, id, name)
            .unwrap_or_else(|e| degrade("get_connections", name, e))
    }

    pub fn get_connections_full(&self, kind: EntityKind, id: EntityId, name: &str) -> Vec<EntitySummary> {
        self.manager
            .get_connections_full(kind, id, name)
            .unwrap_or_else(|e| degrade("get_connections_full", name, e))
    }

    pub fn get_reverse_connections(&self, kind: EntityKind, id: EntityId, name: &str) -> Vec<EntityId> {
        self.store
            .get_reverse_connections(kind, id, name)
            .unwrap_or_else(|e| degrade("get_reverse_connections", name, e))
    }

    pub fn get_reverse_connections_full(&self, kind: EntityKind, id: EntityId, name: &str) -> Vec<EntitySummary> {
        self.manager
            .get_reverse_connections_full(kind, id, name)
            .unwrap_or_else(|e| degrade("get_reverse_connections_full", name, e))
    }

    pub fn search_connectable(
        &self,
        name: &str,
        query: &str,
        type_filter: Option<&str>,
        exclude_id: EntityId,
        limit: Option<usize>,
    ) -> Vec<EntitySummary> {
        self.manager
            .search_connectable(name, query, type_filter, exclude_id, limit)
    }

    pub fn get_searchable_types(&self, name: &str) -> SearchableTypes {
        self.manager.get_searchable_types(name)
    }

    /// Whether `source` holds the tuple `(target_id, target_subtype)`.
    pub fn are_connected(&self, source: EntityRef, target_subtype: &str, target_id: EntityId, name: &str) -> bool {
        self.get_connections(source.kind, source.id, name)
            .iter()
            .any(|t| t.is(target_id, target_subtype))
    }

    /// Number of stored forward tuples, whether or not they still resolve.
    pub fn connection_count(&self, source: EntityRef, name: &str) -> usize {
        self.get_connections(source.kind, source.id, name).len()
    }

    pub fn type_label(&self, subtype: &str) -> String {
        self.manager.get_type_label(subtype)
    }

    /// Display data for one entity, if it can be shown.
    pub fn entity_summary(&self, subtype: &str, id: EntityId) -> Option<EntitySummary> {
        self.manager.entity_summary(subtype, id)
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    pub fn add_connection(&self, source: EntityRef, target_subtype: &str, target_id: EntityId, name: &str) -> bool {
        self.store
            .add_connection(source, target_subtype, target_id, name, self.is_bidirectional(name))
            .unwrap_or_else(|e| degrade("add_connection", name, e))
    }

    pub fn remove_connection(&self, source: EntityRef, target_subtype: &str, target_id: EntityId, name: &str) -> bool {
        self.store
            .remove_connection(source, target_subtype, target_id, name, self.is_bidirectional(name))
            .unwrap_or_else(|e| degrade("remove_connection", name, e))
    }

    pub fn set_connections(&self, source: EntityRef, tuples: &[ConnectionTuple], name: &str) -> bool {
        self.store
            .set_connections(source, tuples, name)
            .unwrap_or_else(|e| degrade("set_connections", name, e))
    }

    // ========================================================================
    // Deletion cleanup
    // ========================================================================

    /// Subscribe connection type `name` to deletions of its source kind.
    ///
    /// Installing twice is harmless: the existing hook is returned. `None`
    /// for unknown types.
    ///
    /// Only source-kind deletions cascade. When a cross-kind target (a
    /// principal behind an item-sourced type, say) is deleted, its tuples stay
    /// stored and `get_connections_full` drops them once the directory no
    /// longer resolves the entity; `are_connected` and `connection_count`
    /// still see them.
    pub fn register_connection_cleanup(&self, name: &str) -> Option<CleanupHook> {
        let schema = self.registry().get(name)?;
        let hook = CleanupHook::for_schema(schema);
        if self.hooks.install(hook.clone()) {
            debug!("Installed {} cleanup for `{}`", hook.trigger, name);
        }
        Some(hook)
    }

    /// Run every installed hook matching a deletion.
    pub fn handle_deletion(&self, event: &DeletionEvent) -> CleanupSummary {
        let mut total = CleanupSummary::default();
        let entity = EntityRef::new(event.kind, event.id);

        for hook in self.hooks.for_kind(event.kind) {
            let subtype = event
                .subtype
                .clone()
                .or_else(|| self.resolve_subtype(event.kind, event.id, &hook));
            if !hook.matches(event.kind, subtype.as_deref()) {
                continue;
            }
            match self.store.cleanup_on_delete(entity, &hook.connection) {
                Ok(summary) => {
                    total.reverse_entries_removed += summary.reverse_entries_removed;
                    total.forward_edges_removed += summary.forward_edges_removed;
                }
                Err(e) => warn!("Cleanup of {} under `{}` failed: {}", entity, hook.connection, e),
            }
        }
        total
    }

    /// Subtype of a deleted entity the host did not name.
    fn resolve_subtype(&self, kind: EntityKind, id: EntityId, hook: &CleanupHook) -> Option<String> {
        let directory = self.store.directory();
        match kind {
            EntityKind::Item => directory.item(id).map(|item| item.item_type),
            EntityKind::Term => hook
                .subtypes
                .iter()
                .find(|taxonomy| directory.term(taxonomy, id).is_some())
                .cloned(),
            EntityKind::Principal => None,
        }
    }
}

impl std::fmt::Debug for Connections {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connections")
            .field("store", &self.store)
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

fn degrade<T: Default>(operation: &str, name: &str, err: TetherError) -> T {
    warn!("{} for `{}` failed: {}", operation, name, err);
    T::default()
}
