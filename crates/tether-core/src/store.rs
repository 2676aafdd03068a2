//! Connection store: forward and reverse edge persistence.
//!
//! Every edge is written twice. The source holds the forward list under
//! `_conn_<name>`: an ordered, duplicate-free list of `{id, type}` tuples. For
//! bidirectional types the target also holds a reverse list under
//! `_conn_<name>_rev`: the plain ids of every source pointing at it.
//!
//! The two views live in different attribute rows and are updated one after
//! the other without a transaction. Each list is read, changed in memory and
//! written back whole; concurrent writers to the same list race and the last
//! write wins.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::constants::{CONNECTION_KEY_PREFIX, PRINCIPAL_SUBTYPE, REVERSE_KEY_SUFFIX};
use crate::directory::EntityDirectory;
use crate::errors::TetherError;
use crate::events::{ConnectionAction, ConnectionEvent, ConnectionListener, EventBus};
use crate::legacy::{decode_entries, decode_id_list, normalize_entries, Normalized};
use crate::registry::{ConnectionRegistry, ConnectionSchema};
use crate::types::{AttributeStore, ConnectionTuple, EntityId, EntityKind, EntityRef};

/// Attribute key of the forward list for a connection type.
pub fn forward_key(name: &str) -> String {
    format!("{}{}", CONNECTION_KEY_PREFIX, name)
}

/// Attribute key of the reverse list for a connection type.
pub fn reverse_key(name: &str) -> String {
    format!("{}{}{}", CONNECTION_KEY_PREFIX, name, REVERSE_KEY_SUFFIX)
}

/// What [`ConnectionStore::cleanup_on_delete`] touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupSummary {
    /// Reverse lists the deleted entity was stripped from.
    pub reverse_entries_removed: usize,
    /// Forward edges of other entities that pointed at the deleted entity.
    pub forward_edges_removed: usize,
}

impl CleanupSummary {
    pub fn is_empty(&self) -> bool {
        self.reverse_entries_removed == 0 && self.forward_edges_removed == 0
    }
}

/// Reads and writes connection lists through an [`AttributeStore`].
pub struct ConnectionStore {
    registry: Arc<ConnectionRegistry>,
    attributes: Arc<dyn AttributeStore>,
    directory: Arc<dyn EntityDirectory>,
    events: EventBus,
}

impl ConnectionStore {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        attributes: Arc<dyn AttributeStore>,
        directory: Arc<dyn EntityDirectory>,
    ) -> Self {
        Self {
            registry,
            attributes,
            directory,
            events: EventBus::new(),
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn directory(&self) -> &dyn EntityDirectory {
        self.directory.as_ref()
    }

    pub fn attributes(&self) -> &dyn AttributeStore {
        self.attributes.as_ref()
    }

    /// Register a listener for edge changes.
    pub fn subscribe(&self, listener: Arc<dyn ConnectionListener>) {
        self.events.subscribe(listener);
    }

    /// Entity kind a target subtype lives in.
    ///
    /// `"principal"` is a principal, a known taxonomy name is a taxonomy
    /// node, anything else a content item.
    pub fn target_kind(&self, subtype: &str) -> EntityKind {
        if subtype == PRINCIPAL_SUBTYPE {
            EntityKind::Principal
        } else if self.directory.is_taxonomy(subtype) {
            EntityKind::Term
        } else {
            EntityKind::Item
        }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Normalized forward list stored under `key`.
    pub(crate) fn read_entries(&self, kind: EntityKind, id: EntityId, key: &str) -> Result<Normalized, TetherError> {
        match self.attributes.get(kind, id, key)? {
            Some(raw) => Ok(normalize_entries(decode_entries(&raw), self.directory.as_ref())),
            None => Ok(Normalized::default()),
        }
    }

    /// Raw id list stored under `key`.
    pub(crate) fn read_ids(&self, kind: EntityKind, id: EntityId, key: &str) -> Result<Vec<EntityId>, TetherError> {
        Ok(self
            .attributes
            .get(kind, id, key)?
            .map(|raw| decode_id_list(&raw))
            .unwrap_or_default())
    }

    /// Forward tuples of an entity, in display order.
    pub fn get_connections(&self, kind: EntityKind, id: EntityId, name: &str) -> Result<Vec<ConnectionTuple>, TetherError> {
        if id == 0 {
            return Ok(Vec::new());
        }
        Ok(self.read_entries(kind, id, &forward_key(name))?.tuples)
    }

    /// Ids of the entities pointing at this one.
    pub fn get_reverse_connections(&self, kind: EntityKind, id: EntityId, name: &str) -> Result<Vec<EntityId>, TetherError> {
        if id == 0 {
            return Ok(Vec::new());
        }
        self.read_ids(kind, id, &reverse_key(name))
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Add one edge.
    ///
    /// Returns `false` for a zero id, an unknown type or a self-connection,
    /// and `true` when the edge exists afterwards (including when it already
    /// did).
    pub fn add_connection(
        &self,
        source: EntityRef,
        target_subtype: &str,
        target_id: EntityId,
        name: &str,
        bidirectional: bool,
    ) -> Result<bool, TetherError> {
        if source.id == 0 || target_id == 0 {
            return Ok(false);
        }
        let Some(schema) = self.registry.get(name) else {
            debug!("add_connection: unknown connection type `{}`", name);
            return Ok(false);
        };
        if self.is_self_connection(schema, source, target_subtype, target_id) {
            debug!("add_connection: refusing self-connection of {} under `{}`", source, name);
            return Ok(false);
        }

        let mut tuples = self.get_connections(source.kind, source.id, name)?;
        if tuples.iter().any(|t| t.is(target_id, target_subtype)) {
            return Ok(true);
        }
        tuples.push(ConnectionTuple::new(target_id, target_subtype));
        self.write_forward(source, name, &tuples)?;

        if bidirectional {
            let target_kind = self.target_kind(target_subtype);
            self.add_reverse(target_kind, target_id, source.id, name)?;
        }

        self.events.emit(ConnectionEvent::new(
            ConnectionAction::Added,
            source,
            target_id,
            target_subtype,
            name,
        ));
        Ok(true)
    }

    /// Remove one edge. Removing an absent edge succeeds and writes nothing.
    pub fn remove_connection(
        &self,
        source: EntityRef,
        target_subtype: &str,
        target_id: EntityId,
        name: &str,
        bidirectional: bool,
    ) -> Result<bool, TetherError> {
        if source.id == 0 || target_id == 0 {
            return Ok(false);
        }
        if !self.registry.exists(name) {
            debug!("remove_connection: unknown connection type `{}`", name);
            return Ok(false);
        }

        let tuples = self.get_connections(source.kind, source.id, name)?;
        let before = tuples.len();
        let remaining: Vec<ConnectionTuple> = tuples
            .into_iter()
            .filter(|t| !t.is(target_id, target_subtype))
            .collect();
        let removed = remaining.len() != before;
        if removed {
            self.write_forward(source, name, &remaining)?;
        }

        if bidirectional {
            let target_kind = self.target_kind(target_subtype);
            if !self.still_points_at(&remaining, target_kind, target_id) {
                self.remove_reverse(target_kind, target_id, source.id, name)?;
            }
        }

        if removed {
            self.events.emit(ConnectionEvent::new(
                ConnectionAction::Removed,
                source,
                target_id,
                target_subtype,
                name,
            ));
        }
        Ok(true)
    }

    /// Replace an entity's forward list.
    ///
    /// Only tuples that appear or disappear get their reverse list touched.
    /// The new list is deduplicated (first occurrence wins); zero ids and
    /// self-connections are dropped. The forward list is written once.
    pub fn set_connections(
        &self,
        source: EntityRef,
        new_tuples: &[ConnectionTuple],
        name: &str,
    ) -> Result<bool, TetherError> {
        if source.id == 0 {
            return Ok(false);
        }
        let Some(schema) = self.registry.get(name) else {
            debug!("set_connections: unknown connection type `{}`", name);
            return Ok(false);
        };

        let mut desired: Vec<ConnectionTuple> = Vec::with_capacity(new_tuples.len());
        for tuple in new_tuples {
            if tuple.id == 0
                || desired.contains(tuple)
                || self.is_self_connection(schema, source, &tuple.subtype, tuple.id)
            {
                continue;
            }
            desired.push(tuple.clone());
        }

        let current = self.get_connections(source.kind, source.id, name)?;
        let dropped: Vec<&ConnectionTuple> = current.iter().filter(|t| !desired.contains(t)).collect();
        let added: Vec<&ConnectionTuple> = desired.iter().filter(|t| !current.contains(t)).collect();
        debug!(
            "set_connections {} `{}`: {} kept, {} removed, {} added",
            source,
            name,
            desired.len() - added.len(),
            dropped.len(),
            added.len()
        );

        if schema.bidirectional {
            for tuple in &dropped {
                let kind = self.target_kind(&tuple.subtype);
                if !self.still_points_at(&desired, kind, tuple.id) {
                    self.remove_reverse(kind, tuple.id, source.id, name)?;
                }
            }
            for tuple in &added {
                let kind = self.target_kind(&tuple.subtype);
                self.add_reverse(kind, tuple.id, source.id, name)?;
            }
        }

        self.write_forward(source, name, &desired)?;

        for tuple in dropped {
            self.events.emit(ConnectionEvent::new(
                ConnectionAction::Removed,
                source,
                tuple.id,
                &tuple.subtype,
                name,
            ));
        }
        for tuple in added {
            self.events.emit(ConnectionEvent::new(
                ConnectionAction::Added,
                source,
                tuple.id,
                &tuple.subtype,
                name,
            ));
        }
        Ok(true)
    }

    /// Remove every edge of type `name` that touches a deleted entity.
    ///
    /// Runs in two passes: the entity's own targets forget it in their
    /// reverse lists, then every source listed in its reverse list drops the
    /// edges pointing at it. Finally the entity's own lists are deleted.
    /// Only bidirectional types keep the reverse lists this relies on; other
    /// types are left alone.
    pub fn cleanup_on_delete(&self, entity: EntityRef, name: &str) -> Result<CleanupSummary, TetherError> {
        let mut summary = CleanupSummary::default();
        if entity.id == 0 {
            return Ok(summary);
        }
        let Some(schema) = self.registry.get(name) else {
            return Ok(summary);
        };
        if !schema.bidirectional {
            return Ok(summary);
        }

        for tuple in self.get_connections(entity.kind, entity.id, name)? {
            let kind = self.target_kind(&tuple.subtype);
            if self.remove_reverse(kind, tuple.id, entity.id, name)? {
                summary.reverse_entries_removed += 1;
            }
            self.events.emit(ConnectionEvent::new(
                ConnectionAction::Removed,
                entity,
                tuple.id,
                &tuple.subtype,
                name,
            ));
        }

        let source_kind = schema.from_kind;
        for source_id in self.get_reverse_connections(entity.kind, entity.id, name)? {
            let source = EntityRef::new(source_kind, source_id);
            let tuples = self.get_connections(source_kind, source_id, name)?;
            let (gone, kept): (Vec<ConnectionTuple>, Vec<ConnectionTuple>) = tuples
                .into_iter()
                .partition(|t| t.id == entity.id && self.target_kind(&t.subtype) == entity.kind);
            if gone.is_empty() {
                continue;
            }
            self.write_forward(source, name, &kept)?;
            summary.forward_edges_removed += gone.len();
            for tuple in gone {
                self.events.emit(ConnectionEvent::new(
                    ConnectionAction::Removed,
                    source,
                    tuple.id,
                    &tuple.subtype,
                    name,
                ));
            }
        }

        self.attributes.delete(entity.kind, entity.id, &forward_key(name))?;
        self.attributes.delete(entity.kind, entity.id, &reverse_key(name))?;

        debug!(
            "Cleaned up {} under `{}`: {} reverse entries, {} forward edges",
            entity, name, summary.reverse_entries_removed, summary.forward_edges_removed
        );
        Ok(summary)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    /// Source and target are the same entity under a same-kind relation.
    fn is_self_connection(
        &self,
        schema: &ConnectionSchema,
        source: EntityRef,
        target_subtype: &str,
        target_id: EntityId,
    ) -> bool {
        source.id == target_id
            && self.target_kind(target_subtype) == source.kind
            && schema.from_subtypes.iter().any(|s| s == target_subtype)
    }

    /// Whether some tuple still targets entity `(kind, id)`.
    ///
    /// Item subtypes share one id space, so `{7, article}` and `{7, page}`
    /// are the same entity and share one reverse entry.
    fn still_points_at(&self, tuples: &[ConnectionTuple], kind: EntityKind, id: EntityId) -> bool {
        tuples
            .iter()
            .any(|t| t.id == id && self.target_kind(&t.subtype) == kind)
    }

    pub(crate) fn write_forward(&self, source: EntityRef, name: &str, tuples: &[ConnectionTuple]) -> Result<(), TetherError> {
        debug!("Writing {} tuples to {} `{}`", tuples.len(), source, name);
        self.attributes.set(
            source.kind,
            source.id,
            &forward_key(name),
            serde_json::to_value(tuples)?,
        )
    }

    pub(crate) fn write_ids(&self, kind: EntityKind, id: EntityId, key: &str, ids: &[EntityId]) -> Result<(), TetherError> {
        self.attributes.set(kind, id, key, Value::from(ids.to_vec()))
    }

    /// Append `source_id` to a reverse list. Returns `false` if already there.
    fn add_reverse(&self, kind: EntityKind, id: EntityId, source_id: EntityId, name: &str) -> Result<bool, TetherError> {
        let key = reverse_key(name);
        let mut ids = self.read_ids(kind, id, &key)?;
        if ids.contains(&source_id) {
            return Ok(false);
        }
        ids.push(source_id);
        self.write_ids(kind, id, &key, &ids)?;
        Ok(true)
    }

    /// Strip `source_id` from a reverse list. Returns `false` if it was absent.
    fn remove_reverse(&self, kind: EntityKind, id: EntityId, source_id: EntityId, name: &str) -> Result<bool, TetherError> {
        let key = reverse_key(name);
        let mut ids = self.read_ids(kind, id, &key)?;
        let before = ids.len();
        ids.retain(|existing| *existing != source_id);
        if ids.len() == before {
            return Ok(false);
        }
        self.write_ids(kind, id, &key, &ids)?;
        Ok(true)
    }
}

impl std::fmt::Debug for ConnectionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionStore")
            .field("connection_types", &self.registry.len())
            .field("events", &self.events)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ConnectionAction;
    use crate::test_support::{Fixture, RecordingListener};
    use serde_json::json;

    fn tuple(id: EntityId, subtype: &str) -> ConnectionTuple {
        ConnectionTuple::new(id, subtype)
    }

    #[test]
    fn test_keys() {
        assert_eq!(forward_key("see_also"), "_conn_see_also");
        assert_eq!(reverse_key("see_also"), "_conn_see_also_rev");
    }

    #[test]
    fn test_scenario_add_then_remove() {
        let fx = Fixture::new();
        let store = fx.store();

        assert!(store
            .add_connection(EntityRef::item(101), "content", 102, "see_also", true)
            .unwrap());
        assert_eq!(
            store.get_connections(EntityKind::Item, 101, "see_also").unwrap(),
            vec![tuple(102, "content")]
        );
        assert_eq!(
            store.get_reverse_connections(EntityKind::Item, 102, "see_also").unwrap(),
            vec![101]
        );
        assert_eq!(
            fx.attributes.raw(EntityKind::Item, 101, "_conn_see_also"),
            Some(json!([{"id": 102, "type": "content"}]))
        );

        assert!(store
            .remove_connection(EntityRef::item(101), "content", 102, "see_also", true)
            .unwrap());
        assert!(store.get_connections(EntityKind::Item, 101, "see_also").unwrap().is_empty());
        assert!(store
            .get_reverse_connections(EntityKind::Item, 102, "see_also")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_add_is_idempotent() {
        let fx = Fixture::new();
        let store = fx.store();

        for _ in 0..2 {
            assert!(store
                .add_connection(EntityRef::item(101), "content", 102, "see_also", true)
                .unwrap());
        }
        assert_eq!(store.get_connections(EntityKind::Item, 101, "see_also").unwrap().len(), 1);
        assert_eq!(
            store.get_reverse_connections(EntityKind::Item, 102, "see_also").unwrap(),
            vec![101]
        );
        assert_eq!(fx.attributes.writes_to(EntityKind::Item, 101, "_conn_see_also"), 1);
    }

    #[test]
    fn test_symmetry_across_kinds() {
        let fx = Fixture::new();
        let store = fx.store();
        let source = EntityRef::item(101);

        store.add_connection(source, "principal", 5, "related_people", true).unwrap();
        store.add_connection(source, "article", 201, "related_people", true).unwrap();
        store.add_connection(EntityRef::item(102), "principal", 5, "related_people", true).unwrap();

        assert_eq!(
            store.get_reverse_connections(EntityKind::Principal, 5, "related_people").unwrap(),
            vec![101, 102]
        );
        assert_eq!(
            store.get_reverse_connections(EntityKind::Item, 201, "related_people").unwrap(),
            vec![101]
        );
        // The principal's reverse list lives in the principal scope only.
        assert!(store
            .get_reverse_connections(EntityKind::Item, 5, "related_people")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_term_targets_resolve_to_term_kind() {
        let fx = Fixture::new();
        let store = fx.store();

        store
            .add_connection(EntityRef::term(30), "category", 31, "category_relations", true)
            .unwrap();
        assert_eq!(store.target_kind("category"), EntityKind::Term);
        assert_eq!(
            store.get_reverse_connections(EntityKind::Term, 31, "category_relations").unwrap(),
            vec![30]
        );
    }

    #[test]
    fn test_self_connection_rejected() {
        let fx = Fixture::new();
        let store = fx.store();

        assert!(!store
            .add_connection(EntityRef::term(30), "category", 30, "category_relations", true)
            .unwrap());
        assert!(!store
            .add_connection(EntityRef::item(101), "content", 101, "see_also", true)
            .unwrap());
        assert!(store
            .get_connections(EntityKind::Term, 30, "category_relations")
            .unwrap()
            .is_empty());
        assert_eq!(fx.attributes.total_writes(), 0);
    }

    #[test]
    fn test_same_id_different_kind_is_allowed() {
        let fx = Fixture::new();
        let store = fx.store();

        // Item 5 and principal 5 are different entities.
        assert!(store
            .add_connection(EntityRef::item(5), "principal", 5, "related_people", true)
            .unwrap());
    }

    #[test]
    fn test_rejects_zero_ids_and_unknown_types() {
        let fx = Fixture::new();
        let store = fx.store();

        assert!(!store.add_connection(EntityRef::item(0), "content", 102, "see_also", true).unwrap());
        assert!(!store.add_connection(EntityRef::item(101), "content", 0, "see_also", true).unwrap());
        assert!(!store.add_connection(EntityRef::item(101), "content", 102, "nope", true).unwrap());
        assert!(!store.remove_connection(EntityRef::item(101), "content", 102, "nope", true).unwrap());
        assert!(!store.set_connections(EntityRef::item(101), &[], "nope").unwrap());
        assert_eq!(fx.attributes.total_writes(), 0);
    }

    #[test]
    fn test_removing_absent_edge_keeps_others() {
        let fx = Fixture::new();
        let store = fx.store();
        let source = EntityRef::item(101);
        store.add_connection(source, "content", 102, "see_also", true).unwrap();
        store.add_connection(source, "content", 103, "see_also", true).unwrap();

        assert!(store.remove_connection(source, "content", 999, "see_also", true).unwrap());
        // Same id, different subtype is a different edge.
        assert!(store.remove_connection(source, "article", 102, "see_also", true).unwrap());

        assert_eq!(
            store.get_connections(EntityKind::Item, 101, "see_also").unwrap(),
            vec![tuple(102, "content"), tuple(103, "content")]
        );
        assert_eq!(
            store.get_reverse_connections(EntityKind::Item, 102, "see_also").unwrap(),
            vec![101]
        );
    }

    #[test]
    fn test_remove_keeps_order_without_gaps() {
        let fx = Fixture::new();
        let store = fx.store();
        let source = EntityRef::item(101);
        for id in [102, 103, 201] {
            let subtype = if id > 200 { "article" } else { "content" };
            store.add_connection(source, subtype, id, "see_also", true).unwrap();
        }

        store.remove_connection(source, "content", 103, "see_also", true).unwrap();
        assert_eq!(
            fx.attributes.raw(EntityKind::Item, 101, "_conn_see_also"),
            Some(json!([{"id": 102, "type": "content"}, {"id": 201, "type": "article"}]))
        );
    }

    #[test]
    fn test_set_connections_diffs() {
        let fx = Fixture::new();
        let store = fx.store();
        let source = EntityRef::item(101);
        let (a, b, c) = (tuple(102, "content"), tuple(103, "content"), tuple(201, "article"));

        store.set_connections(source, &[a.clone(), b.clone()], "see_also").unwrap();
        fx.attributes.reset();

        assert!(store.set_connections(source, &[b.clone(), c.clone()], "see_also").unwrap());

        assert_eq!(store.get_connections(EntityKind::Item, 101, "see_also").unwrap(), vec![b, c]);
        assert!(!store
            .get_reverse_connections(EntityKind::Item, 102, "see_also")
            .unwrap()
            .contains(&101));
        assert!(store
            .get_reverse_connections(EntityKind::Item, 201, "see_also")
            .unwrap()
            .contains(&101));
        assert_eq!(fx.attributes.writes_to(EntityKind::Item, 103, "_conn_see_also_rev"), 0);
        assert_eq!(fx.attributes.writes_to(EntityKind::Item, 101, "_conn_see_also"), 1);
        assert_eq!(fx.attributes.total_writes(), 3);
    }

    #[test]
    fn test_set_connections_dedupes_and_drops_invalid() {
        let fx = Fixture::new();
        let store = fx.store();
        let source = EntityRef::item(101);

        store
            .set_connections(
                source,
                &[
                    tuple(102, "content"),
                    tuple(0, "content"),
                    tuple(102, "content"),
                    tuple(101, "content"),
                ],
                "see_also",
            )
            .unwrap();

        assert_eq!(
            store.get_connections(EntityKind::Item, 101, "see_also").unwrap(),
            vec![tuple(102, "content")]
        );
        assert_eq!(
            store.get_reverse_connections(EntityKind::Item, 102, "see_also").unwrap(),
            vec![101]
        );
    }

    #[test]
    fn test_unidirectional_type_keeps_no_reverse() {
        let fx = Fixture::new();
        let store = fx.store();

        store
            .add_connection(EntityRef::term(30), "principal", 5, "term_owners", false)
            .unwrap();
        assert!(store
            .get_reverse_connections(EntityKind::Principal, 5, "term_owners")
            .unwrap()
            .is_empty());

        store
            .set_connections(EntityRef::term(30), &[tuple(6, "principal")], "term_owners")
            .unwrap();
        assert_eq!(fx.attributes.writes_to(EntityKind::Principal, 6, "_conn_term_owners_rev"), 0);
        // Nothing to clean for one-way types.
        assert!(store
            .cleanup_on_delete(EntityRef::term(30), "term_owners")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_cleanup_on_delete_both_passes() {
        let fx = Fixture::new();
        let store = fx.store();

        // 101 -> 102, 101 -> 103, 102 -> 101, 103 -> 102
        store.add_connection(EntityRef::item(101), "content", 102, "see_also", true).unwrap();
        store.add_connection(EntityRef::item(101), "content", 103, "see_also", true).unwrap();
        store.add_connection(EntityRef::item(102), "content", 101, "see_also", true).unwrap();
        store.add_connection(EntityRef::item(103), "content", 102, "see_also", true).unwrap();

        let summary = store.cleanup_on_delete(EntityRef::item(101), "see_also").unwrap();
        assert_eq!(summary.reverse_entries_removed, 2);
        assert_eq!(summary.forward_edges_removed, 1);

        // Pass 1: targets no longer list 101 as a source.
        assert!(!store
            .get_reverse_connections(EntityKind::Item, 102, "see_also")
            .unwrap()
            .contains(&101));
        assert!(store
            .get_reverse_connections(EntityKind::Item, 103, "see_also")
            .unwrap()
            .is_empty());
        // Pass 2: sources no longer point at 101.
        assert!(store.get_connections(EntityKind::Item, 102, "see_also").unwrap().is_empty());
        // Unrelated edges survive.
        assert_eq!(
            store.get_connections(EntityKind::Item, 103, "see_also").unwrap(),
            vec![tuple(102, "content")]
        );
        assert_eq!(
            store.get_reverse_connections(EntityKind::Item, 102, "see_also").unwrap(),
            vec![103]
        );
        // The deleted entity's own lists are gone.
        assert_eq!(fx.attributes.raw(EntityKind::Item, 101, "_conn_see_also"), None);
        assert_eq!(fx.attributes.raw(EntityKind::Item, 101, "_conn_see_also_rev"), None);
    }

    #[test]
    fn test_cleanup_of_target_only_entity() {
        let fx = Fixture::new();
        let store = fx.store();

        store.add_connection(EntityRef::item(101), "principal", 5, "related_people", true).unwrap();
        store.add_connection(EntityRef::item(101), "content", 5, "related_people", true).unwrap();

        let summary = store
            .cleanup_on_delete(EntityRef::principal(5), "related_people")
            .unwrap();
        assert_eq!(summary.forward_edges_removed, 1);
        // Only the principal edge goes; the item with the same id stays.
        assert_eq!(
            store.get_connections(EntityKind::Item, 101, "related_people").unwrap(),
            vec![tuple(5, "content")]
        );
    }

    #[test]
    fn test_legacy_bare_ids_normalized_on_read() {
        let fx = Fixture::new();
        let store = fx.store();
        fx.attributes
            .set(EntityKind::Item, 101, "_conn_related_people", json!([5, "201", 999]))
            .unwrap();

        assert_eq!(
            store.get_connections(EntityKind::Item, 101, "related_people").unwrap(),
            vec![tuple(5, "principal"), tuple(201, "article")]
        );
    }

    #[test]
    fn test_events_emitted_for_changes_only() {
        let fx = Fixture::new();
        let store = fx.store();
        let listener = Arc::new(RecordingListener::default());
        store.subscribe(listener.clone());
        let source = EntityRef::item(101);

        store.add_connection(source, "content", 102, "see_also", true).unwrap();
        store.add_connection(source, "content", 102, "see_also", true).unwrap();
        store.remove_connection(source, "content", 999, "see_also", true).unwrap();
        store.set_connections(source, &[tuple(103, "content")], "see_also").unwrap();

        let actions: Vec<_> = listener
            .events()
            .iter()
            .map(|e| (e.action, e.target_id))
            .collect();
        assert_eq!(
            actions,
            vec![
                (ConnectionAction::Added, 102),
                (ConnectionAction::Removed, 102),
                (ConnectionAction::Added, 103),
            ]
        );
    }
}
