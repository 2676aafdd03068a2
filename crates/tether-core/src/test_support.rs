//! Shared fixtures for unit tests.

use std::sync::{Arc, Mutex};

use serde_json::Value;
use tether_db::AttributeStores;

use crate::directory::{
    ItemRecord, ItemStatus, MemoryDirectory, PrincipalRecord, SubtypeLabels, TermRecord,
};
use crate::errors::TetherError;
use crate::events::{ConnectionEvent, ConnectionListener};
use crate::registry::{ConnectionArgs, ConnectionRegistry, LabelOverrides, TargetKind};
use crate::store::ConnectionStore;
use crate::types::{AttributeStore, EntityId, EntityKind};

/// Directory with a small, fixed population.
///
/// - items: content 101 "Harbour walk", 102 "Lighthouse", 103 "Old mill",
///   110 (draft); articles 201 "Apple", 202 "Applesauce", 203 "Banana",
///   204 "Annual meeting"
/// - principals: 5 ann, 6 annika, 7 jlie ("Joanna Lie"), 8 bob
/// - category terms: 30 "Beaches", 31 "Boats", 32 "Bathing"; tag 40 "News"
pub fn fixture_directory() -> MemoryDirectory {
    let dir = MemoryDirectory::new();
    dir.add_item_type("content", SubtypeLabels::new("Content", "Content item"));
    dir.add_item_type("article", SubtypeLabels::new("Articles", "Article"));
    dir.add_item_type("page", SubtypeLabels::new("Pages", "Page"));
    dir.add_taxonomy("category", SubtypeLabels::new("Categories", "Category"));
    dir.add_taxonomy("tag", SubtypeLabels::new("Tags", "Tag"));

    dir.insert_item(
        ItemRecord::new(101, "content", "Harbour walk")
            .with_content("A <em>short</em> walk along the old harbour wall past the boats"),
    );
    dir.insert_item(ItemRecord::new(102, "content", "Lighthouse"));
    dir.insert_item(ItemRecord::new(103, "content", "Old mill"));
    dir.insert_item(ItemRecord::new(110, "content", "Unfinished").with_status(ItemStatus::Draft));
    dir.insert_item(ItemRecord::new(201, "article", "Apple"));
    dir.insert_item(ItemRecord::new(202, "article", "Applesauce"));
    dir.insert_item(ItemRecord::new(203, "article", "Banana"));
    dir.insert_item(ItemRecord::new(204, "article", "Annual meeting"));

    dir.insert_principal(PrincipalRecord::new(5, "ann", "Ann Berg"));
    dir.insert_principal(PrincipalRecord::new(6, "annika", "Annika Holm"));
    dir.insert_principal(PrincipalRecord::new(7, "jlie", "Joanna Lie"));
    dir.insert_principal(PrincipalRecord::new(8, "bob", "Bob Stone"));

    let mut beaches = TermRecord::new(30, "category", "Beaches");
    beaches.count = 4;
    beaches.description = "Sandy and rocky beaches around the island".to_string();
    dir.insert_term(beaches);
    dir.insert_term(TermRecord::new(31, "category", "Boats"));
    dir.insert_term(TermRecord::new(32, "category", "Bathing"));
    dir.insert_term(TermRecord::new(40, "tag", "News"));
    dir
}

/// Registry with the connection types used across tests.
///
/// - `see_also`: content/article items to content/article items
/// - `category_relations`: categories to categories
/// - `related_people`: content items to principals and articles
/// - `term_owners`: categories to principals, one-way
pub fn fixture_registry() -> ConnectionRegistry {
    let mut registry = ConnectionRegistry::new();
    registry.register(
        "see_also",
        ConnectionArgs::new(EntityKind::Item, vec!["content", "article"])
            .to(TargetKind::Item, vec!["content", "article"]),
    );
    registry.register(
        "category_relations",
        ConnectionArgs::new(EntityKind::Term, "category").to(TargetKind::Term, "category"),
    );
    registry.register(
        "related_people",
        ConnectionArgs::new(EntityKind::Item, "content")
            .to(TargetKind::Any, vec!["principal", "article"])
            .labels(LabelOverrides {
                title: Some("Related people".to_string()),
                ..LabelOverrides::default()
            }),
    );
    registry.register(
        "term_owners",
        ConnectionArgs::new(EntityKind::Term, "category")
            .to(TargetKind::Principal, "principal")
            .bidirectional(false),
    );
    registry
}

/// Attribute store that records every write.
pub struct CountingAttributes {
    inner: AttributeStores,
    writes: Mutex<Vec<(EntityKind, EntityId, String)>>,
}

impl CountingAttributes {
    pub fn new() -> Self {
        Self {
            inner: AttributeStores::in_memory(),
            writes: Mutex::new(Vec::new()),
        }
    }

    /// Writes (sets and deletes) to one attribute since the last reset.
    pub fn writes_to(&self, kind: EntityKind, id: EntityId, key: &str) -> usize {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, i, key_)| *k == kind && *i == id && key_ == key)
            .count()
    }

    pub fn total_writes(&self) -> usize {
        self.writes.lock().unwrap().len()
    }

    pub fn reset(&self) {
        self.writes.lock().unwrap().clear();
    }

    /// Stored value, bypassing any decoding.
    pub fn raw(&self, kind: EntityKind, id: EntityId, key: &str) -> Option<Value> {
        AttributeStore::get(&self.inner, kind, id, key).unwrap()
    }

    fn record(&self, kind: EntityKind, id: EntityId, key: &str) {
        self.writes.lock().unwrap().push((kind, id, key.to_string()));
    }
}

impl AttributeStore for CountingAttributes {
    fn get(&self, kind: EntityKind, id: EntityId, key: &str) -> Result<Option<Value>, TetherError> {
        AttributeStore::get(&self.inner, kind, id, key)
    }

    fn set(&self, kind: EntityKind, id: EntityId, key: &str, value: Value) -> Result<(), TetherError> {
        self.record(kind, id, key);
        AttributeStore::set(&self.inner, kind, id, key, value)
    }

    fn delete(&self, kind: EntityKind, id: EntityId, key: &str) -> Result<bool, TetherError> {
        self.record(kind, id, key);
        AttributeStore::delete(&self.inner, kind, id, key)
    }

    fn ids_with_key(&self, kind: EntityKind, key: &str) -> Result<Vec<EntityId>, TetherError> {
        AttributeStore::ids_with_key(&self.inner, kind, key)
    }

    fn flush(&self) -> Result<(), TetherError> {
        AttributeStore::flush(&self.inner)
    }
}

/// Listener that keeps every event it sees.
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<ConnectionEvent>>,
}

impl RecordingListener {
    pub fn events(&self) -> Vec<ConnectionEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl ConnectionListener for RecordingListener {
    fn on_event(&self, event: &ConnectionEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// The shared parts a store is built from, kept accessible to assertions.
pub struct Fixture {
    pub registry: Arc<ConnectionRegistry>,
    pub attributes: Arc<CountingAttributes>,
    pub directory: Arc<MemoryDirectory>,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(fixture_registry()),
            attributes: Arc::new(CountingAttributes::new()),
            directory: Arc::new(fixture_directory()),
        }
    }

    pub fn store(&self) -> ConnectionStore {
        ConnectionStore::new(
            self.registry.clone(),
            self.attributes.clone(),
            self.directory.clone(),
        )
    }
}
