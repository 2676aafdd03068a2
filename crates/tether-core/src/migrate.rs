//! One-shot migration of stored connection lists into the canonical layout.
//!
//! Forward lists under legacy keys (bare ids, term pairs) are merged into
//! `_conn_<name>` as tagged tuples, and legacy reverse lists are copied to
//! `_conn_<name>_rev`. Legacy keys are left in place. The run is best effort:
//! a failing entity is recorded in the report and the scan moves on.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::errors::TetherError;
use crate::store::{forward_key, reverse_key, ConnectionStore};
use crate::types::{ConnectionTuple, EntityId, EntityKind, EntityRef};

/// Attribute keys of a pre-registry connection layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyKeys {
    /// Forward list of bare ids or untyped tuples.
    pub forward: String,
    /// Forward list of `{term_id, taxonomy}` pairs.
    pub term_forward: String,
    /// Reverse list, on every kind of target.
    pub reverse: String,
}

impl Default for LegacyKeys {
    fn default() -> Self {
        Self {
            forward: "_connections".to_string(),
            term_forward: "_term_connections".to_string(),
            reverse: "_connected_locations".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MigrationOptions {
    /// Legacy layout to fold in. Without it only canonical lists holding
    /// untyped entries are rewritten.
    pub legacy: Option<LegacyKeys>,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    pub connection: String,
    pub entities_processed: usize,
    pub connections_migrated: usize,
    pub term_connections_migrated: usize,
    pub reverse_lists_migrated: usize,
    /// Entries that could not be resolved to any entity.
    pub dropped: usize,
    pub errors: Vec<String>,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl MigrationReport {
    fn start(connection: &str, dry_run: bool) -> Self {
        let now = Utc::now();
        Self {
            connection: connection.to_string(),
            entities_processed: 0,
            connections_migrated: 0,
            term_connections_migrated: 0,
            reverse_lists_migrated: 0,
            dropped: 0,
            errors: Vec::new(),
            dry_run,
            started_at: now,
            finished_at: now,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Rewrite every stored list of connection type `name`.
///
/// # Errors
///
/// Fails only for an unknown connection type or when the set of entities to
/// visit cannot be listed. Failures on individual entities end up in
/// [`MigrationReport::errors`].
pub fn migrate_connections(
    store: &ConnectionStore,
    name: &str,
    options: &MigrationOptions,
) -> Result<MigrationReport, TetherError> {
    let schema = store
        .registry()
        .get(name)
        .ok_or_else(|| TetherError::UnknownConnectionType(name.to_string()))?;
    let kind = schema.from_kind;
    let canonical = forward_key(name);
    let mut report = MigrationReport::start(name, options.dry_run);

    info!(
        "Migrating `{}`{}",
        name,
        if options.dry_run { " (dry run)" } else { "" }
    );

    let mut sources = store.attributes().ids_with_key(kind, &canonical)?;
    if let Some(legacy) = &options.legacy {
        sources.extend(store.attributes().ids_with_key(kind, &legacy.forward)?);
        sources.extend(store.attributes().ids_with_key(kind, &legacy.term_forward)?);
    }
    sources.sort_unstable();
    sources.dedup();

    for id in sources {
        report.entities_processed += 1;
        let source = EntityRef::new(kind, id);
        if let Err(e) = migrate_forward(store, source, name, options, &mut report) {
            warn!("Migration of {} failed: {}", source, e);
            report.errors.push(format!("{}: {}", source, e));
        }
    }

    if let Some(legacy) = &options.legacy {
        for target_kind in EntityKind::ALL {
            let targets = match store.attributes().ids_with_key(target_kind, &legacy.reverse) {
                Ok(ids) => ids,
                Err(e) => {
                    report.errors.push(format!("listing {} reverse lists: {}", target_kind, e));
                    continue;
                }
            };
            for id in targets {
                let target = EntityRef::new(target_kind, id);
                match migrate_reverse(store, target, name, &legacy.reverse, options.dry_run) {
                    Ok(true) => report.reverse_lists_migrated += 1,
                    Ok(false) => {}
                    Err(e) => {
                        warn!("Reverse migration of {} failed: {}", target, e);
                        report.errors.push(format!("{}: {}", target, e));
                    }
                }
            }
        }
    }

    report.finished_at = Utc::now();
    info!(
        "Migrated `{}`: {} entities, {} connections, {} term connections, {} reverse lists, {} dropped, {} errors",
        name,
        report.entities_processed,
        report.connections_migrated,
        report.term_connections_migrated,
        report.reverse_lists_migrated,
        report.dropped,
        report.errors.len()
    );
    Ok(report)
}

fn migrate_forward(
    store: &ConnectionStore,
    source: EntityRef,
    name: &str,
    options: &MigrationOptions,
    report: &mut MigrationReport,
) -> Result<(), TetherError> {
    let canonical = forward_key(name);
    let current = store.attributes().get(source.kind, source.id, &canonical)?;

    let existing = store.read_entries(source.kind, source.id, &canonical)?;
    report.connections_migrated += existing.bare_resolved;
    report.term_connections_migrated += existing.term_pairs;
    report.dropped += existing.dropped;
    let mut merged = existing.tuples;

    if let Some(legacy) = &options.legacy {
        let forward = store.read_entries(source.kind, source.id, &legacy.forward)?;
        report.connections_migrated += forward.tuples.len().saturating_sub(forward.term_pairs);
        report.term_connections_migrated += forward.term_pairs;
        report.dropped += forward.dropped;
        merge_into(&mut merged, forward.tuples);

        let terms = store.read_entries(source.kind, source.id, &legacy.term_forward)?;
        report.term_connections_migrated += terms.tuples.len();
        report.dropped += terms.dropped;
        merge_into(&mut merged, terms.tuples);
    }

    let value = serde_json::to_value(&merged)?;
    if current.as_ref() == Some(&value) || (current.is_none() && merged.is_empty()) {
        return Ok(());
    }
    debug!("{}: {} canonical tuples", source, merged.len());
    if !options.dry_run {
        store.write_forward(source, name, &merged)?;
    }
    Ok(())
}

/// Copy one legacy reverse list. Returns whether it held anything.
fn migrate_reverse(
    store: &ConnectionStore,
    target: EntityRef,
    name: &str,
    legacy_key: &str,
    dry_run: bool,
) -> Result<bool, TetherError> {
    let legacy = store.read_ids(target.kind, target.id, legacy_key)?;
    if legacy.is_empty() {
        return Ok(false);
    }

    let key = reverse_key(name);
    let mut ids: Vec<EntityId> = store.read_ids(target.kind, target.id, &key)?;
    let before = ids.len();
    for id in legacy {
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    let stored_as_ints = store.attributes().get(target.kind, target.id, &key)? == Some(Value::from(ids.clone()));
    if !dry_run && (ids.len() != before || !stored_as_ints) {
        store.write_ids(target.kind, target.id, &key, &ids)?;
    }
    Ok(true)
}

fn merge_into(merged: &mut Vec<ConnectionTuple>, tuples: Vec<ConnectionTuple>) {
    for tuple in tuples {
        if !merged.contains(&tuple) {
            merged.push(tuple);
        }
    }
}
