//! Connection type registry.
//!
//! A connection type is a named schema stating which entities may be the
//! source of an edge (`from_kind` + `from_subtypes`), which may be its target
//! (`to_kind` + `to_subtypes`), and whether a reverse index is maintained.
//!
//! The registry is an ordinary value: build it at startup, register every
//! type, then share it behind an `Arc` with the store, manager and facade.
//! Schemas are immutable once registered.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::DEFAULT_ITEM_SUBTYPE;
use crate::errors::TetherError;
use crate::types::EntityKind;

// ============================================================================
// Schema building blocks
// ============================================================================

/// Which kind of entity may be the target of a connection type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    /// Any kind and any subtype.
    #[default]
    Any,
    Item,
    Term,
    Principal,
}

impl TargetKind {
    /// Whether an entity of `kind` satisfies this target kind.
    pub fn matches(&self, kind: EntityKind) -> bool {
        match self {
            Self::Any => true,
            Self::Item => kind == EntityKind::Item,
            Self::Term => kind == EntityKind::Term,
            Self::Principal => kind == EntityKind::Principal,
        }
    }

    /// The concrete entity kind, or `None` for [`TargetKind::Any`].
    pub fn entity_kind(&self) -> Option<EntityKind> {
        match self {
            Self::Any => None,
            Self::Item => Some(EntityKind::Item),
            Self::Term => Some(EntityKind::Term),
            Self::Principal => Some(EntityKind::Principal),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Item => "item",
            Self::Term => "term",
            Self::Principal => "principal",
        }
    }
}

impl From<EntityKind> for TargetKind {
    fn from(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Item => Self::Item,
            EntityKind::Term => Self::Term,
            EntityKind::Principal => Self::Principal,
        }
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetKind {
    type Err = TetherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("any") {
            return Ok(Self::Any);
        }
        s.parse::<EntityKind>().map(Self::from)
    }
}

/// Intended multiplicity of a connection type.
///
/// Documentation only: the store enforces nothing beyond rejecting duplicate
/// edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cardinality {
    #[default]
    ManyToMany,
    OneToMany,
    OneToOne,
}

impl Cardinality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ManyToMany => "many-to-many",
            Self::OneToMany => "one-to-many",
            Self::OneToOne => "one-to-one",
        }
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Labels shown by editing interfaces for a connection type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionLabels {
    pub title: String,
    pub add_new: String,
    pub search_placeholder: String,
    pub no_results: String,
    pub confirm_remove: String,
}

impl Default for ConnectionLabels {
    fn default() -> Self {
        Self {
            title: "Connections".to_string(),
            add_new: "Add connection".to_string(),
            search_placeholder: "Search...".to_string(),
            no_results: "No results found.".to_string(),
            confirm_remove: "Are you sure you want to remove this connection?".to_string(),
        }
    }
}

/// Partial labels given at registration; missing ones take the defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelOverrides {
    pub title: Option<String>,
    pub add_new: Option<String>,
    pub search_placeholder: Option<String>,
    pub no_results: Option<String>,
    pub confirm_remove: Option<String>,
}

impl LabelOverrides {
    fn resolve(self) -> ConnectionLabels {
        let defaults = ConnectionLabels::default();
        ConnectionLabels {
            title: self.title.unwrap_or(defaults.title),
            add_new: self.add_new.unwrap_or(defaults.add_new),
            search_placeholder: self.search_placeholder.unwrap_or(defaults.search_placeholder),
            no_results: self.no_results.unwrap_or(defaults.no_results),
            confirm_remove: self.confirm_remove.unwrap_or(defaults.confirm_remove),
        }
    }
}

/// A subtype list that may be written as a single string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(s) => vec![s],
            Self::Many(v) => v,
        }
    }
}

impl Default for OneOrMany {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

impl From<&str> for OneOrMany {
    fn from(s: &str) -> Self {
        Self::One(s.to_string())
    }
}

impl From<Vec<&str>> for OneOrMany {
    fn from(v: Vec<&str>) -> Self {
        Self::Many(v.into_iter().map(str::to_string).collect())
    }
}

// ============================================================================
// ConnectionArgs
// ============================================================================

fn default_from_subtypes() -> OneOrMany {
    OneOrMany::One(DEFAULT_ITEM_SUBTYPE.to_string())
}

fn default_true() -> bool {
    true
}

/// Registration arguments, as written by a feature or in configuration.
///
/// ```yaml
/// related_people:
///   from_kind: item
///   from_subtypes: place
///   to_kind: any
///   to_subtypes: [principal, article]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionArgs {
    #[serde(default = "default_from_kind")]
    pub from_kind: EntityKind,
    #[serde(default = "default_from_subtypes")]
    pub from_subtypes: OneOrMany,
    #[serde(default)]
    pub to_kind: TargetKind,
    #[serde(default)]
    pub to_subtypes: OneOrMany,
    #[serde(default = "default_true")]
    pub bidirectional: bool,
    #[serde(default)]
    pub cardinality: Cardinality,
    #[serde(default)]
    pub labels: LabelOverrides,
}

fn default_from_kind() -> EntityKind {
    EntityKind::Item
}

impl Default for ConnectionArgs {
    fn default() -> Self {
        Self {
            from_kind: default_from_kind(),
            from_subtypes: default_from_subtypes(),
            to_kind: TargetKind::default(),
            to_subtypes: OneOrMany::default(),
            bidirectional: true,
            cardinality: Cardinality::default(),
            labels: LabelOverrides::default(),
        }
    }
}

impl ConnectionArgs {
    /// Arguments for a connection from `kind` entities of the given subtypes.
    pub fn new(kind: EntityKind, subtypes: impl Into<OneOrMany>) -> Self {
        Self {
            from_kind: kind,
            from_subtypes: subtypes.into(),
            ..Self::default()
        }
    }

    pub fn to(mut self, kind: TargetKind, subtypes: impl Into<OneOrMany>) -> Self {
        self.to_kind = kind;
        self.to_subtypes = subtypes.into();
        self
    }

    pub fn bidirectional(mut self, bidirectional: bool) -> Self {
        self.bidirectional = bidirectional;
        self
    }

    pub fn cardinality(mut self, cardinality: Cardinality) -> Self {
        self.cardinality = cardinality;
        self
    }

    pub fn labels(mut self, labels: LabelOverrides) -> Self {
        self.labels = labels;
        self
    }
}

// ============================================================================
// ConnectionSchema
// ============================================================================

/// A registered, normalized connection type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionSchema {
    pub name: String,
    pub from_kind: EntityKind,
    pub from_subtypes: Vec<String>,
    pub to_kind: TargetKind,
    pub to_subtypes: Vec<String>,
    pub bidirectional: bool,
    pub cardinality: Cardinality,
    pub labels: ConnectionLabels,
}

impl ConnectionSchema {
    fn normalize(name: &str, args: ConnectionArgs) -> Self {
        Self {
            name: name.to_string(),
            from_kind: args.from_kind,
            from_subtypes: args.from_subtypes.into_vec(),
            to_kind: args.to_kind,
            to_subtypes: args.to_subtypes.into_vec(),
            bidirectional: args.bidirectional,
            cardinality: args.cardinality,
            labels: args.labels.resolve(),
        }
    }

    /// Whether `(kind, subtype)` may be the source of this type.
    pub fn accepts_source(&self, kind: EntityKind, subtype: &str) -> bool {
        self.from_kind == kind && self.from_subtypes.iter().any(|s| s == subtype)
    }

    /// Whether `(kind, subtype)` may be the target of this type.
    pub fn accepts_target(&self, kind: EntityKind, subtype: &str) -> bool {
        match self.to_kind {
            TargetKind::Any => true,
            other => other.matches(kind) && self.to_subtypes.iter().any(|s| s == subtype),
        }
    }
}

// ============================================================================
// ConnectionRegistry
// ============================================================================

/// In-memory catalog of connection types, keyed by name.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    types: BTreeMap<String, ConnectionSchema>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection type.
    ///
    /// Returns `false` if the name is already taken; the existing schema is
    /// left as it was.
    pub fn register(&mut self, name: &str, args: ConnectionArgs) -> bool {
        if self.types.contains_key(name) {
            debug!("Connection type `{}` already registered", name);
            return false;
        }
        let schema = ConnectionSchema::normalize(name, args);
        debug!(
            "Registered connection type `{}` ({} -> {})",
            name, schema.from_kind, schema.to_kind
        );
        self.types.insert(name.to_string(), schema);
        true
    }

    pub fn get(&self, name: &str) -> Option<&ConnectionSchema> {
        self.types.get(name)
    }

    /// All registered types in name order.
    pub fn get_all(&self) -> impl Iterator<Item = &ConnectionSchema> {
        self.types.values()
    }

    pub fn exists(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Types where `(kind, subtype)` may be the source.
    pub fn get_for_entity(&self, kind: EntityKind, subtype: &str) -> Vec<&ConnectionSchema> {
        self.types
            .values()
            .filter(|schema| schema.accepts_source(kind, subtype))
            .collect()
    }

    /// Types where `(kind, subtype)` may be the target.
    pub fn get_as_target(&self, kind: EntityKind, subtype: &str) -> Vec<&ConnectionSchema> {
        self.types
            .values()
            .filter(|schema| schema.accepts_target(kind, subtype))
            .collect()
    }

    /// Schema check only; `false` for unknown names.
    pub fn can_connect_to(&self, name: &str, target_kind: EntityKind, target_subtype: &str) -> bool {
        self.get(name)
            .is_some_and(|schema| schema.accepts_target(target_kind, target_subtype))
    }

    /// Remove a connection type. Returns `false` if it was not registered.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.types.remove(name).is_some()
    }
}

/// Whether `name` is an acceptable connection type name
/// (lowercase letters, digits, `_` and `-`).
pub fn is_valid_connection_name(name: &str) -> bool {
    static NAME_RE: OnceLock<Regex> = OnceLock::new();
    NAME_RE
        .get_or_init(|| Regex::new(r"^[a-z0-9_-]+$").expect("Invalid regex"))
        .is_match(name)
}
