//! Common types for tether-core.
//!
//! - [`EntityKind`] / [`EntityRef`] - addressing entities on the platform
//! - [`ConnectionTuple`] - one stored forward edge
//! - [`EntitySummary`] - a resolved, display-ready view of an entity
//! - [`AttributeStore`] - the storage seam the connection store writes through

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tether_db::AttributeScope;

use crate::errors::TetherError;

/// Numeric entity identifier. Zero means "missing".
pub type EntityId = u64;

// ============================================================================
// EntityKind
// ============================================================================

/// The three kinds of entity a connection can join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// A content item (article, page, event...).
    #[serde(alias = "post", alias = "content")]
    Item,
    /// A taxonomy node (category, tag...).
    #[serde(alias = "taxonomy")]
    Term,
    /// A principal (user account).
    #[serde(alias = "user")]
    Principal,
}

impl EntityKind {
    /// All kinds, in a stable order.
    pub const ALL: [EntityKind; 3] = [Self::Item, Self::Term, Self::Principal];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Item => "item",
            Self::Term => "term",
            Self::Principal => "principal",
        }
    }

    /// The attribute store scope holding this kind's attributes.
    pub fn scope(&self) -> AttributeScope {
        match self {
            Self::Item => AttributeScope::Item,
            Self::Term => AttributeScope::Term,
            Self::Principal => AttributeScope::Principal,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = TetherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "item" | "post" | "content" => Ok(Self::Item),
            "term" | "taxonomy" => Ok(Self::Term),
            "principal" | "user" => Ok(Self::Principal),
            _ => Err(TetherError::InvalidEntityKind(s.to_string())),
        }
    }
}

// ============================================================================
// EntityRef
// ============================================================================

/// An entity addressed by kind and id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: EntityId,
}

impl EntityRef {
    pub fn new(kind: EntityKind, id: EntityId) -> Self {
        Self { kind, id }
    }

    pub fn item(id: EntityId) -> Self {
        Self::new(EntityKind::Item, id)
    }

    pub fn term(id: EntityId) -> Self {
        Self::new(EntityKind::Term, id)
    }

    pub fn principal(id: EntityId) -> Self {
        Self::new(EntityKind::Principal, id)
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.id)
    }
}

// ============================================================================
// ConnectionTuple
// ============================================================================

/// One forward edge: the target's id and subtype.
///
/// The subtype is `"principal"` for principals, the taxonomy name for
/// taxonomy nodes and the item type for content items.
///
/// ```json
/// {"id": 42, "type": "article"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionTuple {
    pub id: EntityId,
    #[serde(rename = "type")]
    pub subtype: String,
}

impl ConnectionTuple {
    pub fn new(id: EntityId, subtype: impl Into<String>) -> Self {
        Self {
            id,
            subtype: subtype.into(),
        }
    }

    /// Whether this tuple points at `(id, subtype)`.
    pub fn is(&self, id: EntityId, subtype: &str) -> bool {
        self.id == id && self.subtype == subtype
    }
}

impl FromStr for ConnectionTuple {
    type Err = TetherError;

    /// Parse the `type:id` shorthand used on the command line.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (subtype, id) = s.rsplit_once(':').ok_or_else(|| {
            TetherError::InvalidArgument(format!("expected `type:id`, got `{}`", s))
        })?;
        let id: EntityId = id
            .trim()
            .parse()
            .map_err(|_| TetherError::InvalidArgument(format!("invalid id in `{}`", s)))?;
        if subtype.trim().is_empty() || id == 0 {
            return Err(TetherError::InvalidArgument(format!(
                "expected `type:id` with a non-empty type and non-zero id, got `{}`",
                s
            )));
        }
        Ok(Self::new(id, subtype.trim()))
    }
}

// ============================================================================
// EntitySummary
// ============================================================================

/// A connected or searchable entity joined with its live display data.
///
/// Optional fields are only present for the kinds that have them: thumbnails
/// and excerpts for content items, avatars for principals, member counts and
/// slugs for taxonomy nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySummary {
    pub id: EntityId,
    #[serde(rename = "type")]
    pub subtype: String,
    pub title: String,
    pub link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edit_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
}

// ============================================================================
// AttributeStore
// ============================================================================

/// Uniform key-value access to the per-kind attribute stores.
///
/// The connection store depends only on this trait. `tether_db::AttributeStores`
/// implements it (see `db_adapter`); hosts can supply their own.
pub trait AttributeStore: Send + Sync {
    /// Read the raw value stored under `key` for an entity.
    fn get(&self, kind: EntityKind, id: EntityId, key: &str) -> Result<Option<Value>, TetherError>;

    /// Replace the value stored under `key` for an entity.
    fn set(&self, kind: EntityKind, id: EntityId, key: &str, value: Value) -> Result<(), TetherError>;

    /// Delete `key` for an entity. Returns `true` if something was removed.
    fn delete(&self, kind: EntityKind, id: EntityId, key: &str) -> Result<bool, TetherError>;

    /// Ids of all entities of `kind` holding `key`.
    fn ids_with_key(&self, kind: EntityKind, key: &str) -> Result<Vec<EntityId>, TetherError>;

    /// Flush pending writes.
    fn flush(&self) -> Result<(), TetherError>;
}
