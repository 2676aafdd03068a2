//! Deletion hooks.
//!
//! When an entity is deleted its edges must go too. Each connection type gets
//! one [`CleanupHook`] naming the deletion it reacts to (chosen from the
//! type's source kind) and the source subtypes it applies to. The host
//! forwards its own pre-delete notifications as [`DeletionEvent`]s; see
//! `Connections::handle_deletion`.

use std::fmt;
use std::sync::{PoisonError, RwLock};

use serde::Serialize;

use crate::registry::ConnectionSchema;
use crate::types::{EntityId, EntityKind};

/// The deletion notification a hook subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionTrigger {
    ItemPreDelete,
    TermPreDelete,
    PrincipalPreDelete,
}

impl DeletionTrigger {
    pub fn for_kind(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Item => Self::ItemPreDelete,
            EntityKind::Term => Self::TermPreDelete,
            EntityKind::Principal => Self::PrincipalPreDelete,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Self::ItemPreDelete => EntityKind::Item,
            Self::TermPreDelete => EntityKind::Term,
            Self::PrincipalPreDelete => EntityKind::Principal,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ItemPreDelete => "item_pre_delete",
            Self::TermPreDelete => "term_pre_delete",
            Self::PrincipalPreDelete => "principal_pre_delete",
        }
    }
}

impl fmt::Display for DeletionTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cleanup subscription for one connection type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupHook {
    pub trigger: DeletionTrigger,
    pub connection: String,
    /// Source subtypes whose deletion triggers cleanup. Ignored for
    /// principals, which have no subtypes.
    pub subtypes: Vec<String>,
}

impl CleanupHook {
    pub fn for_schema(schema: &ConnectionSchema) -> Self {
        Self {
            trigger: DeletionTrigger::for_kind(schema.from_kind),
            connection: schema.name.clone(),
            subtypes: schema.from_subtypes.clone(),
        }
    }

    /// Whether deleting an entity of `kind` and `subtype` fires this hook.
    pub fn matches(&self, kind: EntityKind, subtype: Option<&str>) -> bool {
        if self.trigger.kind() != kind {
            return false;
        }
        match self.trigger {
            DeletionTrigger::PrincipalPreDelete => true,
            _ => subtype.is_some_and(|s| self.subtypes.iter().any(|allowed| allowed == s)),
        }
    }
}

/// An entity about to be deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionEvent {
    pub kind: EntityKind,
    pub id: EntityId,
    /// Item type or taxonomy, when the host knows it.
    pub subtype: Option<String>,
}

impl DeletionEvent {
    pub fn new(kind: EntityKind, id: EntityId) -> Self {
        Self {
            kind,
            id,
            subtype: None,
        }
    }

    pub fn with_subtype(mut self, subtype: impl Into<String>) -> Self {
        self.subtype = Some(subtype.into());
        self
    }
}

/// Installed cleanup hooks, at most one per connection type.
#[derive(Debug, Default)]
pub struct DeletionHooks {
    hooks: RwLock<Vec<CleanupHook>>,
}

impl DeletionHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a hook. Returns `false` if its connection already has one.
    pub fn install(&self, hook: CleanupHook) -> bool {
        let mut hooks = self.hooks.write().unwrap_or_else(PoisonError::into_inner);
        if hooks.iter().any(|h| h.connection == hook.connection) {
            return false;
        }
        hooks.push(hook);
        true
    }

    /// Hooks subscribed to deletions of `kind`, in installation order.
    pub fn for_kind(&self, kind: EntityKind) -> Vec<CleanupHook> {
        self.hooks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|h| h.trigger.kind() == kind)
            .cloned()
            .collect()
    }

    pub fn all(&self) -> Vec<CleanupHook> {
        self.hooks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.hooks.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
