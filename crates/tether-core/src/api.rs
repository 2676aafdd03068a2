//! HTTP boundary for connection management.
//!
//! Transport-agnostic handlers: a host web layer parses the route, builds the
//! request types below and serializes whatever comes back. Each handler
//! validates the connection name first (400), then authorization (403), then
//! does the work. Authorization lives here and only here; the store and
//! manager never check it.
//!
//! | Handler  | Capability                  | Failure codes        |
//! |----------|-----------------------------|----------------------|
//! | `search` | manage                      | 400, 403             |
//! | `list`   | none                        | 400                  |
//! | `add`    | manage + edit source entity | 400, 403, 500        |
//! | `remove` | manage + edit source entity | 400, 403, 500        |
//! | `types`  | manage                      | 400, 403             |

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::facade::Connections;
use crate::manager::SearchableTypes;
use crate::registry::is_valid_connection_name;
use crate::types::{EntityId, EntityKind, EntityRef, EntitySummary};

// ============================================================================
// Authorization
// ============================================================================

/// Capabilities of the caller making a request.
pub trait Authorizer: Send + Sync {
    /// May manage connections at all.
    fn can_manage(&self) -> bool;

    /// May edit this particular entity.
    fn can_edit(&self, entity: EntityRef) -> bool;
}

/// Grants everything. For trusted local callers such as the CLI.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn can_manage(&self) -> bool {
        true
    }

    fn can_edit(&self, _entity: EntityRef) -> bool {
        true
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Error payload, serialized as `{code, message, status}`.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{message} ({code}, {status})")]
pub struct ApiError {
    pub code: String,
    pub message: String,
    pub status: u16,
}

impl ApiError {
    pub fn invalid_connection_name(name: &str) -> Self {
        Self {
            code: "invalid_connection_name".to_string(),
            message: format!("Invalid connection type `{}`.", name),
            status: 400,
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self {
            code: "rest_forbidden".to_string(),
            message: message.into(),
            status: 403,
        }
    }

    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self {
            code: "connection_failed".to_string(),
            message: message.into(),
            status: 500,
        }
    }
}

// ============================================================================
// Requests and responses
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    /// Restrict to one target subtype. Empty means all.
    #[serde(default, rename = "type")]
    pub type_filter: String,
    #[serde(default)]
    pub exclude_id: EntityId,
}

/// Body of an add or remove request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRequest {
    pub entity_type: EntityKind,
    pub entity_id: EntityId,
    pub target_type: String,
    pub target_id: EntityId,
}

impl ConnectionRequest {
    pub fn source(&self) -> EntityRef {
        EntityRef::new(self.entity_type, self.entity_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionList {
    pub entity_type: EntityKind,
    pub entity_id: EntityId,
    pub connection_name: String,
    pub connections: Vec<EntitySummary>,
    pub count: usize,
}

/// The counterpart of an added or removed edge.
///
/// Resolved targets carry their display data; a target the directory cannot
/// show is echoed back as id and type only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AddedTarget {
    Resolved(EntitySummary),
    Unresolved {
        id: EntityId,
        #[serde(rename = "type")]
        subtype: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddResponse {
    pub success: bool,
    pub connection: AddedTarget,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoveResponse {
    pub success: bool,
    pub target_id: EntityId,
    pub connection: AddedTarget,
}

// ============================================================================
// ConnectionApi
// ============================================================================

pub struct ConnectionApi {
    connections: Arc<Connections>,
}

impl ConnectionApi {
    pub fn new(connections: Arc<Connections>) -> Self {
        Self { connections }
    }

    pub fn connections(&self) -> &Connections {
        &self.connections
    }

    /// `GET /connections/{name}/search`
    pub fn search(
        &self,
        auth: &dyn Authorizer,
        name: &str,
        request: &SearchRequest,
    ) -> Result<Vec<EntitySummary>, ApiError> {
        self.validate_name(name)?;
        require_manage(auth)?;
        let filter = (!request.type_filter.is_empty()).then_some(request.type_filter.as_str());
        Ok(self
            .connections
            .search_connectable(name, &request.query, filter, request.exclude_id, None))
    }

    /// `GET /connections/{name}/{kind}/{id}`, public.
    pub fn list(&self, name: &str, kind: EntityKind, id: EntityId) -> Result<ConnectionList, ApiError> {
        self.validate_name(name)?;
        let connections = self.connections.get_connections_full(kind, id, name);
        Ok(ConnectionList {
            entity_type: kind,
            entity_id: id,
            connection_name: name.to_string(),
            count: connections.len(),
            connections,
        })
    }

    /// `POST /connections/{name}`
    pub fn add(
        &self,
        auth: &dyn Authorizer,
        name: &str,
        request: &ConnectionRequest,
    ) -> Result<AddResponse, ApiError> {
        self.authorize_edit(auth, name, request)?;

        if !self
            .connections
            .add_connection(request.source(), &request.target_type, request.target_id, name)
        {
            return Err(ApiError::connection_failed("Could not create the connection."));
        }

        Ok(AddResponse {
            success: true,
            connection: self.counterpart(request),
        })
    }

    /// `DELETE /connections/{name}`
    pub fn remove(
        &self,
        auth: &dyn Authorizer,
        name: &str,
        request: &ConnectionRequest,
    ) -> Result<RemoveResponse, ApiError> {
        self.authorize_edit(auth, name, request)?;

        // resolved before the edge goes, so the caller can still render it
        let connection = self.counterpart(request);
        if !self
            .connections
            .remove_connection(request.source(), &request.target_type, request.target_id, name)
        {
            return Err(ApiError::connection_failed("Could not remove the connection."));
        }
        Ok(RemoveResponse {
            success: true,
            target_id: request.target_id,
            connection,
        })
    }

    /// `GET /connections/{name}/types`
    pub fn types(&self, auth: &dyn Authorizer, name: &str) -> Result<SearchableTypes, ApiError> {
        self.validate_name(name)?;
        require_manage(auth)?;
        Ok(self.connections.get_searchable_types(name))
    }

    fn counterpart(&self, request: &ConnectionRequest) -> AddedTarget {
        match self
            .connections
            .entity_summary(&request.target_type, request.target_id)
        {
            Some(summary) => AddedTarget::Resolved(summary),
            None => AddedTarget::Unresolved {
                id: request.target_id,
                subtype: request.target_type.clone(),
            },
        }
    }

    /// Well-formed and registered.
    fn validate_name(&self, name: &str) -> Result<(), ApiError> {
        if is_valid_connection_name(name) && self.connections.registry().exists(name) {
            Ok(())
        } else {
            debug!("Rejecting connection name `{}`", name);
            Err(ApiError::invalid_connection_name(name))
        }
    }

    fn authorize_edit(
        &self,
        auth: &dyn Authorizer,
        name: &str,
        request: &ConnectionRequest,
    ) -> Result<(), ApiError> {
        self.validate_name(name)?;
        require_manage(auth)?;
        if !auth.can_edit(request.source()) {
            return Err(ApiError::forbidden("You are not allowed to edit this entity."));
        }
        Ok(())
    }
}

fn require_manage(auth: &dyn Authorizer) -> Result<(), ApiError> {
    if auth.can_manage() {
        Ok(())
    } else {
        Err(ApiError::forbidden("You are not allowed to manage connections."))
    }
}
