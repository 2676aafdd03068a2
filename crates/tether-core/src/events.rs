//! Connection change notifications.
//!
//! The store emits a [`ConnectionEvent`] after every edge it adds or removes.
//! Listeners run synchronously, in subscription order, after the write; they
//! cannot veto or fail the operation.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, trace};

use crate::types::{EntityId, EntityRef};

/// What happened to an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionAction {
    Added,
    Removed,
}

/// One edge change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionEvent {
    pub action: ConnectionAction,
    pub source: EntityRef,
    pub target_id: EntityId,
    pub target_type: String,
    pub connection: String,
    pub at: DateTime<Utc>,
}

impl ConnectionEvent {
    pub fn new(
        action: ConnectionAction,
        source: EntityRef,
        target_id: EntityId,
        target_type: &str,
        connection: &str,
    ) -> Self {
        Self {
            action,
            source,
            target_id,
            target_type: target_type.to_string(),
            connection: connection.to_string(),
            at: Utc::now(),
        }
    }
}

/// Receives connection events.
pub trait ConnectionListener: Send + Sync {
    fn on_event(&self, event: &ConnectionEvent);
}

/// Logs every event at `info`.
pub struct TracingListener;

impl ConnectionListener for TracingListener {
    fn on_event(&self, event: &ConnectionEvent) {
        match event.action {
            ConnectionAction::Added => info!(
                source = %event.source,
                target_id = event.target_id,
                target_type = %event.target_type,
                connection = %event.connection,
                "Connection added"
            ),
            ConnectionAction::Removed => info!(
                source = %event.source,
                target_id = event.target_id,
                target_type = %event.target_type,
                connection = %event.connection,
                "Connection removed"
            ),
        }
    }
}

/// Fan-out of events to subscribed listeners.
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<Vec<Arc<dyn ConnectionListener>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: Arc<dyn ConnectionListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn emit(&self, event: ConnectionEvent) {
        trace!(event = ?event, "Emitting connection event");
        // Clone the list so a listener may subscribe others without deadlocking.
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            listener.on_event(&event);
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
