//! Connection manager: the broadcast fanout over registered viewers

use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::connection::{SendFailure, ViewerConnection};
use crate::event::PushMessage;

/// Default per-viewer queue capacity
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Holds every open viewer and fans push messages out to them.
///
/// The manager never owns a viewer's lifecycle; it only keeps a lookup it
/// iterates on publish. Sends never wait, so no shard lock is held across a
/// blocked send.
#[derive(Clone)]
pub struct ConnectionManager {
    /// All registered connections: connection_id -> connection
    connections: Arc<DashMap<String, ViewerConnection>>,
    queue_capacity: usize,
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

impl ConnectionManager {
    /// Create a new connection manager whose viewers queue up to `queue_capacity` messages
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            connections: Arc::new(DashMap::new()),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Capacity given to each new viewer's queue
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Register a connection for subsequent broadcasts
    pub fn register(&self, connection: ViewerConnection) {
        info!(
            connection_id = %connection.id,
            client_ip = ?connection.metadata.client_ip,
            "Connection registered"
        );
        self.connections.insert(connection.id.clone(), connection);
    }

    /// Unregister a connection. Unknown or already removed ids are ignored.
    pub fn unregister(&self, connection_id: &str) -> bool {
        match self.connections.remove(connection_id) {
            Some((_, connection)) => {
                connection.mark_closed();
                info!(connection_id, "Connection unregistered");
                true
            }
            None => false,
        }
    }

    /// Deliver a message to every registered, open connection.
    ///
    /// Best effort: closed viewers are pruned and viewers whose queue is full
    /// are evicted, which ends their stream. Returns how many viewers the
    /// message was queued for.
    pub fn publish(&self, message: &PushMessage) -> usize {
        let mut sent = 0;
        let mut dropped = Vec::new();

        for entry in self.connections.iter() {
            match entry.try_send(message.clone()) {
                Ok(()) => sent += 1,
                Err(SendFailure::Closed) => dropped.push(entry.key().clone()),
                Err(SendFailure::Full) => {
                    warn!(connection_id = %entry.key(), "Viewer queue full, evicting");
                    dropped.push(entry.key().clone());
                }
            }
        }

        // Removal must happen after iteration releases the shard guards
        for id in dropped {
            self.unregister(&id);
        }

        debug!(kind = message.kind(), sent_count = sent, "Message published");
        sent
    }

    /// Get total connection count
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// List all connections
    pub fn list_connections(&self) -> Vec<ViewerConnection> {
        self.connections.iter().map(|e| e.value().clone()).collect()
    }

    /// Clean up dead connections, returning how many were removed
    pub fn cleanup_dead_connections(&self) -> usize {
        let dead_ids: Vec<String> = self
            .connections
            .iter()
            .filter(|e| !e.value().is_active())
            .map(|e| e.key().clone())
            .collect();

        let mut removed = 0;
        for id in dead_ids {
            if self.unregister(&id) {
                removed += 1;
            }
        }
        removed
    }
}
