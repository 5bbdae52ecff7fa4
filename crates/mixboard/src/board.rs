//! The board ties request storage to the viewer fanout

use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};

use crate::connection::{ConnectionInfo, ViewerConnection};
use crate::error::Result;
use crate::event::PushMessage;
use crate::manager::ConnectionManager;
use crate::request::{NewRequest, Request};
use crate::storage::RequestStorage;

/// Request store plus live viewers.
///
/// Store mutations with their broadcast, and snapshot-then-register for a new
/// viewer, run under one gate. A viewer therefore sees every request exactly
/// once: either inside its `initial` snapshot or as a later `new-request`.
#[derive(Clone)]
pub struct Board<S: RequestStorage> {
    storage: S,
    connections: ConnectionManager,
    gate: Arc<Mutex<()>>,
}

impl<S: RequestStorage> Board<S> {
    pub fn new(storage: S, connections: ConnectionManager) -> Self {
        Self {
            storage,
            connections,
            gate: Arc::new(Mutex::new(())),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    /// Store a candidate and announce it to every viewer.
    ///
    /// Rejected candidates are neither stored nor published.
    pub async fn submit(&self, candidate: NewRequest) -> Result<Request> {
        let _gate = self.gate.lock().await;
        let request = self.storage.append(candidate).await?;
        let sent = self.connections.publish(&PushMessage::NewRequest {
            request: request.clone(),
        });
        info!(
            request_id = %request.id,
            requester = %request.requester_name,
            item = %request.item_name,
            adjustment = request.adjustment,
            sent_count = sent,
            "Request submitted"
        );
        Ok(request)
    }

    /// All stored requests, newest first
    pub async fn requests(&self) -> Result<Vec<Request>> {
        self.storage.list_all().await
    }

    /// Empty the store and tell every viewer to drop its state
    pub async fn clear(&self) -> Result<()> {
        let _gate = self.gate.lock().await;
        self.storage.clear().await?;
        let sent = self.connections.publish(&PushMessage::Clear);
        info!(sent_count = sent, "Requests cleared");
        Ok(())
    }

    /// Open a new viewer: queue the `initial` snapshot, then register it.
    ///
    /// The returned receiver yields the snapshot first and every later
    /// broadcast after it, in publish order.
    pub async fn connect(
        &self,
        client_ip: Option<String>,
        user_agent: Option<String>,
    ) -> Result<(ConnectionInfo, mpsc::Receiver<PushMessage>)> {
        let (connection, receiver) =
            ViewerConnection::new(self.connections.queue_capacity(), client_ip, user_agent);

        let _gate = self.gate.lock().await;
        let requests = self.storage.list_all().await?;
        let snapshot_len = requests.len();

        // Fresh queue with capacity >= 1, the snapshot always fits
        let _ = connection.try_send(PushMessage::Initial { requests });
        connection.mark_open();

        let info = ConnectionInfo {
            connection_id: connection.id.clone(),
            connected_at: connection.metadata.connected_at,
            snapshot_len,
        };
        self.connections.register(connection);

        debug!(connection_id = %info.connection_id, snapshot_len, "Viewer opened");
        Ok((info, receiver))
    }

    /// Close a viewer. Safe to call more than once.
    pub fn disconnect(&self, connection_id: &str) {
        if !self.connections.unregister(connection_id) {
            debug!(connection_id, "Viewer already closed");
        }
    }
}
