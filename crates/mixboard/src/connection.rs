//! Viewer connection types

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::event::PushMessage;

/// Lifecycle of a viewer connection: `Connecting -> Open -> Closed`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Created, snapshot not yet queued
    Connecting,
    /// Snapshot queued and registered for broadcasts
    Open,
    /// Deregistered or transport gone. Terminal.
    Closed,
}

impl ConnectionState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => ConnectionState::Connecting,
            1 => ConnectionState::Open,
            _ => ConnectionState::Closed,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            ConnectionState::Connecting => 0,
            ConnectionState::Open => 1,
            ConnectionState::Closed => 2,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Metadata about a connection
#[derive(Debug, Clone)]
pub struct ConnectionMetadata {
    /// When the connection was established
    pub connected_at: chrono::DateTime<chrono::Utc>,
    /// Client IP address (if available)
    pub client_ip: Option<String>,
    /// User agent (if available)
    pub user_agent: Option<String>,
}

/// Why a message could not be queued for a viewer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendFailure {
    /// The viewer's queue is full; it is not keeping up
    Full,
    /// The receiving side is gone
    Closed,
}

/// A registered viewer as seen by the broadcast side.
///
/// Clones share the queue and the lifecycle state.
#[derive(Debug, Clone)]
pub struct ViewerConnection {
    /// Unique connection ID
    pub id: String,
    /// Sender for pushing messages to this viewer
    sender: mpsc::Sender<PushMessage>,
    state: Arc<AtomicU8>,
    /// Connection metadata
    pub metadata: ConnectionMetadata,
}

impl ViewerConnection {
    /// Create a new connection in the `Connecting` state with a queue of `capacity` messages
    pub fn new(
        capacity: usize,
        client_ip: Option<String>,
        user_agent: Option<String>,
    ) -> (Self, mpsc::Receiver<PushMessage>) {
        let (sender, receiver) = mpsc::channel(capacity);
        let connection = Self {
            id: uuid::Uuid::new_v4().to_string(),
            sender,
            state: Arc::new(AtomicU8::new(ConnectionState::Connecting.as_u8())),
            metadata: ConnectionMetadata {
                connected_at: chrono::Utc::now(),
                client_ip,
                user_agent,
            },
        };
        (connection, receiver)
    }

    /// Current lifecycle state. A dropped receiver reads as `Closed`.
    pub fn state(&self) -> ConnectionState {
        let state = ConnectionState::from_u8(self.state.load(Ordering::Acquire));
        if self.sender.is_closed() {
            ConnectionState::Closed
        } else {
            state
        }
    }

    /// Check if the connection is still active
    pub fn is_active(&self) -> bool {
        self.state() != ConnectionState::Closed
    }

    pub(crate) fn mark_open(&self) {
        // Never reopen a closed connection
        let _ = self.state.compare_exchange(
            ConnectionState::Connecting.as_u8(),
            ConnectionState::Open.as_u8(),
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    pub(crate) fn mark_closed(&self) {
        self.state.store(ConnectionState::Closed.as_u8(), Ordering::Release);
    }

    /// Queue a message without waiting
    pub fn try_send(&self, message: PushMessage) -> Result<(), SendFailure> {
        self.sender.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendFailure::Full,
            mpsc::error::TrySendError::Closed(_) => SendFailure::Closed,
        })
    }
}

/// Connection info handed back to whoever opened the viewer
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    /// Unique connection ID
    pub connection_id: String,
    /// When the connection was established
    pub connected_at: chrono::DateTime<chrono::Utc>,
    /// Number of requests in the initial snapshot
    pub snapshot_len: usize,
}
