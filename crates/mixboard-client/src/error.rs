//! Error types for the client channel

use thiserror::Error;

/// The push transport failed or went away.
///
/// Always recoverable: it drives the reconnect state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Could not open the connection
    #[error("connect failed: {0}")]
    Connect(String),

    /// Server answered with a non-success status
    #[error("unexpected status {0}")]
    Status(u16),

    /// The open stream broke
    #[error("stream error: {0}")]
    Stream(String),
}

/// Errors surfaced to whoever drives a channel
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Automatic retries are used up; only a manual reconnect will try again
    #[error("gave up after {attempts} reconnect attempts")]
    Exhausted { attempts: u32 },
}
