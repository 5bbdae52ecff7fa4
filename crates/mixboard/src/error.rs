//! Error types for the mix board

use thiserror::Error;

/// Result type alias using the library's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the mix board
#[derive(Error, Debug)]
pub enum Error {
    /// A submitted candidate request was rejected
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Server errors
    #[error("Server error: {0}")]
    Server(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A candidate request violated one of the submission constraints.
///
/// The message names the constraint so it can be returned to the submitter as-is.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("requester name must not be empty")]
    EmptyRequesterName,

    #[error("item type must be \"instrument\" or \"singer\", got {0:?}")]
    UnknownItemType(String),

    #[error("adjustment cannot be zero")]
    ZeroAdjustment,

    #[error("adjustment must be between {min} and {max}, got {value}")]
    AdjustmentOutOfRange { value: i64, min: i32, max: i32 },
}

/// A push message could not be decoded into one of the known variants.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Payload is not JSON at all
    #[error("malformed push message: {0}")]
    Malformed(#[source] serde_json::Error),

    /// Payload is JSON but carries no string `type` field
    #[error("push message has no type")]
    MissingType,

    /// `type` names a variant this decoder does not know
    #[error("unknown push message type {0:?}")]
    UnknownType(String),

    /// Known variant with a payload of the wrong shape
    #[error("invalid {kind} message: {source}")]
    Invalid {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}
