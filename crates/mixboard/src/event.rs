//! Push message types
//!
//! The wire form is JSON tagged by a `type` field:
//!
//! ```json
//! {"type":"initial","requests":[...]}
//! {"type":"new-request","request":{...}}
//! {"type":"clear"}
//! ```

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::request::Request;

/// Message pushed from the server to every viewer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PushMessage {
    /// Full current list, newest first. Sent once per connection.
    Initial { requests: Vec<Request> },
    /// A single freshly stored request
    NewRequest { request: Request },
    /// Discard all local state
    Clear,
}

impl PushMessage {
    pub const INITIAL: &'static str = "initial";
    pub const NEW_REQUEST: &'static str = "new-request";
    pub const CLEAR: &'static str = "clear";

    /// The `type` tag, also used as the SSE event name
    pub fn kind(&self) -> &'static str {
        match self {
            PushMessage::Initial { .. } => Self::INITIAL,
            PushMessage::NewRequest { .. } => Self::NEW_REQUEST,
            PushMessage::Clear => Self::CLEAR,
        }
    }

    /// Encode to the JSON wire form
    pub fn encode(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Decode the JSON wire form, rejecting anything but the three known variants.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let value: serde_json::Value =
            serde_json::from_slice(bytes).map_err(DecodeError::Malformed)?;

        let kind = value
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or(DecodeError::MissingType)?
            .to_string();

        if !matches!(kind.as_str(), Self::INITIAL | Self::NEW_REQUEST | Self::CLEAR) {
            return Err(DecodeError::UnknownType(kind));
        }
        serde_json::from_value(value).map_err(|source| DecodeError::Invalid { kind, source })
    }
}
