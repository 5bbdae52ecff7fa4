//! Local request list kept in sync by push messages

use mixboard::{PushMessage, Request};

/// A viewer's copy of the board, newest first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestList {
    requests: Vec<Request>,
}

impl RequestList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one push message: `initial` replaces, `new-request` prepends, `clear` empties.
    pub fn apply(&mut self, message: PushMessage) {
        match message {
            PushMessage::Initial { requests } => self.requests = requests,
            PushMessage::NewRequest { request } => self.requests.insert(0, request),
            PushMessage::Clear => self.requests.clear(),
        }
    }

    pub fn requests(&self) -> &[Request] {
        &self.requests
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}
