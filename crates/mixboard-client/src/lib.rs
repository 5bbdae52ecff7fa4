//! # Mix Board Client
//!
//! A push channel for mix board viewers that survives dropped connections.
//!
//! The channel connects to the board's push endpoint, decodes every message
//! into a [`PushMessage`](mixboard::PushMessage), and hands valid ones to your
//! handler. When the connection drops it retries with exponential backoff
//! (3 s doubling to a 30 s cap, 10 attempts by default) and then waits for a
//! manual [`reconnect`](ChannelHandle::reconnect).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mixboard_client::{RequestList, ResilientChannel, SseConnector};
//! use std::sync::{Arc, Mutex};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let list = Arc::new(Mutex::new(RequestList::new()));
//!     let view = list.clone();
//!
//!     let channel = ResilientChannel::builder(SseConnector::new("http://localhost:8080/sse/connect")?)
//!         .on_message(move |message| {
//!             if let Ok(mut view) = view.lock() {
//!                 view.apply(message);
//!             }
//!         })
//!         .spawn();
//!
//!     let mut status = channel.subscribe();
//!     while status.changed().await.is_ok() {
//!         let current = *status.borrow();
//!         if current.exhausted {
//!             channel.reconnect();
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod backoff;
mod channel;
mod error;
pub mod transport;
mod view;

pub use backoff::{ChannelStatus, ReconnectPolicy, ReconnectState, RetryDecision};
pub use channel::{ChannelHandle, ChannelObserver, LoggingObserver, MessageHandler, ResilientChannel};
pub use error::{ClientError, TransportError};
pub use transport::{Connector, FrameStream, SseConnector, SseDecoder, SseFrame};
pub use view::RequestList;

pub use mixboard::{DecodeError, PushMessage, Request};
