//! # Mix Board
//!
//! A small real-time request board. Musicians submit volume adjustments for an
//! instrument or singer; sound engineers watch them arrive live.
//!
//! ## Features
//!
//! - **Validated Requests**: Candidates are checked before they are stored or announced
//! - **Pluggable Storage**: Implement `RequestStorage` to swap the in-memory store
//! - **Snapshot then Live**: Every viewer gets the full list on connect, then each new request
//! - **Best-effort Fanout**: A broken or slow viewer never blocks the others
//! - **Built-in Server**: Optional Axum-based HTTP server with an SSE push endpoint
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mixboard::{MemoryStorage, Server};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Server::builder()
//!         .port(8080)
//!         .storage(MemoryStorage::new())
//!         .build()?
//!         .run()
//!         .await
//! }
//! ```
//!
//! ## Using the Board Directly
//!
//! ```rust,ignore
//! use mixboard::{Board, ConnectionManager, ItemType, MemoryStorage, NewRequest};
//!
//! let board = Board::new(MemoryStorage::new(), ConnectionManager::default());
//! let (_info, mut viewer) = board.connect(None, None).await?;
//!
//! board.submit(NewRequest::new("Ana", ItemType::Singer, "Lead vocal", 3)).await?;
//!
//! // initial snapshot, then the new request
//! let snapshot = viewer.recv().await;
//! let live = viewer.recv().await;
//! ```

mod board;
mod connection;
mod error;
mod event;
mod manager;
pub mod request;
pub mod storage;

#[cfg(feature = "server")]
mod handler;
#[cfg(feature = "server")]
mod server;

// Re-exports
pub use board::Board;
pub use connection::{
    ConnectionInfo, ConnectionMetadata, ConnectionState, SendFailure, ViewerConnection,
};
pub use error::{DecodeError, Error, Result, ValidationError};
pub use event::PushMessage;
pub use manager::{ConnectionManager, DEFAULT_QUEUE_CAPACITY};
pub use request::{ItemType, NewRequest, Request, MAX_ADJUSTMENT, MIN_ADJUSTMENT};
pub use storage::{MemoryStorage, RequestStorage};

#[cfg(feature = "server")]
pub use server::{router, Server, ServerBuilder};

// Re-export commonly used types from dependencies
pub use async_trait::async_trait;
pub use tokio_util::sync::CancellationToken;
