//! Server builder and runner

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::board::Board;
use crate::handler::{self, BoardState};
use crate::manager::{ConnectionManager, DEFAULT_QUEUE_CAPACITY};
use crate::storage::{MemoryStorage, RequestStorage};

/// Build the HTTP router for a board
pub fn router<S: RequestStorage>(board: Board<S>, keep_alive: Duration) -> Router {
    let state = BoardState { board, keep_alive };

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/ready", get(|| async { "READY" }))
        .route("/sse/connect", get(handler::sse_connect::<S>))
        .route(
            "/api/mix-requests",
            get(handler::list_requests::<S>)
                .post(handler::create_request::<S>)
                .delete(handler::clear_requests::<S>),
        )
        .route("/api/stats", get(handler::get_stats::<S>))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Server configuration and runner
pub struct Server<S: RequestStorage> {
    port: u16,
    board: Board<S>,
    keep_alive: Duration,
    cleanup_interval: Duration,
}

impl<S: RequestStorage> Server<S> {
    /// The board this server exposes
    pub fn board(&self) -> &Board<S> {
        &self.board
    }

    /// Bind `0.0.0.0:port` and serve until Ctrl+C or SIGTERM
    pub async fn run(self) -> anyhow::Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Listening on {}", addr);

        let cancel = CancellationToken::new();
        let cancel_for_signal = cancel.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            cancel_for_signal.cancel();
        });

        self.serve(listener, cancel).await
    }

    /// Serve on an already bound listener until `shutdown` is cancelled
    pub async fn serve(self, listener: TcpListener, shutdown: CancellationToken) -> anyhow::Result<()> {
        tracing::info!(
            storage = self.board.storage().name(),
            queue_capacity = self.board.connections().queue_capacity(),
            "Starting mix board"
        );

        // Start cleanup task
        let cleanup_manager = self.board.connections().clone();
        let cleanup_cancel = shutdown.clone();
        let cleanup_interval = self.cleanup_interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(cleanup_interval);
            loop {
                tokio::select! {
                    _ = cleanup_cancel.cancelled() => break,
                    _ = interval.tick() => {
                        let cleaned = cleanup_manager.cleanup_dead_connections();
                        tracing::debug!(
                            connections = cleanup_manager.connection_count(),
                            cleaned,
                            "Connection cleanup"
                        );
                    }
                }
            }
        });

        let app = router(self.board, self.keep_alive);

        let cancel_for_shutdown = shutdown.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { cancel_for_shutdown.cancelled().await })
            .await?;

        shutdown.cancel();
        tracing::info!("Mix board shutdown complete");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
}

/// Builder for Server
pub struct ServerBuilder<S = MemoryStorage> {
    port: u16,
    storage: Option<S>,
    queue_capacity: usize,
    keep_alive: Duration,
    cleanup_interval: Duration,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self {
            port: 8080,
            storage: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            keep_alive: Duration::from_secs(10),
            cleanup_interval: Duration::from_secs(30),
        }
    }
}

impl Server<MemoryStorage> {
    /// Create a new server builder
    pub fn builder() -> ServerBuilder {
        ServerBuilder::default()
    }
}

impl<S> ServerBuilder<S> {
    /// Set the server port
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the request storage
    pub fn storage<T: RequestStorage>(self, storage: T) -> ServerBuilder<T> {
        ServerBuilder {
            port: self.port,
            storage: Some(storage),
            queue_capacity: self.queue_capacity,
            keep_alive: self.keep_alive,
            cleanup_interval: self.cleanup_interval,
        }
    }

    /// Set how many pending messages a viewer may have before it is evicted
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the SSE keep-alive comment interval
    pub fn keep_alive(mut self, interval: Duration) -> Self {
        self.keep_alive = interval;
        self
    }

    /// Set the cleanup interval
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }
}

impl<S: RequestStorage> ServerBuilder<S> {
    /// Build the server
    pub fn build(self) -> anyhow::Result<Server<S>> {
        let storage = self.storage.ok_or_else(|| anyhow::anyhow!("Storage is required"))?;
        if self.queue_capacity == 0 {
            anyhow::bail!("Queue capacity must be at least 1");
        }
        if self.cleanup_interval.is_zero() {
            anyhow::bail!("Cleanup interval must be non-zero");
        }

        Ok(Server {
            port: self.port,
            board: Board::new(storage, ConnectionManager::new(self.queue_capacity)),
            keep_alive: self.keep_alive,
            cleanup_interval: self.cleanup_interval,
        })
    }
}
