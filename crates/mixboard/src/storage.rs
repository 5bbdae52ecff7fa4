//! Request storage trait and implementations
//!
//! Implement `RequestStorage` to back the board with something other than memory.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::Result;
use crate::request::{NewRequest, Request};

/// Trait for request storage
///
/// Implementors only provide raw persistence; validation and identity
/// assignment happen in the provided [`append`](RequestStorage::append).
///
/// # Example
///
/// ```rust,ignore
/// use mixboard::{Request, RequestStorage, Result};
/// use async_trait::async_trait;
///
/// #[derive(Clone)]
/// struct PgStorage {
///     pool: Pool,
/// }
///
/// #[async_trait]
/// impl RequestStorage for PgStorage {
///     async fn insert(&self, request: Request) -> Result<()> {
///         self.pool.insert(request).await
///     }
///
///     async fn list_all(&self) -> Result<Vec<Request>> {
///         self.pool.query("ORDER BY timestamp DESC").await
///     }
///
///     async fn clear(&self) -> Result<()> { self.pool.truncate().await }
///     async fn len(&self) -> Result<usize> { self.pool.count().await }
///     fn name(&self) -> &'static str { "Postgres" }
/// }
/// ```
#[async_trait]
pub trait RequestStorage: Send + Sync + Clone + 'static {
    /// Validate a candidate, assign identity and timestamp, and store it.
    ///
    /// Nothing is stored when validation fails.
    async fn append(&self, candidate: NewRequest) -> Result<Request> {
        let request = candidate.into_request()?;
        self.insert(request.clone()).await?;
        Ok(request)
    }

    /// Store an already validated request
    async fn insert(&self, request: Request) -> Result<()>;

    /// All stored requests, newest first
    async fn list_all(&self) -> Result<Vec<Request>>;

    /// Remove every stored request
    async fn clear(&self) -> Result<()>;

    /// Number of stored requests
    async fn len(&self) -> Result<usize>;

    /// Return the storage name (for logging)
    fn name(&self) -> &'static str;
}

/// In-memory request storage
///
/// Contents are lost when the process exits.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    requests: Arc<DashMap<Uuid, (u64, Request)>>,
    counter: Arc<AtomicU64>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RequestStorage for MemoryStorage {
    async fn insert(&self, request: Request) -> Result<()> {
        let seq = self.counter.fetch_add(1, Ordering::SeqCst);
        self.requests.insert(request.id, (seq, request));
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Request>> {
        let mut entries: Vec<(u64, Request)> =
            self.requests.iter().map(|e| e.value().clone()).collect();

        // Newest first; equal timestamps fall back to insertion order
        entries.sort_by(|(seq_a, a), (seq_b, b)| {
            b.timestamp.cmp(&a.timestamp).then(seq_b.cmp(seq_a))
        });

        Ok(entries.into_iter().map(|(_, request)| request).collect())
    }

    async fn clear(&self) -> Result<()> {
        self.requests.clear();
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.requests.len())
    }

    fn name(&self) -> &'static str {
        "Memory"
    }
}
