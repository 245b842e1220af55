//! The backend index: a best-effort hash → descriptive-metadata store.
//!
//! Authoritative only for display fields; never the sole proof of
//! authenticity. Implementations: `infra::backend::HttpBackendIndex`
//! (client for the HTTP API), `storage::index::PostgresIndexStore` (the
//! API's own store) and `storage::memory::MemoryIndex`.

use crate::domain::model::{IndexEntry, ProductHash};

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("index store error: {0}")]
    StoreError(String),
}

#[async_trait::async_trait]
pub trait BackendIndex: Send + Sync {
    /// Stores (or overwrites) the entry for its hash.
    async fn put(&self, entry: &IndexEntry) -> Result<(), IndexError>;

    /// Looks up an entry; `None` means the hash is unknown to the index,
    /// which by itself proves nothing about authenticity.
    async fn get_by_hash(&self, hash: &ProductHash) -> Result<Option<IndexEntry>, IndexError>;

    /// Liveness probe.
    async fn ping(&self) -> Result<(), IndexError> {
        Ok(())
    }
}
