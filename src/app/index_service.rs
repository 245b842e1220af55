//! The backend index service.
//!
//! Sits between the HTTP handlers and the store: validates entries before
//! they are written and keeps store errors in one place. The store is a
//! trait object so the server can run against Postgres in production and
//! the in-memory index in tests.

use crate::domain::index::BackendIndex;
use crate::domain::model::{IndexEntry, ProductHash};
use crate::infra::config;
use crate::storage::index::PostgresIndexStore;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;

pub struct IndexService {
    store: Arc<dyn BackendIndex>,
}

impl IndexService {
    /// Connects to Postgres (via `DATABASE_URL`) and prepares the schema.
    pub async fn new() -> Result<Self, anyhow::Error> {
        dotenv::dotenv().ok();
        let database_url = config::database_url();

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&database_url)
            .await?;

        let store = PostgresIndexStore::new(pool).await?;
        Ok(Self::with_store(Arc::new(store)))
    }

    /// Builds the service over any index store (used by tests and local
    /// development with the in-memory index).
    pub fn with_store(store: Arc<dyn BackendIndex>) -> Self {
        Self { store }
    }

    /// Validates and stores an entry. Returns the stored entry.
    pub async fn save(&self, entry: IndexEntry) -> Result<IndexEntry, String> {
        if entry.vendor_address.trim().is_empty() {
            return Err("vendorAddress must not be empty".to_string());
        }
        if entry.name.trim().is_empty() {
            return Err("name must not be empty".to_string());
        }

        self.store.put(&entry).await.map_err(|e| e.to_string())?;
        println!(
            "> IndexService: stored entry for {} (chain id {:?})",
            entry.hash, entry.product_id_on_chain
        );
        Ok(entry)
    }

    pub async fn lookup(&self, hash: &ProductHash) -> Result<Option<IndexEntry>, String> {
        self.store.get_by_hash(hash).await.map_err(|e| e.to_string())
    }

    pub async fn ping(&self) -> Result<(), String> {
        self.store.ping().await.map_err(|e| e.to_string())
    }
}
