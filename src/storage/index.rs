//! Postgres-backed store for the backend index API.

use crate::domain::index::{BackendIndex, IndexError};
use crate::domain::model::{IndexEntry, ProductHash};
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Row};
use std::str::FromStr;

pub struct PostgresIndexStore {
    pool: PgPool,
}

impl PostgresIndexStore {
    /// Creates the store and the `products` table if it does not exist yet.
    pub async fn new(pool: PgPool) -> Result<Self, anyhow::Error> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS products (
                hash TEXT PRIMARY KEY,
                product_id_on_chain BIGINT,
                vendor_address TEXT NOT NULL,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                metadata JSONB NOT NULL DEFAULT '{}'::jsonb,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn row_to_entry(row: &sqlx::postgres::PgRow) -> Result<IndexEntry, IndexError> {
    let hash: String = row
        .try_get("hash")
        .map_err(|e| IndexError::StoreError(e.to_string()))?;
    let hash = ProductHash::from_str(&hash)
        .map_err(|e| IndexError::StoreError(format!("corrupt hash column: {}", e)))?;
    let product_id_on_chain: Option<i64> = row
        .try_get("product_id_on_chain")
        .map_err(|e| IndexError::StoreError(e.to_string()))?;

    Ok(IndexEntry {
        hash,
        product_id_on_chain: product_id_on_chain.map(|id| id as u64),
        vendor_address: row
            .try_get("vendor_address")
            .map_err(|e| IndexError::StoreError(e.to_string()))?,
        name: row
            .try_get("name")
            .map_err(|e| IndexError::StoreError(e.to_string()))?,
        description: row
            .try_get("description")
            .map_err(|e| IndexError::StoreError(e.to_string()))?,
        metadata: row
            .try_get::<JsonValue, _>("metadata")
            .map_err(|e| IndexError::StoreError(e.to_string()))?,
    })
}

#[async_trait::async_trait]
impl BackendIndex for PostgresIndexStore {
    async fn put(&self, entry: &IndexEntry) -> Result<(), IndexError> {
        sqlx::query(
            "INSERT INTO products (hash, product_id_on_chain, vendor_address, name, description, metadata)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (hash) DO UPDATE SET
                product_id_on_chain = EXCLUDED.product_id_on_chain,
                vendor_address = EXCLUDED.vendor_address,
                name = EXCLUDED.name,
                description = EXCLUDED.description,
                metadata = EXCLUDED.metadata",
        )
        .bind(entry.hash.to_string())
        .bind(entry.product_id_on_chain.map(|id| id as i64))
        .bind(&entry.vendor_address)
        .bind(&entry.name)
        .bind(&entry.description)
        .bind(&entry.metadata)
        .execute(&self.pool)
        .await
        .map_err(|e| IndexError::StoreError(e.to_string()))?;
        Ok(())
    }

    async fn get_by_hash(&self, hash: &ProductHash) -> Result<Option<IndexEntry>, IndexError> {
        let row = sqlx::query(
            "SELECT hash, product_id_on_chain, vendor_address, name, description, metadata
             FROM products WHERE hash = $1",
        )
        .bind(hash.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| IndexError::StoreError(e.to_string()))?;

        row.as_ref().map(row_to_entry).transpose()
    }

    async fn ping(&self) -> Result<(), IndexError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| IndexError::StoreError(format!("DB ping failed: {}", e)))?;
        Ok(())
    }
}
