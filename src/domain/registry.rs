//! The append-only product ledger, behind a trait so the workflows can run
//! against the on-chain registry (`infra::solana::SolanaRegistry`) or the
//! in-process ledger (`storage::memory::MemoryRegistry`).

use crate::domain::model::{ChainReceipt, ChainRecord, ProductHash, UpdateEntry};
use crate::domain::session::{WalletError, WalletSession};

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// The ledger definitively refused the write; safe to retry.
    #[error("transaction rejected: {0}")]
    Rejected(String),
    /// The outcome is ambiguous: the write may still land. Callers must
    /// reconcile with a read before re-submitting.
    #[error("transaction unconfirmed within the confirmation window")]
    Unconfirmed,
    #[error("chain network error: {0}")]
    NetworkError(String),
    #[error("product {0} not found on chain")]
    NotFound(u64),
    #[error(transparent)]
    Wallet(#[from] WalletError),
}

/// Append-only external ledger of product records plus per-product update
/// logs.
///
/// `register` is NOT idempotent at the ledger level: two calls with the same
/// inputs create two distinct entries. Deduplication is the caller's job
/// (see `RegistrationWorkflow`'s reconciliation step).
#[async_trait::async_trait]
pub trait ChainRegistry: Send + Sync {
    /// Submits a product registration and waits for confirmation. The result
    /// is only durable once confirmed; `Unconfirmed` means the outcome is
    /// unknown, not that the write failed.
    async fn register(
        &self,
        sku: &str,
        hash: &ProductHash,
        session: &WalletSession,
    ) -> Result<ChainReceipt, ChainError>;

    /// Reads the creation record of a product.
    async fn creation(&self, product_id: u64) -> Result<ChainRecord, ChainError>;

    /// Reads one entry of a product's update log.
    async fn update(&self, product_id: u64, index: u64) -> Result<UpdateEntry, ChainError>;

    /// Reconciliation read: the product id of the first confirmed record
    /// carrying `hash`, if any.
    async fn find_by_hash(&self, hash: &ProductHash) -> Result<Option<u64>, ChainError>;

    /// Appends a supply-chain update to an existing product.
    async fn add_update(
        &self,
        product_id: u64,
        metadata_hash: &ProductHash,
        note: &str,
        session: &WalletSession,
    ) -> Result<(), ChainError>;

    /// Creation record plus the full ordered update trail.
    ///
    /// Consistent with the latest confirmed ledger state at call time; may
    /// be stale relative to very recent writes.
    async fn history(&self, product_id: u64) -> Result<(ChainRecord, Vec<UpdateEntry>), ChainError> {
        let creation = self.creation(product_id).await?;
        let mut updates = Vec::with_capacity(creation.updates_count as usize);
        for index in 0..creation.updates_count {
            updates.push(self.update(product_id, index).await?);
        }
        Ok((creation, updates))
    }
}
