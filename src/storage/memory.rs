//! In-process implementations of the ledger and index, used for local
//! development and tests.

use crate::domain::index::{BackendIndex, IndexError};
use crate::domain::model::{ChainReceipt, ChainRecord, IndexEntry, ProductHash, UpdateEntry};
use crate::domain::registry::{ChainError, ChainRegistry};
use crate::domain::session::WalletSession;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::Mutex;

#[derive(Default)]
struct Ledger {
    next_product_id: u64,
    products: BTreeMap<u64, ChainRecord>,
    updates: HashMap<u64, Vec<UpdateEntry>>,
    /// First registration for a hash wins the index slot; the ledger itself
    /// stays non-idempotent.
    by_hash: HashMap<ProductHash, u64>,
}

/// An in-process append-only ledger with the same contract as the on-chain
/// registry: monotonic product ids from 1, ordered update logs, and no
/// deduplication of identical registrations.
pub struct MemoryRegistry {
    ledger: Mutex<Ledger>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self {
            ledger: Mutex::new(Ledger {
                next_product_id: 1,
                ..Ledger::default()
            }),
        }
    }

    /// Number of records on the ledger (one per `register` call that landed).
    pub async fn product_count(&self) -> usize {
        self.ledger.lock().await.products.len()
    }
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ChainRegistry for MemoryRegistry {
    async fn register(
        &self,
        sku: &str,
        hash: &ProductHash,
        session: &WalletSession,
    ) -> Result<ChainReceipt, ChainError> {
        let mut ledger = self.ledger.lock().await;
        let product_id = ledger.next_product_id;
        ledger.next_product_id += 1;

        let record = ChainRecord {
            product_id,
            vendor: session.address(),
            sku: sku.to_string(),
            initial_hash: *hash,
            created_at: Utc::now(),
            updates_count: 0,
        };
        ledger.products.insert(product_id, record);
        ledger.by_hash.entry(*hash).or_insert(product_id);

        Ok(ChainReceipt {
            product_id,
            confirmation_id: Some(format!("memory-tx-{}", product_id)),
        })
    }

    async fn creation(&self, product_id: u64) -> Result<ChainRecord, ChainError> {
        self.ledger
            .lock()
            .await
            .products
            .get(&product_id)
            .cloned()
            .ok_or(ChainError::NotFound(product_id))
    }

    async fn update(&self, product_id: u64, index: u64) -> Result<UpdateEntry, ChainError> {
        self.ledger
            .lock()
            .await
            .updates
            .get(&product_id)
            .and_then(|log| log.get(index as usize))
            .cloned()
            .ok_or(ChainError::NotFound(product_id))
    }

    async fn find_by_hash(&self, hash: &ProductHash) -> Result<Option<u64>, ChainError> {
        Ok(self.ledger.lock().await.by_hash.get(hash).copied())
    }

    async fn add_update(
        &self,
        product_id: u64,
        metadata_hash: &ProductHash,
        note: &str,
        session: &WalletSession,
    ) -> Result<(), ChainError> {
        let mut ledger = self.ledger.lock().await;
        let record = ledger
            .products
            .get_mut(&product_id)
            .ok_or(ChainError::NotFound(product_id))?;
        record.updates_count += 1;

        let entry = UpdateEntry {
            timestamp: Utc::now(),
            metadata_hash: *metadata_hash,
            updater: session.address(),
            note: note.to_string(),
        };
        ledger.updates.entry(product_id).or_default().push(entry);
        Ok(())
    }
}

/// An in-process hash → entry map with the same contract as the backend
/// index.
pub struct MemoryIndex {
    entries: Mutex<HashMap<ProductHash, IndexEntry>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl BackendIndex for MemoryIndex {
    async fn put(&self, entry: &IndexEntry) -> Result<(), IndexError> {
        self.entries
            .lock()
            .await
            .insert(entry.hash, entry.clone());
        Ok(())
    }

    async fn get_by_hash(&self, hash: &ProductHash) -> Result<Option<IndexEntry>, IndexError> {
        Ok(self.entries.lock().await.get(hash).cloned())
    }
}
