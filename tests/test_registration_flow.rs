//! End-to-end workflow tests over the in-process ledger and index:
//! registration happy path (including the QR round trip), resume semantics
//! after rejection and ambiguous outcomes, degraded index writes, and the
//! verification failure modes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use vibechain::domain::index::{BackendIndex, IndexError};
use vibechain::domain::model::{ChainReceipt, ChainRecord, IndexEntry, ProductHash, UpdateEntry};
use vibechain::domain::registration::{RegistrationStage, WorkflowError};
use vibechain::domain::registry::{ChainError, ChainRegistry};
use vibechain::domain::session::{NetworkId, WalletAgent, WalletError, WalletSession};
use vibechain::storage::memory::{MemoryIndex, MemoryRegistry};
use vibechain::{
    commit_product, parse_scanned_payload, qr_payload, KeypairWallet, ProductDraft,
    RegistrationWorkflow, VerificationStatus, VerificationWorkflow,
};

fn widget_draft() -> ProductDraft {
    ProductDraft {
        name: "Widget".to_string(),
        description: "A widget".to_string(),
        batch: "B100".to_string(),
        manufacture_date: chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
    }
}

async fn test_session() -> WalletSession {
    WalletSession::connect(Arc::new(KeypairWallet::ephemeral()))
        .await
        .unwrap()
}

/// Simulates a transaction that lands on the ledger but whose confirmation
/// is never observed by the first caller.
struct UnconfirmedOnceRegistry {
    inner: MemoryRegistry,
    tripped: AtomicBool,
}

#[async_trait::async_trait]
impl ChainRegistry for UnconfirmedOnceRegistry {
    async fn register(
        &self,
        sku: &str,
        hash: &ProductHash,
        session: &WalletSession,
    ) -> Result<ChainReceipt, ChainError> {
        let receipt = self.inner.register(sku, hash, session).await?;
        if !self.tripped.swap(true, Ordering::SeqCst) {
            return Err(ChainError::Unconfirmed);
        }
        Ok(receipt)
    }

    async fn creation(&self, product_id: u64) -> Result<ChainRecord, ChainError> {
        self.inner.creation(product_id).await
    }

    async fn update(&self, product_id: u64, index: u64) -> Result<UpdateEntry, ChainError> {
        self.inner.update(product_id, index).await
    }

    async fn find_by_hash(&self, hash: &ProductHash) -> Result<Option<u64>, ChainError> {
        self.inner.find_by_hash(hash).await
    }

    async fn add_update(
        &self,
        product_id: u64,
        metadata_hash: &ProductHash,
        note: &str,
        session: &WalletSession,
    ) -> Result<(), ChainError> {
        self.inner
            .add_update(product_id, metadata_hash, note, session)
            .await
    }
}

/// A ledger whose reads always fail, as seen from a verifier behind a
/// broken RPC connection.
struct UnreachableRegistry;

#[async_trait::async_trait]
impl ChainRegistry for UnreachableRegistry {
    async fn register(
        &self,
        _sku: &str,
        _hash: &ProductHash,
        _session: &WalletSession,
    ) -> Result<ChainReceipt, ChainError> {
        Err(ChainError::NetworkError("rpc unreachable".to_string()))
    }

    async fn creation(&self, _product_id: u64) -> Result<ChainRecord, ChainError> {
        Err(ChainError::NetworkError("rpc unreachable".to_string()))
    }

    async fn update(&self, _product_id: u64, _index: u64) -> Result<UpdateEntry, ChainError> {
        Err(ChainError::NetworkError("rpc unreachable".to_string()))
    }

    async fn find_by_hash(&self, _hash: &ProductHash) -> Result<Option<u64>, ChainError> {
        Err(ChainError::NetworkError("rpc unreachable".to_string()))
    }

    async fn add_update(
        &self,
        _product_id: u64,
        _metadata_hash: &ProductHash,
        _note: &str,
        _session: &WalletSession,
    ) -> Result<(), ChainError> {
        Err(ChainError::NetworkError("rpc unreachable".to_string()))
    }
}

/// An index whose writes fail.
struct FailingIndex;

#[async_trait::async_trait]
impl BackendIndex for FailingIndex {
    async fn put(&self, _entry: &IndexEntry) -> Result<(), IndexError> {
        Err(IndexError::StoreError("disk full".to_string()))
    }

    async fn get_by_hash(&self, _hash: &ProductHash) -> Result<Option<IndexEntry>, IndexError> {
        Ok(None)
    }
}

/// A signing agent that rejects the next signature request, then signs.
struct RejectingOnceAgent {
    inner: KeypairWallet,
    reject_next: AtomicBool,
}

#[async_trait::async_trait]
impl WalletAgent for RejectingOnceAgent {
    async fn request_accounts(&self) -> Result<solana_sdk::pubkey::Pubkey, WalletError> {
        self.inner.request_accounts().await
    }

    async fn sign_message(
        &self,
        message: &str,
    ) -> Result<solana_sdk::signature::Signature, WalletError> {
        if self.reject_next.swap(false, Ordering::SeqCst) {
            return Err(WalletError::UserRejected);
        }
        self.inner.sign_message(message).await
    }

    async fn sign_transaction(
        &self,
        transaction: &mut solana_sdk::transaction::Transaction,
        recent_blockhash: solana_sdk::hash::Hash,
    ) -> Result<(), WalletError> {
        self.inner
            .sign_transaction(transaction, recent_blockhash)
            .await
    }

    fn network(&self) -> NetworkId {
        self.inner.network()
    }

    async fn switch_network(&self, target: &NetworkId) -> Result<(), WalletError> {
        self.inner.switch_network(target).await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_end_to_end_registration_and_verification() {
    let session = test_session().await;
    let registry = Arc::new(MemoryRegistry::new());
    let index = Arc::new(MemoryIndex::new());

    // Seed six earlier registrations so the draft under test lands on id 7.
    for i in 0..6 {
        let hash = commit_product(&ProductDraft {
            name: format!("Seed {}", i),
            description: String::new(),
            batch: format!("S{}", i),
            manufacture_date: chrono::NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
        });
        registry
            .register(&format!("S{}", i), &hash, &session)
            .await
            .unwrap();
    }

    let mut workflow = RegistrationWorkflow::new(
        widget_draft(),
        session.clone(),
        registry.clone(),
        index.clone(),
    );
    let complete = workflow.run().await.unwrap();

    assert_eq!(workflow.stage(), RegistrationStage::Complete);
    assert_eq!(complete.product_id, 7);
    assert_eq!(complete.hash, commit_product(&widget_draft()));
    assert!(complete.confirmation_id.is_some());
    assert!(!complete.degraded());
    assert_eq!(registry.product_count().await, 7);

    // The stored index entry carries a verifiable attestation.
    let entry = index.get_by_hash(&complete.hash).await.unwrap().unwrap();
    assert_eq!(entry.product_id_on_chain, Some(7));
    assert_eq!(entry.vendor_address, session.address().to_string());
    assert!(entry.metadata["attestation"]["signature"].is_string());

    // QR round trip: payload -> scan -> hash -> verification.
    let payload = qr_payload("http://localhost:5173", &complete.hash);
    let scanned = parse_scanned_payload(&payload).unwrap();
    assert_eq!(scanned, complete.hash);

    let verifier = VerificationWorkflow::new(index, registry);
    let report = verifier.verify(&scanned).await.unwrap();
    assert_eq!(report.name, "Widget");
    assert_eq!(report.batch.as_deref(), Some("B100"));
    assert!(report.status.is_chain_verified());
    let record = report.chain_record.unwrap();
    assert_eq!(record.product_id, 7);
    assert_eq!(record.initial_hash, complete.hash);
    assert_eq!(record.vendor, session.address());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unconfirmed_submission_reconciles_without_resubmitting() {
    let session = test_session().await;
    let registry = Arc::new(UnconfirmedOnceRegistry {
        inner: MemoryRegistry::new(),
        tripped: AtomicBool::new(false),
    });
    let index = Arc::new(MemoryIndex::new());

    let mut workflow =
        RegistrationWorkflow::new(widget_draft(), session, registry.clone(), index);

    let err = workflow.run().await.unwrap_err();
    assert_eq!(err.stage, RegistrationStage::ChainConfirmed);
    assert!(matches!(
        err.reason,
        WorkflowError::Chain(ChainError::Unconfirmed)
    ));

    // The retry must reconcile against the ledger and adopt the record that
    // already landed instead of creating a second one.
    let complete = workflow.run().await.unwrap();
    assert_eq!(complete.product_id, 1);
    assert!(complete.confirmation_id.is_none());
    assert_eq!(registry.inner.product_count().await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_rejected_signature_is_recoverable() {
    let agent = RejectingOnceAgent {
        inner: KeypairWallet::ephemeral(),
        reject_next: AtomicBool::new(true),
    };
    let session = WalletSession::connect(Arc::new(agent)).await.unwrap();
    let registry = Arc::new(MemoryRegistry::new());
    let index = Arc::new(MemoryIndex::new());

    let mut workflow =
        RegistrationWorkflow::new(widget_draft(), session, registry.clone(), index);

    let err = workflow.run().await.unwrap_err();
    assert_eq!(err.stage, RegistrationStage::Signed);
    assert!(matches!(
        err.reason,
        WorkflowError::Wallet(WalletError::UserRejected)
    ));
    // Nothing was submitted.
    assert_eq!(registry.product_count().await, 0);

    // Retrying resumes at the signing stage and completes.
    let complete = workflow.run().await.unwrap();
    assert_eq!(complete.product_id, 1);
    assert_eq!(registry.product_count().await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_index_write_failure_is_degraded_success() {
    let session = test_session().await;
    let registry = Arc::new(MemoryRegistry::new());

    let mut workflow = RegistrationWorkflow::new(
        widget_draft(),
        session,
        registry.clone(),
        Arc::new(FailingIndex),
    );

    let complete = workflow.run().await.unwrap();
    assert!(complete.degraded());
    assert!(complete.index_error.as_deref().unwrap().contains("disk full"));
    // The chain write still happened exactly once.
    assert_eq!(registry.product_count().await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_invalid_draft_fails_locally() {
    let session = test_session().await;
    let registry = Arc::new(MemoryRegistry::new());

    let mut draft = widget_draft();
    draft.name = String::new();
    let mut workflow = RegistrationWorkflow::new(
        draft,
        session,
        registry.clone(),
        Arc::new(MemoryIndex::new()),
    );

    let err = workflow.run().await.unwrap_err();
    assert_eq!(err.stage, RegistrationStage::Draft);
    assert!(matches!(err.reason, WorkflowError::Invalid(_)));
    assert_eq!(registry.product_count().await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_network_switch_cancels_in_flight_workflow() {
    let session = test_session().await;
    let registry = Arc::new(MemoryRegistry::new());

    let mut workflow = RegistrationWorkflow::new(
        widget_draft(),
        session.clone(),
        registry.clone(),
        Arc::new(MemoryIndex::new()),
    );

    let mut events = session.subscribe();
    session
        .switch_network(&NetworkId::from("testnet"))
        .await
        .unwrap();
    assert!(matches!(
        events.try_recv().unwrap(),
        vibechain::WalletEvent::NetworkChanged(_)
    ));

    let err = workflow.run().await.unwrap_err();
    assert!(matches!(err.reason, WorkflowError::SessionInvalidated));
    assert_eq!(registry.product_count().await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_duplicate_submissions_both_land_on_the_ledger() {
    // Documents current ledger behavior: identical content submitted twice
    // without reconciliation creates two distinct entries.
    let session = test_session().await;
    let registry = Arc::new(MemoryRegistry::new());
    let index = Arc::new(MemoryIndex::new());

    let mut first = RegistrationWorkflow::new(
        widget_draft(),
        session.clone(),
        registry.clone(),
        index.clone(),
    );
    let mut second =
        RegistrationWorkflow::new(widget_draft(), session, registry.clone(), index);

    let a = first.run().await.unwrap();
    let b = second.run().await.unwrap();

    assert_eq!(a.hash, b.hash);
    assert_ne!(a.product_id, b.product_id);
    assert_eq!(registry.product_count().await, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_verification_with_unreachable_chain_is_partial() {
    let session = test_session().await;
    let registry = Arc::new(MemoryRegistry::new());
    let index = Arc::new(MemoryIndex::new());

    let mut workflow = RegistrationWorkflow::new(
        widget_draft(),
        session,
        registry,
        index.clone(),
    );
    let complete = workflow.run().await.unwrap();

    // Same index, but the chain is now unreachable.
    let verifier = VerificationWorkflow::new(index, Arc::new(UnreachableRegistry));
    let report = verifier.verify(&complete.hash).await.unwrap();

    assert_eq!(report.name, "Widget");
    assert!(!report.status.is_chain_verified());
    assert!(report.chain_record.is_none());
    match report.status {
        VerificationStatus::IndexOnly { reason } => {
            assert!(reason.contains("unavailable"));
        }
        VerificationStatus::ChainVerified => panic!("must not report chain-verified"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_verification_of_unknown_hash_is_not_found() {
    let verifier = VerificationWorkflow::new(
        Arc::new(MemoryIndex::new()),
        Arc::new(MemoryRegistry::new()),
    );
    let hash = commit_product(&widget_draft());
    let err = verifier.verify(&hash).await.unwrap_err();
    assert!(matches!(
        err,
        vibechain::domain::verification::VerifyError::NotFound
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_supply_chain_updates_appear_in_history_order() {
    let session = test_session().await;
    let registry = Arc::new(MemoryRegistry::new());
    let index = Arc::new(MemoryIndex::new());

    let mut workflow = RegistrationWorkflow::new(
        widget_draft(),
        session.clone(),
        registry.clone(),
        index.clone(),
    );
    let complete = workflow.run().await.unwrap();

    for note in ["Shipped to warehouse", "Customs cleared"] {
        let metadata_hash = vibechain::hash_value(&serde_json::json!({ "note": note }));
        registry
            .add_update(complete.product_id, &metadata_hash, note, &session)
            .await
            .unwrap();
    }

    let verifier = VerificationWorkflow::new(index, registry);
    let report = verifier.verify(&complete.hash).await.unwrap();
    assert!(report.status.is_chain_verified());
    assert_eq!(report.updates.len(), 2);
    assert_eq!(report.updates[0].note, "Shipped to warehouse");
    assert_eq!(report.updates[1].note, "Customs cleared");
    assert_eq!(report.chain_record.unwrap().updates_count, 2);
}
