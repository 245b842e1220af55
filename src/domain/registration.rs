//! The registration workflow: a resumable, linear state machine that takes a
//! vendor draft through hashing, attestation signing, the ledger write and
//! the index write.
//!
//! `Draft -> Hashed -> Signed -> ChainSubmitted -> ChainConfirmed ->
//! IndexWritten -> Complete`, with failure reachable from any non-terminal
//! stage. A failed run keeps its progress: calling `run` again resumes from
//! the stage that failed instead of restarting, which is what prevents
//! duplicate ledger writes on retry.

use crate::crypto::attestation::SignedAttestation;
use crate::crypto::hashing::commit_product;
use crate::domain::index::{BackendIndex, IndexError};
use crate::domain::model::{ChainReceipt, IndexEntry, ProductDraft, ProductHash};
use crate::domain::registry::{ChainError, ChainRegistry};
use crate::domain::session::{WalletError, WalletSession};
use chrono::Utc;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationStage {
    Draft,
    Hashed,
    Signed,
    ChainSubmitted,
    ChainConfirmed,
    IndexWritten,
    Complete,
}

impl fmt::Display for RegistrationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RegistrationStage::Draft => "Draft",
            RegistrationStage::Hashed => "Hashed",
            RegistrationStage::Signed => "Signed",
            RegistrationStage::ChainSubmitted => "ChainSubmitted",
            RegistrationStage::ChainConfirmed => "ChainConfirmed",
            RegistrationStage::IndexWritten => "IndexWritten",
            RegistrationStage::Complete => "Complete",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("invalid draft: {0}")]
    Invalid(String),
    #[error(transparent)]
    Wallet(#[from] WalletError),
    #[error(transparent)]
    Chain(#[from] ChainError),
    /// The wallet session changed account or network after this workflow
    /// started; the run is cancelled and a fresh workflow must be created.
    #[error("wallet session was invalidated mid-run")]
    SessionInvalidated,
}

#[derive(Debug, thiserror::Error)]
#[error("registration failed at {stage}: {reason}")]
pub struct RegistrationError {
    pub stage: RegistrationStage,
    pub reason: WorkflowError,
}

/// Terminal result of a completed registration, feeding QR generation.
#[derive(Debug, Clone)]
pub struct RegistrationComplete {
    pub hash: ProductHash,
    pub product_id: u64,
    /// `None` when the record was adopted via reconciliation rather than a
    /// directly observed confirmation.
    pub confirmation_id: Option<String>,
    /// Degraded success: the chain write is confirmed but descriptive fields
    /// could not be stored in the index. Never silently dropped.
    pub index_error: Option<String>,
}

impl RegistrationComplete {
    pub fn degraded(&self) -> bool {
        self.index_error.is_some()
    }
}

pub struct RegistrationWorkflow {
    draft: ProductDraft,
    session: WalletSession,
    registry: Arc<dyn ChainRegistry>,
    index: Arc<dyn BackendIndex>,
    session_epoch: u64,
    stage: RegistrationStage,
    hash: Option<ProductHash>,
    attestation: Option<SignedAttestation>,
    receipt: Option<ChainReceipt>,
    index_error: Option<String>,
}

impl RegistrationWorkflow {
    pub fn new(
        draft: ProductDraft,
        session: WalletSession,
        registry: Arc<dyn ChainRegistry>,
        index: Arc<dyn BackendIndex>,
    ) -> Self {
        let session_epoch = session.epoch();
        Self {
            draft,
            session,
            registry,
            index,
            session_epoch,
            stage: RegistrationStage::Draft,
            hash: None,
            attestation: None,
            receipt: None,
            index_error: None,
        }
    }

    pub fn stage(&self) -> RegistrationStage {
        self.stage
    }

    pub fn hash(&self) -> Option<ProductHash> {
        self.hash
    }

    /// Drives the workflow to completion, resuming from the current stage.
    ///
    /// Exactly one ledger `register` call is made per completed run: a run
    /// left in the ambiguous `ChainSubmitted` state first reconciles via
    /// `find_by_hash` and only re-submits when no record exists.
    pub async fn run(&mut self) -> Result<RegistrationComplete, RegistrationError> {
        loop {
            match self.stage {
                RegistrationStage::Draft => {
                    self.draft.validate().map_err(|e| RegistrationError {
                        stage: RegistrationStage::Draft,
                        reason: WorkflowError::Invalid(e),
                    })?;
                    let hash = commit_product(&self.draft);
                    println!("> Registration: draft hashed ({})", hash);
                    self.hash = Some(hash);
                    self.stage = RegistrationStage::Hashed;
                }
                RegistrationStage::Hashed => {
                    let hash = self.hash.expect("hash is set before leaving Draft");
                    match self.session.sign_attestation(hash, Utc::now()).await {
                        Ok(attestation) => {
                            println!(
                                "> Registration: attestation signed by {}",
                                attestation.signer
                            );
                            self.attestation = Some(attestation);
                            self.stage = RegistrationStage::Signed;
                        }
                        Err(reason) => {
                            // Recoverable: the user may retry, resuming here.
                            return Err(RegistrationError {
                                stage: RegistrationStage::Signed,
                                reason: reason.into(),
                            });
                        }
                    }
                }
                RegistrationStage::Signed => {
                    if self.session.epoch() != self.session_epoch {
                        return Err(RegistrationError {
                            stage: RegistrationStage::ChainSubmitted,
                            reason: WorkflowError::SessionInvalidated,
                        });
                    }
                    let hash = self.hash.expect("hash is set before leaving Draft");
                    self.stage = RegistrationStage::ChainSubmitted;
                    match self
                        .registry
                        .register(&self.draft.batch, &hash, &self.session)
                        .await
                    {
                        Ok(receipt) => {
                            println!(
                                "> Registration: chain record {} confirmed ({})",
                                receipt.product_id,
                                receipt.confirmation_id.as_deref().unwrap_or("-")
                            );
                            self.receipt = Some(receipt);
                            self.stage = RegistrationStage::ChainConfirmed;
                        }
                        Err(ChainError::Unconfirmed) => {
                            // Ambiguous: the write may still land. Stay in
                            // ChainSubmitted so the next run reconciles
                            // before any re-submit.
                            return Err(RegistrationError {
                                stage: RegistrationStage::ChainConfirmed,
                                reason: ChainError::Unconfirmed.into(),
                            });
                        }
                        Err(reason) => {
                            // Definitive failure: nothing landed, safe to
                            // re-submit on retry.
                            self.stage = RegistrationStage::Signed;
                            return Err(RegistrationError {
                                stage: RegistrationStage::ChainSubmitted,
                                reason: reason.into(),
                            });
                        }
                    }
                }
                RegistrationStage::ChainSubmitted => {
                    // Resumed after an ambiguous outcome: reconcile first.
                    let hash = self.hash.expect("hash is set before leaving Draft");
                    println!("> Registration: reconciling ambiguous submission for {}", hash);
                    match self.registry.find_by_hash(&hash).await {
                        Ok(Some(product_id)) => {
                            println!(
                                "> Registration: found existing chain record {}; not re-submitting",
                                product_id
                            );
                            self.receipt = Some(ChainReceipt {
                                product_id,
                                confirmation_id: None,
                            });
                            self.stage = RegistrationStage::ChainConfirmed;
                        }
                        Ok(None) => {
                            // The earlier submission never landed.
                            self.stage = RegistrationStage::Signed;
                        }
                        Err(reason) => {
                            return Err(RegistrationError {
                                stage: RegistrationStage::ChainSubmitted,
                                reason: reason.into(),
                            });
                        }
                    }
                }
                RegistrationStage::ChainConfirmed => {
                    let entry = self.index_entry();
                    match self.index.put(&entry).await {
                        Ok(()) => {
                            self.stage = RegistrationStage::IndexWritten;
                        }
                        Err(IndexError::StoreError(e)) => {
                            // Non-fatal to authenticity (the chain write is
                            // confirmed) but surfaced as degraded success.
                            eprintln!(
                                "> Registration: index write failed ({}); completing as degraded success",
                                e
                            );
                            self.index_error = Some(e);
                            self.stage = RegistrationStage::Complete;
                        }
                    }
                }
                RegistrationStage::IndexWritten => {
                    self.stage = RegistrationStage::Complete;
                }
                RegistrationStage::Complete => {
                    return Ok(self.completion());
                }
            }
        }
    }

    fn completion(&self) -> RegistrationComplete {
        let receipt = self
            .receipt
            .as_ref()
            .expect("receipt is set before reaching Complete");
        RegistrationComplete {
            hash: self.hash.expect("hash is set before leaving Draft"),
            product_id: receipt.product_id,
            confirmation_id: receipt.confirmation_id.clone(),
            index_error: self.index_error.clone(),
        }
    }

    fn index_entry(&self) -> IndexEntry {
        let attestation = self
            .attestation
            .as_ref()
            .expect("attestation is set before reaching ChainConfirmed");
        let receipt = self
            .receipt
            .as_ref()
            .expect("receipt is set before reaching ChainConfirmed");
        IndexEntry {
            hash: attestation.hash,
            product_id_on_chain: Some(receipt.product_id),
            vendor_address: attestation.signer.to_string(),
            name: self.draft.name.clone(),
            description: self.draft.description.clone(),
            metadata: serde_json::json!({
                "batch": self.draft.batch,
                "manufactureDate": self.draft.manufacture_date,
                "attestation": {
                    "message": attestation.message,
                    "signature": attestation.signature.to_string(),
                    "timestamp": attestation.timestamp.to_rfc3339(),
                },
            }),
        }
    }
}
