pub mod app;
pub mod crypto;
pub mod domain;
pub mod infra;
pub mod storage;
pub mod transport;

// Convenience re-exports (keeps call-sites clean)
pub use app::index_service::IndexService;
pub use crypto::attestation::{attestation_message, SignedAttestation};
pub use crypto::hashing::{commit_product, hash_value};
pub use domain::index::BackendIndex;
pub use domain::model::{
    ChainReceipt, ChainRecord, IndexEntry, ProductDraft, ProductHash, UpdateEntry,
    VerificationReport, VerificationStatus,
};
pub use domain::registration::{RegistrationComplete, RegistrationWorkflow};
pub use domain::registry::ChainRegistry;
pub use domain::session::{NetworkId, WalletAgent, WalletEvent, WalletSession};
pub use domain::verification::{parse_scanned_payload, qr_payload, VerificationWorkflow};
pub use infra::solana::SolanaRegistry;
pub use infra::wallet::KeypairWallet;
