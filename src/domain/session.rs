//! Wallet sessions: an explicitly owned connection to an external signing
//! agent, with an event-subscription interface instead of ambient global
//! state.
//!
//! A session is bound to one address on one network. Switching accounts or
//! networks bumps the session epoch; in-flight workflows snapshot the epoch
//! at creation and treat a mismatch as cancellation, since chain identity
//! may have changed under them.

use crate::crypto::attestation::{attestation_message, SignedAttestation};
use crate::domain::model::ProductHash;
use chrono::{DateTime, Utc};
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::Transaction;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

/// Identifies the network (cluster) a signing agent is pointed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkId(pub String);

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NetworkId {
    fn from(s: &str) -> Self {
        NetworkId(s.to_string())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum WalletError {
    #[error("no signing agent available: {0}")]
    NotAvailable(String),
    #[error("signature request rejected by user")]
    UserRejected,
    #[error("signing agent unavailable: {0}")]
    AgentUnavailable(String),
    #[error("unknown network: {0}")]
    NetworkUnknown(String),
}

/// Emitted when the external agent reports a change.
#[derive(Debug, Clone)]
pub enum WalletEvent {
    AccountChanged(Option<Pubkey>),
    NetworkChanged(NetworkId),
}

/// The external signing agent behind a session.
///
/// The production implementation is a keypair file
/// (`infra::wallet::KeypairWallet`); tests plug in rejecting or unavailable
/// agents to exercise failure paths.
#[async_trait::async_trait]
pub trait WalletAgent: Send + Sync {
    /// Requests account access; the agent may prompt and the user may refuse.
    async fn request_accounts(&self) -> Result<Pubkey, WalletError>;

    /// Signs an arbitrary message. Suspends until the agent responds; no
    /// timeout is imposed here (the agent owns that).
    async fn sign_message(&self, message: &str) -> Result<Signature, WalletError>;

    /// Signs a prepared transaction with the agent's key.
    async fn sign_transaction(
        &self,
        transaction: &mut Transaction,
        recent_blockhash: Hash,
    ) -> Result<(), WalletError>;

    fn network(&self) -> NetworkId;

    async fn switch_network(&self, target: &NetworkId) -> Result<(), WalletError>;
}

struct SessionInner {
    agent: Arc<dyn WalletAgent>,
    /// Address is fixed for the session's lifetime; an account change from
    /// the agent invalidates the session rather than mutating it.
    address: Pubkey,
    network: RwLock<NetworkId>,
    epoch: AtomicU64,
    events: broadcast::Sender<WalletEvent>,
}

/// A connected signing identity: one address, one network, process-wide
/// single writer. Cheap to clone (shared state).
#[derive(Clone)]
pub struct WalletSession {
    inner: Arc<SessionInner>,
}

impl WalletSession {
    /// Connects to the agent and establishes a session.
    ///
    /// Idempotent from the caller's perspective: if the agent is already
    /// authorized it answers without re-prompting, and the resulting session
    /// is equivalent to the existing one.
    pub async fn connect(agent: Arc<dyn WalletAgent>) -> Result<Self, WalletError> {
        let address = agent.request_accounts().await?;
        let network = agent.network();
        println!("> WalletSession: connected as {} on {}", address, network);

        let (events, _) = broadcast::channel(16);
        Ok(Self {
            inner: Arc::new(SessionInner {
                agent,
                address,
                network: RwLock::new(network),
                epoch: AtomicU64::new(0),
                events,
            }),
        })
    }

    pub fn address(&self) -> Pubkey {
        self.inner.address
    }

    pub fn current_network(&self) -> NetworkId {
        self.inner.network.read().unwrap().clone()
    }

    /// Monotonic counter bumped on every account/network change. Workflows
    /// snapshot this at creation and bail out when it moves.
    pub fn epoch(&self) -> u64 {
        self.inner.epoch.load(Ordering::SeqCst)
    }

    /// Subscribes to account/network change events. Dropping the receiver
    /// deregisters the subscription.
    pub fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.inner.events.subscribe()
    }

    pub async fn sign(&self, message: &str) -> Result<Signature, WalletError> {
        self.inner.agent.sign_message(message).await
    }

    /// Signs the canonical attestation message for `hash` at `timestamp`.
    pub async fn sign_attestation(
        &self,
        hash: ProductHash,
        timestamp: DateTime<Utc>,
    ) -> Result<SignedAttestation, WalletError> {
        let signer = self.address();
        let message = attestation_message(&hash, &signer, &timestamp);
        let signature = self.sign(&message).await?;
        Ok(SignedAttestation {
            hash,
            signer,
            signature,
            timestamp,
            message,
        })
    }

    pub async fn sign_transaction(
        &self,
        transaction: &mut Transaction,
        recent_blockhash: Hash,
    ) -> Result<(), WalletError> {
        self.inner
            .agent
            .sign_transaction(transaction, recent_blockhash)
            .await
    }

    /// Switches the agent to `target`. Invalidates in-flight workflows,
    /// since chain identity changed.
    pub async fn switch_network(&self, target: &NetworkId) -> Result<(), WalletError> {
        self.inner.agent.switch_network(target).await?;
        *self.inner.network.write().unwrap() = target.clone();
        println!("> WalletSession: network switched to {}", target);
        self.invalidate(WalletEvent::NetworkChanged(target.clone()));
        Ok(())
    }

    /// Called when the agent reports an account change. The session does not
    /// follow the new account; callers must establish a fresh session.
    pub fn notify_account_changed(&self, account: Option<Pubkey>) {
        self.invalidate(WalletEvent::AccountChanged(account));
    }

    fn invalidate(&self, event: WalletEvent) {
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        // No subscribers is fine; send only fails when none are listening.
        let _ = self.inner.events.send(event);
    }
}
