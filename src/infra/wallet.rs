//! File-backed signing agent: an Ed25519 keypair on disk playing the role a
//! browser wallet plays for the original front-end.

use crate::domain::session::{NetworkId, WalletAgent, WalletError};
use crate::infra::config;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::signer::keypair::{read_keypair_file, Keypair};
use solana_sdk::signer::Signer;
use solana_sdk::transaction::Transaction;
use std::sync::RwLock;

const KNOWN_NETWORKS: &[&str] = &["mainnet-beta", "testnet", "devnet", "localnet"];

pub struct KeypairWallet {
    keypair: Keypair,
    network: RwLock<NetworkId>,
}

impl KeypairWallet {
    pub fn new(keypair: Keypair, network: NetworkId) -> Self {
        Self {
            keypair,
            network: RwLock::new(network),
        }
    }

    /// Loads the keypair at `WALLET_KEYPAIR_PATH` (default
    /// `~/.config/solana/id.json`).
    pub fn from_env() -> Result<Self, WalletError> {
        let path = config::wallet_keypair_path();
        let keypair = read_keypair_file(&path)
            .map_err(|e| WalletError::NotAvailable(format!("failed to read {}: {}", path, e)))?;
        Ok(Self::new(
            keypair,
            NetworkId::from(config::solana_network().as_str()),
        ))
    }

    /// A throwaway wallet with a freshly generated key, for local
    /// development against the in-process ledger.
    pub fn ephemeral() -> Self {
        Self::new(Keypair::new(), NetworkId::from("devnet"))
    }
}

#[async_trait::async_trait]
impl WalletAgent for KeypairWallet {
    async fn request_accounts(&self) -> Result<Pubkey, WalletError> {
        Ok(self.keypair.pubkey())
    }

    async fn sign_message(&self, message: &str) -> Result<Signature, WalletError> {
        Ok(self.keypair.sign_message(message.as_bytes()))
    }

    async fn sign_transaction(
        &self,
        transaction: &mut Transaction,
        recent_blockhash: Hash,
    ) -> Result<(), WalletError> {
        transaction
            .try_sign(&[&self.keypair], recent_blockhash)
            .map_err(|e| WalletError::AgentUnavailable(e.to_string()))
    }

    fn network(&self) -> NetworkId {
        self.network.read().unwrap().clone()
    }

    async fn switch_network(&self, target: &NetworkId) -> Result<(), WalletError> {
        if !KNOWN_NETWORKS.contains(&target.0.as_str()) {
            return Err(WalletError::NetworkUnknown(target.0.clone()));
        }
        *self.network.write().unwrap() = target.clone();
        Ok(())
    }
}
