// Responsible for all communication with the on-chain product registry.

use crate::domain::model::{ChainReceipt, ChainRecord, ProductHash, UpdateEntry};
use crate::domain::registry::{ChainError, ChainRegistry};
use crate::domain::session::WalletSession;
use crate::infra::config;
use chrono::{DateTime, Utc};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_program::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
};
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::transaction::Transaction;
use std::str::FromStr;

// Anchor instruction discriminators: sha256("global:<name>")[0..8].
const INITIALIZE_DISCRIMINATOR: [u8; 8] = [175, 175, 109, 31, 13, 152, 155, 237];
const ADD_PRODUCT_DISCRIMINATOR: [u8; 8] = [0, 219, 137, 36, 105, 180, 164, 93];
const ADD_UPDATE_DISCRIMINATOR: [u8; 8] = [121, 250, 225, 47, 181, 81, 235, 80];

// Anchor account discriminators: sha256("account:<Name>")[0..8].
const REGISTRY_STATE_DISCRIMINATOR: [u8; 8] = [29, 34, 224, 195, 175, 183, 99, 97];
const PRODUCT_DISCRIMINATOR: [u8; 8] = [102, 76, 55, 251, 38, 73, 224, 229];
const PRODUCT_UPDATE_DISCRIMINATOR: [u8; 8] = [154, 239, 178, 252, 32, 193, 136, 170];
const HASH_INDEX_DISCRIMINATOR: [u8; 8] = [181, 243, 92, 3, 61, 247, 210, 207];

/// `ChainRegistry` implementation over the Anchor product registry program.
pub struct SolanaRegistry {
    client: RpcClient,
    program_id: Pubkey,
}

impl SolanaRegistry {
    pub fn new(rpc_url: String, program_id: Pubkey) -> Self {
        let client = RpcClient::new_with_commitment(rpc_url, CommitmentConfig::confirmed());
        Self { client, program_id }
    }

    pub fn from_env() -> anyhow::Result<Self> {
        let program_id = Pubkey::from_str(&config::solana_program_id())
            .map_err(|e| anyhow::anyhow!("SOLANA_PROGRAM_ID is not a valid pubkey: {}", e))?;
        Ok(Self::new(config::solana_rpc_url(), program_id))
    }

    pub fn program_id(&self) -> Pubkey {
        self.program_id
    }

    // The registry state account is a PDA so every client derives the same
    // address.
    pub fn registry_state_pubkey(&self) -> Pubkey {
        Pubkey::find_program_address(&[b"registry_state"], &self.program_id).0
    }

    fn product_pubkey(&self, product_id: u64) -> Pubkey {
        Pubkey::find_program_address(
            &[b"product", &product_id.to_le_bytes()],
            &self.program_id,
        )
        .0
    }

    fn update_pubkey(&self, product_id: u64, index: u64) -> Pubkey {
        Pubkey::find_program_address(
            &[b"product_update", &product_id.to_le_bytes(), &index.to_le_bytes()],
            &self.program_id,
        )
        .0
    }

    fn hash_index_pubkey(&self, hash: &ProductHash) -> Pubkey {
        Pubkey::find_program_address(&[b"product_hash", hash.as_bytes()], &self.program_id).0
    }

    /// Initializes the registry state account. Only needs to be called once
    /// per deployment.
    pub async fn initialize(&self, session: &WalletSession) -> Result<(), ChainError> {
        let state = self.registry_state_pubkey();
        if self.client.get_account(&state).await.is_ok() {
            println!("> SolanaRegistry: registry state already initialized.");
            return Ok(());
        }

        println!("> SolanaRegistry: initializing registry state account...");
        let payer = session.address();
        let accounts = vec![
            AccountMeta::new(state, false),
            AccountMeta::new(payer, true),
            AccountMeta::new_readonly(solana_program::system_program::ID, false),
        ];
        let instruction = Instruction {
            program_id: self.program_id,
            accounts,
            data: INITIALIZE_DISCRIMINATOR.to_vec(),
        };
        self.send(session, instruction).await?;
        println!("> SolanaRegistry: registry state initialized.");
        Ok(())
    }

    async fn next_product_id(&self) -> Result<u64, ChainError> {
        let state = self.registry_state_pubkey();
        let account = self
            .client
            .get_account(&state)
            .await
            .map_err(map_client_error)?;
        let mut cursor = Cursor::new(&account.data, &REGISTRY_STATE_DISCRIMINATOR)?;
        cursor.read_u64()
    }

    async fn send(
        &self,
        session: &WalletSession,
        instruction: Instruction,
    ) -> Result<String, ChainError> {
        let payer = session.address();
        let mut transaction = Transaction::new_with_payer(&[instruction], Some(&payer));
        let recent_blockhash = self
            .client
            .get_latest_blockhash()
            .await
            .map_err(map_client_error)?;
        session
            .sign_transaction(&mut transaction, recent_blockhash)
            .await?;
        let signature = self
            .client
            .send_and_confirm_transaction(&transaction)
            .await
            .map_err(map_client_error)?;
        Ok(signature.to_string())
    }
}

#[async_trait::async_trait]
impl ChainRegistry for SolanaRegistry {
    async fn register(
        &self,
        sku: &str,
        hash: &ProductHash,
        session: &WalletSession,
    ) -> Result<ChainReceipt, ChainError> {
        // The product account is addressed by the id the registry will
        // assign; read it just before submitting. Losing a race against a
        // concurrent registration makes the transaction fail (seeds
        // mismatch) and surface as Rejected — the ledger stays the only
        // serialization point.
        let product_id = self.next_product_id().await?;

        let accounts = vec![
            AccountMeta::new(self.registry_state_pubkey(), false),
            AccountMeta::new(self.product_pubkey(product_id), false),
            AccountMeta::new(self.hash_index_pubkey(hash), false),
            AccountMeta::new(session.address(), true),
            AccountMeta::new_readonly(solana_program::system_program::ID, false),
        ];

        let mut data = ADD_PRODUCT_DISCRIMINATOR.to_vec();
        append_borsh_string(&mut data, sku);
        data.extend_from_slice(hash.as_bytes());

        let instruction = Instruction {
            program_id: self.program_id,
            accounts,
            data,
        };

        let signature = self.send(session, instruction).await?;
        println!(
            "> SolanaRegistry: product {} registered, tx {}",
            product_id, signature
        );

        Ok(ChainReceipt {
            product_id,
            confirmation_id: Some(signature),
        })
    }

    async fn creation(&self, product_id: u64) -> Result<ChainRecord, ChainError> {
        let account = self
            .client
            .get_account(&self.product_pubkey(product_id))
            .await
            .map_err(|e| map_read_error(e, product_id))?;

        let mut cursor = Cursor::new(&account.data, &PRODUCT_DISCRIMINATOR)?;
        let id = cursor.read_u64()?;
        let vendor = cursor.read_pubkey()?;
        let sku = cursor.read_string()?;
        let initial_hash = cursor.read_hash()?;
        let created_at = cursor.read_timestamp()?;
        let updates_count = cursor.read_u64()?;

        Ok(ChainRecord {
            product_id: id,
            vendor,
            sku,
            initial_hash,
            created_at,
            updates_count,
        })
    }

    async fn update(&self, product_id: u64, index: u64) -> Result<UpdateEntry, ChainError> {
        let account = self
            .client
            .get_account(&self.update_pubkey(product_id, index))
            .await
            .map_err(|e| map_read_error(e, product_id))?;

        let mut cursor = Cursor::new(&account.data, &PRODUCT_UPDATE_DISCRIMINATOR)?;
        let timestamp = cursor.read_timestamp()?;
        let metadata_hash = cursor.read_hash()?;
        let updater = cursor.read_pubkey()?;
        let note = cursor.read_string()?;

        Ok(UpdateEntry {
            timestamp,
            metadata_hash,
            updater,
            note,
        })
    }

    async fn find_by_hash(&self, hash: &ProductHash) -> Result<Option<u64>, ChainError> {
        match self.client.get_account(&self.hash_index_pubkey(hash)).await {
            Ok(account) => {
                let mut cursor = Cursor::new(&account.data, &HASH_INDEX_DISCRIMINATOR)?;
                Ok(Some(cursor.read_u64()?))
            }
            Err(e) => {
                let message = e.to_string();
                if message.contains("AccountNotFound") || message.contains("could not find account")
                {
                    Ok(None)
                } else {
                    Err(ChainError::NetworkError(message))
                }
            }
        }
    }

    async fn add_update(
        &self,
        product_id: u64,
        metadata_hash: &ProductHash,
        note: &str,
        session: &WalletSession,
    ) -> Result<(), ChainError> {
        let creation = self.creation(product_id).await?;

        let accounts = vec![
            AccountMeta::new(self.product_pubkey(product_id), false),
            AccountMeta::new(self.update_pubkey(product_id, creation.updates_count), false),
            AccountMeta::new(session.address(), true),
            AccountMeta::new_readonly(solana_program::system_program::ID, false),
        ];

        let mut data = ADD_UPDATE_DISCRIMINATOR.to_vec();
        data.extend_from_slice(metadata_hash.as_bytes());
        append_borsh_string(&mut data, note);

        let instruction = Instruction {
            program_id: self.program_id,
            accounts,
            data,
        };

        let signature = self.send(session, instruction).await?;
        println!(
            "> SolanaRegistry: update {} appended to product {}, tx {}",
            creation.updates_count, product_id, signature
        );
        Ok(())
    }
}

/// Appends a borsh-encoded string (u32 little-endian length + bytes).
fn append_borsh_string(data: &mut Vec<u8>, value: &str) {
    data.extend_from_slice(&(value.len() as u32).to_le_bytes());
    data.extend_from_slice(value.as_bytes());
}

fn map_client_error(e: solana_client::client_error::ClientError) -> ChainError {
    let message = e.to_string();
    if message.contains("unable to confirm") || message.contains("timed out") {
        ChainError::Unconfirmed
    } else if message.contains("Transaction simulation failed")
        || message.contains("InstructionError")
        || message.contains("custom program error")
    {
        ChainError::Rejected(message)
    } else {
        ChainError::NetworkError(message)
    }
}

fn map_read_error(e: solana_client::client_error::ClientError, product_id: u64) -> ChainError {
    let message = e.to_string();
    if message.contains("AccountNotFound") || message.contains("could not find account") {
        ChainError::NotFound(product_id)
    } else {
        ChainError::NetworkError(message)
    }
}

/// Byte-level reader for Anchor account data: 8-byte discriminator followed
/// by borsh-encoded fields.
struct Cursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8], discriminator: &[u8; 8]) -> Result<Self, ChainError> {
        if data.len() < 8 || &data[..8] != discriminator {
            return Err(ChainError::NetworkError(
                "account data has an unexpected discriminator".to_string(),
            ));
        }
        Ok(Self { data, offset: 8 })
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], ChainError> {
        if self.offset + len > self.data.len() {
            return Err(ChainError::NetworkError(
                "account data too short".to_string(),
            ));
        }
        let slice = &self.data[self.offset..self.offset + len];
        self.offset += len;
        Ok(slice)
    }

    fn read_u64(&mut self) -> Result<u64, ChainError> {
        let bytes = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(buf))
    }

    fn read_i64(&mut self) -> Result<i64, ChainError> {
        let bytes = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Ok(i64::from_le_bytes(buf))
    }

    fn read_timestamp(&mut self) -> Result<DateTime<Utc>, ChainError> {
        let secs = self.read_i64()?;
        DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| ChainError::NetworkError("invalid on-chain timestamp".to_string()))
    }

    fn read_pubkey(&mut self) -> Result<Pubkey, ChainError> {
        let bytes = self.take(32)?;
        let mut buf = [0u8; 32];
        buf.copy_from_slice(bytes);
        Ok(Pubkey::from(buf))
    }

    fn read_hash(&mut self) -> Result<ProductHash, ChainError> {
        let bytes = self.take(32)?;
        let mut buf = [0u8; 32];
        buf.copy_from_slice(bytes);
        Ok(ProductHash::from_fixed_bytes(buf))
    }

    fn read_string(&mut self) -> Result<String, ChainError> {
        let len = self.take(4)?;
        let mut buf = [0u8; 4];
        buf.copy_from_slice(len);
        let len = u32::from_le_bytes(buf) as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| ChainError::NetworkError("invalid utf8 in account data".to_string()))
    }
}
