//! Domain model for product registration and verification.

use chrono::{DateTime, NaiveDate, Utc};
use primitive_types::H256;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;
use solana_sdk::pubkey::Pubkey;
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// 256-bit content hash of a product draft; the identity key of the system.
///
/// Serialized form is 64 lowercase hex characters; parsing tolerates an
/// optional `0x` prefix.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProductHash(pub H256);

impl ProductHash {
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn to_fixed_bytes(&self) -> [u8; 32] {
        self.0.to_fixed_bytes()
    }

    pub fn from_fixed_bytes(bytes: [u8; 32]) -> Self {
        ProductHash(H256::from(bytes))
    }
}

impl fmt::Display for ProductHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0.as_bytes()))
    }
}

impl fmt::Debug for ProductHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProductHash({})", self)
    }
}

impl FromStr for ProductHash {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s).map_err(|_| "invalid hex".to_string())?;
        if bytes.len() != 32 {
            return Err("expected 32-byte hex string".to_string());
        }
        Ok(ProductHash(H256::from_slice(&bytes)))
    }
}

impl Serialize for ProductHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ProductHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(D::Error::custom)
    }
}

/// Vendor-entered product fields. Transient: exists only until submitted.
///
/// The serialized field names (`name`, `description`, `batch`, `date`) are
/// part of the hashing contract — see `crypto::hashing::commit_product`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductDraft {
    pub name: String,
    pub description: String,
    pub batch: String,
    #[serde(rename = "date")]
    pub manufacture_date: NaiveDate,
}

impl ProductDraft {
    /// Local validation; failures never reach external collaborators.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("product name must not be empty".to_string());
        }
        if self.batch.trim().is_empty() {
            return Err("batch/SKU must not be empty".to_string());
        }
        Ok(())
    }
}

/// Receipt returned by a ledger write.
///
/// `confirmation_id` is `None` when the record was adopted through a
/// reconciliation read instead of a directly observed confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainReceipt {
    pub product_id: u64,
    pub confirmation_id: Option<String>,
}

/// Canonical, immutable-once-written ledger entry for a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainRecord {
    pub product_id: u64,
    pub vendor: Pubkey,
    pub sku: String,
    pub initial_hash: ProductHash,
    pub created_at: DateTime<Utc>,
    pub updates_count: u64,
}

/// One entry of a product's append-only update log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateEntry {
    pub timestamp: DateTime<Utc>,
    pub metadata_hash: ProductHash,
    pub updater: Pubkey,
    pub note: String,
}

/// Descriptive product metadata stored in the backend index, keyed by hash.
///
/// Supplementary display data only — authenticity lives in the ChainRecord.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
    #[schema(value_type = String)]
    pub hash: ProductHash,
    #[serde(default)]
    pub product_id_on_chain: Option<u64>,
    pub vendor_address: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub metadata: JsonValue,
}

/// Whether a verification result is backed by an on-chain record or only by
/// the best-effort index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationStatus {
    /// The index entry is corroborated by a confirmed ChainRecord carrying
    /// the same hash.
    ChainVerified,
    /// Only index data was available; on-chain proof could not be confirmed.
    IndexOnly { reason: String },
}

impl VerificationStatus {
    pub fn is_chain_verified(&self) -> bool {
        matches!(self, VerificationStatus::ChainVerified)
    }
}

/// Composed result of a verification run.
#[derive(Debug, Clone)]
pub struct VerificationReport {
    pub name: String,
    pub description: String,
    pub batch: Option<String>,
    pub vendor_address: String,
    pub hash: ProductHash,
    pub chain_record: Option<ChainRecord>,
    pub updates: Vec<UpdateEntry>,
    pub status: VerificationStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_hash_roundtrips_through_hex() {
        let hash = ProductHash(H256::repeat_byte(0x5a));
        let parsed: ProductHash = hash.to_string().parse().unwrap();
        assert_eq!(hash, parsed);

        let prefixed: ProductHash = format!("0x{}", hash).parse().unwrap();
        assert_eq!(hash, prefixed);
    }

    #[test]
    fn product_hash_rejects_bad_input() {
        assert!("zz".parse::<ProductHash>().is_err());
        assert!("abcd".parse::<ProductHash>().is_err());
    }

    #[test]
    fn draft_validation_requires_name_and_batch() {
        let mut draft = ProductDraft {
            name: "Widget".to_string(),
            description: String::new(),
            batch: "B100".to_string(),
            manufacture_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        };
        assert!(draft.validate().is_ok());

        draft.name = "  ".to_string();
        assert!(draft.validate().is_err());

        draft.name = "Widget".to_string();
        draft.batch = String::new();
        assert!(draft.validate().is_err());
    }

    #[test]
    fn index_entry_uses_camel_case_wire_names() {
        let entry = IndexEntry {
            hash: ProductHash(H256::repeat_byte(1)),
            product_id_on_chain: Some(7),
            vendor_address: "vendor".to_string(),
            name: "Widget".to_string(),
            description: String::new(),
            metadata: serde_json::json!({}),
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("productIdOnChain").is_some());
        assert!(json.get("vendorAddress").is_some());
    }
}
