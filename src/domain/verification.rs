//! The verification workflow: resolves a scanned hash into a verified
//! product view with supply-chain history.
//!
//! Stateless per invocation. The index provides display fields; the ledger
//! provides the authoritative proof. Index-only data is never presented as
//! chain-verified.

use crate::domain::index::BackendIndex;
use crate::domain::model::{ProductHash, VerificationReport, VerificationStatus};
use crate::domain::registry::ChainRegistry;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// The hash is unknown to the index: unverifiable, not proof of a
    /// counterfeit.
    #[error("product hash not found in index")]
    NotFound,
    #[error("invalid product hash: {0}")]
    InvalidHash(String),
    #[error("index unavailable: {0}")]
    Index(String),
}

/// Builds the QR payload for a registered product: the verification page
/// URL carrying the hash as a query parameter.
pub fn qr_payload(base_url: &str, hash: &ProductHash) -> String {
    format!("{}/verify?hash={}", base_url.trim_end_matches('/'), hash)
}

/// Parses the untrusted text decoded from a QR scan into a product hash.
///
/// Accepts a URL carrying a `hash` query parameter, or a bare hash with no
/// URL wrapper. Anything that is not a well-formed 32-byte hex digest is
/// rejected here, before it can be used as a lookup key.
pub fn parse_scanned_payload(payload: &str) -> Result<ProductHash, VerifyError> {
    let payload = payload.trim();
    let candidate = match reqwest::Url::parse(payload) {
        Ok(url) => url
            .query_pairs()
            .find(|(key, _)| key == "hash")
            .map(|(_, value)| value.into_owned())
            .unwrap_or_else(|| payload.to_string()),
        Err(_) => payload.to_string(),
    };
    candidate.parse().map_err(VerifyError::InvalidHash)
}

pub struct VerificationWorkflow {
    index: Arc<dyn BackendIndex>,
    registry: Arc<dyn ChainRegistry>,
}

impl VerificationWorkflow {
    pub fn new(index: Arc<dyn BackendIndex>, registry: Arc<dyn ChainRegistry>) -> Self {
        Self { index, registry }
    }

    /// Parses a raw scanned payload and verifies the extracted hash.
    pub async fn verify_scanned(&self, payload: &str) -> Result<VerificationReport, VerifyError> {
        let hash = parse_scanned_payload(payload)?;
        self.verify(&hash).await
    }

    /// Resolves `hash` into a verification report.
    ///
    /// The chain record, when reachable, must carry the same hash as the
    /// lookup key; otherwise the index entry is treated as uncorroborated.
    pub async fn verify(&self, hash: &ProductHash) -> Result<VerificationReport, VerifyError> {
        let entry = self
            .index
            .get_by_hash(hash)
            .await
            .map_err(|e| VerifyError::Index(e.to_string()))?
            .ok_or(VerifyError::NotFound)?;

        let batch = entry
            .metadata
            .get("batch")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        let (status, chain_record, updates) = match entry.product_id_on_chain {
            None => (
                VerificationStatus::IndexOnly {
                    reason: "index entry carries no chain identifier".to_string(),
                },
                None,
                Vec::new(),
            ),
            Some(product_id) => match self.registry.history(product_id).await {
                Ok((record, updates)) => {
                    if record.initial_hash != *hash {
                        (
                            VerificationStatus::IndexOnly {
                                reason: format!(
                                    "chain record {} carries a different hash",
                                    product_id
                                ),
                            },
                            None,
                            Vec::new(),
                        )
                    } else {
                        (VerificationStatus::ChainVerified, Some(record), updates)
                    }
                }
                Err(e) => {
                    eprintln!(
                        "> Verification: chain history unavailable for product {}: {}",
                        product_id, e
                    );
                    (
                        VerificationStatus::IndexOnly {
                            reason: format!("on-chain proof unavailable: {}", e),
                        },
                        None,
                        Vec::new(),
                    )
                }
            },
        };

        println!(
            "> Verification: {} -> {}",
            hash,
            if status.is_chain_verified() {
                "chain-verified"
            } else {
                "index-only"
            }
        );

        Ok(VerificationReport {
            name: entry.name,
            description: entry.description,
            batch,
            vendor_address: entry.vendor_address,
            hash: *hash,
            chain_record,
            updates,
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use primitive_types::H256;

    #[test]
    fn payload_with_url_wrapper_extracts_hash_param() {
        let hash = ProductHash(H256::repeat_byte(0x42));
        let payload = qr_payload("http://localhost:5173", &hash);
        assert_eq!(payload, format!("http://localhost:5173/verify?hash={}", hash));
        assert_eq!(parse_scanned_payload(&payload).unwrap(), hash);
    }

    #[test]
    fn bare_hash_payload_is_accepted() {
        let hash = ProductHash(H256::repeat_byte(0x42));
        assert_eq!(parse_scanned_payload(&hash.to_string()).unwrap(), hash);
        assert_eq!(
            parse_scanned_payload(&format!("  0x{}  ", hash)).unwrap(),
            hash
        );
    }

    #[test]
    fn malformed_payloads_are_rejected_before_lookup() {
        assert!(matches!(
            parse_scanned_payload("not-a-hash"),
            Err(VerifyError::InvalidHash(_))
        ));
        assert!(matches!(
            parse_scanned_payload("http://localhost:5173/verify?hash=zzzz"),
            Err(VerifyError::InvalidHash(_))
        ));
        assert!(matches!(
            parse_scanned_payload("http://localhost:5173/verify"),
            Err(VerifyError::InvalidHash(_))
        ));
    }
}
