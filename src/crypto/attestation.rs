//! Vendor attestations: a human-readable message binding a product hash to a
//! vendor address and timestamp, signed with the vendor's wallet key.
//!
//! The message is what the signing agent displays in its prompt, so the
//! vendor can visually confirm exactly what they are authorizing.

use crate::domain::model::ProductHash;
use chrono::{DateTime, SecondsFormat, Utc};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;

/// Builds the exact message a vendor signs when registering a product.
///
/// The template is a compatibility contract: verification recomputes it from
/// the attestation fields, so any change here invalidates previously issued
/// attestations.
pub fn attestation_message(
    hash: &ProductHash,
    vendor: &Pubkey,
    timestamp: &DateTime<Utc>,
) -> String {
    format!(
        "VibeChain Product Registration\nHash: 0x{}\nVendor: {}\nTimestamp: {}",
        hash,
        vendor,
        timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
    )
}

/// A signed product attestation.
///
/// `signature` is an Ed25519 signature over the exact bytes of `message`;
/// `message` in turn embeds `hash`, `signer` and `timestamp`, so tampering
/// with any field makes `verify` fail.
#[derive(Debug, Clone)]
pub struct SignedAttestation {
    pub hash: ProductHash,
    pub signer: Pubkey,
    pub signature: Signature,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl SignedAttestation {
    /// Verifies the attestation: the message must match the canonical
    /// template for the attested fields, and the signature must verify
    /// against the message under the signer's key.
    pub fn verify(&self) -> bool {
        let expected = attestation_message(&self.hash, &self.signer, &self.timestamp);
        expected == self.message
            && self
                .signature
                .verify(self.signer.as_ref(), self.message.as_bytes())
    }
}
