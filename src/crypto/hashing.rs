// This file is used to hash product content into a 256-bit hash.

use crate::domain::model::{ProductDraft, ProductHash};
use primitive_types::H256;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

// Domain separation constant to prevent hash collisions with other uses of SHA-256.
const PRODUCT_DOMAIN: &[u8] = b"VIBEPROD";

/// A helper function to sort a JSON object's keys recursively.
/// This is essential for canonical serialization.
fn sort_json_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted_map: BTreeMap<String, Value> = map
                .iter()
                .map(|(k, v)| (k.clone(), sort_json_value(v)))
                .collect();
            Value::Object(sorted_map.into_iter().collect())
        }
        Value::Array(arr) => {
            let sorted_arr = arr.iter().map(sort_json_value).collect();
            Value::Array(sorted_arr)
        }
        _ => value.clone(),
    }
}

/// Hashes a generic JSON value into a ProductHash.
/// It ensures canonical serialization by sorting keys.
pub fn hash_value(value: &Value) -> ProductHash {
    let sorted_value = sort_json_value(value);
    let canonical_string = serde_json::to_string(&sorted_value).unwrap();

    let mut hasher = Sha256::new();
    hasher.update(PRODUCT_DOMAIN);
    hasher.update(canonical_string.as_bytes());
    ProductHash(H256::from_slice(&hasher.finalize()))
}

/// Derives the content hash of a product draft.
///
/// Identical field content always yields the identical hash; this is the
/// identity key for the whole registration/verification pipeline, so the
/// serialization convention (canonical key order, `YYYY-MM-DD` dates) must
/// stay stable.
pub fn commit_product(draft: &ProductDraft) -> ProductHash {
    let value = serde_json::to_value(draft).expect("product draft serializes to JSON");
    hash_value(&value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn draft() -> ProductDraft {
        ProductDraft {
            name: "Widget".to_string(),
            description: "A widget".to_string(),
            batch: "B100".to_string(),
            manufacture_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        }
    }

    #[test]
    fn identical_content_yields_identical_hash() {
        assert_eq!(commit_product(&draft()), commit_product(&draft()));
    }

    #[test]
    fn any_field_change_changes_the_hash() {
        let base = commit_product(&draft());

        let mut renamed = draft();
        renamed.name = "Widget 2".to_string();
        assert_ne!(base, commit_product(&renamed));

        let mut rebatched = draft();
        rebatched.batch = "B101".to_string();
        assert_ne!(base, commit_product(&rebatched));

        let mut redated = draft();
        redated.manufacture_date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert_ne!(base, commit_product(&redated));
    }

    #[test]
    fn hash_value_is_key_order_independent() {
        let a = serde_json::json!({"name": "Widget", "batch": "B100"});
        let b = serde_json::json!({"batch": "B100", "name": "Widget"});
        assert_eq!(hash_value(&a), hash_value(&b));
    }
}
