//! Parameter flattening and HMAC-SHA256 checksums.
//!
//! QuickPay signs hosted payment-window requests with a checksum over the
//! posted parameters, and signs asynchronous callbacks with a checksum over
//! the raw request body. Both use HMAC-SHA256 with different keys:
//!
//! - Payment window: the agreement's Payment Window API key signs
//!   `join(" ", values sorted by flattened parameter key)`
//! - Callback: the merchant private key signs the raw JSON body, and the
//!   digest arrives in the `QuickPay-Checksum-Sha256` header
//!
//! See <https://tech.quickpay.net/payments/hosted/#checksum>.

use std::collections::BTreeMap;

use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Flatten nested request parameters into bracket-path keys.
///
/// Objects and arrays recurse; every leaf ends up under a key built from its
/// full path, each segment wrapped in brackets:
///
/// ```text
/// {"invoice_address": {"email": "a@b.dk"}}  =>  "[invoice_address][email]" -> "a@b.dk"
/// {"basket": [{"qty": 2}]}                  =>  "[basket][0][qty]"         -> "2"
/// ```
///
/// The BTreeMap keeps keys in lexicographic order, which is exactly the sort
/// the checksum is defined over.
pub fn flatten(params: &Value) -> BTreeMap<String, String> {
    let mut result = BTreeMap::new();
    flatten_into(params, String::new(), &mut result);
    result
}

fn flatten_into(value: &Value, path: String, result: &mut BTreeMap<String, String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                flatten_into(child, format!("{}[{}]", path, key), result);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten_into(child, format!("{}[{}]", path, index), result);
            }
        }
        leaf => {
            result.insert(path, leaf_to_string(leaf));
        }
    }
}

/// Render a scalar the way form encoding does: bare strings, numbers as
/// written, booleans as 1/0, null as the empty string.
fn leaf_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => "0".to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Calculate the payment-window checksum for a parameter set.
///
/// The parameters are flattened, sorted by flattened key, and the values are
/// joined with a single space. The result is the hex-encoded HMAC-SHA256 of
/// that string under the Payment Window API key.
pub fn checksum(params: &Value, api_key: &str) -> String {
    let flattened = flatten(params);
    let base = flattened.values().cloned().collect::<Vec<_>>().join(" ");
    sign(base.as_bytes(), api_key)
}

/// Hex-encoded HMAC-SHA256 of `data` under `key`.
pub fn sign(data: &[u8], key: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC accepts any key length");
    mac.update(data);
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a callback body against the `QuickPay-Checksum-Sha256` header.
///
/// Recomputes HMAC-SHA256 over the raw body with the merchant private key
/// and compares against the hex digest from the header. The comparison runs
/// in constant time via `Mac::verify_slice`.
pub fn verify_callback(body: &[u8], checksum_header: &str, private_key: &str) -> bool {
    let Ok(expected) = hex::decode(checksum_header.trim()) else {
        return false;
    };
    let mut mac =
        HmacSha256::new_from_slice(private_key.as_bytes()).expect("HMAC accepts any key length");
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flatten_produces_bracket_paths() {
        let params = json!({
            "merchant_id": "1234",
            "invoice_address": {"email": "shopper@example.dk", "city": "Aarhus"},
            "basket": [{"qty": 2, "item_no": "SKU-1"}],
        });
        let flat = flatten(&params);

        assert_eq!(flat.get("[merchant_id]").unwrap(), "1234");
        assert_eq!(
            flat.get("[invoice_address][email]").unwrap(),
            "shopper@example.dk"
        );
        assert_eq!(flat.get("[basket][0][qty]").unwrap(), "2");
        assert_eq!(flat.get("[basket][0][item_no]").unwrap(), "SKU-1");
    }

    #[test]
    fn flatten_renders_scalars_like_form_encoding() {
        let flat = flatten(&json!({"a": true, "b": false, "c": null, "d": 7}));
        assert_eq!(flat.get("[a]").unwrap(), "1");
        assert_eq!(flat.get("[b]").unwrap(), "0");
        assert_eq!(flat.get("[c]").unwrap(), "");
        assert_eq!(flat.get("[d]").unwrap(), "7");
    }

    #[test]
    fn checksum_is_deterministic() {
        let params = json!({"order_id": "shop0001", "amount": 10000, "currency": "DKK"});
        assert_eq!(checksum(&params, "key"), checksum(&params, "key"));
    }

    #[test]
    fn checksum_ignores_insertion_order() {
        // serde_json object built in two different key orders
        let a = json!({"version": "v10", "amount": 5000, "merchant_id": "99"});
        let b = json!({"merchant_id": "99", "version": "v10", "amount": 5000});
        assert_eq!(checksum(&a, "key"), checksum(&b, "key"));
    }

    #[test]
    fn checksum_changes_with_values_and_key() {
        let params = json!({"order_id": "shop0001", "amount": 10000});
        let tampered = json!({"order_id": "shop0001", "amount": 10001});
        assert_ne!(checksum(&params, "key"), checksum(&tampered, "key"));
        assert_ne!(checksum(&params, "key"), checksum(&params, "other_key"));
    }

    #[test]
    fn checksum_is_64_hex_chars() {
        let digest = checksum(&json!({"a": "b"}), "key");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn callback_roundtrip_verifies() {
        let body = br#"{"id":3185590,"order_id":"shop0042","accepted":true}"#;
        let digest = sign(body, "private_key");
        assert!(verify_callback(body, &digest, "private_key"));
    }

    #[test]
    fn callback_rejects_tampered_body() {
        let body = br#"{"id":318559,"accepted":true}"#;
        let digest = sign(body, "private_key");
        assert!(!verify_callback(br#"{"id":318559,"accepted":false}"#, &digest, "private_key"));
    }

    #[test]
    fn callback_rejects_wrong_key_and_bad_hex() {
        let body = b"payload";
        let digest = sign(body, "private_key");
        assert!(!verify_callback(body, &digest, "another_key"));
        assert!(!verify_callback(body, "not-hex-at-all", "private_key"));
    }
}
