//! Canonical event form
//!
//! Signatures cover a deterministic rendering of the event: object keys
//! sorted, no insignificant whitespace, and the signature value itself
//! removed. Everything else, including `alg` and `publicKey`, is covered.

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::events::Event;

/// Render a JSON value with object keys in sorted order
pub fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut pairs: Vec<_> = map.iter().collect();
            pairs.sort_by_key(|(k, _)| *k);
            let contents: Vec<String> = pairs
                .iter()
                .map(|(k, v)| format!("{}:{}", Value::from(k.as_str()), canonical_json(v)))
                .collect();
            format!("{{{}}}", contents.join(","))
        }
        Value::Array(arr) => {
            let contents: Vec<String> = arr.iter().map(canonical_json).collect();
            format!("[{}]", contents.join(","))
        }
        // Scalars render through their Display, which is compact JSON
        _ => value.to_string(),
    }
}

/// Drop `meta.security.integrityProtection.signature` from an event document
pub fn strip_signature(value: &mut Value) {
    if let Some(protection) = value
        .pointer_mut("/meta/security/integrityProtection")
        .and_then(Value::as_object_mut)
    {
        protection.remove("signature");
    }
}

/// Canonical bytes that a signature covers
pub fn signing_form(event: &Event) -> Result<String> {
    let mut value = event.to_value()?;
    strip_signature(&mut value);
    Ok(canonical_json(&value))
}

/// SHA-256 digest of the signing form
pub fn event_digest(event: &Event) -> Result<[u8; 32]> {
    let mut hasher = Sha256::new();
    hasher.update(signing_form(event)?.as_bytes());
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&hasher.finalize());
    Ok(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{IntegrityProtection, Security};
    use serde_json::json;

    #[test]
    fn test_keys_are_sorted_at_every_level() {
        let value = json!({"b": 1, "a": {"d": [1, {"z": true, "y": null}], "c": "x"}});
        assert_eq!(
            canonical_json(&value),
            r#"{"a":{"c":"x","d":[1,{"y":null,"z":true}]},"b":1}"#
        );
    }

    #[test]
    fn test_keys_are_escaped() {
        let value = json!({"quo\"te": "va\nl"});
        assert_eq!(canonical_json(&value), r#"{"quo\"te":"va\nl"}"#);
    }

    #[test]
    fn test_signature_is_excluded_from_digest() {
        let mut event = Event::tercc("strategy");
        event.meta.security = Some(Security {
            author_identity: "me".to_string(),
            integrity_protection: Some(IntegrityProtection {
                alg: "RS256".to_string(),
                signature: "aa".to_string(),
                public_key: None,
            }),
            ..Default::default()
        });
        let before = event_digest(&event).unwrap();

        if let Some(security) = event.meta.security.as_mut() {
            if let Some(protection) = security.integrity_protection.as_mut() {
                protection.signature = "bb".to_string();
            }
        }
        assert_eq!(event_digest(&event).unwrap(), before);

        event.meta.tags = Some(vec!["changed".to_string()]);
        assert_ne!(event_digest(&event).unwrap(), before);
    }
}
