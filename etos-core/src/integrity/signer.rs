//! RS256 event signing and verification
//!
//! Private keys are read from PEM files (PKCS#1 `RSA PRIVATE KEY`, or
//! PKCS#8). A signed event carries `meta.security.integrityProtection` with
//! the algorithm, the hex encoded RSASSA-PKCS1-v1_5 signature over the
//! SHA-256 digest of the canonical form, and the signer's PKCS#1 public key.

use std::path::Path;

use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey, EncodeRsaPublicKey, LineEnding};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

use super::canonical::event_digest;
use crate::error::{EtosError, Result};
use crate::events::{Event, Events, IntegrityProtection, Security};

pub const SIGNATURE_ALGORITHM: &str = "RS256";

/// Signs events with an RSA private key
pub struct Signer {
    key: RsaPrivateKey,
    author_identity: Option<String>,
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("author_identity", &self.author_identity)
            .finish_non_exhaustive()
    }
}

impl Signer {
    pub fn new(key: RsaPrivateKey) -> Self {
        Self {
            key,
            author_identity: None,
        }
    }

    /// Parse a PEM encoded private key
    pub fn from_pem(pem: &str) -> Result<Self> {
        let pem = pem.trim();
        let key = RsaPrivateKey::from_pkcs1_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs8_pem(pem))
            .map_err(|e| EtosError::MalformedKey {
                reason: format!("failed to parse private key: {}", e),
            })?;
        Ok(Self::new(key))
    }

    /// Read a PEM encoded private key from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let pem = std::fs::read_to_string(path)?;
        Self::from_pem(&pem)
    }

    /// Identity written to `meta.security.authorIdentity`
    pub fn with_author_identity(mut self, identity: impl Into<String>) -> Self {
        self.author_identity = Some(identity.into());
        self
    }

    pub fn verifying_key(&self) -> RsaPublicKey {
        self.key.to_public_key()
    }

    /// PKCS#1 PEM of the public half
    pub fn public_key_pem(&self) -> Result<String> {
        self.verifying_key()
            .to_pkcs1_pem(LineEnding::LF)
            .map_err(|e| EtosError::MalformedKey {
                reason: e.to_string(),
            })
    }

    /// Sign the event in place, replacing any previous signature
    pub fn sign(&self, event: &mut Event) -> Result<()> {
        let mut security = event.meta.security.clone().unwrap_or_default();
        if let Some(identity) = &self.author_identity {
            security.author_identity = identity.clone();
        }
        security.integrity_protection = Some(IntegrityProtection {
            alg: SIGNATURE_ALGORITHM.to_string(),
            signature: String::new(),
            public_key: Some(self.public_key_pem()?),
        });
        event.set_security(security.clone())?;

        let digest = event_digest(event)?;
        let signature = self
            .key
            .sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
            .map_err(|e| EtosError::MalformedKey {
                reason: format!("failed to sign: {}", e),
            })?;

        if let Some(protection) = security.integrity_protection.as_mut() {
            protection.signature = hex::encode(signature);
        }
        event.set_security(security)?;
        tracing::debug!("Signed event {}", event.id());
        Ok(())
    }
}

/// Parse a PEM encoded RSA public key (PKCS#1 or SubjectPublicKeyInfo)
pub fn parse_public_key(pem: &str) -> Result<RsaPublicKey> {
    let pem = pem.trim();
    RsaPublicKey::from_pkcs1_pem(pem)
        .or_else(|_| RsaPublicKey::from_public_key_pem(pem))
        .map_err(|e| EtosError::MalformedKey {
            reason: format!("failed to parse public key: {}", e),
        })
}

/// Read a PEM encoded public key from a file
pub fn read_public_key(path: impl AsRef<Path>) -> Result<RsaPublicKey> {
    let pem = std::fs::read_to_string(path)?;
    parse_public_key(&pem)
}

/// Check an event's signature against a trusted public key
pub fn verify_event(event: &Event, key: &RsaPublicKey) -> Result<()> {
    let malformed = |reason: &str| EtosError::MalformedEvent {
        event_id: event.id().to_string(),
        reason: reason.to_string(),
    };

    let protection = event
        .meta
        .security
        .as_ref()
        .and_then(|s| s.integrity_protection.as_ref())
        .ok_or_else(|| malformed("event is not signed"))?;
    if protection.alg != SIGNATURE_ALGORITHM {
        return Err(malformed(&format!(
            "unsupported signature algorithm '{}'",
            protection.alg
        )));
    }

    let signature = hex::decode(&protection.signature)
        .map_err(|_| malformed("signature is not valid hex"))?;

    let digest = event_digest(event)?;
    key.verify(Pkcs1v15Sign::new::<Sha256>(), &digest, &signature)
        .map_err(|_| EtosError::SignatureInvalid {
            event_id: event.id().to_string(),
        })
}

/// Verify every event present in the aggregate
pub fn verify_events(events: &Events, key: &RsaPublicKey) -> Result<()> {
    for (location, event) in events.located() {
        verify_event(event, key).map_err(|e| EtosError::EventValidation {
            location: location.to_string(),
            source: Box::new(e),
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SIGNING_KEY: &str = include_str!("../../tests/fixtures/signing-key.pem");
    const SIGNING_PUBLIC_KEY: &str = include_str!("../../tests/fixtures/signing-key.pub.pem");
    const OTHER_KEY: &str = include_str!("../../tests/fixtures/other-key.pem");

    fn signer() -> Signer {
        Signer::from_pem(SIGNING_KEY).unwrap()
    }

    #[test]
    fn test_sign_then_verify() {
        let signer = signer().with_author_identity("etos");
        let mut event = Event::tercc("strategy");
        signer.sign(&mut event).unwrap();

        let security = event.meta.security.as_ref().unwrap();
        assert_eq!(security.author_identity, "etos");
        let protection = security.integrity_protection.as_ref().unwrap();
        assert_eq!(protection.alg, "RS256");
        assert_eq!(
            protection.public_key.as_deref(),
            Some(signer.public_key_pem().unwrap().as_str())
        );

        let key = parse_public_key(SIGNING_PUBLIC_KEY).unwrap();
        assert_eq!(key, signer.verifying_key());
        assert!(verify_event(&event, &key).is_ok());
    }

    #[test]
    fn test_signature_survives_serialisation() {
        let signer = signer();
        let mut event = Event::activity_triggered("run", "tercc");
        signer.sign(&mut event).unwrap();

        let json = event.to_value().unwrap().to_string();
        let decoded = Event::from_json(&json).unwrap();
        assert!(verify_event(&decoded, &signer.verifying_key()).is_ok());
    }

    #[test]
    fn test_received_document_is_signed_as_received() {
        let mut event = Event::from_value(json!({
            "meta": {
                "id": "6a8a4b6e-4b1a-4e2b-9d4a-0c1e2f3a4b5c",
                "type": "EiffelActivityCanceledEvent",
                "version": "3.0.0",
                "time": 1700000000000i64
            },
            "data": {"reason": null},
            "links": [{"type": "ACTIVITY_EXECUTION", "target": "activity-1"}]
        }))
        .unwrap();
        let signer = signer();
        signer.sign(&mut event).unwrap();

        let document = event.to_value().unwrap();
        assert_eq!(document["data"], json!({"reason": null}));
        assert_eq!(
            document["meta"]["security"]["integrityProtection"]["alg"],
            "RS256"
        );
        let decoded = Event::from_value(document).unwrap();
        assert!(verify_event(&decoded, &signer.verifying_key()).is_ok());
    }

    #[test]
    fn test_wrong_key_is_rejected() {
        let mut event = Event::tercc("strategy");
        signer().sign(&mut event).unwrap();
        let other = Signer::from_pem(OTHER_KEY).unwrap();
        let err = verify_event(&event, &other.verifying_key()).unwrap_err();
        assert!(matches!(err, EtosError::SignatureInvalid { .. }));
    }

    #[test]
    fn test_tampered_event_is_rejected() {
        let signer = signer();
        let mut event = Event::tercc("strategy");
        signer.sign(&mut event).unwrap();

        let mut document = event.to_value().unwrap();
        document["meta"]["tags"] = json!(["tampered"]);
        let tampered = Event::from_value(document).unwrap();
        let err = verify_event(&tampered, &signer.verifying_key()).unwrap_err();
        assert_eq!(err.error_code(), "SIGNATURE_INVALID");
    }

    #[test]
    fn test_unsigned_event_is_malformed() {
        let event = Event::tercc("strategy");
        let err = verify_event(&event, &signer().verifying_key()).unwrap_err();
        assert!(matches!(err, EtosError::MalformedEvent { .. }));
    }

    #[test]
    fn test_malformed_keys() {
        assert!(matches!(
            Signer::from_pem("not a key").unwrap_err(),
            EtosError::MalformedKey { .. }
        ));
        assert!(matches!(
            parse_public_key("-----BEGIN RSA PUBLIC KEY-----\nabcd\n-----END RSA PUBLIC KEY-----").unwrap_err(),
            EtosError::MalformedKey { .. }
        ));
    }
}
