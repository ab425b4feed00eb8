//! Event integrity
//!
//! Two independent checks can be applied to collected events before their
//! verdict is trusted:
//!
//! - schema conformance ([`validator`]), against bundled protocol schemas
//! - authenticity ([`signer`]), RS256 signatures over a canonical form
//!
//! # Example
//!
//! ```rust
//! use etos_core::events::Event;
//! use etos_core::integrity::{verify_event, Signer};
//!
//! let pem = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/signing-key.pem"));
//! let signer = Signer::from_pem(pem).unwrap();
//! let mut event = Event::tercc("strategy");
//! signer.sign(&mut event).unwrap();
//! assert!(verify_event(&event, &signer.verifying_key()).is_ok());
//! ```

pub mod canonical;
pub mod signer;
pub mod validator;

pub use canonical::{canonical_json, event_digest};
pub use signer::{
    parse_public_key, read_public_key, verify_event, verify_events, Signer, SIGNATURE_ALGORITHM,
};
pub use validator::{validate_event, validate_events, SchemaRegistry};
