//! Error types for ETOS core operations
//!
//! Every failure the collector, the result evaluator or the integrity layer
//! can report is a variant of [`EtosError`]. Variants are grouped into
//! categories that mirror how a caller should react:
//!
//! - **Transport**: the event repository could not be queried. Retry later.
//! - **NotReady**: a required event does not exist yet. Poll again.
//! - **Terminal**: the run reached a state that no amount of polling changes.
//! - **Integrity**: a signature could not be trusted.
//! - **Validation**: an event does not conform to its protocol schema.
//! - **Decode**: a document from the repository is not an event we understand.
//!
//! # Example
//!
//! ```rust
//! use etos_core::error::{ErrorCategory, EtosError};
//!
//! fn should_poll_again(err: &EtosError) -> bool {
//!     match err.category() {
//!         ErrorCategory::NotReady | ErrorCategory::Transport => true,
//!         _ => false,
//!     }
//! }
//!
//! assert!(should_poll_again(&EtosError::NoMainSuites));
//! assert!(!should_poll_again(&EtosError::ActivityCanceled));
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for ETOS core operations
pub type Result<T> = std::result::Result<T, EtosError>;

/// Error category for grouping related errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Event repository or network failure
    Transport,
    /// A required event has not been published yet
    NotReady,
    /// The run can no longer produce a verdict
    Terminal,
    /// Signature or key failure
    Integrity,
    /// Schema validation failure
    Validation,
    /// Undecodable or unexpected event document
    Decode,
    /// Local failure unrelated to the run
    Internal,
}

/// Errors that can occur while collecting, evaluating or verifying events
#[derive(Error, Debug)]
pub enum EtosError {
    // ═══════════════════════════════════════════════════════════════════════
    // Transport errors (event repository access)
    // ═══════════════════════════════════════════════════════════════════════

    /// A repository query failed; `query` names what was being fetched
    #[error("failed to get {query}: {source}")]
    Query {
        query: &'static str,
        #[source]
        source: Box<EtosError>,
    },

    /// The repository could not be reached or answered with an error
    #[error("event repository error: {reason}")]
    Transport { reason: String },

    /// The caller-supplied deadline elapsed while a query was in flight
    #[error("timed out while getting {query}")]
    Timeout { query: &'static str },

    /// In-memory repository lock is poisoned
    #[error("event repository lock poisoned")]
    RepositoryLocked,

    // ═══════════════════════════════════════════════════════════════════════
    // Not-ready errors (run still in progress)
    // ═══════════════════════════════════════════════════════════════════════

    /// The run-definition event (TERCC) has not been published
    #[error("no originating run-definition event found")]
    NoTercc,

    /// The activity for the run has not been triggered
    #[error("no activity-triggered event found")]
    NoActivityTriggered,

    /// The activity has not started any main test suites
    #[error("no main test suites found")]
    NoMainSuites,

    /// A main test suite has started but not finished
    #[error("test suite {suite_id} not finished")]
    SuiteNotFinished { suite_id: String },

    // ═══════════════════════════════════════════════════════════════════════
    // Terminal errors
    // ═══════════════════════════════════════════════════════════════════════

    /// The activity was canceled before the suites could finish
    #[error("activity was canceled")]
    ActivityCanceled,

    // ═══════════════════════════════════════════════════════════════════════
    // Decode errors (repository boundary)
    // ═══════════════════════════════════════════════════════════════════════

    /// The event type is not one the engine interprets
    #[error("unknown event type '{event_type}'")]
    UnknownEventType { event_type: String },

    /// The event type is known but its version is outside the supported edition
    #[error("unsupported version '{version}' for {event_type}")]
    UnsupportedVersion { event_type: String, version: String },

    /// The event document is structurally invalid
    #[error("invalid event: {reason}")]
    InvalidEvent { reason: String },

    /// The repository answered a query with an event of the wrong type
    #[error("expected {expected} but repository returned {actual} ({event_id})")]
    UnexpectedEvent {
        expected: String,
        actual: String,
        event_id: String,
    },

    /// JSON serialization or deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ═══════════════════════════════════════════════════════════════════════
    // Integrity errors (signing and verification)
    // ═══════════════════════════════════════════════════════════════════════

    /// A signing or verifying key could not be parsed from its encoded form
    #[error("malformed key: {reason}")]
    MalformedKey { reason: String },

    /// The event carries no usable signature block
    #[error("malformed event {event_id}: {reason}")]
    MalformedEvent { event_id: String, reason: String },

    /// The signature does not match the event content and key
    #[error("signature invalid for event {event_id}")]
    SignatureInvalid { event_id: String },

    // ═══════════════════════════════════════════════════════════════════════
    // Validation errors (schema conformance)
    // ═══════════════════════════════════════════════════════════════════════

    /// An event failed schema validation
    #[error("event validation failed: {reason}")]
    SchemaValidation { event_id: String, reason: String },

    /// No schema is bundled for the event's type and edition
    #[error("no schema available for {event_type} version {version}")]
    SchemaUnavailable { event_type: String, version: String },

    /// A bundled schema failed to compile
    #[error("invalid schema for {event_type}: {reason}")]
    InvalidSchema { event_type: String, reason: String },

    /// An event inside the aggregate failed validation or verification
    #[error("{location} validation failed: {source}")]
    EventValidation {
        location: String,
        #[source]
        source: Box<EtosError>,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // Infrastructure errors
    // ═══════════════════════════════════════════════════════════════════════

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EtosError {
    /// Wrap a repository failure with the name of the query that failed
    pub fn query(query: &'static str, source: EtosError) -> Self {
        EtosError::Query {
            query,
            source: Box::new(source),
        }
    }

    /// Returns the error category for grouping
    pub fn category(&self) -> ErrorCategory {
        match self {
            EtosError::Query { .. }
            | EtosError::Transport { .. }
            | EtosError::Timeout { .. }
            | EtosError::RepositoryLocked => ErrorCategory::Transport,

            EtosError::NoTercc
            | EtosError::NoActivityTriggered
            | EtosError::NoMainSuites
            | EtosError::SuiteNotFinished { .. } => ErrorCategory::NotReady,

            EtosError::ActivityCanceled => ErrorCategory::Terminal,

            EtosError::UnknownEventType { .. }
            | EtosError::UnsupportedVersion { .. }
            | EtosError::InvalidEvent { .. }
            | EtosError::UnexpectedEvent { .. }
            | EtosError::Json(_) => ErrorCategory::Decode,

            EtosError::MalformedKey { .. }
            | EtosError::MalformedEvent { .. }
            | EtosError::SignatureInvalid { .. } => ErrorCategory::Integrity,

            EtosError::SchemaValidation { .. }
            | EtosError::SchemaUnavailable { .. }
            | EtosError::InvalidSchema { .. } => ErrorCategory::Validation,

            EtosError::EventValidation { source, .. } => source.category(),

            EtosError::Io(_) => ErrorCategory::Internal,
        }
    }

    /// Returns true if polling again might produce a different answer
    ///
    /// Not-ready conditions and transport failures are retryable. A canceled
    /// activity, integrity and validation failures are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::NotReady | ErrorCategory::Transport
        )
    }

    /// Returns the stable error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            EtosError::Query { .. } => "QUERY_FAILED",
            EtosError::Transport { .. } => "TRANSPORT_ERROR",
            EtosError::Timeout { .. } => "TIMEOUT",
            EtosError::RepositoryLocked => "REPOSITORY_LOCKED",
            EtosError::NoTercc => "NO_TERCC",
            EtosError::NoActivityTriggered => "NO_ACTIVITY_TRIGGERED",
            EtosError::NoMainSuites => "NO_MAIN_SUITES",
            EtosError::SuiteNotFinished { .. } => "SUITE_NOT_FINISHED",
            EtosError::ActivityCanceled => "ACTIVITY_CANCELED",
            EtosError::UnknownEventType { .. } => "UNKNOWN_EVENT_TYPE",
            EtosError::UnsupportedVersion { .. } => "UNSUPPORTED_VERSION",
            EtosError::InvalidEvent { .. } => "INVALID_EVENT",
            EtosError::UnexpectedEvent { .. } => "UNEXPECTED_EVENT",
            EtosError::Json(_) => "JSON_ERROR",
            EtosError::MalformedKey { .. } => "MALFORMED_KEY",
            EtosError::MalformedEvent { .. } => "MALFORMED_EVENT",
            EtosError::SignatureInvalid { .. } => "SIGNATURE_INVALID",
            EtosError::SchemaValidation { .. } => "SCHEMA_VALIDATION_ERROR",
            EtosError::SchemaUnavailable { .. } => "SCHEMA_UNAVAILABLE",
            EtosError::InvalidSchema { .. } => "INVALID_SCHEMA",
            EtosError::EventValidation { .. } => "EVENT_VALIDATION_ERROR",
            EtosError::Io(_) => "IO_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_ready_errors_are_retryable() {
        assert!(EtosError::NoTercc.is_retryable());
        assert!(EtosError::NoActivityTriggered.is_retryable());
        assert!(EtosError::NoMainSuites.is_retryable());
        assert!(EtosError::SuiteNotFinished {
            suite_id: "suite-1".to_string()
        }
        .is_retryable());
    }

    #[test]
    fn test_terminal_and_integrity_errors_are_not_retryable() {
        assert!(!EtosError::ActivityCanceled.is_retryable());
        assert!(!EtosError::SignatureInvalid {
            event_id: "e1".to_string()
        }
        .is_retryable());
        assert!(!EtosError::MalformedKey {
            reason: "short".to_string()
        }
        .is_retryable());
    }

    #[test]
    fn test_query_wrapping_keeps_transport_category() {
        let err = EtosError::query(
            "TERCC event",
            EtosError::Transport {
                reason: "connection refused".to_string(),
            },
        );
        assert_eq!(err.category(), ErrorCategory::Transport);
        assert_eq!(
            err.to_string(),
            "failed to get TERCC event: event repository error: connection refused"
        );
        assert!(err.is_retryable());
    }

    #[test]
    fn test_event_validation_inherits_source_category() {
        let err = EtosError::EventValidation {
            location: "TERCC event".to_string(),
            source: Box::new(EtosError::SchemaValidation {
                event_id: "e1".to_string(),
                reason: "missing data".to_string(),
            }),
        };
        assert_eq!(err.category(), ErrorCategory::Validation);
        assert!(err.to_string().starts_with("TERCC event validation failed"));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            EtosError::NoTercc.to_string(),
            "no originating run-definition event found"
        );
        assert_eq!(
            EtosError::SuiteNotFinished {
                suite_id: "abc".to_string()
            }
            .to_string(),
            "test suite abc not finished"
        );
        assert_eq!(EtosError::ActivityCanceled.error_code(), "ACTIVITY_CANCELED");
    }
}
