//! Error types for the ETOS client

use thiserror::Error;

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur while talking to the ETOS API
#[derive(Error, Debug)]
pub enum ClientError {
    /// The server answered with an error document
    #[error("server error: {0}")]
    Server(String),

    /// The server answered with an error status and an unreadable body
    #[error("server returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The request could not be sent or the response not received
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A response body did not match the expected shape
    #[error("failed to parse response: {0}")]
    Json(#[from] serde_json::Error),

    /// A required start parameter is empty after environment fallbacks
    #[error("missing required parameter: {0}")]
    MissingParameter(&'static str),

    /// Configuration file or value is invalid
    #[error("invalid configuration: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
