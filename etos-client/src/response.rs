//! Response types from the ETOS API

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};

/// An ETOS test run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestRun {
    pub id: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Error document returned with 4xx and 5xx statuses
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Turn an error status into a [`ClientError`], passing successes through
pub fn check_status(status: u16, body: &[u8]) -> ClientResult<()> {
    if status < 400 {
        return Ok(());
    }
    match serde_json::from_slice::<ErrorResponse>(body) {
        Ok(response) => Err(ClientError::Server(response.error)),
        Err(_) => Err(ClientError::Status {
            status,
            body: String::from_utf8_lossy(body).trim().to_string(),
        }),
    }
}

/// Check the status and decode the body
pub fn parse_response<T: DeserializeOwned>(status: u16, body: &[u8]) -> ClientResult<T> {
    check_status(status, body)?;
    Ok(serde_json::from_slice(body)?)
}
