//! Omaha protocol error types.

use thiserror::Error;

/// Errors produced while exchanging one request/response pair
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Update server returned status {status}: {url}")]
    UnexpectedStatus { url: String, status: u16 },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Response carries no app update check")]
    MissingApp,
}
