//! Neutron client errors

use thiserror::Error;

/// Errors that can occur when interacting with the Neutron API
#[derive(Debug, Error)]
pub enum NeutronError {
    /// HTTP request/response error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Neutron API returned an error
    #[error("Neutron API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Resource already exists or is in a conflicting state
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid request (e.g., missing required fields)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}
