//! Error types for lms-pay
//!
//! Module-specific error type using thiserror. HTTP mapping lives in
//! `api::error`.

use thiserror::Error;

/// Main error type for lms-pay
#[derive(Error, Debug)]
pub enum Error {
    /// Backend answered with something other than the expected envelope
    #[error("Backend error: {0}")]
    Backend(String),

    /// Transport failure talking to the backend or the hub
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Realtime hub negotiation or stream failure
    #[error("Hub error: {0}")]
    Hub(String),

    /// Malformed hub frame or backend response body
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Dialog id unknown or already closed
    #[error("Dialog not found: {0}")]
    DialogNotFound(uuid::Uuid),

    /// Return session id unknown
    #[error("Return session not found: {0}")]
    ReturnNotFound(uuid::Uuid),

    /// Operation not allowed in the current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Invalid request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// lms-common error (session, config)
    #[error(transparent)]
    Common(#[from] lms_common::Error),
}

/// Convenience Result type using lms-pay Error
pub type Result<T> = std::result::Result<T, Error>;
