//! Drivemirror Drive - Google Drive v2 remote-store adapter
//!
//! Provides:
//! - An HTTP client for the three Drive v2 calls the sync engine needs
//!   (list children, get by id, insert)
//! - An [`IRemoteStore`](drivemirror_core::ports::IRemoteStore) implementation
//!   on top of it
//! - OAuth2 refresh-token exchange for a fresh bearer token at startup
//!
//! ## Modules
//!
//! - [`auth`] - OAuth2 refresh-token exchange
//! - [`client`] - Drive v2 HTTP client and wire types
//! - [`provider`] - Remote store adapter

pub mod auth;
pub mod client;
pub mod provider;

use reqwest::StatusCode;
use thiserror::Error;

/// Errors returned by the Drive v2 API
#[derive(Debug, Error)]
pub enum DriveError {
    /// Authentication credentials are invalid or expired
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Insufficient permissions for the requested operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// The requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limit exceeded
    #[error("Too many requests: {0}")]
    TooManyRequests(String),

    /// A server-side error occurred (5xx)
    #[error("Server error: {0}")]
    ServerError(String),

    /// Any other non-success status
    #[error("Unexpected status {status}: {message}")]
    UnexpectedStatus { status: u16, message: String },

    /// A network-level error occurred
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The API response could not be parsed or was malformed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl DriveError {
    /// Classifies a non-success HTTP status
    pub fn from_status(status: StatusCode, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            StatusCode::UNAUTHORIZED => DriveError::Unauthorized(message),
            StatusCode::FORBIDDEN => DriveError::Forbidden(message),
            StatusCode::NOT_FOUND => DriveError::NotFound(message),
            StatusCode::TOO_MANY_REQUESTS => DriveError::TooManyRequests(message),
            s if s.is_server_error() => DriveError::ServerError(message),
            s => DriveError::UnexpectedStatus {
                status: s.as_u16(),
                message,
            },
        }
    }

    /// Whether a later attempt of the same call might succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DriveError::TooManyRequests(_) | DriveError::ServerError(_) | DriveError::NetworkError(_)
        )
    }
}
