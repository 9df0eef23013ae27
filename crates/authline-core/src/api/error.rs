use reqwest::StatusCode;
use thiserror::Error;

use super::transport::TransportError;

/// Why a credential renewal did not produce a new pair. Clonable so every
/// request waiting on the same renewal receives the same error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenewalError {
    #[error("No refresh token available")]
    MissingCredential,

    #[error("Refresh request failed: {0}")]
    Transport(TransportError),

    #[error("Refresh rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Invalid refresh response: {0}")]
    InvalidResponse(String),

    /// The renewal task panicked or was aborted before finishing
    #[error("Refresh task ended unexpectedly: {0}")]
    Interrupted(String),
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// 401 with no refresh token to renew with
    #[error("Unauthorized - no valid session")]
    Unauthorized,

    /// 401 on a request that was already replayed after a renewal
    #[error("Unauthorized after credential renewal: {0}")]
    RetryExhausted(String),

    #[error("Session renewal failed: {0}")]
    RenewalFailed(#[from] RenewalError),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    Transport(#[from] TransportError),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    pub(crate) fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            return body.to_string();
        }
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }

    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 => ApiError::Unauthorized,
            403 => ApiError::AccessDenied(truncated),
            404 => ApiError::NotFound(truncated),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(truncated),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, truncated)),
        }
    }

    /// The server refused the presented credential.
    pub fn is_authorization_failure(&self) -> bool {
        matches!(self, ApiError::Unauthorized | ApiError::RetryExhausted(_))
    }

    /// The session was torn down while handling the request.
    pub fn ends_session(&self) -> bool {
        matches!(self, ApiError::RenewalFailed(_))
    }
}
