use thiserror::Error;

use crate::auth::StoreError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Not signed in - no access token available")]
    NoCredential,

    #[error("Session renewal failed: {0}")]
    RefreshFailed(String),

    #[error("Authentication failed after renewing the session")]
    AuthFailure,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    #[error("Request failed with status {status}: {message}")]
    RequestFailed { status: u16, message: String },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Credential store error: {0}")]
    Store(#[from] StoreError),

    /// Internal signal; `AuthenticatedClient` turns this into a refresh.
    #[error("Unauthorized - token may be expired")]
    Unauthorized,
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let truncated = Self::truncate_body(body);
        match status.as_u16() {
            401 => ApiError::Unauthorized,
            403 => ApiError::PermissionDenied(truncated),
            404 => ApiError::NotFound(truncated),
            429 => ApiError::RateLimited,
            status @ 500..=599 => ApiError::ServerError {
                status,
                message: truncated,
            },
            code => ApiError::RequestFailed {
                status: code,
                message: truncated,
            },
        }
    }

    /// Errors that end the signed-in session; the UI must send the user back
    /// to the login screen.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            ApiError::NoCredential
                | ApiError::RefreshFailed(_)
                | ApiError::AuthFailure
                | ApiError::Unauthorized
        )
    }
}
