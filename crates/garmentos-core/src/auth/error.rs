use thiserror::Error;

use crate::api::ApiError;

/// Errors returned by `SessionAuthority` operations.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The backend rejected the username/password pair. Carries the message
    /// to show on the login form.
    #[error("{0}")]
    Authentication(String),

    /// The stored credential was rejected; it has been cleared.
    #[error("Session expired - please sign in again")]
    SessionInvalid,

    #[error("Not signed in")]
    NotAuthenticated,

    #[error("Request failed: {0}")]
    Transport(#[from] ApiError),

    #[error("Credential storage failed: {0:#}")]
    Storage(anyhow::Error),

    #[error("Session has been shut down")]
    Closed,
}

impl AuthError {
    /// Message suitable for inline login-form feedback.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::Authentication(msg) => msg.clone(),
            AuthError::Transport(ApiError::NetworkError(e)) if e.is_timeout() => {
                "Connection timed out. Please try again.".to_string()
            }
            AuthError::Transport(ApiError::NetworkError(_)) => {
                "Unable to connect to server. Check your internet connection.".to_string()
            }
            other => other.to_string(),
        }
    }
}
