//! Error taxonomy shared by the auth client, session manager and guards.

use thiserror::Error;

/// Authorization core errors.
///
/// `InvalidRefreshToken` forces a logout and is never retried; `Transport`
/// during a refresh is retried a bounded number of times before the session
/// falls back to a forced logout.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("invalid refresh token")]
    InvalidRefreshToken,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unauthenticated")]
    Unauthenticated,

    #[error("forbidden")]
    Forbidden,

    #[error("tenant not found")]
    TenantNotFound,
}

impl AuthError {
    /// Whether a failed refresh with this error may be retried.
    ///
    /// Only transport failures qualify; a rejected refresh token is dead and
    /// retrying it can only trip replay detection.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}
