use thiserror::Error;

/// Session token errors.
///
/// Verification has exactly one failure kind; callers learn only "invalid or expired".
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Failed to issue session token: {0}")]
    IssueFailed(String),
}
