use thiserror::Error;

/// Error type for JWT operations.
///
/// Every decoding failure is `InvalidToken`, whatever the cause.
/// `reason` is for server-side logs only.
#[derive(Debug, Clone, Error)]
pub enum JwtError {
    #[error("Failed to encode token: {0}")]
    EncodingFailed(String),

    #[error("Invalid or expired token")]
    InvalidToken { reason: String },
}
