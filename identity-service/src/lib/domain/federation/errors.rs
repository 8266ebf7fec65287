use thiserror::Error;

use crate::domain::federation::models::PolicyViolation;
use crate::domain::session::errors::SessionError;
use crate::user::errors::UserError;

/// Top-level error for federated sign-in
#[derive(Debug, Clone, Error)]
pub enum FederationError {
    #[error("Authorization code and state are required")]
    MissingParameters,

    #[error("State does not match this session or was already used")]
    InvalidState,

    #[error("Sign-in blocked by conditional access policy")]
    ConditionalAccessViolation(Vec<PolicyViolation>),

    #[error("Provider profile is missing {0}")]
    IncompleteProfile(&'static str),

    /// Transport failure, timeout or non-2xx answer from the provider.
    /// The detail is for logs only.
    #[error("Identity provider request failed: {0}")]
    Upstream(String),

    #[error("Identity provider configuration is invalid: {0}")]
    Configuration(String),

    #[error("Failed to link local account: {0}")]
    Account(#[from] UserError),

    #[error("Failed to issue session: {0}")]
    Session(#[from] SessionError),

    #[error("State storage error: {0}")]
    StateStorage(String),
}
