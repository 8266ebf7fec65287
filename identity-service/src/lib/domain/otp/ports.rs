use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;

use crate::domain::otp::errors::DeliveryError;
use crate::domain::otp::errors::OtpError;
use crate::domain::otp::models::AttemptOutcome;
use crate::domain::otp::models::ChallengeId;
use crate::domain::otp::models::OtpChallenge;
use crate::domain::otp::models::OtpCode;
use crate::domain::otp::models::OtpDispatch;
use crate::domain::user::models::PhoneNumber;
use crate::domain::user::models::UserId;

/// Port for the OTP challenge service.
#[async_trait]
pub trait OtpServicePort: Send + Sync + 'static {
    /// Issue a fresh challenge for the user named by `identifier` and dispatch it.
    ///
    /// # Arguments
    /// * `identifier` - Email address or internal user id
    ///
    /// # Returns
    /// Expiry and masked destination; the code itself is never returned
    ///
    /// # Errors
    /// * `UserNotFound` - Identifier resolves to nobody
    /// * `NoPhoneNumber` - User has no phone on file
    /// * `Delivery` / `DeliveryTimeout` - Dispatch failed; the challenge was rolled back
    async fn generate_and_send(&self, identifier: &str) -> Result<OtpDispatch, OtpError>;

    /// Check a submitted code against the user's live challenge.
    ///
    /// # Errors
    /// * `OtpNotFound` - No live challenge
    /// * `OtpExpired` - Challenge outlived its TTL (now removed)
    /// * `MaxAttemptsExceeded` - Attempts already used up (now removed)
    /// * `InvalidOtp` - Wrong code, carries the attempts remaining
    async fn verify(&self, user_id: &UserId, code: &OtpCode) -> Result<(), OtpError>;
}

/// Keyed challenge storage, at most one live challenge per user.
///
/// Each method runs as a single critical section for the user it touches.
#[async_trait]
pub trait OtpStore: Send + Sync + 'static {
    /// Store `challenge`, discarding any earlier challenge for the same user.
    async fn replace(&self, challenge: OtpChallenge) -> Result<(), OtpError>;

    /// Remove the user's challenge only if it is still `challenge_id`.
    async fn remove_if_current(
        &self,
        user_id: &UserId,
        challenge_id: &ChallengeId,
    ) -> Result<bool, OtpError>;

    /// Apply one attempt and delete the challenge when the outcome is terminal.
    ///
    /// # Returns
    /// `None` when the user has no live challenge
    async fn record_attempt(
        &self,
        user_id: &UserId,
        code: &OtpCode,
        now: DateTime<Utc>,
    ) -> Result<Option<AttemptOutcome>, OtpError>;

    /// Drop every challenge expired at `now`, returning how many were removed.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, OtpError>;
}

/// Outbound channel that carries the code to the user.
#[async_trait]
pub trait MessageDelivery: Send + Sync + 'static {
    async fn send_otp(
        &self,
        to: &PhoneNumber,
        code: &OtpCode,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DeliveryError>;
}
