use std::collections::HashMap;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::domain::otp::errors::OtpError;
use crate::domain::otp::models::AttemptOutcome;
use crate::domain::otp::models::ChallengeId;
use crate::domain::otp::models::OtpChallenge;
use crate::domain::otp::models::OtpCode;
use crate::domain::otp::ports::OtpStore;
use crate::domain::user::models::UserId;

/// OTP challenges held in process memory, one per user.
///
/// Every operation, including the read-increment-compare of an attempt,
/// runs under the same lock.
#[derive(Default)]
pub struct InMemoryOtpStore {
    challenges: Mutex<HashMap<UserId, OtpChallenge>>,
}

impl InMemoryOtpStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.challenges.lock().await.len()
    }
}

#[async_trait]
impl OtpStore for InMemoryOtpStore {
    async fn replace(&self, challenge: OtpChallenge) -> Result<(), OtpError> {
        self.challenges
            .lock()
            .await
            .insert(challenge.user_id, challenge);
        Ok(())
    }

    async fn remove_if_current(
        &self,
        user_id: &UserId,
        challenge_id: &ChallengeId,
    ) -> Result<bool, OtpError> {
        let mut challenges = self.challenges.lock().await;
        match challenges.get(user_id) {
            Some(current) if current.id == *challenge_id => {
                challenges.remove(user_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_attempt(
        &self,
        user_id: &UserId,
        code: &OtpCode,
        now: DateTime<Utc>,
    ) -> Result<Option<AttemptOutcome>, OtpError> {
        let mut challenges = self.challenges.lock().await;
        let Some(challenge) = challenges.get_mut(user_id) else {
            return Ok(None);
        };

        let outcome = challenge.attempt(code, now);
        if outcome.is_terminal() {
            challenges.remove(user_id);
        }

        Ok(Some(outcome))
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, OtpError> {
        let mut challenges = self.challenges.lock().await;
        let before = challenges.len();
        challenges.retain(|_, challenge| !challenge.is_expired(now));
        Ok(before - challenges.len())
    }
}
