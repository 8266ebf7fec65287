use std::fmt;

use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use rand::Rng;
use uuid::Uuid;

use crate::domain::otp::errors::OtpError;
use crate::domain::user::models::UserId;

/// Six-digit numeric one-time passcode.
#[derive(Clone, PartialEq, Eq)]
pub struct OtpCode(String);

impl OtpCode {
    pub const LENGTH: usize = 6;

    /// Draw a uniformly random code from `000000..=999999`.
    pub fn generate() -> Self {
        let value: u32 = rand::thread_rng().gen_range(0..1_000_000);
        Self(format!("{:06}", value))
    }

    /// Parse a caller-submitted code.
    ///
    /// # Errors
    /// * `InvalidCode` - Not exactly six ASCII digits
    pub fn parse(code: &str) -> Result<Self, OtpError> {
        let code = code.trim();
        if code.len() != Self::LENGTH || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(OtpError::InvalidCode);
        }
        Ok(Self(code.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compare without short-circuiting on the first differing digit.
    pub fn matches(&self, other: &OtpCode) -> bool {
        let a = self.0.as_bytes();
        let b = other.0.as_bytes();
        if a.len() != b.len() {
            return false;
        }
        a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
    }
}

impl fmt::Debug for OtpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OtpCode(******)")
    }
}

/// Identity of one issued challenge, used to tell a regenerated challenge apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChallengeId(Uuid);

impl ChallengeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ChallengeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ChallengeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Live OTP challenge bound to one user.
#[derive(Debug, Clone)]
pub struct OtpChallenge {
    pub id: ChallengeId,
    pub user_id: UserId,
    code: OtpCode,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub attempts: u32,
    pub max_attempts: u32,
    pub masked_destination: String,
}

/// Result of applying one verification attempt to a challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Verified,
    Mismatch { attempts_remaining: u32 },
    Expired,
    Exhausted,
}

impl AttemptOutcome {
    /// Terminal outcomes remove the challenge from the store.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AttemptOutcome::Mismatch { .. })
    }
}

impl OtpChallenge {
    pub fn issue(
        user_id: UserId,
        code: OtpCode,
        masked_destination: String,
        now: DateTime<Utc>,
        ttl: Duration,
        max_attempts: u32,
    ) -> Self {
        Self {
            id: ChallengeId::new(),
            user_id,
            code,
            created_at: now,
            expires_at: now + ttl,
            attempts: 0,
            max_attempts,
            masked_destination,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Apply one verification attempt.
    ///
    /// Expiry and exhaustion are checked first and leave the counter alone;
    /// otherwise the counter is incremented before the codes are compared.
    pub fn attempt(&mut self, submitted: &OtpCode, now: DateTime<Utc>) -> AttemptOutcome {
        if self.is_expired(now) {
            return AttemptOutcome::Expired;
        }
        if self.attempts >= self.max_attempts {
            return AttemptOutcome::Exhausted;
        }

        self.attempts += 1;

        if self.code.matches(submitted) {
            AttemptOutcome::Verified
        } else {
            AttemptOutcome::Mismatch {
                attempts_remaining: self.max_attempts - self.attempts,
            }
        }
    }
}

/// What the caller of generation learns: never the code itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpDispatch {
    pub expires_at: DateTime<Utc>,
    pub masked_destination: String,
}
