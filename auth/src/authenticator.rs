use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;

use crate::jwt::Claims;
use crate::jwt::JwtError;
use crate::jwt::JwtHandler;
use crate::password::PasswordError;
use crate::password::PasswordHasher;

/// Authentication coordinator combining password verification and session token issuance.
///
/// Every token it issues carries the same fixed lifetime; issuance is
/// stateless and verification has no side effects.
pub struct Authenticator {
    password_hasher: PasswordHasher,
    jwt_handler: JwtHandler,
    token_ttl: Duration,
}

/// A freshly signed session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    /// Compact JWS representation
    pub access_token: String,
    /// Instant after which verification fails
    pub expires_at: DateTime<Utc>,
}

/// Authentication operation errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthenticationError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Password error: {0}")]
    PasswordError(#[from] PasswordError),
}

impl Authenticator {
    /// Create a new authenticator.
    ///
    /// # Arguments
    /// * `jwt_secret` - Secret key for JWT signing
    /// * `token_ttl` - Lifetime stamped on every issued token
    pub fn new(jwt_secret: &[u8], token_ttl: Duration) -> Self {
        Self {
            password_hasher: PasswordHasher::new(),
            jwt_handler: JwtHandler::new(jwt_secret),
            token_ttl,
        }
    }

    /// Hash a password for storage.
    ///
    /// # Errors
    /// * `PasswordError` - Hashing operation failed
    pub fn hash_password(&self, password: &str) -> Result<String, PasswordError> {
        self.password_hasher.hash(password)
    }

    /// Verify a password against a stored hash.
    ///
    /// A `None` hash means there is no usable credential (unknown account or
    /// federation-only account); the decoy verification still runs so both
    /// cases cost the same as a real mismatch.
    ///
    /// # Errors
    /// * `InvalidCredentials` - No usable hash or password does not match
    /// * `PasswordError` - Stored hash is corrupt
    pub fn verify_password(
        &self,
        password: &str,
        stored_hash: Option<&str>,
    ) -> Result<(), AuthenticationError> {
        let is_valid = match stored_hash {
            Some(hash) => self.password_hasher.verify(password, hash)?,
            None => self.password_hasher.verify_decoy(password),
        };

        if !is_valid {
            return Err(AuthenticationError::InvalidCredentials);
        }

        Ok(())
    }

    /// Start claims for an identity, stamped now with the configured TTL.
    pub fn claims_for(
        &self,
        user_id: impl ToString,
        email: impl ToString,
        name: impl ToString,
    ) -> Claims {
        Claims::for_identity(user_id, email, name, Utc::now(), self.token_ttl)
    }

    /// Sign claims without password verification.
    ///
    /// Used once identity has been established by other means (federation).
    ///
    /// # Errors
    /// * `JwtError` - Token generation failed
    pub fn generate_token(&self, claims: &Claims) -> Result<IssuedToken, JwtError> {
        let access_token = self.jwt_handler.encode(claims)?;
        let expires_at = claims.expires_at().ok_or_else(|| {
            JwtError::EncodingFailed(format!("Expiry out of range: {}", claims.exp))
        })?;

        Ok(IssuedToken {
            access_token,
            expires_at,
        })
    }

    /// Validate and decode a session token.
    ///
    /// # Errors
    /// * `InvalidToken` - Bad signature, malformed, or expired
    pub fn validate_token(&self, token: &str) -> Result<Claims, JwtError> {
        self.jwt_handler.decode(token)
    }
}
