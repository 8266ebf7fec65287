use std::sync::OnceLock;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::PasswordHash;
use argon2::password_hash::PasswordHasher as Argon2PasswordHasher;
use argon2::password_hash::PasswordVerifier;
use argon2::password_hash::SaltString;
use argon2::Algorithm;
use argon2::Argon2;
use argon2::Params;
use argon2::Version;

use super::errors::PasswordError;

/// Input for the decoy hash used when no account matches.
const DECOY_PASSWORD: &str = "decoy-password-never-matches";

/// Argon2id password hasher.
///
/// Produces PHC strings (algorithm, version, parameters, salt and digest) with a
/// fresh random salt per call. Verification reads the parameters back from the
/// stored string, so hashes created under older parameters keep verifying.
pub struct PasswordHasher {
    argon2: Argon2<'static>,
    decoy_hash: OnceLock<String>,
}

impl PasswordHasher {
    /// Create a hasher using Argon2id v1.3 with the crate's default cost parameters.
    pub fn new() -> Self {
        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, Params::default()),
            decoy_hash: OnceLock::new(),
        }
    }

    /// Hash a plaintext password.
    ///
    /// # Returns
    /// PHC string, e.g. `$argon2id$v=19$m=19456,t=2,p=1$<salt>$<digest>`
    ///
    /// # Errors
    /// * `HashingFailed` - Argon2 rejected the input or parameters
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);

        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| PasswordError::HashingFailed(e.to_string()))
    }

    /// Check `password` against a stored PHC hash.
    ///
    /// # Returns
    /// Whether the password matches
    ///
    /// # Errors
    /// * `VerificationFailed` - Stored hash is not a valid PHC string
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordError> {
        let parsed = PasswordHash::new(hash).map_err(|e| {
            PasswordError::VerificationFailed(format!("Invalid password hash: {}", e))
        })?;

        Ok(self
            .argon2
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }

    /// Run a full verification against a decoy hash and report a mismatch.
    ///
    /// Used when no account matches the submitted identifier, so a login for an
    /// unknown account costs the same as one with a wrong password.
    pub fn verify_decoy(&self, password: &str) -> bool {
        let decoy = self
            .decoy_hash
            .get_or_init(|| self.hash(DECOY_PASSWORD).unwrap_or_default());

        let _ = self.verify(password, decoy);
        false
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new()
    }
}
