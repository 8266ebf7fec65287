use serde::Deserialize;

use super::errors::PasswordPolicyError;

/// Named password strength policies.
///
/// `Basic` is the length-only rule of the simple sign-in path. `Strong` is the
/// registration rule and also demands mixed case and a digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PasswordPolicy {
    /// At least [`PasswordPolicy::MIN_LENGTH`] characters.
    Basic,
    /// `Basic` plus one uppercase letter, one lowercase letter and one digit.
    #[default]
    Strong,
}

impl PasswordPolicy {
    pub const MIN_LENGTH: usize = 8;

    /// Check a candidate password against this policy.
    ///
    /// # Errors
    /// * `TooShort` - Fewer than 8 characters
    /// * `MissingUppercase` / `MissingLowercase` / `MissingDigit` - Strong policy only
    pub fn check(&self, password: &str) -> Result<(), PasswordPolicyError> {
        let length = password.chars().count();
        if length < Self::MIN_LENGTH {
            return Err(PasswordPolicyError::TooShort {
                min: Self::MIN_LENGTH,
                actual: length,
            });
        }

        if *self == PasswordPolicy::Basic {
            return Ok(());
        }

        if !password.chars().any(char::is_uppercase) {
            return Err(PasswordPolicyError::MissingUppercase);
        }
        if !password.chars().any(char::is_lowercase) {
            return Err(PasswordPolicyError::MissingLowercase);
        }
        if !password.chars().any(|c| c.is_ascii_digit()) {
            return Err(PasswordPolicyError::MissingDigit);
        }

        Ok(())
    }
}
