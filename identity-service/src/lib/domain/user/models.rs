use std::fmt;
use std::str::FromStr;

use chrono::DateTime;
use chrono::Utc;
use uuid::Uuid;

use crate::user::errors::DisplayNameError;
use crate::user::errors::EmailError;
use crate::user::errors::PhoneNumberError;
use crate::user::errors::UserIdError;

/// User identity as seen outside the credential store.
///
/// Carries no credential material; the password hash lives only in
/// [`UserRecord`] and never leaves the repository/service pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub name: DisplayName,
    pub email: EmailAddress,
    pub phone: Option<PhoneNumber>,
    pub status: AccountStatus,
    pub mfa_enabled: bool,
    pub created_at: DateTime<Utc>,
}

/// Stored form of a user: the public identity plus its credential.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub user: User,
    pub credential: Credential,
}

/// How an account proves possession of its identity.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Argon2 PHC hash of the account password
    Password(String),
    /// Account created through federation; password sign-in is impossible
    FederatedOnly,
}

impl Credential {
    /// Hash usable for password verification, if any.
    pub fn password_hash(&self) -> Option<&str> {
        match self {
            Credential::Password(hash) => Some(hash),
            Credential::FederatedOnly => None,
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Password(_) => f.write_str("Password(<redacted>)"),
            Credential::FederatedOnly => f.write_str("FederatedOnly"),
        }
    }
}

/// Account lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccountStatus {
    Active,
    Locked,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Locked => "locked",
        }
    }
}

/// User unique identifier type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UserId(pub Uuid);

impl UserId {
    /// Generate a new random user ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a user ID from string.
    ///
    /// # Errors
    /// * `InvalidFormat` - String is not a valid UUID
    pub fn from_string(s: &str) -> Result<Self, UserIdError> {
        Uuid::parse_str(s)
            .map(UserId)
            .map_err(|e| UserIdError::InvalidFormat(e.to_string()))
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Display name value type
///
/// Trimmed, non-empty, at most 100 characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayName(String);

impl DisplayName {
    const MAX_LENGTH: usize = 100;

    /// Create a new display name.
    ///
    /// # Errors
    /// * `Empty` - Nothing left after trimming
    /// * `TooLong` - More than 100 characters
    pub fn new(name: String) -> Result<Self, DisplayNameError> {
        let trimmed = name.trim();
        let length = trimmed.chars().count();

        if length == 0 {
            Err(DisplayNameError::Empty)
        } else if length > Self::MAX_LENGTH {
            Err(DisplayNameError::TooLong {
                max: Self::MAX_LENGTH,
                actual: length,
            })
        } else {
            Ok(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Email address type
///
/// Validated with an RFC 5322 parser and normalized to lowercase, so it can
/// serve directly as the unique lookup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Create a new validated, normalized email address.
    ///
    /// # Errors
    /// * `InvalidFormat` - Email does not conform to RFC 5322
    pub fn new(email: String) -> Result<Self, EmailError> {
        let normalized = email.trim().to_lowercase();
        email_address::EmailAddress::from_str(&normalized)
            .map(|_| EmailAddress(normalized))
            .map_err(|e| EmailError::InvalidFormat(e.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Phone number in E.164 format: `+` followed by 1 to 15 digits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    const MAX_DIGITS: usize = 15;

    /// # Errors
    /// * `InvalidFormat` - Not `+` followed by 1-15 ASCII digits
    pub fn new(phone: String) -> Result<Self, PhoneNumberError> {
        let digits = phone
            .strip_prefix('+')
            .ok_or(PhoneNumberError::InvalidFormat)?;

        if digits.is_empty()
            || digits.len() > Self::MAX_DIGITS
            || !digits.chars().all(|c| c.is_ascii_digit())
        {
            return Err(PhoneNumberError::InvalidFormat);
        }

        Ok(Self(phone))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Masked form safe to show back to the caller, e.g. `+1****4567`.
    pub fn masked(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        if chars.len() <= 6 {
            return "****".to_string();
        }

        let head: String = chars[..2].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}****{}", head, tail)
    }
}

/// Command to register a new user with domain types
#[derive(Debug)]
pub struct RegisterUserCommand {
    pub name: DisplayName,
    pub email: EmailAddress,
    /// Plain text password (policy-checked and hashed by the service)
    pub password: String,
    pub phone: Option<PhoneNumber>,
}

impl RegisterUserCommand {
    pub fn new(
        name: DisplayName,
        email: EmailAddress,
        password: String,
        phone: Option<PhoneNumber>,
    ) -> Self {
        Self {
            name,
            email,
            password,
            phone,
        }
    }
}

/// Single-field mutation applied atomically to a stored user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserChange {
    MfaEnabled(bool),
    Status(AccountStatus),
}

/// Identity asserted by an external provider, used to find or create a local account.
#[derive(Debug, Clone)]
pub struct FederatedAccountCommand {
    /// Subject id at the provider
    pub subject: String,
    pub email: EmailAddress,
    pub name: DisplayName,
    pub phone: Option<PhoneNumber>,
}

/// Back-reference from a provider subject to a local user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedLink {
    pub subject: String,
    pub user_id: UserId,
    pub linked_at: DateTime<Utc>,
}

/// Parsed form of a caller-supplied identifier: either an internal id or an email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserLookup {
    ById(UserId),
    ByEmail(EmailAddress),
}

impl UserLookup {
    /// Classify an identifier. UUIDs are ids, anything else must be an email.
    pub fn parse(identifier: &str) -> Option<Self> {
        let identifier = identifier.trim();
        if let Ok(id) = UserId::from_string(identifier) {
            return Some(UserLookup::ById(id));
        }
        EmailAddress::new(identifier.to_string())
            .ok()
            .map(UserLookup::ByEmail)
    }
}

/// Outcome of resolving an identifier against the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedUser {
    ByEmail(User),
    ById(User),
    NotFound,
}

impl ResolvedUser {
    pub fn into_user(self) -> Option<User> {
        match self {
            ResolvedUser::ByEmail(user) | ResolvedUser::ById(user) => Some(user),
            ResolvedUser::NotFound => None,
        }
    }
}
