use async_trait::async_trait;

use crate::domain::session::models::SessionToken;
use crate::domain::user::models::AccountStatus;
use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::FederatedAccountCommand;
use crate::domain::user::models::FederatedLink;
use crate::domain::user::models::RegisterUserCommand;
use crate::domain::user::models::ResolvedUser;
use crate::domain::user::models::User;
use crate::domain::user::models::UserChange;
use crate::domain::user::models::UserId;
use crate::domain::user::models::UserRecord;
use crate::user::errors::UserError;

/// Port for credential store operations.
#[async_trait]
pub trait CredentialStorePort: Send + Sync + 'static {
    /// Register a new user.
    ///
    /// # Arguments
    /// * `command` - Validated name, email and optional phone plus the raw password
    ///
    /// # Returns
    /// Created user (no credential material)
    ///
    /// # Errors
    /// * `WeakPassword` - Password fails the configured policy
    /// * `EmailAlreadyExists` - Email is already registered
    async fn register(&self, command: RegisterUserCommand) -> Result<User, UserError>;

    /// Verify email/password and issue a session token.
    ///
    /// # Errors
    /// * `MissingCredentials` - Email or password empty
    /// * `InvalidEmail` - Email malformed
    /// * `InvalidCredentials` - Unknown email or wrong password (indistinguishable)
    /// * `AccountLocked` - Account exists but is locked
    async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(User, SessionToken), UserError>;

    /// Lookup by id; `None` when absent.
    async fn get_by_id(&self, id: &UserId) -> Result<Option<User>, UserError>;

    /// Lookup by email (case-insensitive); `None` when absent or malformed.
    async fn get_by_email(&self, email: &str) -> Result<Option<User>, UserError>;

    /// Resolve an identifier that may be an internal id or an email.
    async fn resolve_identifier(&self, identifier: &str) -> Result<ResolvedUser, UserError>;

    /// Toggle MFA for a user.
    ///
    /// # Errors
    /// * `NotFound` - Unknown user id
    async fn set_mfa_enabled(&self, id: &UserId, enabled: bool) -> Result<User, UserError>;

    /// Lock or unlock an account.
    ///
    /// # Errors
    /// * `NotFound` - Unknown user id
    async fn set_account_status(
        &self,
        id: &UserId,
        status: AccountStatus,
    ) -> Result<User, UserError>;

    /// Find the local account for a federated identity, creating and linking one if needed.
    async fn link_federated_account(
        &self,
        command: FederatedAccountCommand,
    ) -> Result<User, UserError>;
}

/// Persistence operations for user records and federated links.
///
/// Every method is atomic with respect to the keys it touches.
#[async_trait]
pub trait UserRepository: Send + Sync + 'static {
    /// Persist a new record.
    ///
    /// # Errors
    /// * `EmailAlreadyExists` - Email is already registered
    async fn create(&self, record: UserRecord) -> Result<UserRecord, UserError>;

    async fn find_by_id(&self, id: &UserId) -> Result<Option<UserRecord>, UserError>;

    async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<UserRecord>, UserError>;

    /// Apply a change to a stored user.
    ///
    /// # Returns
    /// Updated user, or `None` if the id is unknown
    async fn apply(&self, id: &UserId, change: UserChange) -> Result<Option<User>, UserError>;

    /// Record a provider subject → user link. Re-linking the same subject overwrites.
    async fn create_link(&self, link: FederatedLink) -> Result<(), UserError>;

    async fn find_link(&self, subject: &str) -> Result<Option<FederatedLink>, UserError>;
}
