use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use auth::AuthenticationError;
use auth::Authenticator;
use auth::PasswordPolicy;
use chrono::Utc;

use crate::domain::session::models::SessionExtras;
use crate::domain::session::models::SessionToken;
use crate::domain::session::service::SessionTokenService;
use crate::domain::user::models::AccountStatus;
use crate::domain::user::models::Credential;
use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::FederatedAccountCommand;
use crate::domain::user::models::FederatedLink;
use crate::domain::user::models::RegisterUserCommand;
use crate::domain::user::models::ResolvedUser;
use crate::domain::user::models::User;
use crate::domain::user::models::UserChange;
use crate::domain::user::models::UserId;
use crate::domain::user::models::UserLookup;
use crate::domain::user::models::UserRecord;
use crate::user::errors::UserError;
use crate::user::ports::CredentialStorePort;
use crate::user::ports::UserRepository;

/// Upper bound on a single Argon2 hash or verification.
const CREDENTIAL_WORK_TIMEOUT: Duration = Duration::from_secs(10);

/// Credential store: user records, password hashing and account lifecycle.
pub struct CredentialService<UR>
where
    UR: UserRepository,
{
    repository: Arc<UR>,
    authenticator: Arc<Authenticator>,
    sessions: Arc<SessionTokenService>,
    password_policy: PasswordPolicy,
}

impl<UR> CredentialService<UR>
where
    UR: UserRepository,
{
    /// Create a new credential service with injected dependencies.
    ///
    /// # Arguments
    /// * `repository` - User persistence implementation
    /// * `authenticator` - Password hashing and verification
    /// * `sessions` - Session token issuance
    /// * `password_policy` - Policy enforced on registration
    pub fn new(
        repository: Arc<UR>,
        authenticator: Arc<Authenticator>,
        sessions: Arc<SessionTokenService>,
        password_policy: PasswordPolicy,
    ) -> Self {
        Self {
            repository,
            authenticator,
            sessions,
            password_policy,
        }
    }

    async fn hash_password(&self, password: String) -> Result<String, UserError> {
        let authenticator = Arc::clone(&self.authenticator);
        run_blocking(move || authenticator.hash_password(&password))
            .await?
            .map_err(|e| UserError::Credential(e.to_string()))
    }

    async fn verify_password(
        &self,
        password: String,
        stored_hash: Option<String>,
    ) -> Result<(), UserError> {
        let authenticator = Arc::clone(&self.authenticator);
        let outcome =
            run_blocking(move || authenticator.verify_password(&password, stored_hash.as_deref()))
                .await?;

        match outcome {
            Ok(()) => Ok(()),
            Err(AuthenticationError::InvalidCredentials) => Err(UserError::InvalidCredentials),
            Err(e) => Err(UserError::Credential(e.to_string())),
        }
    }

    /// Locked accounts are refused before any link is written.
    fn unless_locked(user: User) -> Result<User, UserError> {
        if user.status == AccountStatus::Locked {
            tracing::warn!(user_id = %user.id, "Federated sign-in to locked account");
            return Err(UserError::AccountLocked);
        }
        Ok(user)
    }

    async fn change(&self, id: &UserId, change: UserChange) -> Result<User, UserError> {
        self.repository
            .apply(id, change)
            .await?
            .ok_or(UserError::NotFound(id.to_string()))
    }

    async fn create_federated(&self, command: &FederatedAccountCommand) -> Result<User, UserError> {
        let record = UserRecord {
            user: User {
                id: UserId::new(),
                name: command.name.clone(),
                email: command.email.clone(),
                phone: command.phone.clone(),
                status: AccountStatus::Active,
                mfa_enabled: false,
                created_at: Utc::now(),
            },
            credential: Credential::FederatedOnly,
        };

        match self.repository.create(record).await {
            Ok(created) => {
                tracing::info!(
                    user_id = %created.user.id,
                    "Created local account for federated identity"
                );
                Ok(created.user)
            }
            // Lost a race with a concurrent first sign-in for the same email
            Err(UserError::EmailAlreadyExists(_)) => self
                .repository
                .find_by_email(&command.email)
                .await?
                .map(|record| record.user)
                .ok_or_else(|| UserError::NotFound(command.email.to_string())),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl<UR> CredentialStorePort for CredentialService<UR>
where
    UR: UserRepository,
{
    async fn register(&self, command: RegisterUserCommand) -> Result<User, UserError> {
        self.password_policy.check(&command.password)?;

        let password_hash = self.hash_password(command.password).await?;

        let record = UserRecord {
            user: User {
                id: UserId::new(),
                name: command.name,
                email: command.email,
                phone: command.phone,
                status: AccountStatus::Active,
                mfa_enabled: false,
                created_at: Utc::now(),
            },
            credential: Credential::Password(password_hash),
        };

        let created = self.repository.create(record).await?;
        tracing::info!(user_id = %created.user.id, "User registered");

        Ok(created.user)
    }

    async fn authenticate(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(User, SessionToken), UserError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(UserError::MissingCredentials);
        }

        let email = EmailAddress::new(email.to_string())?;
        let record = self.repository.find_by_email(&email).await?;

        let stored_hash = record
            .as_ref()
            .and_then(|r| r.credential.password_hash().map(str::to_string));

        // Always verified, locked accounts included
        let verified = self.verify_password(password.to_string(), stored_hash).await;

        if let Some(locked) = record
            .as_ref()
            .filter(|r| r.user.status == AccountStatus::Locked)
        {
            tracing::warn!(user_id = %locked.user.id, "Sign-in attempt on locked account");
            return Err(UserError::AccountLocked);
        }

        if let Err(e) = verified {
            if matches!(e, UserError::InvalidCredentials) {
                tracing::warn!("Sign-in rejected: invalid credentials");
            }
            return Err(e);
        }

        // A missing record never verifies, so this only guards the type.
        let user = record.map(|r| r.user).ok_or(UserError::InvalidCredentials)?;

        let token = self
            .sessions
            .issue(&user, SessionExtras::password())
            .map_err(|e| UserError::Credential(e.to_string()))?;

        tracing::info!(user_id = %user.id, "User signed in");
        Ok((user, token))
    }

    async fn get_by_id(&self, id: &UserId) -> Result<Option<User>, UserError> {
        Ok(self.repository.find_by_id(id).await?.map(|r| r.user))
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, UserError> {
        let Ok(email) = EmailAddress::new(email.to_string()) else {
            return Ok(None);
        };
        Ok(self.repository.find_by_email(&email).await?.map(|r| r.user))
    }

    async fn resolve_identifier(&self, identifier: &str) -> Result<ResolvedUser, UserError> {
        let resolved = match UserLookup::parse(identifier) {
            Some(UserLookup::ById(id)) => self
                .repository
                .find_by_id(&id)
                .await?
                .map(|r| ResolvedUser::ById(r.user)),
            Some(UserLookup::ByEmail(email)) => self
                .repository
                .find_by_email(&email)
                .await?
                .map(|r| ResolvedUser::ByEmail(r.user)),
            None => None,
        };

        Ok(resolved.unwrap_or(ResolvedUser::NotFound))
    }

    async fn set_mfa_enabled(&self, id: &UserId, enabled: bool) -> Result<User, UserError> {
        let user = self.change(id, UserChange::MfaEnabled(enabled)).await?;
        tracing::info!(user_id = %id, mfa_enabled = enabled, "MFA setting changed");
        Ok(user)
    }

    async fn set_account_status(
        &self,
        id: &UserId,
        status: AccountStatus,
    ) -> Result<User, UserError> {
        let user = self.change(id, UserChange::Status(status)).await?;
        tracing::info!(user_id = %id, status = status.as_str(), "Account status changed");
        Ok(user)
    }

    async fn link_federated_account(
        &self,
        command: FederatedAccountCommand,
    ) -> Result<User, UserError> {
        if let Some(link) = self.repository.find_link(&command.subject).await? {
            if let Some(record) = self.repository.find_by_id(&link.user_id).await? {
                return Self::unless_locked(record.user);
            }
        }

        let user = match self.repository.find_by_email(&command.email).await? {
            Some(record) => Self::unless_locked(record.user)?,
            None => self.create_federated(&command).await?,
        };

        self.repository
            .create_link(FederatedLink {
                subject: command.subject.clone(),
                user_id: user.id,
                linked_at: Utc::now(),
            })
            .await?;

        Ok(user)
    }
}

/// Run CPU-bound credential work off the async executor, bounded by a timeout.
async fn run_blocking<F, T>(work: F) -> Result<T, UserError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::time::timeout(CREDENTIAL_WORK_TIMEOUT, tokio::task::spawn_blocking(work))
        .await
        .map_err(|_| UserError::Credential("Credential work timed out".to_string()))?
        .map_err(|e| UserError::Credential(e.to_string()))
}
