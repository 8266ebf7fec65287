use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use url::Url;

use crate::domain::federation::errors::FederationError;
use crate::domain::federation::models::AuthorizationRequest;
use crate::domain::federation::models::CsrfState;
use crate::domain::federation::models::FederatedProfile;
use crate::domain::federation::models::FederatedSignIn;
use crate::domain::federation::models::Group;
use crate::domain::federation::models::ProviderTokens;
use crate::domain::federation::models::SessionKey;

/// Port for the federated identity broker.
#[async_trait]
pub trait FederationPort: Send + Sync + 'static {
    /// Mint a CSRF state for `session` and build the provider authorization URL.
    async fn build_authorization_url(
        &self,
        session: &SessionKey,
    ) -> Result<AuthorizationRequest, FederationError>;

    /// Complete the authorization-code flow started for `session`.
    ///
    /// # Errors
    /// * `MissingParameters` - Code or state absent
    /// * `InvalidState` - State unknown, mismatched, expired or replayed
    /// * `ConditionalAccessViolation` - Policy rejected the sign-in; no local state changed
    /// * `Upstream` - Provider failed or timed out
    async fn handle_callback(
        &self,
        code: Option<&str>,
        state: Option<&str>,
        session: Option<&SessionKey>,
    ) -> Result<FederatedSignIn, FederationError>;

    /// Provider sign-out URL. Pure construction.
    fn build_logout_url(&self, post_logout_redirect: &str) -> Result<Url, FederationError>;
}

/// External OAuth2/OpenID Connect identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync + 'static {
    /// Authorization endpoint URL carrying client id, scopes, redirect URI,
    /// `response_type=code` and `state`; requests step-up when asked.
    fn authorization_url(&self, state: &str, step_up: bool) -> Result<Url, FederationError>;

    /// Exchange an authorization code server-to-server.
    async fn exchange_code(&self, code: &str) -> Result<ProviderTokens, FederationError>;

    async fn fetch_profile(&self, access_token: &str) -> Result<FederatedProfile, FederationError>;

    async fn fetch_groups(&self, access_token: &str) -> Result<Vec<Group>, FederationError>;

    fn logout_url(&self, post_logout_redirect: &str) -> Result<Url, FederationError>;
}

/// CSRF states keyed by caller session.
#[async_trait]
pub trait StateStore: Send + Sync + 'static {
    /// Record `state` for `session`, replacing any earlier one.
    async fn put(&self, session: SessionKey, state: CsrfState) -> Result<(), FederationError>;

    /// Remove and return the state for `session` in one step.
    async fn take(&self, session: &SessionKey) -> Result<Option<CsrfState>, FederationError>;

    /// Drop every state expired at `now`.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, FederationError>;
}
