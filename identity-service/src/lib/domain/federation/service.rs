use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use auth::JwtHandler;
use serde_json::Value;
use url::Url;

use crate::clock::Clock;
use crate::config::FederationConfig;
use crate::domain::federation::errors::FederationError;
use crate::domain::federation::models::AccessPolicy;
use crate::domain::federation::models::AuthorizationRequest;
use crate::domain::federation::models::CsrfState;
use crate::domain::federation::models::FederatedProfile;
use crate::domain::federation::models::FederatedSignIn;
use crate::domain::federation::models::ProviderTokens;
use crate::domain::federation::models::SessionKey;
use crate::domain::federation::models::SignInContext;
use crate::domain::federation::policy::derive_role;
use crate::domain::federation::policy::evaluate_conditional_access;
use crate::domain::federation::ports::FederationPort;
use crate::domain::federation::ports::IdentityProvider;
use crate::domain::federation::ports::StateStore;
use crate::domain::otp::sweeper::ExpirySweep;
use crate::domain::session::models::SessionExtras;
use crate::domain::session::service::SessionTokenService;
use crate::domain::user::models::DisplayName;
use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::FederatedAccountCommand;
use crate::domain::user::models::PhoneNumber;
use crate::user::errors::UserError;
use crate::user::ports::CredentialStorePort;

/// Policy, state lifetime and provider call bound for the broker.
#[derive(Debug, Clone, Copy)]
pub struct FederationSettings {
    pub policy: AccessPolicy,
    pub state_ttl: chrono::Duration,
    pub request_timeout: Duration,
}

impl From<&FederationConfig> for FederationSettings {
    fn from(config: &FederationConfig) -> Self {
        Self {
            policy: AccessPolicy::from(&config.policy),
            state_ttl: chrono::Duration::seconds(config.state_ttl_seconds),
            request_timeout: Duration::from_millis(config.request_timeout_ms),
        }
    }
}

/// Federated identity broker.
///
/// Drives the authorization-code flow, evaluates conditional access, and
/// only after a compliant decision links a local account and issues a session.
pub struct FederationBroker<S>
where
    S: StateStore,
{
    provider: Arc<dyn IdentityProvider>,
    states: Arc<S>,
    users: Arc<dyn CredentialStorePort>,
    sessions: Arc<SessionTokenService>,
    clock: Arc<dyn Clock>,
    settings: FederationSettings,
}

impl<S> FederationBroker<S>
where
    S: StateStore,
{
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        states: Arc<S>,
        users: Arc<dyn CredentialStorePort>,
        sessions: Arc<SessionTokenService>,
        clock: Arc<dyn Clock>,
        settings: FederationSettings,
    ) -> Self {
        Self {
            provider,
            states,
            users,
            sessions,
            clock,
            settings,
        }
    }

    /// Bound a provider call; a timeout aborts the attempt.
    async fn bounded<T, F>(&self, call: F) -> Result<T, FederationError>
    where
        F: Future<Output = Result<T, FederationError>>,
    {
        tokio::time::timeout(self.settings.request_timeout, call)
            .await
            .map_err(|_| FederationError::Upstream("request timed out".to_string()))?
    }

    async fn consume_state(
        &self,
        session: Option<&SessionKey>,
        presented: &str,
    ) -> Result<(), FederationError> {
        let stored = match session {
            Some(session) => self.states.take(session).await?,
            None => None,
        };

        let now = self.clock.now();
        match stored {
            Some(state) if !state.is_expired(now) && state.matches(presented) => Ok(()),
            _ => {
                tracing::warn!(has_session = session.is_some(), "Federation state rejected");
                Err(FederationError::InvalidState)
            }
        }
    }

    fn sign_in_context(tokens: &ProviderTokens) -> SignInContext {
        let Some(id_token) = tokens.id_token.as_deref() else {
            return SignInContext::default();
        };

        match JwtHandler::decode_unverified::<Value>(id_token) {
            Ok(claims) => SignInContext::from_id_token_claims(&claims),
            Err(e) => {
                tracing::debug!(error = %e, "Unreadable provider ID token");
                SignInContext::default()
            }
        }
    }

    fn account_command(profile: FederatedProfile) -> Result<FederatedAccountCommand, FederationError> {
        let email = profile
            .email
            .ok_or(FederationError::IncompleteProfile("email"))?;
        let email = EmailAddress::new(email).map_err(UserError::from)?;

        let name = profile
            .display_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| email.as_str().split('@').next().unwrap_or_default().to_string());
        let name = DisplayName::new(name).map_err(UserError::from)?;

        let phone = profile.phone.and_then(|raw| {
            let compact: String = raw
                .chars()
                .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.'))
                .collect();
            PhoneNumber::new(compact).ok()
        });

        Ok(FederatedAccountCommand {
            subject: profile.subject,
            email,
            name,
            phone,
        })
    }
}

#[async_trait]
impl<S> FederationPort for FederationBroker<S>
where
    S: StateStore,
{
    async fn build_authorization_url(
        &self,
        session: &SessionKey,
    ) -> Result<AuthorizationRequest, FederationError> {
        let state = CsrfState::mint(self.clock.now(), self.settings.state_ttl);
        let url = self
            .provider
            .authorization_url(&state.value, self.settings.policy.require_step_up)?;
        let value = state.value.clone();

        self.states.put(session.clone(), state).await?;
        tracing::debug!("Federation attempt initiated");

        Ok(AuthorizationRequest { url, state: value })
    }

    async fn handle_callback(
        &self,
        code: Option<&str>,
        state: Option<&str>,
        session: Option<&SessionKey>,
    ) -> Result<FederatedSignIn, FederationError> {
        let (Some(code), Some(state)) = (present(code), present(state)) else {
            return Err(FederationError::MissingParameters);
        };

        self.consume_state(session, state).await?;

        let tokens = self.bounded(self.provider.exchange_code(code)).await?;
        let (profile, groups) = tokio::try_join!(
            self.bounded(self.provider.fetch_profile(&tokens.access_token)),
            self.bounded(self.provider.fetch_groups(&tokens.access_token)),
        )?;

        let context = Self::sign_in_context(&tokens);
        let decision = evaluate_conditional_access(&self.settings.policy, &context);
        if !decision.compliant {
            tracing::warn!(
                subject = %profile.subject,
                violations = ?decision.violations,
                "Federated sign-in rejected by conditional access"
            );
            return Err(FederationError::ConditionalAccessViolation(
                decision.violations,
            ));
        }

        let role = derive_role(&groups);
        let command = Self::account_command(profile)?;
        let subject = command.subject.clone();

        let user = self.users.link_federated_account(command).await?;

        let session = self
            .sessions
            .issue(&user, SessionExtras::federated(subject, role.as_str()))?;

        tracing::info!(user_id = %user.id, role = %role, "Federated sign-in completed");

        Ok(FederatedSignIn {
            user,
            session,
            role,
            provider_tokens: tokens,
        })
    }

    fn build_logout_url(&self, post_logout_redirect: &str) -> Result<Url, FederationError> {
        self.provider.logout_url(post_logout_redirect)
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[async_trait]
impl<S> ExpirySweep for FederationBroker<S>
where
    S: StateStore,
{
    fn name(&self) -> &'static str {
        "federation_states"
    }

    async fn sweep_expired(&self) -> usize {
        match self.states.purge_expired(self.clock.now()).await {
            Ok(removed) => removed,
            Err(e) => {
                tracing::error!(error = %e, "Failed to purge expired federation states");
                0
            }
        }
    }
}
