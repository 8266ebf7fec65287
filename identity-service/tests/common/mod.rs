#![allow(dead_code)]

use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::net::SocketAddr;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use auth::Authenticator;
use auth::JwtHandler;
use auth::PasswordPolicy;
use chrono::DateTime;
use chrono::Utc;
use identity_service::clock::ManualClock;
use identity_service::config::AccessPolicyConfig;
use identity_service::config::RateLimitConfig;
use identity_service::domain::federation::errors::FederationError;
use identity_service::domain::federation::models::AccessPolicy;
use identity_service::domain::federation::models::FederatedProfile;
use identity_service::domain::federation::models::Group;
use identity_service::domain::federation::models::ProviderTokens;
use identity_service::domain::federation::ports::IdentityProvider;
use identity_service::domain::federation::service::FederationBroker;
use identity_service::domain::federation::service::FederationSettings;
use identity_service::domain::otp::errors::DeliveryError;
use identity_service::domain::otp::models::OtpCode;
use identity_service::domain::otp::ports::MessageDelivery;
use identity_service::domain::otp::service::OtpService;
use identity_service::domain::otp::service::OtpSettings;
use identity_service::domain::session::service::SessionTokenService;
use identity_service::domain::user::models::PhoneNumber;
use identity_service::domain::user::ports::CredentialStorePort;
use identity_service::domain::user::service::CredentialService;
use identity_service::inbound::http::rate_limit::FixedWindowRateLimiter;
use identity_service::inbound::http::router::create_router;
use identity_service::inbound::http::router::AppState;
use identity_service::inbound::http::router::HttpSettings;
use identity_service::outbound::repositories::InMemoryOtpStore;
use identity_service::outbound::repositories::InMemoryStateStore;
use identity_service::outbound::repositories::InMemoryUserRepository;
use serde_json::json;
use url::Url;

pub const JWT_SECRET: &[u8] = b"test-secret-key-for-jwt-signing-at-least-32-bytes";
const PROVIDER_SIGNING_KEY: &[u8] = b"stub-provider-signing-key-for-id-tokens";

/// Code the stub provider refuses to exchange.
pub const REJECTED_CODE: &str = "rejected-code";

/// Test application that spawns a real server
pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub api_client: reqwest::Client,
    pub jwt_handler: JwtHandler,
    pub clock: Arc<ManualClock>,
    pub messages: Arc<CapturingDelivery>,
    pub provider: Arc<StubIdentityProvider>,
    pub credential_store: Arc<dyn CredentialStorePort>,
}

impl TestApp {
    /// Spawn with the rate limiter on but the loopback address exempted.
    pub async fn spawn() -> Self {
        Self::spawn_with(RateLimitConfig {
            enabled: true,
            window_seconds: 900,
            max_requests: 5,
            exempt_addresses: vec![IpAddr::V4(Ipv4Addr::LOCALHOST)],
        })
        .await
    }

    /// Spawn with the rate limiter applying to the test client.
    pub async fn spawn_rate_limited(max_requests: u32) -> Self {
        Self::spawn_with(RateLimitConfig {
            enabled: true,
            window_seconds: 900,
            max_requests,
            exempt_addresses: vec![],
        })
        .await
    }

    async fn spawn_with(rate_limit: RateLimitConfig) -> Self {
        // Use random port (0 = OS assigns)
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind random port");
        let port = listener.local_addr().unwrap().port();
        let address = format!("http://127.0.0.1:{}", port);

        let clock = Arc::new(ManualClock::default());
        let messages = Arc::new(CapturingDelivery::default());
        let provider = Arc::new(StubIdentityProvider::default());

        let authenticator = Arc::new(Authenticator::new(
            JWT_SECRET,
            chrono::Duration::hours(24),
        ));
        let session_tokens = Arc::new(SessionTokenService::new(Arc::clone(&authenticator)));

        let credential_store = Arc::new(CredentialService::new(
            Arc::new(InMemoryUserRepository::new()),
            authenticator,
            Arc::clone(&session_tokens),
            PasswordPolicy::Strong,
        ));

        let otp_service = Arc::new(OtpService::new(
            credential_store.clone(),
            Arc::new(InMemoryOtpStore::new()),
            messages.clone(),
            clock.clone(),
            OtpSettings {
                ttl: chrono::Duration::minutes(5),
                max_attempts: 3,
                dispatch_timeout: std::time::Duration::from_secs(2),
            },
        ));

        let federation = Arc::new(FederationBroker::new(
            provider.clone(),
            Arc::new(InMemoryStateStore::new()),
            credential_store.clone(),
            Arc::clone(&session_tokens),
            clock.clone(),
            FederationSettings {
                policy: AccessPolicy::from(&AccessPolicyConfig {
                    require_mfa: true,
                    require_compliant_device: false,
                    block_legacy_authentication: true,
                    require_step_up: false,
                }),
                state_ttl: chrono::Duration::minutes(10),
                request_timeout: std::time::Duration::from_secs(2),
            },
        ));

        let rate_limiter = Arc::new(FixedWindowRateLimiter::new(&rate_limit, clock.clone()));

        let state = AppState {
            credential_store: credential_store.clone(),
            session_tokens,
            otp_service,
            federation,
            rate_limiter,
            settings: HttpSettings {
                post_logout_redirect_uri: "http://localhost:3000/".to_string(),
                federation_cookie_max_age_seconds: 600,
                secure_cookies: false,
            },
        };

        let router = create_router(state);

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .expect("Server error");
        });

        Self {
            address,
            port,
            // No cookie store: federation tests present the session cookie explicitly
            api_client: reqwest::Client::builder()
                .build()
                .expect("Failed to create reqwest client"),
            jwt_handler: JwtHandler::new(JWT_SECRET),
            clock,
            messages,
            provider,
            credential_store,
        }
    }

    /// Helper to make GET request
    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.api_client.get(&format!("{}{}", self.address, path))
    }

    /// Helper to make POST request
    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.api_client.post(&format!("{}{}", self.address, path))
    }

    /// Helper to make GET request with Bearer token
    pub fn get_authenticated(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.get(path).bearer_auth(token)
    }

    /// Helper to make POST request with Bearer token
    pub fn post_authenticated(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.post(path).bearer_auth(token)
    }

    /// Register a user and return the response body.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
        phone: Option<&str>,
    ) -> reqwest::Response {
        self.post("/register")
            .json(&json!({
                "name": name,
                "email": email,
                "password": password,
                "phone": phone,
            }))
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Log in and return the session token.
    pub async fn login(&self, email: &str, password: &str) -> String {
        let response = self
            .post("/login")
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status(), reqwest::StatusCode::OK);

        let body: serde_json::Value = response.json().await.expect("Failed to parse response");
        body["data"]["token"]
            .as_str()
            .expect("Missing token")
            .to_string()
    }
}

/// Message channel that records every dispatched code.
#[derive(Default)]
pub struct CapturingDelivery {
    sent: Mutex<Vec<(String, String)>>,
}

impl CapturingDelivery {
    /// Most recent code sent to `phone`.
    pub fn last_code_for(&self, phone: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(to, _)| to == phone)
            .map(|(_, code)| code.clone())
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl MessageDelivery for CapturingDelivery {
    async fn send_otp(
        &self,
        to: &PhoneNumber,
        code: &OtpCode,
        _expires_at: DateTime<Utc>,
    ) -> Result<(), DeliveryError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.as_str().to_string(), code.as_str().to_string()));
        Ok(())
    }
}

/// What the stub provider asserts about the signed-in person.
#[derive(Debug, Clone)]
pub struct StubIdentity {
    pub subject: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub phone: Option<String>,
    pub groups: Vec<String>,
    pub amr: Vec<String>,
}

impl Default for StubIdentity {
    fn default() -> Self {
        Self {
            subject: "aad-subject-1".to_string(),
            email: Some("maria@clinic.example".to_string()),
            display_name: Some("Maria Lopez".to_string()),
            phone: Some("+15559876543".to_string()),
            groups: vec!["Portal Users".to_string()],
            amr: vec!["pwd".to_string(), "mfa".to_string()],
        }
    }
}

/// In-process identity provider standing in for the real OAuth2 endpoints.
#[derive(Default)]
pub struct StubIdentityProvider {
    identity: Mutex<StubIdentity>,
    exchanges: AtomicUsize,
}

impl StubIdentityProvider {
    pub fn set_identity(&self, identity: StubIdentity) {
        *self.identity.lock().unwrap() = identity;
    }

    /// Number of code exchanges that reached the provider.
    pub fn exchanges(&self) -> usize {
        self.exchanges.load(Ordering::SeqCst)
    }

    fn identity(&self) -> StubIdentity {
        self.identity.lock().unwrap().clone()
    }
}

#[async_trait]
impl IdentityProvider for StubIdentityProvider {
    fn authorization_url(&self, state: &str, _step_up: bool) -> Result<Url, FederationError> {
        Url::parse_with_params(
            "https://login.example.test/tenant/oauth2/v2.0/authorize",
            &[("client_id", "client-1"), ("response_type", "code"), ("state", state)],
        )
        .map_err(|e| FederationError::Configuration(e.to_string()))
    }

    async fn exchange_code(&self, code: &str) -> Result<ProviderTokens, FederationError> {
        self.exchanges.fetch_add(1, Ordering::SeqCst);
        if code == REJECTED_CODE {
            return Err(FederationError::Upstream(
                "token endpoint returned 400".to_string(),
            ));
        }

        let identity = self.identity();
        let id_token = JwtHandler::new(PROVIDER_SIGNING_KEY)
            .encode(&json!({ "sub": identity.subject, "amr": identity.amr }))
            .map_err(|e| FederationError::Upstream(e.to_string()))?;

        Ok(ProviderTokens {
            access_token: format!("access-{}", code),
            id_token: Some(id_token),
            token_type: "Bearer".to_string(),
            expires_in: 3600,
        })
    }

    async fn fetch_profile(&self, _access_token: &str) -> Result<FederatedProfile, FederationError> {
        let identity = self.identity();
        Ok(FederatedProfile {
            subject: identity.subject,
            email: identity.email,
            display_name: identity.display_name,
            phone: identity.phone,
        })
    }

    async fn fetch_groups(&self, _access_token: &str) -> Result<Vec<Group>, FederationError> {
        Ok(self
            .identity()
            .groups
            .into_iter()
            .enumerate()
            .map(|(i, display_name)| Group {
                id: format!("group-{}", i),
                display_name,
            })
            .collect())
    }

    fn logout_url(&self, post_logout_redirect: &str) -> Result<Url, FederationError> {
        Url::parse_with_params(
            "https://login.example.test/tenant/oauth2/v2.0/logout",
            &[("post_logout_redirect_uri", post_logout_redirect)],
        )
        .map_err(|e| FederationError::Configuration(e.to_string()))
    }
}
