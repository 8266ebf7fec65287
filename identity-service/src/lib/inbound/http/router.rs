use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use axum::http::Response;
use axum::middleware;
use axum::routing::get;
use axum::routing::post;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::Span;

use super::handlers::azure_callback::azure_callback;
use super::handlers::azure_login::azure_login;
use super::handlers::azure_logout::azure_logout;
use super::handlers::generate_otp::generate_otp;
use super::handlers::get_profile::get_profile;
use super::handlers::health::health;
use super::handlers::login::login;
use super::handlers::logout::logout;
use super::handlers::register::register;
use super::handlers::toggle_mfa::toggle_mfa;
use super::handlers::verify_otp::verify_otp;
use super::middleware::authenticate as auth_middleware;
use super::rate_limit::rate_limit as rate_limit_middleware;
use super::rate_limit::FixedWindowRateLimiter;
use crate::domain::federation::ports::FederationPort;
use crate::domain::otp::ports::OtpServicePort;
use crate::domain::session::service::SessionTokenService;
use crate::user::ports::CredentialStorePort;

/// Settings that only the HTTP layer needs.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Default target after provider sign-out
    pub post_logout_redirect_uri: String,
    /// Lifetime of the federation session cookie; matches the CSRF state TTL
    pub federation_cookie_max_age_seconds: i64,
    /// Add `Secure` to cookies (set when served over HTTPS)
    pub secure_cookies: bool,
}

#[derive(Clone)]
pub struct AppState {
    pub credential_store: Arc<dyn CredentialStorePort>,
    pub session_tokens: Arc<SessionTokenService>,
    pub otp_service: Arc<dyn OtpServicePort>,
    pub federation: Arc<dyn FederationPort>,
    pub rate_limiter: Arc<FixedWindowRateLimiter>,
    pub settings: HttpSettings,
}

pub fn create_router(state: AppState) -> Router {
    let throttled_routes = Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
        .route("/azure/login", get(azure_login))
        .route("/azure/callback", get(azure_callback))
        .route("/mfa/generate-otp", post(generate_otp))
        .route("/mfa/verify-otp", post(verify_otp))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ));

    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/logout", post(logout))
        .route("/azure/logout", post(azure_logout));

    let protected_routes = Router::new()
        .route("/profile", get(get_profile))
        .route("/mfa/toggle", post(toggle_mfa))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Headers are left out of the span: they carry bearer tokens and cookies
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<Body>| {
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                path = %request.uri().path(),
                version = ?request.version(),
            )
        })
        .on_request(|request: &Request<Body>, _span: &Span| {
            tracing::info!(
                method = %request.method(),
                path = %request.uri().path(),
                "Request started"
            );
        })
        .on_response(
            |response: &Response<Body>, latency: Duration, _span: &Span| {
                tracing::info!(
                    status = response.status().as_u16(),
                    latency_ms = latency.as_millis(),
                    "Request completed"
                );
            },
        );

    Router::new()
        .merge(throttled_routes)
        .merge(public_routes)
        .merge(protected_routes)
        .layer(trace_layer)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::http::header;
    use axum::http::StatusCode;
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::clock::Clock;
    use crate::clock::SystemClock;
    use crate::config::AccessPolicyConfig;
    use crate::config::FederationConfig;
    use crate::config::RateLimitConfig;
    use crate::domain::federation::service::FederationBroker;
    use crate::domain::federation::service::FederationSettings;
    use crate::domain::otp::service::OtpService;
    use crate::domain::otp::service::OtpSettings;
    use crate::domain::user::service::CredentialService;
    use crate::outbound::identity_provider::AzureIdentityProvider;
    use crate::outbound::messaging::ConsoleMessageDelivery;
    use crate::outbound::repositories::InMemoryOtpStore;
    use crate::outbound::repositories::InMemoryStateStore;
    use crate::outbound::repositories::InMemoryUserRepository;

    fn app(max_requests: u32) -> Router {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let authenticator = Arc::new(auth::Authenticator::new(
            b"router-test-secret-at-least-32-bytes-long",
            chrono::Duration::hours(1),
        ));
        let session_tokens = Arc::new(SessionTokenService::new(Arc::clone(&authenticator)));
        let credential_store = Arc::new(CredentialService::new(
            Arc::new(InMemoryUserRepository::new()),
            authenticator,
            Arc::clone(&session_tokens),
            auth::PasswordPolicy::Strong,
        ));
        let federation_config = FederationConfig {
            authority: "https://login.microsoftonline.com".to_string(),
            tenant_id: "tenant-1".to_string(),
            client_id: "client-1".to_string(),
            client_secret: "shh".to_string(),
            redirect_uri: "http://localhost:3000/azure/callback".to_string(),
            post_logout_redirect_uri: "http://localhost:3000/".to_string(),
            scopes: vec!["openid".to_string()],
            graph_base_url: "https://graph.microsoft.com/v1.0".to_string(),
            request_timeout_ms: 1_000,
            state_ttl_seconds: 600,
            policy: AccessPolicyConfig::default(),
        };

        let otp_service = Arc::new(OtpService::new(
            credential_store.clone(),
            Arc::new(InMemoryOtpStore::new()),
            Arc::new(ConsoleMessageDelivery::new()),
            Arc::clone(&clock),
            OtpSettings::from(&crate::config::OtpConfig::default()),
        ));
        let federation = Arc::new(FederationBroker::new(
            Arc::new(AzureIdentityProvider::new(&federation_config).unwrap()),
            Arc::new(InMemoryStateStore::new()),
            credential_store.clone(),
            Arc::clone(&session_tokens),
            Arc::clone(&clock),
            FederationSettings::from(&federation_config),
        ));
        let rate_limiter = Arc::new(FixedWindowRateLimiter::new(
            &RateLimitConfig {
                enabled: true,
                window_seconds: 900,
                max_requests,
                exempt_addresses: vec![],
            },
            clock,
        ));

        create_router(AppState {
            credential_store,
            session_tokens,
            otp_service,
            federation,
            rate_limiter,
            settings: HttpSettings {
                post_logout_redirect_uri: "http://localhost:3000/".to_string(),
                federation_cookie_max_age_seconds: 600,
                secure_cookies: true,
            },
        })
    }

    async fn json_body(response: Response<Body>) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_protected_route_without_bearer_is_no_token() {
        let response = app(5).oneshot(get("/profile")).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["data"]["code"], "NoToken");
    }

    #[tokio::test]
    async fn test_protected_route_with_garbage_bearer_is_invalid_token() {
        let request = Request::builder()
            .uri("/profile")
            .header(header::AUTHORIZATION, "Bearer not.a.token")
            .body(Body::empty())
            .unwrap();

        let response = app(5).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["data"]["code"], "InvalidToken");
    }

    #[tokio::test]
    async fn test_requests_without_peer_address_share_one_bucket() {
        let router = app(1);
        let body = r#"{"email":"ana@x.com","password":"Wrong1234"}"#;

        let first = router
            .clone()
            .oneshot(post_json("/login", body))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::UNAUTHORIZED);

        let second = router.oneshot(post_json("/login", body)).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_azure_login_sets_session_cookie() {
        let response = app(5).oneshot(get("/azure/login")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response.headers()[header::SET_COOKIE]
            .to_str()
            .unwrap()
            .to_string();
        assert!(cookie.starts_with("fed_sid="));
        assert!(cookie.contains("Path=/azure"));
        assert!(cookie.ends_with("; Secure"));

        let body = json_body(response).await;
        let auth_url = body["data"]["authUrl"].as_str().unwrap();
        assert!(auth_url.starts_with(
            "https://login.microsoftonline.com/tenant-1/oauth2/v2.0/authorize?"
        ));
        assert!(auth_url.contains("state="));
    }

    #[tokio::test]
    async fn test_health_is_not_throttled() {
        let router = app(1);

        for _ in 0..3 {
            let response = router.clone().oneshot(get("/health")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }
}
