use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use auth::Authenticator;
use identity_service::clock::Clock;
use identity_service::clock::SystemClock;
use identity_service::config::Config;
use identity_service::config::DeliveryKind;
use identity_service::domain::federation::service::FederationBroker;
use identity_service::domain::federation::service::FederationSettings;
use identity_service::domain::otp::ports::MessageDelivery;
use identity_service::domain::otp::service::OtpService;
use identity_service::domain::otp::service::OtpSettings;
use identity_service::domain::otp::sweeper::start_sweeper;
use identity_service::domain::otp::sweeper::ExpirySweep;
use identity_service::domain::session::service::SessionTokenService;
use identity_service::domain::user::service::CredentialService;
use identity_service::inbound::http::rate_limit::FixedWindowRateLimiter;
use identity_service::inbound::http::router::create_router;
use identity_service::inbound::http::router::AppState;
use identity_service::inbound::http::router::HttpSettings;
use identity_service::outbound::identity_provider::AzureIdentityProvider;
use identity_service::outbound::messaging::ConsoleMessageDelivery;
use identity_service::outbound::messaging::HttpMessageDelivery;
use identity_service::outbound::repositories::InMemoryOtpStore;
use identity_service::outbound::repositories::InMemoryStateStore;
use identity_service::outbound::repositories::InMemoryUserRepository;
use tokio::sync::Notify;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "identity_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        service = "identity-service",
        version = env!("CARGO_PKG_VERSION"),
        "Service starting"
    );

    let config = Config::load()?;

    tracing::info!(
        http_port = config.server.http_port,
        password_policy = ?config.password.policy,
        otp_ttl_seconds = config.otp.ttl_seconds,
        otp_max_attempts = config.otp.max_attempts,
        delivery = ?config.delivery.kind,
        rate_limit_enabled = config.rate_limit.enabled,
        rate_limit_max_requests = config.rate_limit.max_requests,
        rate_limit_window_seconds = config.rate_limit.window_seconds,
        federation_authority = %config.federation.authority,
        federation_tenant = %config.federation.tenant_id,
        "Configuration loaded"
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let authenticator = Arc::new(Authenticator::new(
        config.jwt.secret.as_bytes(),
        chrono::Duration::hours(config.jwt.expiration_hours),
    ));
    let session_tokens = Arc::new(SessionTokenService::new(Arc::clone(&authenticator)));

    let user_repository = Arc::new(InMemoryUserRepository::new());
    let credential_store = Arc::new(CredentialService::new(
        user_repository,
        Arc::clone(&authenticator),
        Arc::clone(&session_tokens),
        config.password.policy,
    ));

    let delivery: Arc<dyn MessageDelivery> = match config.delivery.kind {
        DeliveryKind::Console => Arc::new(ConsoleMessageDelivery::new()),
        DeliveryKind::Http => {
            let endpoint = config.delivery.endpoint.as_deref().ok_or_else(|| {
                anyhow::anyhow!("delivery.endpoint is required for http delivery")
            })?;
            Arc::new(HttpMessageDelivery::new(
                endpoint,
                config.delivery.api_key.clone(),
            )?)
        }
    };
    tracing::info!(kind = ?config.delivery.kind, "Message delivery configured");

    let otp_service = Arc::new(OtpService::new(
        credential_store.clone(),
        Arc::new(InMemoryOtpStore::new()),
        delivery,
        Arc::clone(&clock),
        OtpSettings::from(&config.otp),
    ));

    let identity_provider = Arc::new(AzureIdentityProvider::new(&config.federation)?);
    let federation = Arc::new(FederationBroker::new(
        identity_provider,
        Arc::new(InMemoryStateStore::new()),
        credential_store.clone(),
        Arc::clone(&session_tokens),
        Arc::clone(&clock),
        FederationSettings::from(&config.federation),
    ));

    let rate_limiter = Arc::new(FixedWindowRateLimiter::new(
        &config.rate_limit,
        Arc::clone(&clock),
    ));

    let sweep_targets: Vec<Arc<dyn ExpirySweep>> = vec![otp_service.clone(), federation.clone()];
    let sweeper = start_sweeper(
        Duration::from_secs(config.otp.sweep_interval_seconds),
        sweep_targets,
    );

    let state = AppState {
        credential_store,
        session_tokens,
        otp_service,
        federation,
        rate_limiter,
        settings: HttpSettings {
            post_logout_redirect_uri: config.federation.post_logout_redirect_uri.clone(),
            federation_cookie_max_age_seconds: config.federation.state_ttl_seconds,
            secure_cookies: config.server.secure_cookies,
        },
    };

    let http_address = format!("0.0.0.0:{}", config.server.http_port);
    let http_listener = tokio::net::TcpListener::bind(&http_address).await?;
    tracing::info!(
        address = %http_address,
        port = config.server.http_port,
        protocol = "http",
        "Http server listening"
    );

    let http_application =
        create_router(state).into_make_service_with_connect_info::<SocketAddr>();
    let stop = Arc::new(Notify::new());
    let stop_server = Arc::clone(&stop);
    let mut http_server = tokio::spawn(async move {
        axum::serve(http_listener, http_application)
            .with_graceful_shutdown(async move { stop_server.notified().await })
            .await
    });

    tokio::select! {
        result = &mut http_server => {
            match result {
                Ok(Ok(())) => tracing::info!("Http server exited"),
                Ok(Err(e)) => tracing::error!(error = %e, "Http server error"),
                Err(e) => tracing::error!(error = %e, "Http server task failed"),
            }
        }
        _ = shutdown_signal() => {
            tracing::info!(
                grace_seconds = config.server.shutdown_grace_seconds,
                "Shutdown requested, draining connections"
            );
            stop.notify_one();

            let grace = Duration::from_secs(config.server.shutdown_grace_seconds);
            match tokio::time::timeout(grace, &mut http_server).await {
                Ok(Ok(Ok(()))) => tracing::info!("Http server drained"),
                Ok(Ok(Err(e))) => tracing::error!(error = %e, "Http server error"),
                Ok(Err(e)) => tracing::error!(error = %e, "Http server task failed"),
                Err(_) => {
                    tracing::warn!("Grace period elapsed with open connections");
                    http_server.abort();
                }
            }
        }
    }

    sweeper.shutdown().await;
    tracing::info!("Service stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
