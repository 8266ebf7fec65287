use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::clock::Clock;
use crate::config::OtpConfig;
use crate::domain::otp::errors::OtpError;
use crate::domain::otp::models::AttemptOutcome;
use crate::domain::otp::models::OtpChallenge;
use crate::domain::otp::models::OtpCode;
use crate::domain::otp::models::OtpDispatch;
use crate::domain::otp::ports::MessageDelivery;
use crate::domain::otp::ports::OtpServicePort;
use crate::domain::otp::ports::OtpStore;
use crate::domain::otp::sweeper::ExpirySweep;
use crate::domain::user::models::UserId;
use crate::user::ports::CredentialStorePort;

/// Challenge lifetime, attempt budget and dispatch bound.
#[derive(Debug, Clone, Copy)]
pub struct OtpSettings {
    pub ttl: chrono::Duration,
    pub max_attempts: u32,
    pub dispatch_timeout: Duration,
}

impl From<&OtpConfig> for OtpSettings {
    fn from(config: &OtpConfig) -> Self {
        Self {
            ttl: chrono::Duration::seconds(config.ttl_seconds),
            max_attempts: config.max_attempts,
            dispatch_timeout: Duration::from_millis(config.dispatch_timeout_ms),
        }
    }
}

/// OTP challenge service: issues, dispatches and verifies one-time passcodes.
pub struct OtpService<S>
where
    S: OtpStore,
{
    users: Arc<dyn CredentialStorePort>,
    store: Arc<S>,
    delivery: Arc<dyn MessageDelivery>,
    clock: Arc<dyn Clock>,
    settings: OtpSettings,
}

impl<S> OtpService<S>
where
    S: OtpStore,
{
    pub fn new(
        users: Arc<dyn CredentialStorePort>,
        store: Arc<S>,
        delivery: Arc<dyn MessageDelivery>,
        clock: Arc<dyn Clock>,
        settings: OtpSettings,
    ) -> Self {
        Self {
            users,
            store,
            delivery,
            clock,
            settings,
        }
    }

    async fn roll_back(&self, challenge: &OtpChallenge) {
        if let Err(e) = self
            .store
            .remove_if_current(&challenge.user_id, &challenge.id)
            .await
        {
            tracing::error!(
                user_id = %challenge.user_id,
                error = %e,
                "Failed to roll back undelivered OTP challenge"
            );
        }
    }
}

#[async_trait]
impl<S> OtpServicePort for OtpService<S>
where
    S: OtpStore,
{
    async fn generate_and_send(&self, identifier: &str) -> Result<OtpDispatch, OtpError> {
        let user = self
            .users
            .resolve_identifier(identifier)
            .await?
            .into_user()
            .ok_or(OtpError::UserNotFound)?;

        let phone = user.phone.as_ref().ok_or(OtpError::NoPhoneNumber)?;

        let code = OtpCode::generate();
        let challenge = OtpChallenge::issue(
            user.id,
            code.clone(),
            phone.masked(),
            self.clock.now(),
            self.settings.ttl,
            self.settings.max_attempts,
        );
        let dispatch = OtpDispatch {
            expires_at: challenge.expires_at,
            masked_destination: challenge.masked_destination.clone(),
        };

        self.store.replace(challenge.clone()).await?;

        let sent = tokio::time::timeout(
            self.settings.dispatch_timeout,
            self.delivery.send_otp(phone, &code, dispatch.expires_at),
        )
        .await;

        match sent {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(user_id = %user.id, error = %e, "OTP delivery failed");
                self.roll_back(&challenge).await;
                return Err(e.into());
            }
            Err(_) => {
                tracing::warn!(user_id = %user.id, "OTP delivery timed out");
                self.roll_back(&challenge).await;
                return Err(OtpError::DeliveryTimeout);
            }
        }

        tracing::info!(
            user_id = %user.id,
            destination = %dispatch.masked_destination,
            "OTP challenge issued"
        );

        Ok(dispatch)
    }

    async fn verify(&self, user_id: &UserId, code: &OtpCode) -> Result<(), OtpError> {
        let outcome = self
            .store
            .record_attempt(user_id, code, self.clock.now())
            .await?
            .ok_or(OtpError::OtpNotFound)?;

        match outcome {
            AttemptOutcome::Verified => {
                tracing::info!(user_id = %user_id, "OTP verified");
                Ok(())
            }
            AttemptOutcome::Mismatch { attempts_remaining } => {
                tracing::warn!(user_id = %user_id, attempts_remaining, "OTP mismatch");
                Err(OtpError::InvalidOtp { attempts_remaining })
            }
            AttemptOutcome::Expired => Err(OtpError::OtpExpired),
            AttemptOutcome::Exhausted => {
                tracing::warn!(user_id = %user_id, "OTP attempts exhausted");
                Err(OtpError::MaxAttemptsExceeded)
            }
        }
    }
}

#[async_trait]
impl<S> ExpirySweep for OtpService<S>
where
    S: OtpStore,
{
    fn name(&self) -> &'static str {
        "otp_challenges"
    }

    async fn sweep_expired(&self) -> usize {
        match self.store.purge_expired(self.clock.now()).await {
            Ok(removed) => removed,
            Err(e) => {
                tracing::error!(error = %e, "Failed to purge expired OTP challenges");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::DateTime;
    use chrono::Utc;
    use mockall::mock;

    use super::*;
    use crate::clock::ManualClock;
    use crate::domain::otp::errors::DeliveryError;
    use crate::domain::session::models::SessionToken;
    use crate::domain::user::models::AccountStatus;
    use crate::domain::user::models::DisplayName;
    use crate::domain::user::models::EmailAddress;
    use crate::domain::user::models::FederatedAccountCommand;
    use crate::domain::user::models::PhoneNumber;
    use crate::domain::user::models::RegisterUserCommand;
    use crate::domain::user::models::ResolvedUser;
    use crate::domain::user::models::User;
    use crate::outbound::repositories::otp::InMemoryOtpStore;
    use crate::user::errors::UserError;

    mock! {
        pub TestCredentialStore {}

        #[async_trait]
        impl CredentialStorePort for TestCredentialStore {
            async fn register(&self, command: RegisterUserCommand) -> Result<User, UserError>;
            async fn authenticate(&self, email: &str, password: &str) -> Result<(User, SessionToken), UserError>;
            async fn get_by_id(&self, id: &UserId) -> Result<Option<User>, UserError>;
            async fn get_by_email(&self, email: &str) -> Result<Option<User>, UserError>;
            async fn resolve_identifier(&self, identifier: &str) -> Result<ResolvedUser, UserError>;
            async fn set_mfa_enabled(&self, id: &UserId, enabled: bool) -> Result<User, UserError>;
            async fn set_account_status(&self, id: &UserId, status: AccountStatus) -> Result<User, UserError>;
            async fn link_federated_account(&self, command: FederatedAccountCommand) -> Result<User, UserError>;
        }
    }

    mock! {
        pub TestMessageDelivery {}

        #[async_trait]
        impl MessageDelivery for TestMessageDelivery {
            async fn send_otp(&self, to: &PhoneNumber, code: &OtpCode, expires_at: DateTime<Utc>) -> Result<(), DeliveryError>;
        }
    }

    fn ana(phone: Option<&str>) -> User {
        User {
            id: UserId::new(),
            name: DisplayName::new("Ana".to_string()).unwrap(),
            email: EmailAddress::new("ana@x.com".to_string()).unwrap(),
            phone: phone.map(|p| PhoneNumber::new(p.to_string()).unwrap()),
            status: AccountStatus::Active,
            mfa_enabled: false,
            created_at: Utc::now(),
        }
    }

    fn users_resolving(user: Option<User>) -> MockTestCredentialStore {
        let mut users = MockTestCredentialStore::new();
        users.expect_resolve_identifier().returning(move |_| {
            Ok(user
                .clone()
                .map(ResolvedUser::ByEmail)
                .unwrap_or(ResolvedUser::NotFound))
        });
        users
    }

    /// Delivery that succeeds and remembers every code it was asked to send.
    fn capturing_delivery(sent: Arc<Mutex<Vec<String>>>) -> MockTestMessageDelivery {
        let mut delivery = MockTestMessageDelivery::new();
        delivery.expect_send_otp().returning(move |_, code, _| {
            sent.lock().unwrap().push(code.as_str().to_string());
            Ok(())
        });
        delivery
    }

    fn settings() -> OtpSettings {
        OtpSettings {
            ttl: chrono::Duration::minutes(5),
            max_attempts: 3,
            dispatch_timeout: Duration::from_millis(200),
        }
    }

    fn service(
        users: MockTestCredentialStore,
        delivery: MockTestMessageDelivery,
        clock: Arc<ManualClock>,
    ) -> OtpService<InMemoryOtpStore> {
        OtpService::new(
            Arc::new(users),
            Arc::new(InMemoryOtpStore::new()),
            Arc::new(delivery),
            clock,
            settings(),
        )
    }

    fn wrong_code(actual: &str) -> OtpCode {
        let wrong = if actual == "000000" { "111111" } else { "000000" };
        OtpCode::parse(wrong).unwrap()
    }

    #[tokio::test]
    async fn test_generate_returns_masked_destination_only() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let clock = Arc::new(ManualClock::default());
        let service = service(
            users_resolving(Some(ana(Some("+15551234567")))),
            capturing_delivery(Arc::clone(&sent)),
            Arc::clone(&clock),
        );

        let dispatch = service.generate_and_send("ana@x.com").await.unwrap();

        assert_eq!(dispatch.masked_destination, "+1****4567");
        assert_eq!(dispatch.expires_at, clock.now() + chrono::Duration::minutes(5));
        assert_eq!(sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_generate_unknown_user() {
        let service = service(
            users_resolving(None),
            MockTestMessageDelivery::new(),
            Arc::new(ManualClock::default()),
        );

        assert!(matches!(
            service.generate_and_send("nobody@x.com").await,
            Err(OtpError::UserNotFound)
        ));
    }

    #[tokio::test]
    async fn test_generate_without_phone() {
        let mut delivery = MockTestMessageDelivery::new();
        delivery.expect_send_otp().times(0);
        let service = service(
            users_resolving(Some(ana(None))),
            delivery,
            Arc::new(ManualClock::default()),
        );

        assert!(matches!(
            service.generate_and_send("ana@x.com").await,
            Err(OtpError::NoPhoneNumber)
        ));
    }

    #[tokio::test]
    async fn test_wrong_code_reports_attempts_remaining() {
        let user = ana(Some("+15551234567"));
        let user_id = user.id;
        let sent = Arc::new(Mutex::new(Vec::new()));
        let service = service(
            users_resolving(Some(user)),
            capturing_delivery(Arc::clone(&sent)),
            Arc::new(ManualClock::default()),
        );

        service.generate_and_send("ana@x.com").await.unwrap();
        let code = sent.lock().unwrap()[0].clone();

        let result = service.verify(&user_id, &wrong_code(&code)).await;

        assert!(matches!(
            result,
            Err(OtpError::InvalidOtp {
                attempts_remaining: 2
            })
        ));
    }

    #[tokio::test]
    async fn test_regeneration_invalidates_previous_code() {
        let user = ana(Some("+15551234567"));
        let user_id = user.id;
        let sent = Arc::new(Mutex::new(Vec::new()));
        let service = service(
            users_resolving(Some(user)),
            capturing_delivery(Arc::clone(&sent)),
            Arc::new(ManualClock::default()),
        );

        service.generate_and_send("ana@x.com").await.unwrap();
        let first = OtpCode::parse(&sent.lock().unwrap()[0]).unwrap();
        service.generate_and_send("ana@x.com").await.unwrap();
        let second = OtpCode::parse(&sent.lock().unwrap()[1]).unwrap();

        if !first.matches(&second) {
            assert!(matches!(
                service.verify(&user_id, &first).await,
                Err(OtpError::InvalidOtp { .. })
            ));
        }
        service.verify(&user_id, &second).await.unwrap();

        // Consumed: neither code works any more
        assert!(matches!(
            service.verify(&user_id, &first).await,
            Err(OtpError::OtpNotFound)
        ));
    }

    #[tokio::test]
    async fn test_exhaustion_then_challenge_is_gone() {
        let user = ana(Some("+15551234567"));
        let user_id = user.id;
        let sent = Arc::new(Mutex::new(Vec::new()));
        let service = service(
            users_resolving(Some(user)),
            capturing_delivery(Arc::clone(&sent)),
            Arc::new(ManualClock::default()),
        );

        service.generate_and_send("ana@x.com").await.unwrap();
        let code = OtpCode::parse(&sent.lock().unwrap()[0]).unwrap();
        let wrong = wrong_code(code.as_str());

        for _ in 0..3 {
            assert!(matches!(
                service.verify(&user_id, &wrong).await,
                Err(OtpError::InvalidOtp { .. })
            ));
        }

        assert!(matches!(
            service.verify(&user_id, &code).await,
            Err(OtpError::MaxAttemptsExceeded)
        ));
        assert!(matches!(
            service.verify(&user_id, &code).await,
            Err(OtpError::OtpNotFound)
        ));
    }

    #[tokio::test]
    async fn test_correct_code_after_ttl_is_expired_and_removed() {
        let user = ana(Some("+15551234567"));
        let user_id = user.id;
        let sent = Arc::new(Mutex::new(Vec::new()));
        let clock = Arc::new(ManualClock::default());
        let service = service(
            users_resolving(Some(user)),
            capturing_delivery(Arc::clone(&sent)),
            Arc::clone(&clock),
        );

        service.generate_and_send("ana@x.com").await.unwrap();
        let code = OtpCode::parse(&sent.lock().unwrap()[0]).unwrap();

        clock.advance(chrono::Duration::minutes(5) + chrono::Duration::seconds(1));

        assert!(matches!(
            service.verify(&user_id, &code).await,
            Err(OtpError::OtpExpired)
        ));
        assert!(matches!(
            service.verify(&user_id, &code).await,
            Err(OtpError::OtpNotFound)
        ));
    }

    #[tokio::test]
    async fn test_failed_delivery_rolls_back_challenge() {
        let user = ana(Some("+15551234567"));
        let user_id = user.id;
        let mut delivery = MockTestMessageDelivery::new();
        delivery
            .expect_send_otp()
            .returning(|_, _, _| Err(DeliveryError::Rejected(503)));
        let service = service(
            users_resolving(Some(user)),
            delivery,
            Arc::new(ManualClock::default()),
        );

        let result = service.generate_and_send("ana@x.com").await;

        assert!(matches!(result, Err(OtpError::Delivery(_))));
        assert!(matches!(
            service.verify(&user_id, &OtpCode::parse("123456").unwrap()).await,
            Err(OtpError::OtpNotFound)
        ));
    }

    struct StalledDelivery;

    #[async_trait]
    impl MessageDelivery for StalledDelivery {
        async fn send_otp(
            &self,
            _to: &PhoneNumber,
            _code: &OtpCode,
            _expires_at: DateTime<Utc>,
        ) -> Result<(), DeliveryError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_delivery_timeout_rolls_back_challenge() {
        let user = ana(Some("+15551234567"));
        let user_id = user.id;
        let service = OtpService::new(
            Arc::new(users_resolving(Some(user))),
            Arc::new(InMemoryOtpStore::new()),
            Arc::new(StalledDelivery),
            Arc::new(ManualClock::default()),
            settings(),
        );

        let result = service.generate_and_send("ana@x.com").await;

        assert!(matches!(result, Err(OtpError::DeliveryTimeout)));
        assert!(matches!(
            service.verify(&user_id, &OtpCode::parse("123456").unwrap()).await,
            Err(OtpError::OtpNotFound)
        ));
    }

    #[tokio::test]
    async fn test_sweep_removes_expired_challenges() {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let clock = Arc::new(ManualClock::default());
        let service = service(
            users_resolving(Some(ana(Some("+15551234567")))),
            capturing_delivery(sent),
            Arc::clone(&clock),
        );

        service.generate_and_send("ana@x.com").await.unwrap();
        assert_eq!(service.sweep_expired().await, 0);

        clock.advance(chrono::Duration::minutes(6));
        assert_eq!(service.sweep_expired().await, 1);
    }
}
