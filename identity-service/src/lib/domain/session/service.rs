use std::sync::Arc;

use auth::Authenticator;
use auth::JwtError;

use crate::domain::session::errors::SessionError;
use crate::domain::session::models::SessionClaims;
use crate::domain::session::models::SessionExtras;
use crate::domain::session::models::SessionToken;
use crate::domain::user::models::User;

/// Issues and verifies signed, time-limited session tokens.
///
/// Stateless: there is no revocation list, so logout is advisory and a
/// token stays valid until its expiry.
pub struct SessionTokenService {
    authenticator: Arc<Authenticator>,
}

impl SessionTokenService {
    pub fn new(authenticator: Arc<Authenticator>) -> Self {
        Self { authenticator }
    }

    /// Issue a token for `user`, embedding id, email, name and the extras.
    ///
    /// # Errors
    /// * `IssueFailed` - Signing failed
    pub fn issue(&self, user: &User, extras: SessionExtras) -> Result<SessionToken, SessionError> {
        let mut claims =
            self.authenticator
                .claims_for(user.id, user.email.as_str(), user.name.as_str());

        if let Some(federated_id) = extras.federated_id {
            claims = claims.with_federated_id(federated_id);
        }
        if let Some(role) = extras.role {
            claims = claims.with_role(role);
        }
        if let Some(method) = extras.auth_method {
            claims = claims.with_auth_method(method.as_str());
        }

        self.authenticator
            .generate_token(&claims)
            .map(SessionToken::from)
            .map_err(|e| SessionError::IssueFailed(e.to_string()))
    }

    /// Verify a token and return its claims.
    ///
    /// # Errors
    /// * `InvalidToken` - Bad signature, malformed or expired; causes are not distinguished
    pub fn verify(&self, token: &str) -> Result<SessionClaims, SessionError> {
        self.authenticator.validate_token(token).map_err(|e| {
            if let JwtError::InvalidToken { reason } = &e {
                tracing::debug!(reason = %reason, "Session token rejected");
            }
            SessionError::InvalidToken
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use chrono::Utc;

    use super::*;
    use crate::domain::user::models::AccountStatus;
    use crate::domain::user::models::DisplayName;
    use crate::domain::user::models::EmailAddress;
    use crate::domain::user::models::UserId;

    const SECRET: &[u8] = b"test-secret-key-for-jwt-signing-at-least-32-bytes";

    fn user() -> User {
        User {
            id: UserId::new(),
            name: DisplayName::new("Ana".to_string()).unwrap(),
            email: EmailAddress::new("ana@x.com".to_string()).unwrap(),
            phone: None,
            status: AccountStatus::Active,
            mfa_enabled: false,
            created_at: Utc::now(),
        }
    }

    fn service(ttl: Duration) -> SessionTokenService {
        SessionTokenService::new(Arc::new(Authenticator::new(SECRET, ttl)))
    }

    #[test]
    fn test_issue_and_verify_round_trip() {
        let service = service(Duration::hours(24));
        let user = user();

        let token = service.issue(&user, SessionExtras::password()).unwrap();
        let claims = service.verify(&token.token).unwrap();

        assert_eq!(claims.sub, user.id.to_string());
        assert_eq!(claims.email, "ana@x.com");
        assert_eq!(claims.name, "Ana");
        assert_eq!(claims.auth_method.as_deref(), Some("password"));
        assert_eq!(claims.exp - claims.iat, 24 * 60 * 60);
    }

    #[test]
    fn test_federated_extras_are_embedded() {
        let service = service(Duration::hours(1));

        let token = service
            .issue(&user(), SessionExtras::federated("oid-123", "Guardian"))
            .unwrap();
        let claims = service.verify(&token.token).unwrap();

        assert_eq!(claims.federated_id.as_deref(), Some("oid-123"));
        assert_eq!(claims.role.as_deref(), Some("Guardian"));
        assert_eq!(claims.auth_method.as_deref(), Some("federated"));
    }

    #[test]
    fn test_flipped_byte_is_rejected() {
        let service = service(Duration::hours(1));
        let token = service.issue(&user(), SessionExtras::default()).unwrap();

        let mut bytes = token.token.into_bytes();
        let last = bytes.len() - 2;
        bytes[last] = if bytes[last] == b'x' { b'y' } else { b'x' };
        let tampered = String::from_utf8(bytes).unwrap();

        assert!(matches!(
            service.verify(&tampered),
            Err(SessionError::InvalidToken)
        ));
    }

    #[test]
    fn test_expired_and_malformed_share_one_error() {
        let expired_service = service(Duration::seconds(-120));
        let expired = expired_service
            .issue(&user(), SessionExtras::default())
            .unwrap();

        let expired_err = expired_service.verify(&expired.token).unwrap_err();
        let malformed_err = expired_service.verify("not-a-token").unwrap_err();

        assert_eq!(expired_err.to_string(), malformed_err.to_string());
    }

    #[test]
    fn test_token_from_other_secret_is_rejected() {
        let other = SessionTokenService::new(Arc::new(Authenticator::new(
            b"another-secret-key-for-jwt-signing-32-bytes!",
            Duration::hours(1),
        )));
        let token = other.issue(&user(), SessionExtras::default()).unwrap();

        assert!(service(Duration::hours(1)).verify(&token.token).is_err());
    }
}
