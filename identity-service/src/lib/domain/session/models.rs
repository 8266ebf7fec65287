use chrono::DateTime;
use chrono::Utc;

/// Claims carried by a verified session token.
pub type SessionClaims = auth::Claims;

/// Signed bearer credential handed to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl From<auth::IssuedToken> for SessionToken {
    fn from(issued: auth::IssuedToken) -> Self {
        Self {
            token: issued.access_token,
            expires_at: issued.expires_at,
        }
    }
}

/// How a session was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    Password,
    Federated,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::Password => "password",
            AuthMethod::Federated => "federated",
        }
    }
}

/// Caller-supplied claims added on top of the identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionExtras {
    pub federated_id: Option<String>,
    pub role: Option<String>,
    pub auth_method: Option<AuthMethod>,
}

impl SessionExtras {
    pub fn password() -> Self {
        Self {
            auth_method: Some(AuthMethod::Password),
            ..Self::default()
        }
    }

    pub fn federated(federated_id: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            federated_id: Some(federated_id.into()),
            role: Some(role.into()),
            auth_method: Some(AuthMethod::Federated),
        }
    }
}
