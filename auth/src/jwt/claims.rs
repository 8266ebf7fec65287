use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

/// Session token claims.
///
/// The identity fields are mandatory: a token that cannot name its subject,
/// email and display name is never issued. Federation adds the optional
/// federated id, role and auth method.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// Subject (local user identifier)
    pub sub: String,

    /// Normalized email address
    pub email: String,

    /// Display name
    pub name: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Subject id at the external identity provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub federated_id: Option<String>,

    /// Role derived during federation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// How the session was established ("password", "federated", ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_method: Option<String>,
}

impl Claims {
    /// Create claims for an authenticated identity.
    ///
    /// # Arguments
    /// * `user_id` - Unique user identifier
    /// * `email` - Normalized email address
    /// * `name` - Display name
    /// * `issued_at` - Issue instant
    /// * `ttl` - Lifetime of the token
    ///
    /// # Returns
    /// Claims with sub, email, name, iat and exp set
    pub fn for_identity(
        user_id: impl ToString,
        email: impl ToString,
        name: impl ToString,
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            sub: user_id.to_string(),
            email: email.to_string(),
            name: name.to_string(),
            iat: issued_at.timestamp(),
            exp: (issued_at + ttl).timestamp(),
            federated_id: None,
            role: None,
            auth_method: None,
        }
    }

    /// Set federated identity id.
    pub fn with_federated_id(mut self, federated_id: impl ToString) -> Self {
        self.federated_id = Some(federated_id.to_string());
        self
    }

    /// Set role.
    pub fn with_role(mut self, role: impl ToString) -> Self {
        self.role = Some(role.to_string());
        self
    }

    /// Set authentication method.
    pub fn with_auth_method(mut self, auth_method: impl ToString) -> Self {
        self.auth_method = Some(auth_method.to_string());
        self
    }

    /// Expiry as a timestamp.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}
