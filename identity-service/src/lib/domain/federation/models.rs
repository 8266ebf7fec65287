use std::fmt;

use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::config::AccessPolicyConfig;
use crate::domain::session::models::SessionToken;
use crate::domain::user::models::User;

/// Portal role derived from provider group membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Role {
    Patient,
    Guardian,
    Proxy,
    EmergencyContact,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "Patient",
            Role::Guardian => "Guardian",
            Role::Proxy => "Proxy",
            Role::EmergencyContact => "EmergencyContact",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Directory group the signed-in identity belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub id: String,
    pub display_name: String,
}

/// Profile returned by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedProfile {
    /// Subject (object) id at the provider
    pub subject: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub phone: Option<String>,
}

/// Tokens obtained from the provider's token endpoint over the back channel.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderTokens {
    pub access_token: String,
    pub id_token: Option<String>,
    pub token_type: String,
    pub expires_in: u64,
}

impl fmt::Debug for ProviderTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderTokens")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .finish_non_exhaustive()
    }
}

/// Signals about how the provider authenticated the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignInContext {
    pub mfa_completed: bool,
    pub device_compliant: bool,
    pub legacy_authentication: bool,
}

impl SignInContext {
    const LEGACY_MARKERS: [&'static str; 6] = ["basic", "legacy", "pop3", "imap", "smtp", "ntlm"];

    /// Read the context from ID token claims.
    ///
    /// `amr` containing `mfa` means a second factor was used. A legacy marker
    /// in `amr` or `auth_method` means a legacy protocol. `device_compliant`
    /// or `xms_dc` set to true means an attested compliant device.
    pub fn from_id_token_claims(claims: &Value) -> Self {
        let amr: Vec<String> = claims
            .get("amr")
            .and_then(Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_ascii_lowercase)
                    .collect()
            })
            .unwrap_or_default();

        let auth_method = claims
            .get("auth_method")
            .and_then(Value::as_str)
            .map(str::to_ascii_lowercase);

        let is_legacy = |value: &str| Self::LEGACY_MARKERS.iter().any(|m| value.contains(m));

        let device_compliant = ["device_compliant", "xms_dc"].iter().any(|key| {
            match claims.get(*key) {
                Some(Value::Bool(flag)) => *flag,
                Some(Value::String(flag)) => flag.eq_ignore_ascii_case("true"),
                _ => false,
            }
        });

        Self {
            mfa_completed: amr.iter().any(|m| m == "mfa"),
            device_compliant,
            legacy_authentication: amr.iter().any(|m| is_legacy(m))
                || auth_method.as_deref().is_some_and(is_legacy),
        }
    }
}

/// Tenant conditional-access requirements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccessPolicy {
    pub require_mfa: bool,
    pub require_compliant_device: bool,
    pub block_legacy_authentication: bool,
    pub require_step_up: bool,
}

impl From<&AccessPolicyConfig> for AccessPolicy {
    fn from(config: &AccessPolicyConfig) -> Self {
        Self {
            require_mfa: config.require_mfa,
            require_compliant_device: config.require_compliant_device,
            block_legacy_authentication: config.block_legacy_authentication,
            require_step_up: config.require_step_up,
        }
    }
}

/// A single unmet conditional-access requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PolicyViolation {
    MfaRequired,
    CompliantDeviceRequired,
    LegacyAuthenticationBlocked,
}

impl PolicyViolation {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyViolation::MfaRequired => "MfaRequired",
            PolicyViolation::CompliantDeviceRequired => "CompliantDeviceRequired",
            PolicyViolation::LegacyAuthenticationBlocked => "LegacyAuthenticationBlocked",
        }
    }
}

impl fmt::Display for PolicyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            PolicyViolation::MfaRequired => "multi-factor authentication required",
            PolicyViolation::CompliantDeviceRequired => "compliant device required",
            PolicyViolation::LegacyAuthenticationBlocked => "legacy authentication is blocked",
        };
        f.write_str(message)
    }
}

/// Outcome of conditional-access evaluation. Computed, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessDecision {
    pub compliant: bool,
    pub violations: Vec<PolicyViolation>,
}

/// Opaque key for the caller's browser session during a federation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey(String);

impl SessionKey {
    pub fn generate() -> Self {
        Self(random_token(32))
    }

    const MAX_PRESENTED_LENGTH: usize = 128;

    /// Wrap a caller-presented key. Only non-empty alphanumeric values of bounded
    /// length are accepted.
    pub fn from_presented(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty()
            || value.len() > Self::MAX_PRESENTED_LENGTH
            || !value.bytes().all(|b| b.is_ascii_alphanumeric())
        {
            None
        } else {
            Some(Self(value.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Single-use CSRF state recorded for one in-flight federation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfState {
    pub value: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl CsrfState {
    pub fn mint(now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            value: random_token(43),
            created_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Length-checked comparison that does not stop at the first difference.
    pub fn matches(&self, presented: &str) -> bool {
        let a = self.value.as_bytes();
        let b = presented.as_bytes();
        a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
    }
}

/// Where to send the browser, plus the state it must bring back.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: Url,
    pub state: String,
}

/// Result of a successful federation callback.
#[derive(Debug, Clone)]
pub struct FederatedSignIn {
    pub user: User,
    pub session: SessionToken,
    pub role: Role,
    pub provider_tokens: ProviderTokens,
}

fn random_token(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}
