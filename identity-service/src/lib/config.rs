use std::env;
use std::net::IpAddr;

use auth::PasswordPolicy;
use config::Config as ConfigBuilder;
use config::ConfigError;
use config::Environment;
use config::File;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub password: PasswordConfig,
    #[serde(default)]
    pub otp: OtpConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    pub federation: FederationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub http_port: u16,
    #[serde(default = "default_shutdown_grace_seconds")]
    pub shutdown_grace_seconds: u64,
    /// Mark cookies `Secure`; enable whenever served over HTTPS
    #[serde(default)]
    pub secure_cookies: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    pub secret: String,
    #[serde(default = "default_expiration_hours")]
    pub expiration_hours: i64,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PasswordConfig {
    /// Policy applied on registration
    #[serde(default)]
    pub policy: PasswordPolicy,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OtpConfig {
    pub ttl_seconds: i64,
    pub max_attempts: u32,
    pub sweep_interval_seconds: u64,
    pub dispatch_timeout_ms: u64,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: 300,
            max_attempts: 3,
            sweep_interval_seconds: 60,
            dispatch_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryKind {
    #[default]
    Console,
    Http,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DeliveryConfig {
    #[serde(default)]
    pub kind: DeliveryKind,
    /// SMS gateway endpoint, required when `kind = "http"`
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub window_seconds: u64,
    pub max_requests: u32,
    /// Addresses never throttled (internal callers, test harnesses)
    #[serde(default)]
    pub exempt_addresses: Vec<IpAddr>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_seconds: 15 * 60,
            max_requests: 5,
            exempt_addresses: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FederationConfig {
    /// Authority base URL, e.g. https://login.microsoftonline.com
    pub authority: String,
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    /// Where the provider sends the browser after sign-out when the caller gives no target
    pub post_logout_redirect_uri: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    #[serde(default = "default_graph_base_url")]
    pub graph_base_url: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_state_ttl_seconds")]
    pub state_ttl_seconds: i64,
    #[serde(default)]
    pub policy: AccessPolicyConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AccessPolicyConfig {
    #[serde(default)]
    pub require_mfa: bool,
    #[serde(default)]
    pub require_compliant_device: bool,
    #[serde(default)]
    pub block_legacy_authentication: bool,
    #[serde(default)]
    pub require_step_up: bool,
}

fn default_shutdown_grace_seconds() -> u64 {
    10
}

fn default_expiration_hours() -> i64 {
    24
}

fn default_scopes() -> Vec<String> {
    ["openid", "profile", "email", "User.Read", "GroupMember.Read.All"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_graph_base_url() -> String {
    "https://graph.microsoft.com/v1.0".to_string()
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_state_ttl_seconds() -> i64 {
    600
}

impl Config {
    /// Load configuration from files with environment variable overrides
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (JWT__SECRET, RATE_LIMIT__MAX_REQUESTS, etc.)
    /// 2. Environment-specific config file (config/{environment}.toml)
    /// 3. Default config file (config/default.toml)
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let configuration = ConfigBuilder::builder()
            // Start with default configuration
            .add_source(File::with_name("config/default").required(false))
            // Layer on environment-specific configuration
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Layer on environment variables (with __ as separator)
            // Example: JWT__SECRET=... overrides jwt.secret
            .add_source(Environment::with_prefix("").separator("__"))
            .build()?;

        let config: Config = configuration.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt.secret.len() < 32 {
            return Err(ConfigError::Message(
                "jwt.secret must be at least 32 bytes".to_string(),
            ));
        }
        if self.delivery.kind == DeliveryKind::Http && self.delivery.endpoint.is_none() {
            return Err(ConfigError::Message(
                "delivery.endpoint is required when delivery.kind = \"http\"".to_string(),
            ));
        }
        if self.otp.max_attempts == 0 {
            return Err(ConfigError::Message(
                "otp.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
