//! Authentication utilities library
//!
//! Provides reusable authentication infrastructure for the identity service:
//! - Password hashing (Argon2id) and named strength policies
//! - Session token (JWT) issuance and strict validation
//! - Authentication coordination
//!
//! Nothing here knows about users, OTP challenges or identity providers;
//! the service adapts these primitives to its own domain types.
//!
//! # Examples
//!
//! ## Password Hashing
//! ```
//! use auth::PasswordHasher;
//!
//! let hasher = PasswordHasher::new();
//! let hash = hasher.hash("Secure123").unwrap();
//! let is_valid = hasher.verify("Secure123", &hash).unwrap();
//! assert!(is_valid);
//! ```
//!
//! ## Password Policies
//! ```
//! use auth::PasswordPolicy;
//!
//! assert!(PasswordPolicy::Basic.check("lowercase").is_ok());
//! assert!(PasswordPolicy::Strong.check("lowercase").is_err());
//! ```
//!
//! ## Complete Authentication Flow
//! ```
//! use auth::Authenticator;
//! use chrono::Duration;
//!
//! let auth = Authenticator::new(b"secret_key_at_least_32_bytes_long!", Duration::hours(24));
//!
//! // Register: hash password
//! let hash = auth.hash_password("Secure123").unwrap();
//!
//! // Login: verify, then issue a token
//! auth.verify_password("Secure123", Some(&hash)).unwrap();
//! let claims = auth.claims_for("user123", "ana@x.com", "Ana");
//! let issued = auth.generate_token(&claims).unwrap();
//!
//! // Validate token
//! let decoded = auth.validate_token(&issued.access_token).unwrap();
//! assert_eq!(decoded.sub, "user123");
//! ```

pub mod authenticator;
pub mod jwt;
pub mod password;

// Re-export commonly used items
pub use authenticator::AuthenticationError;
pub use authenticator::Authenticator;
pub use authenticator::IssuedToken;
pub use jwt::Claims;
pub use jwt::JwtError;
pub use jwt::JwtHandler;
pub use password::PasswordError;
pub use password::PasswordHasher;
pub use password::PasswordPolicy;
pub use password::PasswordPolicyError;
