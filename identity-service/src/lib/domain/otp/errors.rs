use thiserror::Error;

use crate::user::errors::UserError;

/// Failure reported by a message delivery channel.
#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    #[error("Delivery transport failed: {0}")]
    Transport(String),

    #[error("Delivery gateway rejected the message with status {0}")]
    Rejected(u16),
}

/// Top-level error for OTP challenge operations
#[derive(Debug, Clone, Error)]
pub enum OtpError {
    #[error("User not found")]
    UserNotFound,

    #[error("No phone number on file for this user")]
    NoPhoneNumber,

    #[error("No active OTP challenge")]
    OtpNotFound,

    #[error("OTP has expired")]
    OtpExpired,

    #[error("Maximum verification attempts exceeded")]
    MaxAttemptsExceeded,

    #[error("Invalid OTP, {attempts_remaining} attempts remaining")]
    InvalidOtp { attempts_remaining: u32 },

    #[error("OTP must be exactly 6 digits")]
    InvalidCode,

    #[error("OTP delivery failed: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("OTP delivery timed out")]
    DeliveryTimeout,

    #[error("Credential store error: {0}")]
    UserStore(#[from] UserError),

    #[error("Storage error: {0}")]
    Storage(String),
}
