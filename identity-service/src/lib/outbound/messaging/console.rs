use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;

use crate::domain::otp::errors::DeliveryError;
use crate::domain::otp::models::OtpCode;
use crate::domain::otp::ports::MessageDelivery;
use crate::domain::user::models::PhoneNumber;

/// Delivery channel for local development: records the dispatch in the log
/// and sends nothing. The code is never written out.
#[derive(Debug, Default)]
pub struct ConsoleMessageDelivery;

impl ConsoleMessageDelivery {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MessageDelivery for ConsoleMessageDelivery {
    async fn send_otp(
        &self,
        to: &PhoneNumber,
        _code: &OtpCode,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DeliveryError> {
        tracing::info!(
            destination = %to.masked(),
            expires_at = %expires_at.to_rfc3339(),
            "OTP dispatched to console channel"
        );
        Ok(())
    }
}
