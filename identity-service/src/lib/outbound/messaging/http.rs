use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use reqwest::Client;
use serde::Serialize;
use url::Url;

use crate::domain::otp::errors::DeliveryError;
use crate::domain::otp::models::OtpCode;
use crate::domain::otp::ports::MessageDelivery;
use crate::domain::user::models::PhoneNumber;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[derive(Serialize)]
struct SmsRequest<'a> {
    to: &'a str,
    body: String,
}

/// Sends codes through an HTTP SMS gateway: `POST {endpoint}` with `{to, body}`.
pub struct HttpMessageDelivery {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl HttpMessageDelivery {
    /// # Errors
    /// * `Transport` - Endpoint is not a valid URL or the client cannot be built
    pub fn new(endpoint: &str, api_key: Option<String>) -> Result<Self, DeliveryError> {
        let endpoint =
            Url::parse(endpoint).map_err(|e| DeliveryError::Transport(e.to_string()))?;
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }
}

#[async_trait]
impl MessageDelivery for HttpMessageDelivery {
    async fn send_otp(
        &self,
        to: &PhoneNumber,
        code: &OtpCode,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DeliveryError> {
        let minutes = (expires_at - Utc::now()).num_minutes().max(1);
        let payload = SmsRequest {
            to: to.as_str(),
            body: format!(
                "Your verification code is {}. It expires in {} minutes.",
                code.as_str(),
                minutes
            ),
        };

        let mut request = self.client.post(self.endpoint.clone()).json(&payload);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(status = status.as_u16(), "SMS gateway rejected message");
            return Err(DeliveryError::Rejected(status.as_u16()));
        }

        Ok(())
    }
}
