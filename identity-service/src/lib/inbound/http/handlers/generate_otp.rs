use axum::extract::State;
use axum::http::StatusCode;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use super::ApiError;
use super::ApiSuccess;
use super::JsonBody;
use crate::domain::otp::models::OtpDispatch;
use crate::inbound::http::router::AppState;

pub async fn generate_otp(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<GenerateOtpRequestBody>,
) -> Result<ApiSuccess<GenerateOtpResponseData>, ApiError> {
    let identifier = body.identifier.trim();
    if identifier.is_empty() {
        return Err(ApiError::validation("Identifier is required"));
    }

    state
        .otp_service
        .generate_and_send(identifier)
        .await
        .map_err(ApiError::from)
        .map(|dispatch| ApiSuccess::new(StatusCode::OK, dispatch.into()))
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GenerateOtpRequestBody {
    #[serde(default)]
    identifier: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateOtpResponseData {
    pub message: String,
    pub expires_at: DateTime<Utc>,
    pub masked_phone: String,
}

impl From<OtpDispatch> for GenerateOtpResponseData {
    fn from(dispatch: OtpDispatch) -> Self {
        Self {
            message: "Verification code sent".to_string(),
            expires_at: dispatch.expires_at,
            masked_phone: dispatch.masked_destination,
        }
    }
}
