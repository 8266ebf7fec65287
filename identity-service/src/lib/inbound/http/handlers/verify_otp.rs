use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use super::ApiError;
use super::ApiSuccess;
use super::JsonBody;
use crate::domain::otp::errors::OtpError;
use crate::domain::otp::models::OtpCode;
use crate::domain::user::models::UserId;
use crate::inbound::http::router::AppState;
use crate::user::errors::UserIdError;

pub async fn verify_otp(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<VerifyOtpRequestBody>,
) -> Result<ApiSuccess<VerifyOtpResponseData>, ApiError> {
    let (user_id, code) = body.try_into_parts()?;

    state
        .otp_service
        .verify(&user_id, &code)
        .await
        .map_err(ApiError::from)?;

    tracing::info!(user_id = %user_id, "OTP verified");

    Ok(ApiSuccess::new(
        StatusCode::OK,
        VerifyOtpResponseData { verified: true },
    ))
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpRequestBody {
    user_id: String,
    otp: String,
}

#[derive(Debug, Clone, Error)]
enum ParseVerifyOtpRequestError {
    #[error("Invalid user id: {0}")]
    UserId(#[from] UserIdError),

    #[error("{0}")]
    Code(#[from] OtpError),
}

impl VerifyOtpRequestBody {
    fn try_into_parts(self) -> Result<(UserId, OtpCode), ParseVerifyOtpRequestError> {
        let user_id = UserId::from_string(self.user_id.trim())?;
        let code = OtpCode::parse(self.otp.trim())?;
        Ok((user_id, code))
    }
}

impl From<ParseVerifyOtpRequestError> for ApiError {
    fn from(err: ParseVerifyOtpRequestError) -> Self {
        ApiError::validation(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyOtpResponseData {
    pub verified: bool,
}
