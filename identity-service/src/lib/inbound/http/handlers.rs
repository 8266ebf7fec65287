use axum::extract::rejection::JsonRejection;
use axum::extract::FromRequest;
use axum::http::header;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::Json;
use serde::Serialize;
use serde_json::json;
use serde_json::Value;

use crate::domain::federation::errors::FederationError;
use crate::domain::otp::errors::OtpError;
use crate::domain::session::errors::SessionError;
use crate::domain::user::models::User;
use crate::user::errors::UserError;

pub mod azure_callback;
pub mod azure_login;
pub mod azure_logout;
pub mod generate_otp;
pub mod get_profile;
pub mod health;
pub mod login;
pub mod logout;
pub mod register;
pub mod toggle_mfa;
pub mod verify_otp;

#[derive(Debug, Clone)]
pub struct ApiSuccess<T: Serialize + PartialEq>(StatusCode, Json<ApiResponseBody<T>>);

impl<T> PartialEq for ApiSuccess<T>
where
    T: Serialize + PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0 && self.1 .0 == other.1 .0
    }
}

impl<T: Serialize + PartialEq> ApiSuccess<T> {
    pub fn new(status: StatusCode, data: T) -> Self {
        ApiSuccess(status, Json(ApiResponseBody::new(status, data)))
    }
}

impl<T: Serialize + PartialEq> IntoResponse for ApiSuccess<T> {
    fn into_response(self) -> Response {
        (self.0, self.1).into_response()
    }
}

/// Stable machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCode {
    ValidationError,
    MissingCredentials,
    InvalidCredentials,
    AccountLocked,
    UserExists,
    NoToken,
    InvalidToken,
    UserNotFound,
    NoPhoneNumber,
    OtpNotFound,
    OtpExpired,
    MaxAttemptsExceeded,
    InvalidOtp,
    MissingParameters,
    InvalidState,
    ConditionalAccessViolation,
    TooManyRequests,
    UpstreamError,
    InternalError,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    BadRequest(ApiErrorData),
    Unauthorized(ApiErrorData),
    Forbidden(ApiErrorData),
    NotFound(ApiErrorData),
    Conflict(ApiErrorData),
    Locked(ApiErrorData),
    TooManyRequests { retry_after_seconds: u64 },
    /// Detail is logged, never returned.
    BadGateway(String),
    /// Detail is logged, never returned.
    InternalServerError(String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::BadRequest(ApiErrorData::new(ErrorCode::ValidationError, message))
    }
}

/// JSON request body whose rejections are answered in the API error envelope.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(status = %rejection.status(), "Request body rejected");
        ApiError::validation(rejection.body_text())
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        Self::InternalServerError(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, data) = match self {
            ApiError::BadRequest(data) => (StatusCode::BAD_REQUEST, data),
            ApiError::Unauthorized(data) => (StatusCode::UNAUTHORIZED, data),
            ApiError::Forbidden(data) => (StatusCode::FORBIDDEN, data),
            ApiError::NotFound(data) => (StatusCode::NOT_FOUND, data),
            ApiError::Conflict(data) => (StatusCode::CONFLICT, data),
            ApiError::Locked(data) => (StatusCode::LOCKED, data),
            ApiError::TooManyRequests {
                retry_after_seconds,
            } => {
                let data = ApiErrorData::new(
                    ErrorCode::TooManyRequests,
                    "Too many requests, try again later",
                );
                let mut response = (
                    StatusCode::TOO_MANY_REQUESTS,
                    Json(ApiResponseBody::new(StatusCode::TOO_MANY_REQUESTS, data)),
                )
                    .into_response();
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_seconds));
                return response;
            }
            ApiError::BadGateway(detail) => {
                tracing::error!(detail = %detail, "Upstream collaborator failed");
                (
                    StatusCode::BAD_GATEWAY,
                    ApiErrorData::new(
                        ErrorCode::UpstreamError,
                        "An upstream service failed, try again later",
                    ),
                )
            }
            ApiError::InternalServerError(detail) => {
                tracing::error!(detail = %detail, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorData::new(ErrorCode::InternalError, "Internal server error"),
                )
            }
        };

        (status, Json(ApiResponseBody::new(status, data))).into_response()
    }
}

impl From<UserError> for ApiError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::InvalidUserId(_)
            | UserError::InvalidName(_)
            | UserError::InvalidEmail(_)
            | UserError::InvalidPhone(_)
            | UserError::WeakPassword(_) => ApiError::validation(err.to_string()),
            UserError::MissingCredentials => ApiError::BadRequest(ApiErrorData::new(
                ErrorCode::MissingCredentials,
                err.to_string(),
            )),
            UserError::InvalidCredentials => ApiError::Unauthorized(ApiErrorData::new(
                ErrorCode::InvalidCredentials,
                err.to_string(),
            )),
            UserError::AccountLocked => ApiError::Locked(ApiErrorData::new(
                ErrorCode::AccountLocked,
                "Account is locked, contact support",
            )),
            UserError::EmailAlreadyExists(_) => ApiError::Conflict(ApiErrorData::new(
                ErrorCode::UserExists,
                "User with this email already exists",
            )),
            UserError::NotFound(_) => {
                ApiError::NotFound(ApiErrorData::new(ErrorCode::UserNotFound, "User not found"))
            }
            UserError::Credential(_) | UserError::StorageError(_) | UserError::Unknown(_) => {
                ApiError::InternalServerError(err.to_string())
            }
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::InvalidToken => ApiError::Unauthorized(ApiErrorData::new(
                ErrorCode::InvalidToken,
                err.to_string(),
            )),
            SessionError::IssueFailed(_) => ApiError::InternalServerError(err.to_string()),
        }
    }
}

impl From<OtpError> for ApiError {
    fn from(err: OtpError) -> Self {
        let bad_request = |code: ErrorCode, err: &OtpError| {
            ApiError::BadRequest(ApiErrorData::new(code, err.to_string()))
        };

        match err {
            OtpError::UserNotFound => {
                ApiError::NotFound(ApiErrorData::new(ErrorCode::UserNotFound, err.to_string()))
            }
            OtpError::NoPhoneNumber => bad_request(ErrorCode::NoPhoneNumber, &err),
            OtpError::OtpNotFound => bad_request(ErrorCode::OtpNotFound, &err),
            OtpError::OtpExpired => bad_request(ErrorCode::OtpExpired, &err),
            OtpError::MaxAttemptsExceeded => bad_request(ErrorCode::MaxAttemptsExceeded, &err),
            OtpError::InvalidOtp { attempts_remaining } => ApiError::BadRequest(
                ApiErrorData::new(ErrorCode::InvalidOtp, "Invalid OTP")
                    .with_details(json!({ "attemptsRemaining": attempts_remaining })),
            ),
            OtpError::InvalidCode => ApiError::validation(err.to_string()),
            OtpError::Delivery(_) | OtpError::DeliveryTimeout => {
                ApiError::BadGateway(err.to_string())
            }
            OtpError::UserStore(inner) => ApiError::from(inner),
            OtpError::Storage(_) => ApiError::InternalServerError(err.to_string()),
        }
    }
}

impl From<FederationError> for ApiError {
    fn from(err: FederationError) -> Self {
        match err {
            FederationError::MissingParameters => ApiError::BadRequest(ApiErrorData::new(
                ErrorCode::MissingParameters,
                err.to_string(),
            )),
            FederationError::InvalidState => ApiError::BadRequest(ApiErrorData::new(
                ErrorCode::InvalidState,
                "Invalid or expired state",
            )),
            FederationError::ConditionalAccessViolation(ref violations) => {
                let details: Vec<Value> = violations
                    .iter()
                    .map(|v| json!({ "code": v.as_str(), "message": v.to_string() }))
                    .collect();
                ApiError::Forbidden(
                    ApiErrorData::new(ErrorCode::ConditionalAccessViolation, err.to_string())
                        .with_details(json!({ "violations": details })),
                )
            }
            FederationError::Upstream(_) | FederationError::IncompleteProfile(_) => {
                ApiError::BadGateway(err.to_string())
            }
            FederationError::Account(inner) => ApiError::from(inner),
            FederationError::Session(inner) => ApiError::from(inner),
            FederationError::Configuration(_) | FederationError::StateStorage(_) => {
                ApiError::InternalServerError(err.to_string())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiResponseBody<T: Serialize + PartialEq> {
    status_code: u16,
    data: T,
}

impl<T: Serialize + PartialEq> ApiResponseBody<T> {
    pub fn new(status_code: StatusCode, data: T) -> Self {
        Self {
            status_code: status_code.as_u16(),
            data,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiErrorData {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ApiErrorData {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Public projection of a user. Never carries credential material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub status: String,
    pub mfa_enabled: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<&User> for UserData {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            name: user.name.as_str().to_string(),
            email: user.email.as_str().to_string(),
            phone: user.phone.as_ref().map(|p| p.as_str().to_string()),
            status: user.status.as_str().to_string(),
            mfa_enabled: user.mfa_enabled,
            created_at: user.created_at,
        }
    }
}
