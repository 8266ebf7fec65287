use axum::http::StatusCode;
use serde::Serialize;

use super::ApiSuccess;

/// Session tokens are stateless; the client discards its copy.
pub async fn logout() -> ApiSuccess<LogoutResponseData> {
    ApiSuccess::new(
        StatusCode::OK,
        LogoutResponseData {
            message: "Logged out. Discard the session token on the client.".to_string(),
        },
    )
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogoutResponseData {
    pub message: String,
}
