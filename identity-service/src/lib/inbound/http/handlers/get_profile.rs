use axum::extract::State;
use axum::http::StatusCode;
use axum::Extension;
use serde::Serialize;

use super::ApiError;
use super::ApiErrorData;
use super::ApiSuccess;
use super::ErrorCode;
use super::UserData;
use crate::inbound::http::middleware::AuthenticatedUser;
use crate::inbound::http::router::AppState;

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(identity): Extension<AuthenticatedUser>,
) -> Result<ApiSuccess<ProfileResponseData>, ApiError> {
    let user = state
        .credential_store
        .get_by_id(&identity.user_id)
        .await
        .map_err(ApiError::from)?
        // A valid signature over a user that no longer matches is still a bad token
        .filter(|user| user.email.as_str() == identity.claims.email)
        .ok_or_else(|| {
            tracing::warn!(user_id = %identity.user_id, "Token subject no longer resolves");
            ApiError::Unauthorized(ApiErrorData::new(
                ErrorCode::InvalidToken,
                "Invalid or expired token",
            ))
        })?;

    Ok(ApiSuccess::new(
        StatusCode::OK,
        ProfileResponseData {
            user: (&user).into(),
        },
    ))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileResponseData {
    pub user: UserData,
}
