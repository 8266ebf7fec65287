use axum::extract::State;
use axum::http::StatusCode;
use axum::Extension;
use serde::Deserialize;
use serde::Serialize;

use super::ApiError;
use super::ApiSuccess;
use super::JsonBody;
use super::UserData;
use crate::inbound::http::middleware::AuthenticatedUser;
use crate::inbound::http::router::AppState;

pub async fn toggle_mfa(
    State(state): State<AppState>,
    Extension(identity): Extension<AuthenticatedUser>,
    JsonBody(body): JsonBody<ToggleMfaRequestBody>,
) -> Result<ApiSuccess<ToggleMfaResponseData>, ApiError> {
    let user = state
        .credential_store
        .set_mfa_enabled(&identity.user_id, body.enabled)
        .await
        .map_err(ApiError::from)?;

    tracing::info!(user_id = %user.id, enabled = user.mfa_enabled, "MFA setting changed");

    Ok(ApiSuccess::new(
        StatusCode::OK,
        ToggleMfaResponseData {
            user: (&user).into(),
        },
    ))
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ToggleMfaRequestBody {
    enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToggleMfaResponseData {
    pub user: UserData,
}
