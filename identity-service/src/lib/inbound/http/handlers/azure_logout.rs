use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde::Serialize;

use super::ApiError;
use super::ApiSuccess;
use crate::inbound::http::router::AppState;

pub async fn azure_logout(
    State(state): State<AppState>,
    body: Option<Json<AzureLogoutRequestBody>>,
) -> Result<ApiSuccess<AzureLogoutResponseData>, ApiError> {
    let redirect = body
        .and_then(|Json(body)| body.post_logout_redirect_uri)
        .filter(|uri| !uri.trim().is_empty())
        .unwrap_or_else(|| state.settings.post_logout_redirect_uri.clone());

    let url = state
        .federation
        .build_logout_url(&redirect)
        .map_err(ApiError::from)?;

    Ok(ApiSuccess::new(
        StatusCode::OK,
        AzureLogoutResponseData {
            logout_url: url.to_string(),
        },
    ))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureLogoutRequestBody {
    #[serde(default)]
    post_logout_redirect_uri: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureLogoutResponseData {
    pub logout_url: String,
}
