use axum::extract::Query;
use axum::extract::State;
use axum::http::header;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use serde::Deserialize;
use serde::Serialize;

use super::azure_login::cleared_cookie;
use super::azure_login::session_from_headers;
use super::ApiError;
use super::ApiSuccess;
use super::UserData;
use crate::domain::federation::models::FederatedSignIn;
use crate::domain::federation::models::ProviderTokens;
use crate::inbound::http::router::AppState;

/// Provider redirect target. Consumes the CSRF state bound to the caller's cookie.
pub async fn azure_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<AzureCallbackParams>,
) -> Result<Response, ApiError> {
    let session = session_from_headers(&headers);

    let sign_in = state
        .federation
        .handle_callback(
            params.code.as_deref(),
            params.state.as_deref(),
            session.as_ref(),
        )
        .await
        .map_err(ApiError::from)?;

    let mut response =
        ApiSuccess::new(StatusCode::OK, AzureCallbackResponseData::from(sign_in)).into_response();
    response.headers_mut().insert(
        header::SET_COOKIE,
        cleared_cookie(state.settings.secure_cookies)?,
    );
    Ok(response)
}

/// Query parameters sent back by the provider. Both are optional so absence maps to
/// `MissingParameters` rather than an extractor rejection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AzureCallbackParams {
    code: Option<String>,
    state: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureCallbackResponseData {
    pub user: UserData,
    pub token: String,
    pub role: String,
    pub provider_tokens: ProviderTokensData,
}

impl From<FederatedSignIn> for AzureCallbackResponseData {
    fn from(sign_in: FederatedSignIn) -> Self {
        Self {
            user: (&sign_in.user).into(),
            token: sign_in.session.token,
            role: sign_in.role.as_str().to_string(),
            provider_tokens: sign_in.provider_tokens.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderTokensData {
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    pub token_type: String,
    pub expires_in: u64,
}

impl From<ProviderTokens> for ProviderTokensData {
    fn from(tokens: ProviderTokens) -> Self {
        Self {
            access_token: tokens.access_token,
            id_token: tokens.id_token,
            token_type: tokens.token_type,
            expires_in: tokens.expires_in,
        }
    }
}
