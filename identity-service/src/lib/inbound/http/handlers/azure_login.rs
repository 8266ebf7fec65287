use axum::extract::State;
use axum::http::header;
use axum::http::HeaderMap;
use axum::http::HeaderValue;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use serde::Serialize;

use super::ApiError;
use super::ApiSuccess;
use crate::domain::federation::models::SessionKey;
use crate::inbound::http::router::AppState;

/// Cookie binding a browser to the CSRF state minted for it.
pub const FEDERATION_COOKIE: &str = "fed_sid";

const FEDERATION_COOKIE_PATH: &str = "/azure";

/// Start the provider sign-in: mint a caller session and return the authorization URL.
pub async fn azure_login(State(state): State<AppState>) -> Result<Response, ApiError> {
    let session = SessionKey::generate();

    let request = state
        .federation
        .build_authorization_url(&session)
        .await
        .map_err(ApiError::from)?;

    let cookie = session_cookie(
        &session,
        state.settings.federation_cookie_max_age_seconds,
        state.settings.secure_cookies,
    )?;

    let mut response = ApiSuccess::new(
        StatusCode::OK,
        AzureLoginResponseData {
            auth_url: request.url.to_string(),
        },
    )
    .into_response();
    response.headers_mut().insert(header::SET_COOKIE, cookie);
    Ok(response)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureLoginResponseData {
    pub auth_url: String,
}

pub(super) fn session_cookie(
    session: &SessionKey,
    max_age_seconds: i64,
    secure: bool,
) -> Result<HeaderValue, ApiError> {
    build_cookie(session.as_str(), max_age_seconds, secure)
}

/// Expire the federation cookie on the client.
pub(super) fn cleared_cookie(secure: bool) -> Result<HeaderValue, ApiError> {
    build_cookie("", 0, secure)
}

fn build_cookie(value: &str, max_age_seconds: i64, secure: bool) -> Result<HeaderValue, ApiError> {
    let mut cookie = format!(
        "{}={}; Path={}; HttpOnly; SameSite=Lax; Max-Age={}",
        FEDERATION_COOKIE, value, FEDERATION_COOKIE_PATH, max_age_seconds
    );
    if secure {
        cookie.push_str("; Secure");
    }

    HeaderValue::from_str(&cookie)
        .map_err(|e| ApiError::InternalServerError(format!("Invalid cookie header: {}", e)))
}

/// Read the federation session key from the request cookies.
pub(super) fn session_from_headers(headers: &HeaderMap) -> Option<SessionKey> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == FEDERATION_COOKIE)
        .and_then(|(_, value)| SessionKey::from_presented(value))
}
