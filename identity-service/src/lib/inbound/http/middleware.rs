use axum::extract::Request;
use axum::extract::State;
use axum::http::{self};
use axum::middleware::Next;
use axum::response::Response;

use super::handlers::ApiError;
use super::handlers::ApiErrorData;
use super::handlers::ErrorCode;
use crate::domain::session::models::SessionClaims;
use crate::domain::user::models::UserId;
use crate::inbound::http::router::AppState;

/// Extension type to store the authenticated identity in request extensions
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
    pub claims: SessionClaims,
}

/// Middleware that verifies the bearer session token and adds the identity to request extensions
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token_from_header(&req)?;

    let claims = state.session_tokens.verify(token)?;

    let user_id = UserId::from_string(&claims.sub).map_err(|e| {
        tracing::warn!(error = %e, "Session token subject is not a user id");
        invalid_token()
    })?;

    req.extensions_mut()
        .insert(AuthenticatedUser { user_id, claims });

    Ok(next.run(req).await)
}

fn extract_token_from_header(req: &Request) -> Result<&str, ApiError> {
    let auth_header = req
        .headers()
        .get(http::header::AUTHORIZATION)
        .ok_or_else(|| {
            ApiError::Unauthorized(ApiErrorData::new(
                ErrorCode::NoToken,
                "Missing Authorization header",
            ))
        })?;

    let token = auth_header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            ApiError::Unauthorized(ApiErrorData::new(
                ErrorCode::NoToken,
                "Expected Authorization: Bearer <token>",
            ))
        })?;

    Ok(token)
}

fn invalid_token() -> ApiError {
    ApiError::Unauthorized(ApiErrorData::new(
        ErrorCode::InvalidToken,
        "Invalid or expired token",
    ))
}
