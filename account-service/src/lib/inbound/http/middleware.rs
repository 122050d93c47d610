use axum::extract::Request;
use axum::extract::State;
use axum::http::{self};
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;

use crate::account::errors::ErrorKind;
use crate::account::models::PublicUser;
use crate::account::models::UserId;
use crate::inbound::http::handlers::ApiError;
use crate::inbound::http::router::AppState;

/// Extension type carrying the resolved account into protected handlers
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: PublicUser,
}

impl AuthenticatedUser {
    pub fn user_id(&self) -> UserId {
        self.user.id
    }
}

/// Middleware that resolves the bearer session token to an account.
///
/// * Missing or non-`Bearer` header: 401
/// * Token rejected (forged, expired, wrong purpose): 403
/// * Token valid but the account was deleted since: 401
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_token_from_header(&req)?;

    let user = state
        .account_service
        .authenticate_session(token)
        .await
        .map_err(|e| match e.kind() {
            ErrorKind::InvalidToken => {
                tracing::warn!("Session token rejected");
                ApiError::Forbidden("Invalid or expired token".to_string()).into_response()
            }
            ErrorKind::Unauthenticated => {
                tracing::warn!("Session token references a deleted account");
                ApiError::Unauthorized(e.to_string()).into_response()
            }
            _ => ApiError::from(e).into_response(),
        })?;

    req.extensions_mut().insert(AuthenticatedUser { user });

    Ok(next.run(req).await)
}

fn extract_token_from_header(req: &Request) -> Result<&str, Response> {
    let auth_header = req
        .headers()
        .get(http::header::AUTHORIZATION)
        .ok_or_else(|| {
            ApiError::Unauthorized("Missing Authorization header".to_string()).into_response()
        })?;

    let auth_str = auth_header.to_str().map_err(|_| {
        ApiError::Unauthorized("Invalid Authorization header".to_string()).into_response()
    })?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim()),
        _ => Err(ApiError::Unauthorized(
            "Invalid Authorization header format. Expected: Bearer <token>".to_string(),
        )
        .into_response()),
    }
}
