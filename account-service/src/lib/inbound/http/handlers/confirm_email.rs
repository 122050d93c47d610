use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;

use super::required;
use super::ApiError;
use super::ApiSuccess;
use super::JsonBody;
use super::MessageData;
use crate::account::models::EmailAddress;
use crate::inbound::http::router::AppState;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConfirmEmailRequest {
    email: Option<String>,
}

/// Verify an account by address, without a token.
pub async fn confirm_email(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<ConfirmEmailRequest>,
) -> Result<ApiSuccess<MessageData>, ApiError> {
    let email = EmailAddress::new(required(body.email, "email")?)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    state
        .account_service
        .confirm_email(&email)
        .await
        .map_err(ApiError::from)
        .map(|_| ApiSuccess::new(StatusCode::OK, MessageData::new("Email verified successfully")))
}
