use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;

use super::required;
use super::ApiError;
use super::ApiSuccess;
use super::MessageData;
use super::QueryParams;
use crate::inbound::http::router::AppState;

/// Query string of the link delivered after registration.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyEmailQuery {
    token: Option<String>,
}

pub async fn verify_email(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<VerifyEmailQuery>,
) -> Result<ApiSuccess<MessageData>, ApiError> {
    let token = required(query.token, "token")?;

    state
        .account_service
        .verify_email(&token)
        .await
        .map_err(ApiError::from)
        .map(|_| ApiSuccess::new(StatusCode::OK, MessageData::new("Email verified successfully")))
}
