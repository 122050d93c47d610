use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;
use serde::Serialize;

use super::required;
use super::ApiError;
use super::ApiSuccess;
use super::JsonBody;
use crate::account::models::EmailAddress;
use crate::inbound::http::router::AppState;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ForgotPasswordRequest {
    email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordResponseData {
    pub message: String,
    pub reset_link: String,
}

pub async fn forgot_password(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<ForgotPasswordRequest>,
) -> Result<ApiSuccess<ForgotPasswordResponseData>, ApiError> {
    let email = EmailAddress::new(required(body.email, "email")?)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    state
        .account_service
        .request_password_reset(&email)
        .await
        .map_err(ApiError::from)
        .map(|reset_link| {
            ApiSuccess::new(
                StatusCode::OK,
                ForgotPasswordResponseData {
                    message: "Password reset link sent".to_string(),
                    reset_link,
                },
            )
        })
}
