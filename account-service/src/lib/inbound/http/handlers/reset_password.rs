use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;

use super::required;
use super::ApiError;
use super::ApiSuccess;
use super::JsonBody;
use super::MessageData;
use crate::account::errors::AccountError;
use crate::account::models::ResetPasswordCommand;
use crate::inbound::http::router::AppState;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    token: Option<String>,
    new_password: Option<String>,
}

impl ResetPasswordRequest {
    fn try_into_command(self) -> Result<ResetPasswordCommand, AccountError> {
        Ok(ResetPasswordCommand {
            token: required(self.token, "token")?,
            new_password: required(self.new_password, "newPassword")?,
        })
    }
}

pub async fn reset_password(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<ResetPasswordRequest>,
) -> Result<ApiSuccess<MessageData>, ApiError> {
    state
        .account_service
        .complete_password_reset(body.try_into_command()?)
        .await
        .map_err(ApiError::from)
        .map(|_| ApiSuccess::new(StatusCode::OK, MessageData::new("Password reset successfully")))
}
