use axum::extract::State;
use axum::http::StatusCode;
use axum::Extension;
use serde::Deserialize;

use super::required;
use super::ApiError;
use super::ApiSuccess;
use super::JsonBody;
use super::MessageData;
use crate::account::errors::AccountError;
use crate::account::models::ChangePasswordCommand;
use crate::inbound::http::middleware::AuthenticatedUser;
use crate::inbound::http::router::AppState;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    current_password: Option<String>,
    new_password: Option<String>,
}

impl ChangePasswordRequest {
    fn try_into_command(self) -> Result<ChangePasswordCommand, AccountError> {
        Ok(ChangePasswordCommand {
            current_password: required(self.current_password, "currentPassword")?,
            new_password: required(self.new_password, "newPassword")?,
        })
    }
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    JsonBody(body): JsonBody<ChangePasswordRequest>,
) -> Result<ApiSuccess<MessageData>, ApiError> {
    state
        .account_service
        .change_password(&auth_user.user_id(), body.try_into_command()?)
        .await
        .map_err(ApiError::from)
        .map(|_| ApiSuccess::new(StatusCode::OK, MessageData::new("Password changed successfully")))
}
