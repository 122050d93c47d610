use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;

use super::required;
use super::ApiError;
use super::ApiSuccess;
use super::JsonBody;
use super::MessageData;
use crate::account::errors::AccountError;
use crate::account::models::EmailAddress;
use crate::account::models::Password;
use crate::account::models::RegisterCommand;
use crate::account::models::Username;
use crate::inbound::http::router::AppState;

pub async fn register(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<RegisterRequest>,
) -> Result<ApiSuccess<MessageData>, ApiError> {
    state
        .account_service
        .register(body.try_into_command()?)
        .await
        .map_err(ApiError::from)
        .map(|_| {
            ApiSuccess::new(
                StatusCode::CREATED,
                MessageData::new("User registered. Please verify your email"),
            )
        })
}

/// HTTP request body for registration (raw JSON)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegisterRequest {
    email: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

impl RegisterRequest {
    fn try_into_command(self) -> Result<RegisterCommand, AccountError> {
        let email = EmailAddress::new(required(self.email, "email")?)?;
        let username = Username::new(required(self.username, "username")?)?;
        let password = Password::new(required(self.password, "password")?)?;
        Ok(RegisterCommand::new(email, username, password))
    }
}
