use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;
use serde::Serialize;

use super::required;
use super::ApiError;
use super::ApiSuccess;
use super::JsonBody;
use super::UserData;
use crate::account::errors::AccountError;
use crate::account::errors::ErrorKind;
use crate::account::models::EmailAddress;
use crate::account::models::LoginCommand;
use crate::inbound::http::router::AppState;

pub async fn login(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<LoginRequest>,
) -> Result<ApiSuccess<LoginResponseData>, ApiError> {
    let session = state
        .account_service
        .login(body.try_into_command()?)
        .await
        .map_err(|e| match e.kind() {
            // Unknown addresses answer like a wrong password.
            ErrorKind::NotFound => ApiError::Unauthorized("Invalid credentials".to_string()),
            _ => ApiError::from(e),
        })?;

    Ok(ApiSuccess::new(
        StatusCode::OK,
        LoginResponseData {
            token: session.token,
            user: (&session.user).into(),
        },
    ))
}

/// HTTP request body for login (raw JSON)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoginRequest {
    email: Option<String>,
    password: Option<String>,
}

impl LoginRequest {
    fn try_into_command(self) -> Result<LoginCommand, AccountError> {
        let email = EmailAddress::new(required(self.email, "email")?)?;
        let password = required(self.password, "password")?;
        Ok(LoginCommand { email, password })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoginResponseData {
    pub token: String,
    pub user: UserData,
}
