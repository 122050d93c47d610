use axum::extract::State;
use axum::http::StatusCode;
use axum::Extension;
use chrono::NaiveDate;
use serde::Deserialize;

use super::me::MeResponseData;
use super::ApiError;
use super::ApiSuccess;
use super::JsonBody;
use crate::account::errors::AccountError;
use crate::account::models::Description;
use crate::account::models::UpdateProfileCommand;
use crate::account::models::Username;
use crate::inbound::http::middleware::AuthenticatedUser;
use crate::inbound::http::router::AppState;

/// HTTP request body for a partial profile update (raw JSON)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub description: Option<String>,
    pub birth_date: Option<NaiveDate>,
}

impl UpdateProfileRequest {
    fn try_into_command(self) -> Result<UpdateProfileCommand, AccountError> {
        let username = self.username.map(Username::new).transpose()?;
        let description = self.description.map(Description::new).transpose()?;

        Ok(UpdateProfileCommand {
            username,
            description,
            birth_date: self.birth_date,
        })
    }
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthenticatedUser>,
    JsonBody(body): JsonBody<UpdateProfileRequest>,
) -> Result<ApiSuccess<MeResponseData>, ApiError> {
    let command = body.try_into_command()?;
    if command.is_empty() {
        return Err(ApiError::BadRequest("No profile fields provided".to_string()));
    }

    state
        .account_service
        .update_profile(&auth_user.user_id(), command)
        .await
        .map_err(ApiError::from)
        .map(|ref user| ApiSuccess::new(StatusCode::OK, MeResponseData { user: user.into() }))
}
