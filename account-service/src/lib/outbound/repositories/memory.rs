use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::domain::account::errors::AccountError;
use crate::domain::account::models::EmailAddress;
use crate::domain::account::models::UpdateProfileCommand;
use crate::domain::account::models::User;
use crate::domain::account::models::UserId;
use crate::domain::account::ports::UserRepository;

/// Credential store held in process memory.
///
/// Enforces the same email uniqueness as the `users_email_key` constraint.
/// Used by tests and local runs without a database.
#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<UserId, User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }

    /// Apply `change` to one stored user under the write lock.
    async fn modify<F>(&self, id: &UserId, change: F) -> Result<User, AccountError>
    where
        F: FnOnce(&mut User),
    {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(id)
            .ok_or_else(|| AccountError::NotFound(id.to_string()))?;

        change(user);
        user.updated_at = Utc::now();
        Ok(user.clone())
    }
}

fn email_taken(users: &HashMap<UserId, User>, user: &User) -> bool {
    users
        .values()
        .any(|other| other.id != user.id && other.email == user.email)
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: User) -> Result<User, AccountError> {
        let mut users = self.users.write().await;

        if email_taken(&users, &user) {
            return Err(AccountError::EmailAlreadyExists(user.email.to_string()));
        }

        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, AccountError> {
        Ok(self.users.read().await.get(id).cloned())
    }

    async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<User>, AccountError> {
        let users = self.users.read().await;
        Ok(users.values().find(|user| &user.email == email).cloned())
    }

    async fn mark_verified(&self, id: &UserId) -> Result<bool, AccountError> {
        let mut users = self.users.write().await;

        match users.get_mut(id) {
            Some(user) if !user.is_verified => {
                user.is_verified = true;
                user.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_reset_token(&self, id: &UserId, token: &str) -> Result<(), AccountError> {
        self.modify(id, |user| user.reset_token = Some(token.to_string()))
            .await
            .map(|_| ())
    }

    async fn consume_reset_token(
        &self,
        id: &UserId,
        token: &str,
        password_hash: &str,
    ) -> Result<bool, AccountError> {
        let mut users = self.users.write().await;

        match users.get_mut(id) {
            Some(user) if user.holds_reset_token(token) => {
                user.password_hash = password_hash.to_string();
                user.reset_token = None;
                user.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update_password(&self, id: &UserId, password_hash: &str) -> Result<(), AccountError> {
        self.modify(id, |user| user.password_hash = password_hash.to_string())
            .await
            .map(|_| ())
    }

    async fn update_profile(
        &self,
        id: &UserId,
        changes: &UpdateProfileCommand,
    ) -> Result<User, AccountError> {
        self.modify(id, |user| {
            if let Some(username) = &changes.username {
                user.username = username.clone();
            }
            if let Some(description) = &changes.description {
                user.profile.description = description.as_str().to_string();
            }
            if let Some(birth_date) = changes.birth_date {
                user.profile.birth_date = Some(birth_date);
            }
        })
        .await
    }

    async fn clear_profile_image(&self, id: &UserId) -> Result<(), AccountError> {
        self.modify(id, |user| user.profile.profile_image.clear())
            .await
            .map(|_| ())
    }

    async fn delete(&self, id: &UserId) -> Result<(), AccountError> {
        self.users
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| AccountError::NotFound(id.to_string()))
    }
}
