use async_trait::async_trait;
use chrono::DateTime;
use chrono::NaiveDate;
use chrono::Utc;
use sqlx::postgres::PgQueryResult;
use sqlx::FromRow;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::account::errors::AccountError;
use crate::domain::account::models::Description;
use crate::domain::account::models::EmailAddress;
use crate::domain::account::models::Profile;
use crate::domain::account::models::UpdateProfileCommand;
use crate::domain::account::models::User;
use crate::domain::account::models::UserId;
use crate::domain::account::models::Username;
use crate::domain::account::ports::UserRepository;

const USER_COLUMNS: &str = "id, email, username, password_hash, is_verified, reset_token, \
                            description, birth_date, profile_image, created_at, updated_at";

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    username: String,
    password_hash: String,
    is_verified: bool,
    reset_token: Option<String>,
    description: String,
    birth_date: Option<NaiveDate>,
    profile_image: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = AccountError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: UserId(row.id),
            email: EmailAddress::new(row.email)?,
            username: Username::new(row.username)?,
            password_hash: row.password_hash,
            is_verified: row.is_verified,
            reset_token: row.reset_token,
            profile: Profile {
                description: row.description,
                birth_date: row.birth_date,
                profile_image: row.profile_image,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn map_write_error(e: sqlx::Error, user: &User) -> AccountError {
    if let Some(db_err) = e.as_database_error() {
        if db_err.is_unique_violation() && db_err.constraint() == Some("users_email_key") {
            return AccountError::EmailAlreadyExists(user.email.to_string());
        }
    }
    AccountError::DatabaseError(e.to_string())
}

fn require_row(result: PgQueryResult, id: &UserId) -> Result<(), AccountError> {
    if result.rows_affected() == 0 {
        return Err(AccountError::NotFound(id.to_string()));
    }
    Ok(())
}

/// Credential store backed by the `users` table.
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn create(&self, user: User) -> Result<User, AccountError> {
        sqlx::query(
            r#"
            INSERT INTO users (
                id, email, username, password_hash, is_verified, reset_token,
                description, birth_date, profile_image, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(user.id.0)
        .bind(user.email.as_str())
        .bind(user.username.as_str())
        .bind(&user.password_hash)
        .bind(user.is_verified)
        .bind(&user.reset_token)
        .bind(&user.profile.description)
        .bind(user.profile.birth_date)
        .bind(&user.profile.profile_image)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(e, &user))?;

        Ok(user)
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, AccountError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AccountError::DatabaseError(e.to_string()))?;

        row.map(User::try_from).transpose()
    }

    async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<User>, AccountError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AccountError::DatabaseError(e.to_string()))?;

        row.map(User::try_from).transpose()
    }

    async fn mark_verified(&self, id: &UserId) -> Result<bool, AccountError> {
        let result = sqlx::query(
            "UPDATE users SET is_verified = TRUE, updated_at = NOW() \
             WHERE id = $1 AND is_verified = FALSE",
        )
        .bind(id.0)
        .execute(&self.pool)
        .await
        .map_err(|e| AccountError::DatabaseError(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }

    async fn set_reset_token(&self, id: &UserId, token: &str) -> Result<(), AccountError> {
        let result = sqlx::query(
            "UPDATE users SET reset_token = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id.0)
        .bind(token)
        .execute(&self.pool)
        .await
        .map_err(|e| AccountError::DatabaseError(e.to_string()))?;

        require_row(result, id)
    }

    async fn consume_reset_token(
        &self,
        id: &UserId,
        token: &str,
        password_hash: &str,
    ) -> Result<bool, AccountError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $3, reset_token = NULL, updated_at = NOW()
            WHERE id = $1 AND reset_token = $2
            "#,
        )
        .bind(id.0)
        .bind(token)
        .bind(password_hash)
        .execute(&self.pool)
        .await
        .map_err(|e| AccountError::DatabaseError(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_password(&self, id: &UserId, password_hash: &str) -> Result<(), AccountError> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id.0)
        .bind(password_hash)
        .execute(&self.pool)
        .await
        .map_err(|e| AccountError::DatabaseError(e.to_string()))?;

        require_row(result, id)
    }

    async fn update_profile(
        &self,
        id: &UserId,
        changes: &UpdateProfileCommand,
    ) -> Result<User, AccountError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
            SET username = COALESCE($2::TEXT, username),
                description = COALESCE($3::TEXT, description),
                birth_date = COALESCE($4::DATE, birth_date),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id.0)
        .bind(changes.username.as_ref().map(Username::as_str))
        .bind(changes.description.as_ref().map(Description::as_str))
        .bind(changes.birth_date)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AccountError::DatabaseError(e.to_string()))?;

        row.map(User::try_from)
            .transpose()?
            .ok_or_else(|| AccountError::NotFound(id.to_string()))
    }

    async fn clear_profile_image(&self, id: &UserId) -> Result<(), AccountError> {
        let result = sqlx::query(
            "UPDATE users SET profile_image = '', updated_at = NOW() WHERE id = $1",
        )
        .bind(id.0)
        .execute(&self.pool)
        .await
        .map_err(|e| AccountError::DatabaseError(e.to_string()))?;

        require_row(result, id)
    }

    async fn delete(&self, id: &UserId) -> Result<(), AccountError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| AccountError::DatabaseError(e.to_string()))?;

        require_row(result, id)
    }
}
