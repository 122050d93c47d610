use async_trait::async_trait;

use super::errors::AccountError;
use super::errors::DispatchError;
use super::models::ChangePasswordCommand;
use super::models::EmailAddress;
use super::models::LoginCommand;
use super::models::PublicUser;
use super::models::RegisterCommand;
use super::models::ResetPasswordCommand;
use super::models::UpdateProfileCommand;
use super::models::User;
use super::models::UserId;

/// Successful login.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user: PublicUser,
}

/// Port for account domain service operations.
#[async_trait]
pub trait AccountServicePort: Send + Sync + 'static {
    /// Register a new, unverified account and send its verification link.
    ///
    /// # Errors
    /// * `EmailAlreadyExists` - Email is already registered
    /// * `DatabaseError` - Database operation failed
    async fn register(&self, command: RegisterCommand) -> Result<PublicUser, AccountError>;

    /// Mark the account referenced by an email-verification token as verified.
    ///
    /// # Errors
    /// * `InvalidToken` - Token forged, expired, or malformed
    /// * `NotFound` - Referenced account no longer exists
    /// * `AlreadyVerified` - Account was verified before
    async fn verify_email(&self, token: &str) -> Result<(), AccountError>;

    /// Mark the account with this email as verified without a token.
    ///
    /// # Errors
    /// * `NotFound` - No account with this email
    /// * `AlreadyVerified` - Account was verified before
    async fn confirm_email(&self, email: &EmailAddress) -> Result<(), AccountError>;

    /// Check credentials and issue a session token.
    ///
    /// # Errors
    /// * `NotFound` - No account with this email
    /// * `NotVerified` - Email not verified yet
    /// * `InvalidCredentials` - Password mismatch
    async fn login(&self, command: LoginCommand) -> Result<Session, AccountError>;

    /// Issue a reset token, store it on the account, and return the reset link.
    ///
    /// Any previously issued reset token stops working.
    ///
    /// # Errors
    /// * `Forbidden` - Email is on the protected list
    /// * `NotFound` - No account with this email
    async fn request_password_reset(&self, email: &EmailAddress) -> Result<String, AccountError>;

    /// Consume a reset token and replace the password.
    ///
    /// # Errors
    /// * `InvalidToken` - Token rejected, superseded, or already consumed
    /// * `InvalidPassword` - New password violates the policy
    async fn complete_password_reset(
        &self,
        command: ResetPasswordCommand,
    ) -> Result<(), AccountError>;

    /// Replace the password of an authenticated user.
    ///
    /// # Errors
    /// * `NotFound` - Account no longer exists
    /// * `InvalidCredentials` - Current password mismatch
    /// * `InvalidPassword` - New password violates the policy
    async fn change_password(
        &self,
        id: &UserId,
        command: ChangePasswordCommand,
    ) -> Result<(), AccountError>;

    /// Resolve a session token to the account it belongs to.
    ///
    /// # Errors
    /// * `InvalidToken` - Token forged, expired, or malformed
    /// * `Unauthenticated` - Token is valid but the account is gone
    async fn authenticate_session(&self, token: &str) -> Result<PublicUser, AccountError>;

    /// # Errors
    /// * `NotFound` - Account does not exist
    async fn get_user(&self, id: &UserId) -> Result<PublicUser, AccountError>;

    /// Apply the provided profile fields, leaving the others untouched.
    ///
    /// # Errors
    /// * `NotFound` - Account does not exist
    async fn update_profile(
        &self,
        id: &UserId,
        command: UpdateProfileCommand,
    ) -> Result<PublicUser, AccountError>;

    /// # Errors
    /// * `NotFound` - Account does not exist
    async fn remove_profile_image(&self, id: &UserId) -> Result<(), AccountError>;

    /// # Errors
    /// * `NotFound` - Account does not exist
    async fn delete_account(&self, id: &UserId) -> Result<(), AccountError>;
}

/// Persistence operations for user accounts.
///
/// Every write touches only the columns its operation owns, so concurrent
/// operations on one account never overwrite each other's fields.
#[async_trait]
pub trait UserRepository: Send + Sync + 'static {
    /// Persist new user to storage.
    ///
    /// # Errors
    /// * `EmailAlreadyExists` - Email is already registered
    /// * `DatabaseError` - Database operation failed
    async fn create(&self, user: User) -> Result<User, AccountError>;

    /// Retrieve user by identifier.
    ///
    /// # Returns
    /// Optional user entity (None if not found)
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, AccountError>;

    /// Retrieve user by exact email address.
    ///
    /// # Returns
    /// Optional user entity (None if not found)
    async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<User>, AccountError>;

    /// Flip an unverified account to verified.
    ///
    /// # Returns
    /// `false` when no unverified account with this id exists
    async fn mark_verified(&self, id: &UserId) -> Result<bool, AccountError>;

    /// Store the only valid reset token, replacing any earlier one.
    ///
    /// # Errors
    /// * `NotFound` - User does not exist
    /// * `DatabaseError` - Database operation failed
    async fn set_reset_token(&self, id: &UserId, token: &str) -> Result<(), AccountError>;

    /// Replace the password hash and clear the reset token, but only while
    /// `token` is still the stored one. Check and write happen as one step.
    ///
    /// # Returns
    /// `false` when the token was superseded, already consumed, or the user is gone
    async fn consume_reset_token(
        &self,
        id: &UserId,
        token: &str,
        password_hash: &str,
    ) -> Result<bool, AccountError>;

    /// Replace the password hash only.
    ///
    /// # Errors
    /// * `NotFound` - User does not exist
    /// * `DatabaseError` - Database operation failed
    async fn update_password(&self, id: &UserId, password_hash: &str) -> Result<(), AccountError>;

    /// Write the profile fields present in `changes`, leaving the rest as stored.
    ///
    /// # Errors
    /// * `NotFound` - User does not exist
    /// * `DatabaseError` - Database operation failed
    async fn update_profile(
        &self,
        id: &UserId,
        changes: &UpdateProfileCommand,
    ) -> Result<User, AccountError>;

    /// # Errors
    /// * `NotFound` - User does not exist
    /// * `DatabaseError` - Database operation failed
    async fn clear_profile_image(&self, id: &UserId) -> Result<(), AccountError>;

    /// Remove user from storage.
    ///
    /// # Errors
    /// * `NotFound` - User does not exist
    /// * `DatabaseError` - Database operation failed
    async fn delete(&self, id: &UserId) -> Result<(), AccountError>;
}

/// Out-of-band delivery of verification and reset links.
#[async_trait]
pub trait LinkDispatcher: Send + Sync + 'static {
    async fn send_verification_link(
        &self,
        email: &EmailAddress,
        link: &str,
    ) -> Result<(), DispatchError>;

    async fn send_password_reset_link(
        &self,
        email: &EmailAddress,
        link: &str,
    ) -> Result<(), DispatchError>;
}
