use std::sync::Arc;

use async_trait::async_trait;
use auth::AuthenticationError;
use auth::Authenticator;
use auth::TokenPurpose;

use super::errors::AccountError;
use super::models::ChangePasswordCommand;
use super::models::EmailAddress;
use super::models::LoginCommand;
use super::models::Password;
use super::models::PublicUser;
use super::models::RegisterCommand;
use super::models::ResetPasswordCommand;
use super::models::UpdateProfileCommand;
use super::models::User;
use super::models::UserId;
use super::ports::AccountServicePort;
use super::ports::LinkDispatcher;
use super::ports::Session;
use super::ports::UserRepository;

/// Account rules that come from configuration.
#[derive(Debug, Clone, Default)]
pub struct AccountPolicy {
    /// Base URL of the email-verification link; `?token=` is appended.
    pub verification_url: String,
    /// Base URL of the password-reset link; `?token=` is appended.
    pub reset_password_url: String,
    /// Addresses whose password can never be reset.
    pub protected_emails: Vec<String>,
}

impl AccountPolicy {
    fn is_protected(&self, email: &EmailAddress) -> bool {
        self.protected_emails
            .iter()
            .any(|protected| protected == email.as_str())
    }

    fn verification_link(&self, token: &str) -> String {
        format!("{}?token={}", self.verification_url, token)
    }

    fn reset_link(&self, token: &str) -> String {
        format!("{}?token={}", self.reset_password_url, token)
    }
}

/// Domain service implementation for account operations.
///
/// Drives the `Unregistered -> Unverified -> Verified` lifecycle and the
/// orthogonal reset-requested state. Every operation is a read followed by at
/// most one targeted write; the reset-token check is repeated inside that write.
pub struct AccountService<UR, LD>
where
    UR: UserRepository,
    LD: LinkDispatcher,
{
    repository: Arc<UR>,
    dispatcher: Arc<LD>,
    authenticator: Arc<Authenticator>,
    policy: AccountPolicy,
}

impl<UR, LD> AccountService<UR, LD>
where
    UR: UserRepository,
    LD: LinkDispatcher,
{
    /// Create a new account service with injected dependencies.
    ///
    /// # Arguments
    /// * `repository` - Credential store implementation
    /// * `dispatcher` - Out-of-band link delivery
    /// * `authenticator` - Password hashing and token signing
    /// * `policy` - Link URLs and the protected-address list
    pub fn new(
        repository: Arc<UR>,
        dispatcher: Arc<LD>,
        authenticator: Arc<Authenticator>,
        policy: AccountPolicy,
    ) -> Self {
        Self {
            repository,
            dispatcher,
            authenticator,
            policy,
        }
    }

    async fn load(&self, id: &UserId) -> Result<User, AccountError> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| AccountError::NotFound(id.to_string()))
    }

    async fn load_by_email(&self, email: &EmailAddress) -> Result<User, AccountError> {
        self.repository
            .find_by_email(email)
            .await?
            .ok_or_else(|| AccountError::NotFound(email.to_string()))
    }

    /// Verify `token` for `purpose` and return the user id it names.
    fn subject(&self, token: &str, purpose: TokenPurpose) -> Result<UserId, AccountError> {
        let subject = self.authenticator.verify_token(token, purpose)?;
        UserId::from_string(&subject).map_err(|_| AccountError::InvalidToken)
    }

    async fn mark_verified(&self, user: User) -> Result<(), AccountError> {
        if user.is_verified || !self.repository.mark_verified(&user.id).await? {
            return Err(AccountError::AlreadyVerified);
        }

        tracing::info!(user_id = %user.id, "Email verified");
        Ok(())
    }
}

#[async_trait]
impl<UR, LD> AccountServicePort for AccountService<UR, LD>
where
    UR: UserRepository,
    LD: LinkDispatcher,
{
    async fn register(&self, command: RegisterCommand) -> Result<PublicUser, AccountError> {
        if self.repository.find_by_email(&command.email).await?.is_some() {
            return Err(AccountError::EmailAlreadyExists(command.email.to_string()));
        }

        let password_hash = self.authenticator.hash_password(command.password.as_str())?;
        let user = User::new(command.email, command.username, password_hash);
        let created_user = self.repository.create(user).await?;

        let token = self
            .authenticator
            .issue_token(created_user.id, TokenPurpose::EmailVerification)?;
        let link = self.policy.verification_link(&token);
        if let Err(e) = self
            .dispatcher
            .send_verification_link(&created_user.email, &link)
            .await
        {
            tracing::error!(
                user_id = %created_user.id,
                error = %e,
                "Failed to deliver verification link"
            );
        }

        tracing::info!(user_id = %created_user.id, "User registered");
        Ok(created_user.to_public())
    }

    async fn verify_email(&self, token: &str) -> Result<(), AccountError> {
        let id = self.subject(token, TokenPurpose::EmailVerification)?;
        let user = self.load(&id).await?;
        self.mark_verified(user).await
    }

    async fn confirm_email(&self, email: &EmailAddress) -> Result<(), AccountError> {
        let user = self.load_by_email(email).await?;
        self.mark_verified(user).await
    }

    async fn login(&self, command: LoginCommand) -> Result<Session, AccountError> {
        let user = self.load_by_email(&command.email).await?;

        if !user.is_verified {
            tracing::warn!(user_id = %user.id, "Login refused for unverified account");
            return Err(AccountError::NotVerified);
        }

        let result = self
            .authenticator
            .authenticate(&command.password, &user.password_hash, user.id)
            .map_err(|e| match e {
                AuthenticationError::InvalidCredentials => {
                    tracing::warn!(user_id = %user.id, "Login with incorrect password");
                    AccountError::InvalidCredentials
                }
                AuthenticationError::JwtError(err) => AccountError::from(err),
            })?;

        tracing::info!(user_id = %user.id, "User logged in");
        Ok(Session {
            token: result.access_token,
            user: user.to_public(),
        })
    }

    async fn request_password_reset(&self, email: &EmailAddress) -> Result<String, AccountError> {
        if self.policy.is_protected(email) {
            tracing::warn!(email = %email, "Password reset requested for protected account");
            return Err(AccountError::Forbidden(
                "This account cannot be modified".to_string(),
            ));
        }

        let user = self.load_by_email(email).await?;

        let token = self
            .authenticator
            .issue_token(user.id, TokenPurpose::PasswordReset)?;
        // Overwriting the stored copy revokes every earlier reset token.
        self.repository.set_reset_token(&user.id, &token).await?;

        let link = self.policy.reset_link(&token);
        if let Err(e) = self
            .dispatcher
            .send_password_reset_link(&user.email, &link)
            .await
        {
            tracing::error!(
                user_id = %user.id,
                error = %e,
                "Failed to deliver password reset link"
            );
        }

        tracing::info!(user_id = %user.id, "Password reset requested");
        Ok(link)
    }

    async fn complete_password_reset(
        &self,
        command: ResetPasswordCommand,
    ) -> Result<(), AccountError> {
        let id = self.subject(&command.token, TokenPurpose::PasswordReset)?;

        let holds_token = self
            .repository
            .find_by_id(&id)
            .await?
            .is_some_and(|user| user.holds_reset_token(&command.token));
        if !holds_token {
            tracing::warn!(user_id = %id, "Superseded or consumed reset token presented");
            return Err(AccountError::InvalidToken);
        }

        let new_password = Password::new(command.new_password)?;
        let password_hash = self.authenticator.hash_password(new_password.as_str())?;

        // The token may have been replaced or used while the hash was computed.
        if !self
            .repository
            .consume_reset_token(&id, &command.token, &password_hash)
            .await?
        {
            tracing::warn!(user_id = %id, "Reset token superseded during reset");
            return Err(AccountError::InvalidToken);
        }

        tracing::info!(user_id = %id, "Password reset completed");
        Ok(())
    }

    async fn change_password(
        &self,
        id: &UserId,
        command: ChangePasswordCommand,
    ) -> Result<(), AccountError> {
        let user = self.load(id).await?;

        if !self
            .authenticator
            .verify_password(&command.current_password, &user.password_hash)
        {
            tracing::warn!(user_id = %id, "Password change with incorrect current password");
            return Err(AccountError::InvalidCredentials);
        }

        let new_password = Password::new(command.new_password)?;
        let password_hash = self.authenticator.hash_password(new_password.as_str())?;
        self.repository.update_password(id, &password_hash).await?;

        tracing::info!(user_id = %id, "Password changed");
        Ok(())
    }

    async fn authenticate_session(&self, token: &str) -> Result<PublicUser, AccountError> {
        let id = self.subject(token, TokenPurpose::Session)?;

        self.repository
            .find_by_id(&id)
            .await?
            .map(|user| user.to_public())
            .ok_or_else(|| AccountError::Unauthenticated("account no longer exists".to_string()))
    }

    async fn get_user(&self, id: &UserId) -> Result<PublicUser, AccountError> {
        self.load(id).await.map(|user| user.to_public())
    }

    async fn update_profile(
        &self,
        id: &UserId,
        command: UpdateProfileCommand,
    ) -> Result<PublicUser, AccountError> {
        let updated_user = self.repository.update_profile(id, &command).await?;

        tracing::info!(user_id = %id, "Profile updated");
        Ok(updated_user.to_public())
    }

    async fn remove_profile_image(&self, id: &UserId) -> Result<(), AccountError> {
        self.repository.clear_profile_image(id).await
    }

    async fn delete_account(&self, id: &UserId) -> Result<(), AccountError> {
        self.repository.delete(id).await?;

        tracing::info!(user_id = %id, "Account deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use chrono::Duration;
    use chrono::NaiveDate;
    use mockall::mock;
    use tokio::sync::oneshot;

    use super::*;
    use crate::domain::account::errors::DispatchError;
    use crate::domain::account::errors::ErrorKind;
    use crate::domain::account::models::Description;
    use crate::domain::account::models::Username;
    use crate::outbound::notifications::LoggingLinkDispatcher;
    use crate::outbound::repositories::InMemoryUserRepository;

    const SECRET: &[u8] = b"test-secret-key-for-jwt-signing-at-least-32-bytes";

    mock! {
        pub TestUserRepository {}

        #[async_trait]
        impl UserRepository for TestUserRepository {
            async fn create(&self, user: User) -> Result<User, AccountError>;
            async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, AccountError>;
            async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<User>, AccountError>;
            async fn mark_verified(&self, id: &UserId) -> Result<bool, AccountError>;
            async fn set_reset_token(&self, id: &UserId, token: &str) -> Result<(), AccountError>;
            async fn consume_reset_token(&self, id: &UserId, token: &str, password_hash: &str) -> Result<bool, AccountError>;
            async fn update_password(&self, id: &UserId, password_hash: &str) -> Result<(), AccountError>;
            async fn update_profile(&self, id: &UserId, changes: &UpdateProfileCommand) -> Result<User, AccountError>;
            async fn clear_profile_image(&self, id: &UserId) -> Result<(), AccountError>;
            async fn delete(&self, id: &UserId) -> Result<(), AccountError>;
        }
    }

    mock! {
        pub TestLinkDispatcher {}

        #[async_trait]
        impl LinkDispatcher for TestLinkDispatcher {
            async fn send_verification_link(&self, email: &EmailAddress, link: &str) -> Result<(), DispatchError>;
            async fn send_password_reset_link(&self, email: &EmailAddress, link: &str) -> Result<(), DispatchError>;
        }
    }

    fn authenticator() -> Arc<Authenticator> {
        Arc::new(Authenticator::new(SECRET))
    }

    fn policy() -> AccountPolicy {
        AccountPolicy {
            verification_url: "http://localhost/verify-email".to_string(),
            reset_password_url: "http://localhost/reset-password".to_string(),
            protected_emails: vec!["admin@x.com".to_string()],
        }
    }

    fn service(
        repository: MockTestUserRepository,
        dispatcher: MockTestLinkDispatcher,
    ) -> AccountService<MockTestUserRepository, MockTestLinkDispatcher> {
        AccountService::new(
            Arc::new(repository),
            Arc::new(dispatcher),
            authenticator(),
            policy(),
        )
    }

    fn email(value: &str) -> EmailAddress {
        EmailAddress::new(value.to_string()).unwrap()
    }

    fn existing_user(password: &str, is_verified: bool) -> User {
        let hash = authenticator().hash_password(password).unwrap();
        let mut user = User::new(
            email("a@x.com"),
            Username::new("alice".to_string()).unwrap(),
            hash,
        );
        user.is_verified = is_verified;
        user
    }

    fn token_for(user: &User, purpose: TokenPurpose) -> String {
        authenticator().issue_token(user.id, purpose).unwrap()
    }

    #[tokio::test]
    async fn test_register_success() {
        let mut repository = MockTestUserRepository::new();
        let mut dispatcher = MockTestLinkDispatcher::new();

        repository
            .expect_find_by_email()
            .times(1)
            .returning(|_| Ok(None));
        repository
            .expect_create()
            .withf(|user| {
                user.email.as_str() == "a@x.com"
                    && user.username.as_str() == "alice"
                    && !user.is_verified
                    && user.reset_token.is_none()
                    && user.password_hash.starts_with("$argon2")
            })
            .times(1)
            .returning(Ok);
        dispatcher
            .expect_send_verification_link()
            .withf(|email, link| {
                email.as_str() == "a@x.com"
                    && link.starts_with("http://localhost/verify-email?token=")
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let service = service(repository, dispatcher);

        let command = RegisterCommand::new(
            email("a@x.com"),
            Username::new("alice".to_string()).unwrap(),
            Password::new("secret1".to_string()).unwrap(),
        );

        let user = service.register(command).await.unwrap();
        assert_eq!(user.email.as_str(), "a@x.com");
        assert!(!user.is_verified);
    }

    #[tokio::test]
    async fn test_register_duplicate_email() {
        let mut repository = MockTestUserRepository::new();
        let mut dispatcher = MockTestLinkDispatcher::new();

        let existing = existing_user("secret1", false);
        repository
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(existing.clone())));
        repository.expect_create().times(0);
        dispatcher.expect_send_verification_link().times(0);

        let service = service(repository, dispatcher);

        let command = RegisterCommand::new(
            email("a@x.com"),
            Username::new("someone-else".to_string()).unwrap(),
            Password::new("different".to_string()).unwrap(),
        );

        let err = service.register(command).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_register_store_level_conflict() {
        let mut repository = MockTestUserRepository::new();
        let mut dispatcher = MockTestLinkDispatcher::new();

        repository
            .expect_find_by_email()
            .times(1)
            .returning(|_| Ok(None));
        repository
            .expect_create()
            .times(1)
            .returning(|user| Err(AccountError::EmailAlreadyExists(user.email.to_string())));
        dispatcher.expect_send_verification_link().times(0);

        let service = service(repository, dispatcher);

        let command = RegisterCommand::new(
            email("a@x.com"),
            Username::new("alice".to_string()).unwrap(),
            Password::new("secret1".to_string()).unwrap(),
        );

        let err = service.register(command).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_register_survives_dispatch_failure() {
        let mut repository = MockTestUserRepository::new();
        let mut dispatcher = MockTestLinkDispatcher::new();

        repository
            .expect_find_by_email()
            .times(1)
            .returning(|_| Ok(None));
        repository.expect_create().times(1).returning(Ok);
        dispatcher
            .expect_send_verification_link()
            .times(1)
            .returning(|_, _| Err(DispatchError::DeliveryFailed("smtp down".to_string())));

        let service = service(repository, dispatcher);

        let command = RegisterCommand::new(
            email("a@x.com"),
            Username::new("alice".to_string()).unwrap(),
            Password::new("secret1".to_string()).unwrap(),
        );

        assert!(service.register(command).await.is_ok());
    }

    #[tokio::test]
    async fn test_verify_email_success() {
        let mut repository = MockTestUserRepository::new();
        let dispatcher = MockTestLinkDispatcher::new();

        let user = existing_user("secret1", false);
        let token = token_for(&user, TokenPurpose::EmailVerification);
        let user_id = user.id;

        repository
            .expect_find_by_id()
            .withf(move |id| *id == user_id)
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));
        repository
            .expect_mark_verified()
            .withf(move |id| *id == user_id)
            .times(1)
            .returning(|_| Ok(true));

        let service = service(repository, dispatcher);
        assert!(service.verify_email(&token).await.is_ok());
    }

    #[tokio::test]
    async fn test_verify_email_loses_race_to_other_verification() {
        let mut repository = MockTestUserRepository::new();
        let dispatcher = MockTestLinkDispatcher::new();

        let user = existing_user("secret1", false);
        let token = token_for(&user, TokenPurpose::EmailVerification);

        repository
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));
        repository
            .expect_mark_verified()
            .times(1)
            .returning(|_| Ok(false));

        let service = service(repository, dispatcher);

        let err = service.verify_email(&token).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyVerified);
    }

    #[tokio::test]
    async fn test_verify_email_already_verified() {
        let mut repository = MockTestUserRepository::new();
        let dispatcher = MockTestLinkDispatcher::new();

        let user = existing_user("secret1", true);
        let token = token_for(&user, TokenPurpose::EmailVerification);

        repository
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));
        repository.expect_mark_verified().times(0);

        let service = service(repository, dispatcher);

        let err = service.verify_email(&token).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyVerified);
    }

    #[tokio::test]
    async fn test_verify_email_rejects_garbage_token() {
        let mut repository = MockTestUserRepository::new();
        let dispatcher = MockTestLinkDispatcher::new();

        repository.expect_find_by_id().times(0);

        let service = service(repository, dispatcher);

        let err = service.verify_email("not.a.token").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidToken);
    }

    #[tokio::test]
    async fn test_verify_email_rejects_session_token() {
        let repository = MockTestUserRepository::new();
        let dispatcher = MockTestLinkDispatcher::new();

        let user = existing_user("secret1", false);
        let token = token_for(&user, TokenPurpose::Session);

        let service = service(repository, dispatcher);

        let err = service.verify_email(&token).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidToken);
    }

    #[tokio::test]
    async fn test_confirm_email_unknown_address() {
        let mut repository = MockTestUserRepository::new();
        let dispatcher = MockTestLinkDispatcher::new();

        repository
            .expect_find_by_email()
            .times(1)
            .returning(|_| Ok(None));

        let service = service(repository, dispatcher);

        let err = service.confirm_email(&email("nobody@x.com")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_login_success() {
        let mut repository = MockTestUserRepository::new();
        let dispatcher = MockTestLinkDispatcher::new();

        let user = existing_user("secret1", true);
        let user_id = user.id;
        repository
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));

        let service = service(repository, dispatcher);

        let session = service
            .login(LoginCommand {
                email: email("a@x.com"),
                password: "secret1".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(session.user.id, user_id);
        let subject = authenticator()
            .verify_token(&session.token, TokenPurpose::Session)
            .unwrap();
        assert_eq!(subject, user_id.to_string());
    }

    #[tokio::test]
    async fn test_login_unknown_email() {
        let mut repository = MockTestUserRepository::new();
        let dispatcher = MockTestLinkDispatcher::new();

        repository
            .expect_find_by_email()
            .times(1)
            .returning(|_| Ok(None));

        let service = service(repository, dispatcher);

        let err = service
            .login(LoginCommand {
                email: email("nobody@x.com"),
                password: "secret1".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_login_unverified_even_with_correct_password() {
        let mut repository = MockTestUserRepository::new();
        let dispatcher = MockTestLinkDispatcher::new();

        let user = existing_user("secret1", false);
        repository
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));

        let service = service(repository, dispatcher);

        let err = service
            .login(LoginCommand {
                email: email("a@x.com"),
                password: "secret1".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotVerified);
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let mut repository = MockTestUserRepository::new();
        let dispatcher = MockTestLinkDispatcher::new();

        let user = existing_user("secret1", true);
        repository
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));

        let service = service(repository, dispatcher);

        let err = service
            .login(LoginCommand {
                email: email("a@x.com"),
                password: "wrong".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadCredentials);
    }

    #[tokio::test]
    async fn test_login_with_malformed_stored_hash() {
        let mut repository = MockTestUserRepository::new();
        let dispatcher = MockTestLinkDispatcher::new();

        let mut user = existing_user("secret1", true);
        user.password_hash = "corrupted".to_string();
        repository
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));

        let service = service(repository, dispatcher);

        let err = service
            .login(LoginCommand {
                email: email("a@x.com"),
                password: "secret1".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadCredentials);
    }

    #[tokio::test]
    async fn test_request_password_reset_stores_token() {
        let mut repository = MockTestUserRepository::new();
        let mut dispatcher = MockTestLinkDispatcher::new();

        let user = existing_user("secret1", true);
        repository
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));
        repository
            .expect_set_reset_token()
            .withf(|_, token| !token.is_empty())
            .times(1)
            .returning(|_, _| Ok(()));
        dispatcher
            .expect_send_password_reset_link()
            .times(1)
            .returning(|_, _| Ok(()));

        let service = service(repository, dispatcher);

        let link = service
            .request_password_reset(&email("a@x.com"))
            .await
            .unwrap();
        assert!(link.starts_with("http://localhost/reset-password?token="));
    }

    #[tokio::test]
    async fn test_request_password_reset_protected_email() {
        let mut repository = MockTestUserRepository::new();
        let mut dispatcher = MockTestLinkDispatcher::new();

        repository.expect_find_by_email().times(0);
        repository.expect_set_reset_token().times(0);
        dispatcher.expect_send_password_reset_link().times(0);

        let service = service(repository, dispatcher);

        let err = service
            .request_password_reset(&email("admin@x.com"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn test_request_password_reset_unknown_email() {
        let mut repository = MockTestUserRepository::new();
        let dispatcher = MockTestLinkDispatcher::new();

        repository
            .expect_find_by_email()
            .times(1)
            .returning(|_| Ok(None));

        let service = service(repository, dispatcher);

        let err = service
            .request_password_reset(&email("nobody@x.com"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_complete_password_reset_clears_token() {
        let mut repository = MockTestUserRepository::new();
        let dispatcher = MockTestLinkDispatcher::new();

        let mut user = existing_user("secret1", true);
        let token = token_for(&user, TokenPurpose::PasswordReset);
        user.reset_token = Some(token.clone());
        let stored = token.clone();

        repository
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));
        repository
            .expect_consume_reset_token()
            .withf(move |_, token, password_hash| {
                token == stored && authenticator().verify_password("newpass1", password_hash)
            })
            .times(1)
            .returning(|_, _, _| Ok(true));

        let service = service(repository, dispatcher);

        let result = service
            .complete_password_reset(ResetPasswordCommand {
                token,
                new_password: "newpass1".to_string(),
            })
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_complete_password_reset_token_replaced_before_write() {
        let mut repository = MockTestUserRepository::new();
        let dispatcher = MockTestLinkDispatcher::new();

        let mut user = existing_user("secret1", true);
        let token = token_for(&user, TokenPurpose::PasswordReset);
        user.reset_token = Some(token.clone());

        repository
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));
        repository
            .expect_consume_reset_token()
            .times(1)
            .returning(|_, _, _| Ok(false));

        let service = service(repository, dispatcher);

        let err = service
            .complete_password_reset(ResetPasswordCommand {
                token,
                new_password: "newpass1".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidToken);
    }

    #[tokio::test]
    async fn test_complete_password_reset_superseded_token() {
        let mut repository = MockTestUserRepository::new();
        let dispatcher = MockTestLinkDispatcher::new();

        let mut user = existing_user("secret1", true);
        let stale = token_for(&user, TokenPurpose::PasswordReset);
        user.reset_token = Some(token_for(&user, TokenPurpose::PasswordReset));

        repository
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));
        repository.expect_consume_reset_token().times(0);

        let service = service(repository, dispatcher);

        let err = service
            .complete_password_reset(ResetPasswordCommand {
                token: stale,
                new_password: "newpass1".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidToken);
    }

    #[tokio::test]
    async fn test_complete_password_reset_expired_token() {
        let mut repository = MockTestUserRepository::new();
        let dispatcher = MockTestLinkDispatcher::new();

        let mut user = existing_user("secret1", true);
        let expired = authenticator()
            .issue_token_with_ttl(user.id, TokenPurpose::PasswordReset, Duration::seconds(-1))
            .unwrap();
        user.reset_token = Some(expired.clone());

        repository.expect_find_by_id().times(0);
        repository.expect_consume_reset_token().times(0);

        let service = service(repository, dispatcher);

        let err = service
            .complete_password_reset(ResetPasswordCommand {
                token: expired,
                new_password: "newpass1".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidToken);
    }

    #[tokio::test]
    async fn test_complete_password_reset_short_password() {
        let mut repository = MockTestUserRepository::new();
        let dispatcher = MockTestLinkDispatcher::new();

        let mut user = existing_user("secret1", true);
        let token = token_for(&user, TokenPurpose::PasswordReset);
        user.reset_token = Some(token.clone());

        repository
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));
        repository.expect_consume_reset_token().times(0);

        let service = service(repository, dispatcher);

        let err = service
            .complete_password_reset(ResetPasswordCommand {
                token,
                new_password: "short".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_change_password_wrong_current() {
        let mut repository = MockTestUserRepository::new();
        let dispatcher = MockTestLinkDispatcher::new();

        let user = existing_user("secret1", true);
        let user_id = user.id;
        repository
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));
        repository.expect_update_password().times(0);

        let service = service(repository, dispatcher);

        let err = service
            .change_password(
                &user_id,
                ChangePasswordCommand {
                    current_password: "wrong".to_string(),
                    new_password: "newpass1".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadCredentials);
    }

    #[tokio::test]
    async fn test_change_password_writes_only_hash() {
        let mut repository = MockTestUserRepository::new();
        let dispatcher = MockTestLinkDispatcher::new();

        let mut user = existing_user("secret1", true);
        user.reset_token = Some("outstanding".to_string());
        let user_id = user.id;
        repository
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));
        repository
            .expect_update_password()
            .withf(move |id, password_hash| {
                *id == user_id && authenticator().verify_password("newpass1", password_hash)
            })
            .times(1)
            .returning(|_, _| Ok(()));
        repository.expect_set_reset_token().times(0);
        repository.expect_consume_reset_token().times(0);

        let service = service(repository, dispatcher);

        let result = service
            .change_password(
                &user_id,
                ChangePasswordCommand {
                    current_password: "secret1".to_string(),
                    new_password: "newpass1".to_string(),
                },
            )
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_change_password_too_short() {
        let mut repository = MockTestUserRepository::new();
        let dispatcher = MockTestLinkDispatcher::new();

        let user = existing_user("secret1", true);
        let user_id = user.id;
        repository
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));
        repository.expect_update_password().times(0);

        let service = service(repository, dispatcher);

        let err = service
            .change_password(
                &user_id,
                ChangePasswordCommand {
                    current_password: "secret1".to_string(),
                    new_password: "abc".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_authenticate_session_deleted_user() {
        let mut repository = MockTestUserRepository::new();
        let dispatcher = MockTestLinkDispatcher::new();

        let user = existing_user("secret1", true);
        let token = token_for(&user, TokenPurpose::Session);
        repository
            .expect_find_by_id()
            .times(1)
            .returning(|_| Ok(None));

        let service = service(repository, dispatcher);

        let err = service.authenticate_session(&token).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthenticated);
    }

    #[tokio::test]
    async fn test_authenticate_session_rejects_reset_token() {
        let repository = MockTestUserRepository::new();
        let dispatcher = MockTestLinkDispatcher::new();

        let user = existing_user("secret1", true);
        let token = token_for(&user, TokenPurpose::PasswordReset);

        let service = service(repository, dispatcher);

        let err = service.authenticate_session(&token).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidToken);
    }

    #[tokio::test]
    async fn test_update_profile_applies_only_provided_fields() {
        let mut repository = MockTestUserRepository::new();
        let dispatcher = MockTestLinkDispatcher::new();

        let mut user = existing_user("secret1", true);
        user.profile.description = "old bio".to_string();
        let user_id = user.id;
        repository.expect_find_by_id().times(0);
        repository
            .expect_update_profile()
            .withf(|_, changes| {
                changes.username.is_none()
                    && changes.description.is_none()
                    && changes.birth_date == NaiveDate::from_ymd_opt(1990, 5, 17)
            })
            .times(1)
            .returning(move |_, changes| {
                let mut stored = user.clone();
                stored.profile.birth_date = changes.birth_date;
                Ok(stored)
            });

        let service = service(repository, dispatcher);

        let command = UpdateProfileCommand {
            birth_date: NaiveDate::from_ymd_opt(1990, 5, 17),
            ..UpdateProfileCommand::default()
        };

        let user = service.update_profile(&user_id, command).await.unwrap();
        assert_eq!(user.profile.birth_date, NaiveDate::from_ymd_opt(1990, 5, 17));
        assert_eq!(user.profile.description, "old bio");
    }

    #[tokio::test]
    async fn test_update_profile_sets_username_and_description() {
        let mut repository = MockTestUserRepository::new();
        let dispatcher = MockTestLinkDispatcher::new();

        let user = existing_user("secret1", true);
        let user_id = user.id;
        repository
            .expect_update_profile()
            .times(1)
            .returning(move |_, changes| {
                let mut stored = user.clone();
                if let Some(username) = &changes.username {
                    stored.username = username.clone();
                }
                if let Some(description) = &changes.description {
                    stored.profile.description = description.as_str().to_string();
                }
                Ok(stored)
            });

        let service = service(repository, dispatcher);

        let command = UpdateProfileCommand {
            username: Some(Username::new("alice2".to_string()).unwrap()),
            description: Some(Description::new("Loves maps".to_string()).unwrap()),
            birth_date: None,
        };

        let user = service.update_profile(&user_id, command).await.unwrap();
        assert_eq!(user.username.as_str(), "alice2");
        assert_eq!(user.profile.description, "Loves maps");
        assert_eq!(user.profile.birth_date, None);
    }

    #[tokio::test]
    async fn test_remove_profile_image() {
        let mut repository = MockTestUserRepository::new();
        let dispatcher = MockTestLinkDispatcher::new();

        let user_id = UserId::new();
        repository
            .expect_clear_profile_image()
            .withf(move |id| *id == user_id)
            .times(1)
            .returning(|_| Ok(()));

        let service = service(repository, dispatcher);
        assert!(service.remove_profile_image(&user_id).await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_account_not_found() {
        let mut repository = MockTestUserRepository::new();
        let dispatcher = MockTestLinkDispatcher::new();

        let user_id = UserId::new();
        repository
            .expect_delete()
            .times(1)
            .returning(move |_| Err(AccountError::NotFound(user_id.to_string())));

        let service = service(repository, dispatcher);

        let err = service.delete_account(&user_id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    /// In-memory store whose next `set_reset_token` waits until released.
    #[derive(Default)]
    struct PausingUserRepository {
        inner: InMemoryUserRepository,
        pause: StdMutex<Option<(oneshot::Sender<()>, oneshot::Receiver<()>)>>,
    }

    impl PausingUserRepository {
        /// Returns a receiver signalled when the write is reached and a sender that lets it proceed.
        fn pause_next_reset_token_write(&self) -> (oneshot::Receiver<()>, oneshot::Sender<()>) {
            let (reached_tx, reached_rx) = oneshot::channel();
            let (release_tx, release_rx) = oneshot::channel();
            *self.pause.lock().unwrap() = Some((reached_tx, release_rx));
            (reached_rx, release_tx)
        }
    }

    #[async_trait]
    impl UserRepository for PausingUserRepository {
        async fn create(&self, user: User) -> Result<User, AccountError> {
            self.inner.create(user).await
        }

        async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, AccountError> {
            self.inner.find_by_id(id).await
        }

        async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<User>, AccountError> {
            self.inner.find_by_email(email).await
        }

        async fn mark_verified(&self, id: &UserId) -> Result<bool, AccountError> {
            self.inner.mark_verified(id).await
        }

        async fn set_reset_token(&self, id: &UserId, token: &str) -> Result<(), AccountError> {
            let pause = self.pause.lock().unwrap().take();
            if let Some((reached, release)) = pause {
                let _ = reached.send(());
                let _ = release.await;
            }
            self.inner.set_reset_token(id, token).await
        }

        async fn consume_reset_token(
            &self,
            id: &UserId,
            token: &str,
            password_hash: &str,
        ) -> Result<bool, AccountError> {
            self.inner.consume_reset_token(id, token, password_hash).await
        }

        async fn update_password(&self, id: &UserId, password_hash: &str) -> Result<(), AccountError> {
            self.inner.update_password(id, password_hash).await
        }

        async fn update_profile(
            &self,
            id: &UserId,
            changes: &UpdateProfileCommand,
        ) -> Result<User, AccountError> {
            self.inner.update_profile(id, changes).await
        }

        async fn clear_profile_image(&self, id: &UserId) -> Result<(), AccountError> {
            self.inner.clear_profile_image(id).await
        }

        async fn delete(&self, id: &UserId) -> Result<(), AccountError> {
            self.inner.delete(id).await
        }
    }

    fn reset_token_of(link: &str) -> String {
        link.split_once("?token=").unwrap().1.to_string()
    }

    fn login_command(password: &str) -> LoginCommand {
        LoginCommand {
            email: email("a@x.com"),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_reset_request_racing_completion_keeps_new_password() {
        let repository = Arc::new(PausingUserRepository::default());
        let service = Arc::new(AccountService::new(
            Arc::clone(&repository),
            Arc::new(LoggingLinkDispatcher::new()),
            authenticator(),
            policy(),
        ));

        service
            .register(RegisterCommand::new(
                email("a@x.com"),
                Username::new("alice".to_string()).unwrap(),
                Password::new("secret1".to_string()).unwrap(),
            ))
            .await
            .unwrap();
        service.confirm_email(&email("a@x.com")).await.unwrap();

        let first_link = service.request_password_reset(&email("a@x.com")).await.unwrap();

        // A second request reads the account, then stalls before storing its token.
        let (reached, release) = repository.pause_next_reset_token_write();
        let second_request = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.request_password_reset(&email("a@x.com")).await })
        };
        reached.await.unwrap();

        service
            .complete_password_reset(ResetPasswordCommand {
                token: reset_token_of(&first_link),
                new_password: "newpass1".to_string(),
            })
            .await
            .unwrap();

        release.send(()).unwrap();
        let second_link = second_request.await.unwrap().unwrap();

        assert!(service.login(login_command("newpass1")).await.is_ok());
        let err = service.login(login_command("secret1")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadCredentials);

        // The late request still leaves a working reset token behind.
        service
            .complete_password_reset(ResetPasswordCommand {
                token: reset_token_of(&second_link),
                new_password: "newpass2".to_string(),
            })
            .await
            .unwrap();
        assert!(service.login(login_command("newpass2")).await.is_ok());
    }
}
