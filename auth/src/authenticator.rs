use chrono::Duration;
use chrono::Utc;

use crate::jwt::Claims;
use crate::jwt::JwtError;
use crate::jwt::JwtHandler;
use crate::jwt::TokenLifetimes;
use crate::jwt::TokenPurpose;
use crate::password::PasswordError;
use crate::password::PasswordHasher;

/// Authentication coordinator combining password hashing and token handling.
///
/// Issues and verifies purpose-bound tokens whose lifetimes come from
/// [`TokenLifetimes`].
pub struct Authenticator {
    password_hasher: PasswordHasher,
    jwt_handler: JwtHandler,
    lifetimes: TokenLifetimes,
}

/// Result of successful authentication.
#[derive(Debug, Clone)]
pub struct AuthenticationResult {
    /// Session token
    pub access_token: String,
}

/// Authentication operation errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthenticationError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("JWT error: {0}")]
    JwtError(#[from] JwtError),
}

impl Authenticator {
    /// Create a new authenticator with the built-in token lifetimes.
    ///
    /// # Arguments
    /// * `jwt_secret` - Secret key for JWT signing
    pub fn new(jwt_secret: &[u8]) -> Self {
        Self::with_lifetimes(jwt_secret, TokenLifetimes::default())
    }

    /// Create a new authenticator with explicit token lifetimes.
    pub fn with_lifetimes(jwt_secret: &[u8], lifetimes: TokenLifetimes) -> Self {
        Self {
            password_hasher: PasswordHasher::new(),
            jwt_handler: JwtHandler::new(jwt_secret),
            lifetimes,
        }
    }

    /// Hash a password for storage.
    ///
    /// # Errors
    /// * `PasswordError` - Hashing operation failed
    pub fn hash_password(&self, password: &str) -> Result<String, PasswordError> {
        self.password_hasher.hash(password)
    }

    /// Check a plaintext password against a stored hash.
    pub fn verify_password(&self, password: &str, stored_hash: &str) -> bool {
        self.password_hasher.verify(password, stored_hash)
    }

    /// Verify credentials and issue a session token.
    ///
    /// # Arguments
    /// * `password` - Plaintext password to verify
    /// * `stored_hash` - Stored password hash
    /// * `subject` - User identifier to embed in the token
    ///
    /// # Errors
    /// * `InvalidCredentials` - Password does not match
    /// * `JwtError` - Token generation failed
    pub fn authenticate(
        &self,
        password: &str,
        stored_hash: &str,
        subject: impl ToString,
    ) -> Result<AuthenticationResult, AuthenticationError> {
        if !self.verify_password(password, stored_hash) {
            return Err(AuthenticationError::InvalidCredentials);
        }

        let access_token = self.issue_token(subject, TokenPurpose::Session)?;

        Ok(AuthenticationResult { access_token })
    }

    /// Issue a token for `purpose` with its configured lifetime.
    ///
    /// # Errors
    /// * `EncodingFailed` - Token generation failed
    pub fn issue_token(
        &self,
        subject: impl ToString,
        purpose: TokenPurpose,
    ) -> Result<String, JwtError> {
        self.issue_token_with_ttl(subject, purpose, self.lifetimes.for_purpose(purpose))
    }

    /// Issue a token for `purpose` with an explicit lifetime.
    ///
    /// # Errors
    /// * `EncodingFailed` - Token generation failed
    pub fn issue_token_with_ttl(
        &self,
        subject: impl ToString,
        purpose: TokenPurpose,
        ttl: Duration,
    ) -> Result<String, JwtError> {
        self.jwt_handler.encode(&Claims::new(subject, purpose, ttl))
    }

    /// Validate a token and return its subject.
    ///
    /// A token whose `exp` is at or before the current second is expired.
    ///
    /// # Errors
    /// * `InvalidToken` - Forged, expired, malformed, or minted for another purpose
    pub fn verify_token(&self, token: &str, purpose: TokenPurpose) -> Result<String, JwtError> {
        let claims: Claims = self.jwt_handler.decode(token)?;

        if claims.purpose != purpose || claims.is_expired(Utc::now().timestamp()) {
            return Err(JwtError::InvalidToken);
        }

        Ok(claims.sub)
    }
}
