//! Authentication primitives
//!
//! - Password hashing (Argon2id)
//! - Purpose-bound, time-limited JWT tokens (session, email verification, password reset)
//! - An `Authenticator` coordinating both
//!
//! Verification failures are deliberately undifferentiated: a forged, expired,
//! malformed or wrong-purpose token all surface as `JwtError::InvalidToken`.
//!
//! # Examples
//!
//! ## Password Hashing
//! ```
//! use auth::PasswordHasher;
//!
//! let hasher = PasswordHasher::new();
//! let hash = hasher.hash("my_password").unwrap();
//! assert!(hasher.verify("my_password", &hash));
//! assert!(!hasher.verify("my_password", "not-a-phc-string"));
//! ```
//!
//! ## Tokens
//! ```
//! use auth::{Authenticator, JwtError, TokenPurpose};
//!
//! let auth = Authenticator::new(b"secret_key_at_least_32_bytes_long!");
//!
//! let token = auth.issue_token("user123", TokenPurpose::PasswordReset).unwrap();
//! assert_eq!(auth.verify_token(&token, TokenPurpose::PasswordReset).unwrap(), "user123");
//! assert_eq!(
//!     auth.verify_token(&token, TokenPurpose::Session),
//!     Err(JwtError::InvalidToken)
//! );
//! ```
//!
//! ## Login
//! ```
//! use auth::{Authenticator, TokenPurpose};
//!
//! let auth = Authenticator::new(b"secret_key_at_least_32_bytes_long!");
//! let hash = auth.hash_password("password123").unwrap();
//!
//! let result = auth.authenticate("password123", &hash, "user123").unwrap();
//! let subject = auth.verify_token(&result.access_token, TokenPurpose::Session).unwrap();
//! assert_eq!(subject, "user123");
//! ```

pub mod authenticator;
pub mod jwt;
pub mod password;

pub use authenticator::AuthenticationError;
pub use authenticator::AuthenticationResult;
pub use authenticator::Authenticator;
pub use jwt::Claims;
pub use jwt::JwtError;
pub use jwt::JwtHandler;
pub use jwt::TokenLifetimes;
pub use jwt::TokenPurpose;
pub use password::PasswordError;
pub use password::PasswordHasher;
