use chrono::Duration;
use serde::Deserialize;
use serde::Serialize;

/// What a token was issued for.
///
/// Carried inside the signed claims so a token minted for one flow cannot be
/// replayed against another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    Session,
    EmailVerification,
    PasswordReset,
}

impl TokenPurpose {
    /// Built-in lifetime for this purpose.
    ///
    /// Session: 7 days. Email verification: 1 day. Password reset: 15 minutes.
    pub fn default_ttl(self) -> Duration {
        match self {
            TokenPurpose::Session => Duration::days(7),
            TokenPurpose::EmailVerification => Duration::days(1),
            TokenPurpose::PasswordReset => Duration::minutes(15),
        }
    }
}

/// Per-purpose token lifetimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenLifetimes {
    pub session: Duration,
    pub email_verification: Duration,
    pub password_reset: Duration,
}

impl TokenLifetimes {
    pub fn for_purpose(&self, purpose: TokenPurpose) -> Duration {
        match purpose {
            TokenPurpose::Session => self.session,
            TokenPurpose::EmailVerification => self.email_verification,
            TokenPurpose::PasswordReset => self.password_reset,
        }
    }
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self {
            session: TokenPurpose::Session.default_ttl(),
            email_verification: TokenPurpose::EmailVerification.default_ttl(),
            password_reset: TokenPurpose::PasswordReset.default_ttl(),
        }
    }
}
