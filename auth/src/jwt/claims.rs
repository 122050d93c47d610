use chrono::Duration;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use super::purpose::TokenPurpose;

/// JWT payload for every token the service issues.
///
/// `jti` is random per token, so two tokens for the same user and purpose
/// issued within the same second still differ textually.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// Subject (user identifier)
    pub sub: String,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// JWT ID (unique token identifier)
    pub jti: String,

    /// Flow the token was minted for
    pub purpose: TokenPurpose,
}

impl Claims {
    /// Create claims that expire `ttl` from now.
    ///
    /// A negative `ttl` produces claims that are already expired.
    ///
    /// # Arguments
    /// * `subject` - Unique user identifier
    /// * `purpose` - Flow the token authorizes
    /// * `ttl` - Validity window measured from now
    pub fn new(subject: impl ToString, purpose: TokenPurpose, ttl: Duration) -> Self {
        let now = Utc::now();
        let expiration = now + ttl;

        Self {
            sub: subject.to_string(),
            exp: expiration.timestamp(),
            iat: now.timestamp(),
            jti: Uuid::new_v4().to_string(),
            purpose,
        }
    }

    /// Check if the token is expired at `current_timestamp`.
    ///
    /// A token is dead from its `exp` second onward.
    pub fn is_expired(&self, current_timestamp: i64) -> bool {
        self.exp <= current_timestamp
    }
}
