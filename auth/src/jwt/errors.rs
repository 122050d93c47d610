use thiserror::Error;

/// Error type for JWT operations.
///
/// Every verification failure (forged, expired, malformed, issued for another
/// purpose) is reported as the same `InvalidToken` so callers cannot tell why a
/// token was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JwtError {
    #[error("Failed to encode token: {0}")]
    EncodingFailed(String),

    #[error("Invalid or expired token")]
    InvalidToken,
}
