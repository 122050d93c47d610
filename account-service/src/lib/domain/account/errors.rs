use thiserror::Error;

/// Error for UserId parsing failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UserIdError {
    #[error("Invalid UUID format: {0}")]
    InvalidFormat(String),
}

/// Error for Username validation failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UsernameError {
    #[error("Username is required")]
    Empty,

    #[error("Username too long: maximum {max} characters, got {actual}")]
    TooLong { max: usize, actual: usize },
}

/// Error for EmailAddress validation failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EmailError {
    #[error("Invalid email format: {0}")]
    InvalidFormat(String),
}

/// Error for password policy violations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PasswordPolicyError {
    #[error("Password must be at least {min} characters long")]
    TooShort { min: usize },
}

/// Error for profile description validation failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DescriptionError {
    #[error("Description too long: maximum {max} characters, got {actual}")]
    TooLong { max: usize, actual: usize },
}

/// Error for link delivery
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    #[error("Failed to deliver link: {0}")]
    DeliveryFailed(String),
}

/// Failure taxonomy exposed to callers.
///
/// Every [`AccountError`] maps onto exactly one kind, so callers can branch on
/// the cause without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Conflict,
    NotFound,
    BadCredentials,
    NotVerified,
    AlreadyVerified,
    InvalidToken,
    Unauthenticated,
    Forbidden,
    Internal,
}

/// Top-level error for all account operations
#[derive(Debug, Clone, Error)]
pub enum AccountError {
    // Value object validation errors (automatically converted via #[from])
    #[error("Invalid user ID: {0}")]
    InvalidUserId(#[from] UserIdError),

    #[error("Invalid username: {0}")]
    InvalidUsername(#[from] UsernameError),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("Invalid password: {0}")]
    InvalidPassword(#[from] PasswordPolicyError),

    #[error("Invalid description: {0}")]
    InvalidDescription(#[from] DescriptionError),

    #[error("Missing required field: {0}")]
    MissingField(String),

    // Domain-level errors
    #[error("User already exists: {0}")]
    EmailAlreadyExists(String),

    #[error("User not found: {0}")]
    NotFound(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Please verify your email before logging in")]
    NotVerified,

    #[error("Email is already verified")]
    AlreadyVerified,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Authentication required: {0}")]
    Unauthenticated(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    // Infrastructure errors
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl AccountError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AccountError::InvalidUserId(_)
            | AccountError::InvalidUsername(_)
            | AccountError::InvalidEmail(_)
            | AccountError::InvalidPassword(_)
            | AccountError::InvalidDescription(_)
            | AccountError::MissingField(_) => ErrorKind::Validation,
            AccountError::EmailAlreadyExists(_) => ErrorKind::Conflict,
            AccountError::NotFound(_) => ErrorKind::NotFound,
            AccountError::InvalidCredentials => ErrorKind::BadCredentials,
            AccountError::NotVerified => ErrorKind::NotVerified,
            AccountError::AlreadyVerified => ErrorKind::AlreadyVerified,
            AccountError::InvalidToken => ErrorKind::InvalidToken,
            AccountError::Unauthenticated(_) => ErrorKind::Unauthenticated,
            AccountError::Forbidden(_) => ErrorKind::Forbidden,
            AccountError::DatabaseError(_) | AccountError::Unknown(_) => ErrorKind::Internal,
        }
    }
}

impl From<auth::PasswordError> for AccountError {
    fn from(err: auth::PasswordError) -> Self {
        AccountError::Unknown(err.to_string())
    }
}

impl From<auth::JwtError> for AccountError {
    fn from(err: auth::JwtError) -> Self {
        match err {
            auth::JwtError::InvalidToken => AccountError::InvalidToken,
            auth::JwtError::EncodingFailed(_) => AccountError::Unknown(err.to_string()),
        }
    }
}
