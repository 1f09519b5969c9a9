use thiserror::Error;

/// Start-up configuration failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid configuration: {0}")]
    Invalid(#[from] Box<figment::Error>),
}

/// Failures reported by the auth service.
///
/// The variants mirror the handful of cases the login and signup pages word
/// differently; everything else lands in [`AuthError::Service`].
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("incorrect email or password")]
    InvalidCredentials,

    #[error("user has not confirmed their email")]
    UserNotConfirmed,

    #[error("no account for this email")]
    UserNotFound,

    #[error("an account with this email already exists")]
    UserExists,

    #[error("password does not satisfy the pool policy")]
    InvalidPassword,

    #[error("invalid email or password format")]
    InvalidParameter,

    #[error("password reset required")]
    PasswordResetRequired,

    #[error("too many requests")]
    TooManyRequests,

    #[error("access token expired or revoked")]
    SessionExpired,

    #[error("auth service returned no authentication result")]
    MissingResult,

    #[error("auth service error: {0}")]
    Service(String),
}

impl AuthError {
    /// Message safe to show on the login/signup forms.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "Incorrect email or password",
            Self::UserNotConfirmed => "Please verify your email before logging in",
            Self::UserNotFound => "No account found with this email",
            Self::UserExists => "An account with this email already exists",
            Self::InvalidPassword => {
                "Password must contain at least 8 characters with uppercase, lowercase, number, and special character"
            }
            Self::InvalidParameter => "Invalid email or password format",
            Self::PasswordResetRequired => "Password reset required",
            Self::TooManyRequests => "Too many attempts. Please try again later",
            Self::SessionExpired => "Your session has expired. Please log in again",
            Self::MissingResult | Self::Service(_) => "Something went wrong. Please try again",
        }
    }

    /// Whether the failure means the presented token is no longer usable.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired | Self::InvalidCredentials)
    }
}

/// Failures from the record store. Callers treat every variant alike.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{operation} on {table} failed: {message}")]
    Service {
        operation: &'static str,
        table: String,
        message: String,
    },

    #[error("record {id} not found in {table}")]
    NotFound { table: String, id: String },

    #[error("record {id} already exists in {table}")]
    Conflict { table: String, id: String },

    #[error("record in {table} has a missing or malformed `{field}`")]
    Corrupt { table: String, field: &'static str },

    #[error("failed to encode document: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Rejections of a submitted positioning document.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("document is not valid editor JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("document is {size} bytes, the limit is {max}")]
    TooLarge { size: usize, max: usize },

    #[error("heading level {0} is not enabled")]
    HeadingLevel(u8),

    #[error("`{child}` is not allowed inside `{parent}`")]
    InvalidChild {
        parent: &'static str,
        child: &'static str,
    },

    #[error("`{0}` needs at least one child")]
    EmptyContainer(&'static str),

    #[error("text nodes must not be empty")]
    EmptyText,
}

/// Brand form problems shown next to the create form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrandFormError {
    #[error("Brand name is required")]
    NameRequired,

    #[error("Logo URL must start with http:// or https://")]
    InvalidLogoUrl,
}
