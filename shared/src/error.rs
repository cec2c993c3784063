//! Error types for the insights gateway.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Reasons a bearer credential can be refused.
///
/// Every variant surfaces to the caller as the same 401; the variant is only
/// ever logged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No bearer credential was presented
    #[error("no bearer credential supplied")]
    Missing,

    /// Credential could not be parsed or decoded
    #[error("malformed credential: {0}")]
    Malformed(String),

    /// Credential is well formed but past its expiry
    #[error("credential expired")]
    Expired,

    /// Credential was tampered with or signed by another key
    #[error("credential signature invalid")]
    SignatureInvalid,

    /// Anything the validator did not anticipate
    #[error("credential rejected: {0}")]
    Unknown(String),
}

impl AuthError {
    /// Short, stable label used in log fields.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::Missing => "missing",
            AuthError::Malformed(_) => "malformed",
            AuthError::Expired => "expired",
            AuthError::SignatureInvalid => "signature_invalid",
            AuthError::Unknown(_) => "unknown",
        }
    }
}

/// Errors that can occur while serving a gateway request.
#[derive(Error, Debug)]
pub enum Error {
    /// Authentication error
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Authorization error (valid identity, insufficient role)
    #[error("Authorization error: {0}")]
    Forbidden(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found error
    #[error("Not found: {0}")]
    NotFound(String),

    /// Route exists but not for this method
    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    /// A downstream collaborator failed
    #[error("Collaborator error: {0}")]
    Collaborator(String),

    /// A downstream collaborator did not answer in time
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// AWS SDK error
    #[error("AWS error: {0}")]
    Aws(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Validation(_) => 400,
            Error::Auth(_) => 401,
            Error::Forbidden(_) => 403,
            Error::NotFound(_) => 404,
            Error::MethodNotAllowed(_) => 405,
            _ => 500,
        }
    }

    /// Message that is safe to return across the trust boundary.
    ///
    /// The full `Display` text stays in the server logs.
    pub fn public_message(&self) -> String {
        match self {
            Error::Auth(AuthError::Missing) => "Not authenticated".to_string(),
            Error::Auth(_) => "Invalid authentication credentials".to_string(),
            Error::Forbidden(_) => "Admin access required".to_string(),
            Error::Validation(message) => message.clone(),
            Error::NotFound(_) => "Not found".to_string(),
            Error::MethodNotAllowed(_) => "Method not allowed".to_string(),
            _ => "Internal server error".to_string(),
        }
    }
}
