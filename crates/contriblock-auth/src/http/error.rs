/*
[INPUT]:  Error sources (wallet, HTTP, API, serialization, session storage)
[OUTPUT]: Structured auth error taxonomy plus a stable tag for the UI error slot
[POS]:    Error handling layer - unified error types for entire crate
[UPDATE]: When adding new error sources or changing how errors surface to the UI
*/

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for ContriBlock authentication
#[derive(Error, Debug)]
pub enum AuthError {
    /// No wallet extension is injected
    #[error("No wallet provider detected")]
    ProviderUnavailable,

    /// A wallet is present but it is not the expected provider
    #[error("Wallet provider is not MetaMask")]
    WrongProvider,

    /// The wallet holder declined the request
    #[error("Request was rejected in the wallet")]
    UserRejected,

    /// Nonce/verify/user request failed in transit or timed out
    #[error("Network error: {0}")]
    Network(String),

    /// Credentials, signature or nonce were refused (HTTP 401)
    #[error("Authentication rejected: {0}")]
    AuthRejected(String),

    /// Malformed input (empty address, bad nonce, unparsable message)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Another login or restore is still in flight
    #[error("A login attempt is already in progress")]
    LoginInProgress,

    /// The attempt finished after logout or abandonment; its result was discarded
    #[error("Login attempt was superseded")]
    Superseded,

    /// API returned a non-success status other than 400/401
    #[error("API error (code {code}): {message}")]
    Api { code: u16, message: String },

    /// Response body did not match the expected shape
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Wallet failed for a reason other than user rejection
    #[error("Wallet error: {0}")]
    Wallet(String),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Session store could not be written or cleared
    #[error("Session storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AuthError::InvalidResponse(err.to_string())
        } else {
            AuthError::Network(err.to_string())
        }
    }
}

/// Stable tag of the single user-facing error slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    #[serde(rename = "metamask_not_installed")]
    ProviderUnavailable,
    #[serde(rename = "not_metamask")]
    WrongProvider,
    UserRejected,
    NetworkError,
    AuthRejected,
    InvalidInput,
    LoginInProgress,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ProviderUnavailable => "metamask_not_installed",
            ErrorKind::WrongProvider => "not_metamask",
            ErrorKind::UserRejected => "user_rejected",
            ErrorKind::NetworkError => "network_error",
            ErrorKind::AuthRejected => "auth_rejected",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::LoginInProgress => "login_in_progress",
            ErrorKind::Internal => "internal",
        }
    }
}

/// Cloneable view of an error as stored in the controller's error slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&AuthError> for AuthErrorInfo {
    fn from(err: &AuthError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::ProviderUnavailable => ErrorKind::ProviderUnavailable,
            AuthError::WrongProvider => ErrorKind::WrongProvider,
            AuthError::UserRejected => ErrorKind::UserRejected,
            AuthError::Network(_) | AuthError::Api { .. } | AuthError::InvalidResponse(_) => {
                ErrorKind::NetworkError
            }
            AuthError::AuthRejected(_) => ErrorKind::AuthRejected,
            AuthError::InvalidInput(_) => ErrorKind::InvalidInput,
            AuthError::LoginInProgress => ErrorKind::LoginInProgress,
            AuthError::Superseded
            | AuthError::Wallet(_)
            | AuthError::Serialization(_)
            | AuthError::UrlParse(_)
            | AuthError::Storage(_)
            | AuthError::Config(_) => ErrorKind::Internal,
        }
    }

    /// Check if the server refused the credentials
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self, AuthError::AuthRejected(_))
    }

    /// Superseded attempts are discarded silently and never reach the UI
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, AuthError::Superseded)
    }

    /// Create an API error from status code and message
    pub fn api_error(status: StatusCode, message: impl Into<String>) -> Self {
        AuthError::Api {
            code: status.as_u16(),
            message: message.into(),
        }
    }
}

/// Result type alias for ContriBlock auth operations
pub type Result<T> = std::result::Result<T, AuthError>;
