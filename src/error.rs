use thiserror::Error;

/// Failures surfaced to whoever called `login`. The display text is what the
/// login form shows the user.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Email and password are required")]
    MissingCredentials,
    #[error("{0}")]
    Rejected(String),
    #[error("Login failed")]
    Network(#[source] reqwest::Error),
    #[error("Login failed")]
    InvalidToken(#[source] TokenError),
    #[error("Login failed")]
    Storage(#[from] StorageError),
}

/// Problems found while reading the claims of a bearer token. These never
/// escape the session manager; they end the session instead.
#[derive(Error, Debug)]
pub enum TokenError {
    #[error("token is not a three-part JWT")]
    Malformed,
    #[error("invalid token header: {0}")]
    Header(String),
    #[error("invalid token payload: {0}")]
    Payload(String),
    #[error("token expired at {exp}")]
    Expired { exp: i64 },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("storage lock poisoned")]
    Poisoned,
}

/// Errors from the shared API client used by the rest of the dashboard.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Request failed: {status} - {message}")]
    Status { status: u16, message: String },
    #[error("Request failed: {0}")]
    Network(#[source] reqwest::Error),
    #[error("Invalid response body: {0}")]
    Decode(String),
}

pub type Result<T, E = AuthError> = std::result::Result<T, E>;
