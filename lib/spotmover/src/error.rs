use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpotmoverError {
    #[error("Invalid cache id: {0}")]
    InvalidIdentifier(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("{0}")]
    NotFound(String),

    #[error("No such cache key: {0}")]
    KeyNotFound(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Client is not configured")]
    NotConfigured,
}

impl SpotmoverError {
    /// Rate limiting, server-side failures and dropped connections. These are
    /// worth retrying and must never be remembered as a missing match.
    pub fn is_transient(&self) -> bool {
        match self {
            SpotmoverError::Api { status, .. } => *status == 429 || *status >= 500,
            SpotmoverError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SpotmoverError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, SpotmoverError>;
