use reqwest::StatusCode;
use reqwest::header::InvalidHeaderValue;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
    #[error("Reqwest error: {0}")]
    HTTPClient(#[from] reqwest::Error),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Client error: {0}")]
    Client(#[from] Error),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Reqwest error: {0}")]
    HTTPClient(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("URL encoding error: {0}")]
    URLEncode(#[from] serde_urlencoded::ser::Error),
    #[error("Invalid header value: {0}")]
    Header(#[from] InvalidHeaderValue),
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),
    #[error("Session expired, redirected to {location}")]
    SessionExpired { location: String },
    #[error("API error ({status}): {message}")]
    Api { status: StatusCode, message: String },
    #[error("Unauthorized")]
    Unauthorized,
}

impl Error {
    /// Status code of the response that produced this error, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::HTTPClient(e) => e.status(),
            Error::Unauthorized => Some(StatusCode::UNAUTHORIZED),
            _ => None,
        }
    }

    pub fn is_session_expired(&self) -> bool {
        matches!(self, Error::SessionExpired { .. })
    }
}
