use thiserror::Error;

/// Why a geolocation or timezone lookup produced nothing usable.
#[derive(Debug, Error)]
pub enum LookupError {
    /// Connection, TLS or timeout failure before a response arrived.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("provider returned HTTP {0}")]
    Status(reqwest::StatusCode),

    /// The body arrived but did not have the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<serde_json::Error> for LookupError {
    fn from(e: serde_json::Error) -> Self {
        LookupError::Malformed(e.to_string())
    }
}
