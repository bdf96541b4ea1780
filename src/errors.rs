//! Error type shared by requests, the transport and responses.
//!
//! Errors carry their message as a string so a [`LevelUpError`] can live inside a
//! buffered response, be cloned into test hooks and survive a serde round trip.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum LevelUpError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Response too large: more than {limit} bytes")]
    ResponseTooLarge { limit: usize },

    #[error("Network error: {0}")]
    Network(String),

    /// The HTTP client itself could not be set up (TLS backend, resolver).
    #[error("HTTP client setup failed: {0}")]
    ClientSetup(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Parser error: {0}")]
    Parse(String),
}

impl From<std::io::Error> for LevelUpError {
    fn from(e: std::io::Error) -> Self {
        LevelUpError::Io(e.to_string())
    }
}

impl From<reqwest::Error> for LevelUpError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_builder() {
            LevelUpError::BadRequest(e.to_string())
        } else {
            LevelUpError::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for LevelUpError {
    fn from(e: serde_json::Error) -> Self {
        LevelUpError::Parse(e.to_string())
    }
}

impl From<url::ParseError> for LevelUpError {
    fn from(e: url::ParseError) -> Self {
        LevelUpError::InvalidUrl(e.to_string())
    }
}
