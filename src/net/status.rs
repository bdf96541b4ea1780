//! Coarse outcome of a request, as seen by the app.
//!
//! [`map_status`] is a total function over what the transport observed. An
//! error always decides the outcome, even when a status code was also
//! received: if reading the body failed, the code says nothing reliable about
//! the exchange. Retrying is left to the caller.
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::LevelUpError;
use crate::net::response::STATUS_CODE_UNUSED;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LevelUpStatus {
    /// 2xx.
    Ok,
    /// 401: the access token is missing or no longer valid.
    LoginRequired,
    /// 501: the server no longer supports this client version.
    Upgrade,
    /// 503: the service is down for maintenance.
    ErrorMaintenance,
    /// 404.
    ErrorNotFound,
    /// Any other status code.
    ErrorServer,
    /// The exchange failed below HTTP.
    ErrorNetwork,
    /// The request could not be formed.
    ErrorBadRequest,
    /// The body could not be decoded.
    ErrorParsing,
    /// The body exceeded the buffering ceiling.
    ErrorResponseTooLarge,
    /// Neither a status code nor an error was recorded.
    ErrorUnknown,
}

impl LevelUpStatus {
    pub fn is_ok(&self) -> bool {
        *self == LevelUpStatus::Ok
    }
}

impl fmt::Display for LevelUpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LevelUpStatus::Ok => "OK",
            LevelUpStatus::LoginRequired => "LOGIN_REQUIRED",
            LevelUpStatus::Upgrade => "UPGRADE",
            LevelUpStatus::ErrorMaintenance => "ERROR_MAINTENANCE",
            LevelUpStatus::ErrorNotFound => "ERROR_NOT_FOUND",
            LevelUpStatus::ErrorServer => "ERROR_SERVER",
            LevelUpStatus::ErrorNetwork => "ERROR_NETWORK",
            LevelUpStatus::ErrorBadRequest => "ERROR_BAD_REQUEST",
            LevelUpStatus::ErrorParsing => "ERROR_PARSING",
            LevelUpStatus::ErrorResponseTooLarge => "ERROR_RESPONSE_TOO_LARGE",
            LevelUpStatus::ErrorUnknown => "ERROR_UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Classifies a response by its error, or failing that its status code.
pub fn map_status(http_status_code: i32, error: Option<&LevelUpError>) -> LevelUpStatus {
    if let Some(error) = error {
        return match error {
            LevelUpError::ResponseTooLarge { .. } => LevelUpStatus::ErrorResponseTooLarge,
            LevelUpError::BadRequest(_) => LevelUpStatus::ErrorBadRequest,
            LevelUpError::Parse(_) => LevelUpStatus::ErrorParsing,
            _ => LevelUpStatus::ErrorNetwork,
        };
    }

    match http_status_code {
        STATUS_CODE_UNUSED => LevelUpStatus::ErrorUnknown,
        200..=299 => LevelUpStatus::Ok,
        401 => LevelUpStatus::LoginRequired,
        404 => LevelUpStatus::ErrorNotFound,
        501 => LevelUpStatus::Upgrade,
        503 => LevelUpStatus::ErrorMaintenance,
        _ => LevelUpStatus::ErrorServer,
    }
}
