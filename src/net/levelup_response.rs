//! Buffered response with its [`LevelUpStatus`] attached.
//!
//! The status is computed once, when the response is wrapped, and never changes
//! afterwards. Callers branch on [`LevelUpResponse::status`] instead of matching
//! on errors.
//!
//! Failed calls usually come with the web service's error envelope:
//!
//! ```json
//! [{ "error": { "message": "Email is invalid", "object": "user", "property": "email" } }]
//! ```
//!
//! [`LevelUpResponse::server_errors`] decodes it.
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::errors::LevelUpError;
use crate::net::response::{AbstractResponse, BufferedResponse, ResponseHeaders, StreamingResponse};
use crate::net::status::{map_status, LevelUpStatus};

/// One entry of the web service's error envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerError {
    pub message: String,
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default)]
    pub property: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ServerError,
}

/// A decoded response always has its status recomputed from the code and the
/// error; a `status` field in the input is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "EncodedResponse")]
pub struct LevelUpResponse {
    response: BufferedResponse,
    status: LevelUpStatus,
}

#[derive(Deserialize)]
struct EncodedResponse {
    response: BufferedResponse,
}

impl From<EncodedResponse> for LevelUpResponse {
    fn from(encoded: EncodedResponse) -> Self {
        Self::from_buffered(encoded.response)
    }
}

impl LevelUpResponse {
    pub fn new(
        http_status_code: i32,
        headers: Option<ResponseHeaders>,
        data: Option<String>,
        error: Option<LevelUpError>,
    ) -> Self {
        Self::from_buffered(BufferedResponse::new(http_status_code, headers, data, error))
    }

    /// A response carrying `data` under `http_status_code`; handy for canned
    /// responses.
    pub fn with_data(http_status_code: i32, data: impl Into<String>) -> Self {
        Self::new(http_status_code, Some(ResponseHeaders::new()), Some(data.into()), None)
    }

    pub fn from_error(error: LevelUpError) -> Self {
        Self::from_streaming(StreamingResponse::from_error(error))
    }

    pub fn from_streaming(response: StreamingResponse) -> Self {
        Self::from_buffered(BufferedResponse::from_streaming(response))
    }

    pub fn from_buffered(response: BufferedResponse) -> Self {
        let status = map_status(response.http_status_code(), response.error());
        Self { response, status }
    }

    pub fn status(&self) -> LevelUpStatus {
        self.status
    }

    pub fn data(&self) -> Option<&str> {
        self.response.data()
    }

    pub fn into_buffered(self) -> BufferedResponse {
        self.response
    }

    /// Decodes the body as JSON.
    ///
    /// A response that already failed returns its own error; a missing or
    /// undecodable body is [`LevelUpError::Parse`], which callers report as
    /// [`LevelUpStatus::ErrorParsing`].
    pub fn parse_json<T: DeserializeOwned>(&self) -> Result<T, LevelUpError> {
        if let Some(error) = self.response.error() {
            return Err(error.clone());
        }
        let data = self
            .data()
            .ok_or_else(|| LevelUpError::Parse("response has no body".to_string()))?;
        Ok(serde_json::from_str(data)?)
    }

    /// Errors reported by the server, or an empty list when the body is not an
    /// error envelope.
    pub fn server_errors(&self) -> Vec<ServerError> {
        let Some(data) = self.data() else {
            return Vec::new();
        };
        if let Ok(list) = serde_json::from_str::<Vec<ErrorEnvelope>>(data) {
            return list.into_iter().map(|e| e.error).collect();
        }
        serde_json::from_str::<ErrorEnvelope>(data)
            .map(|e| vec![e.error])
            .unwrap_or_default()
    }
}

impl AbstractResponse for LevelUpResponse {
    fn http_status_code(&self) -> i32 {
        self.response.http_status_code()
    }

    fn headers(&self) -> Option<&ResponseHeaders> {
        self.response.headers()
    }

    fn error(&self) -> Option<&LevelUpError> {
        self.response.error()
    }
}
