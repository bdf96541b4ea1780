//! Request/response layer for the LevelUp web service.
//!
//! Build a [`LevelUpRequest`], hand it to [`LevelUpConnection::send`] and branch
//! on the [`LevelUpStatus`] of the returned [`LevelUpResponse`]:
//!
//! ```rust,no_run
//! use levelup_sdk::config::SdkContext;
//! use levelup_sdk::net::{ApiVersion, HttpMethod, LevelUpConnection, LevelUpRequest, LevelUpStatus};
//!
//! let connection = LevelUpConnection::new(SdkContext::default()).expect("HTTP client");
//! let request = LevelUpRequest::builder(HttpMethod::Get, ApiVersion::V15, "apps/1").build();
//!
//! let response = connection.send(&request);
//! match response.status() {
//!     LevelUpStatus::Ok => println!("{}", response.data().unwrap_or_default()),
//!     LevelUpStatus::LoginRequired => println!("log in again"),
//!     other => println!("failed: {other}"),
//! }
//! ```
mod auth;
mod body;
mod connection;
mod levelup_request;
mod levelup_response;
mod method;
mod request;
mod response;
mod status;
mod transport;

pub use auth::{AccessToken, AccessTokenRetriever, AccessTokenRetrieverHandle};
pub use body::{RequestBody, StringRequestBody, FORM_CONTENT_TYPE, JSON_CONTENT_TYPE};
pub use connection::{ConnectionHooks, LevelUpConnection};
pub use levelup_request::{
    ApiVersion, LevelUpRequest, LevelUpRequestBuilder, HEADER_ACCEPT, HEADER_AUTHORIZATION, HEADER_CONTENT_TYPE,
    HEADER_DEVICE_MODEL, HEADER_USER_AGENT, PARAM_ACCESS_TOKEN, USER_ID_PLACEHOLDER,
};
pub use levelup_response::{LevelUpResponse, ServerError};
pub use method::HttpMethod;
pub use request::{build_url, AbstractRequest, BufferedRequest};
pub use response::{
    read_capped, AbstractResponse, BufferedResponse, ResponseHeaders, StreamingResponse, CHUNK_SIZE,
    MAX_DATA_SIZE_BYTES, STATUS_CODE_UNUSED,
};
pub use status::{map_status, LevelUpStatus};
pub use transport::{NetworkConnection, Transport};
