//! Requests against the LevelUp web service.
//!
//! A [`LevelUpRequest`] names an endpoint relative to the configured API base
//! URL and API version, e.g. `POST v15/users`. At send time it adds the default
//! identity headers and, when an [`AccessTokenRetriever`] is attached, the
//! current access token:
//!
//! - API `v15` and later: `Authorization: token <access_token>` header.
//! - Legacy `v13`/`v14`: `access_token=<access_token>` query parameter.
//!
//! Endpoints may contain the `{user_id}` placeholder, which is replaced with the
//! logged-in user's id. Resolving such an endpoint without a user yields
//! [`LevelUpError::BadRequest`].
//!
//! ```rust
//! use levelup_sdk::config::SdkContext;
//! use levelup_sdk::net::{AbstractRequest, AccessToken, ApiVersion, HttpMethod, LevelUpRequest};
//! use std::sync::Arc;
//!
//! let ctx = SdkContext::default();
//! let request = LevelUpRequest::builder(HttpMethod::Get, ApiVersion::V15, "users/{user_id}/orders")
//!     .query_param("page", "2")
//!     .access_token_retriever(Arc::new(|_: &SdkContext| Some(AccessToken::new("t0k3n", Some(42)))))
//!     .build();
//!
//! let url = request.url(&ctx).unwrap();
//! assert_eq!(url.as_str(), "https://api.thelevelup.com/v15/users/42/orders?page=2");
//! assert_eq!(request.request_headers(&ctx)["Authorization"], "token t0k3n");
//! ```
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::SdkContext;
use crate::errors::LevelUpError;
use crate::net::auth::{AccessToken, AccessTokenRetriever, AccessTokenRetrieverHandle};
use crate::net::body::{RequestBody, StringRequestBody, JSON_CONTENT_TYPE};
use crate::net::method::HttpMethod;
use crate::net::request::{check_rep, validate_body, validate_rep, AbstractRequest};

pub const HEADER_ACCEPT: &str = "Accept";
pub const HEADER_AUTHORIZATION: &str = "Authorization";
pub const HEADER_CONTENT_TYPE: &str = "Content-Type";
pub const HEADER_DEVICE_MODEL: &str = "X-Device-Model";
pub const HEADER_USER_AGENT: &str = "User-Agent";

pub const PARAM_ACCESS_TOKEN: &str = "access_token";

/// Replaced with the logged-in user's id when the URL is resolved.
pub const USER_ID_PLACEHOLDER: &str = "{user_id}";

/// Web service API version. Ordered oldest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiVersion {
    V13,
    V14,
    V15,
}

impl ApiVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiVersion::V13 => "v13",
            ApiVersion::V14 => "v14",
            ApiVersion::V15 => "v15",
        }
    }

    /// Whether the token goes in the `Authorization` header rather than the
    /// query string.
    pub fn uses_authorization_header(&self) -> bool {
        *self >= ApiVersion::V15
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request to a LevelUp API endpoint.
///
/// The access token retriever is a runtime capability: it is not serialized and
/// does not take part in equality. Reattach it with
/// [`with_access_token_retriever`](Self::with_access_token_retriever) after
/// decoding a stored request. Decoding rejects invalid headers, unnamed query
/// parameters and bodies on methods that carry none.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "EncodedLevelUpRequest")]
pub struct LevelUpRequest {
    method: HttpMethod,
    api_version: ApiVersion,
    endpoint: String,
    headers: BTreeMap<String, String>,
    query_params: BTreeMap<String, String>,
    body: Option<StringRequestBody>,
    #[serde(skip)]
    retriever: Option<AccessTokenRetrieverHandle>,
}

#[derive(Deserialize)]
struct EncodedLevelUpRequest {
    method: HttpMethod,
    api_version: ApiVersion,
    endpoint: String,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    #[serde(default)]
    query_params: BTreeMap<String, String>,
    #[serde(default)]
    body: Option<StringRequestBody>,
}

impl TryFrom<EncodedLevelUpRequest> for LevelUpRequest {
    type Error = LevelUpError;

    fn try_from(encoded: EncodedLevelUpRequest) -> Result<Self, Self::Error> {
        validate_rep(&encoded.headers, &encoded.query_params)?;
        validate_body(encoded.method, encoded.body.as_ref())?;
        Ok(Self {
            method: encoded.method,
            api_version: encoded.api_version,
            endpoint: encoded.endpoint,
            headers: encoded.headers,
            query_params: encoded.query_params,
            body: encoded.body,
            retriever: None,
        })
    }
}

impl LevelUpRequest {
    pub fn builder(method: HttpMethod, api_version: ApiVersion, endpoint: impl Into<String>) -> LevelUpRequestBuilder {
        LevelUpRequestBuilder {
            inner: LevelUpRequest {
                method,
                api_version,
                endpoint: endpoint.into(),
                headers: BTreeMap::new(),
                query_params: BTreeMap::new(),
                body: None,
                retriever: None,
            },
        }
    }

    pub fn api_version(&self) -> ApiVersion {
        self.api_version
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn access_token_retriever(&self) -> Option<&AccessTokenRetrieverHandle> {
        self.retriever.as_ref()
    }

    pub fn with_access_token_retriever(mut self, retriever: AccessTokenRetrieverHandle) -> Self {
        self.retriever = Some(retriever);
        self
    }

    fn access_token(&self, ctx: &SdkContext) -> Option<AccessToken> {
        self.retriever.as_ref().and_then(|r| r.access_token(ctx))
    }

    fn resolved_endpoint(&self, ctx: &SdkContext) -> Result<String, LevelUpError> {
        let endpoint = self.endpoint.trim_start_matches('/');
        if !endpoint.contains(USER_ID_PLACEHOLDER) {
            return Ok(endpoint.to_string());
        }

        let user_id = self
            .access_token(ctx)
            .and_then(|t| t.user_id)
            .ok_or_else(|| LevelUpError::BadRequest(format!("{endpoint} requires a logged-in user")))?;
        Ok(endpoint.replace(USER_ID_PLACEHOLDER, &user_id.to_string()))
    }
}

impl AbstractRequest for LevelUpRequest {
    fn method(&self) -> HttpMethod {
        self.method
    }

    fn base_url(&self, ctx: &SdkContext) -> Result<Url, LevelUpError> {
        let path = format!("{}/{}", self.api_version, self.resolved_endpoint(ctx)?);
        Ok(ctx.config().api_base_url.join(&path)?)
    }

    fn request_headers(&self, ctx: &SdkContext) -> BTreeMap<String, String> {
        let config = ctx.config();
        let content_type = self.body.as_ref().map_or(JSON_CONTENT_TYPE, |b| b.content_type());

        let mut headers = BTreeMap::new();
        insert_header(&mut headers, HEADER_ACCEPT, "application/json");
        insert_header(&mut headers, HEADER_CONTENT_TYPE, content_type);
        insert_header(&mut headers, HEADER_USER_AGENT, &config.user_agent);
        insert_header(&mut headers, HEADER_DEVICE_MODEL, &config.device_model);
        for (name, value) in &self.headers {
            insert_header(&mut headers, name, value);
        }

        if self.api_version.uses_authorization_header() {
            if let Some(token) = self.access_token(ctx) {
                insert_header(&mut headers, HEADER_AUTHORIZATION, &format!("token {}", token.access_token));
            }
        }
        headers
    }

    fn query_params(&self, ctx: &SdkContext) -> BTreeMap<String, String> {
        let mut params = self.query_params.clone();
        if !self.api_version.uses_authorization_header() {
            if let Some(token) = self.access_token(ctx) {
                params.insert(PARAM_ACCESS_TOKEN.to_string(), token.access_token);
            }
        }
        params
    }

    fn body(&self) -> Option<&dyn RequestBody> {
        self.body.as_ref().map(|b| b as &dyn RequestBody)
    }
}

/// Header names are case-insensitive; a later insert replaces any spelling of
/// the same name.
fn insert_header(headers: &mut BTreeMap<String, String>, name: &str, value: &str) {
    headers.retain(|existing, _| !existing.eq_ignore_ascii_case(name));
    headers.insert(name.to_string(), value.to_string());
}

impl PartialEq for LevelUpRequest {
    fn eq(&self, other: &Self) -> bool {
        self.method == other.method
            && self.api_version == other.api_version
            && self.endpoint == other.endpoint
            && self.headers == other.headers
            && self.query_params == other.query_params
            && self.body == other.body
    }
}

impl Eq for LevelUpRequest {}

impl fmt::Debug for LevelUpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LevelUpRequest")
            .field("method", &self.method)
            .field("api_version", &self.api_version)
            .field("endpoint", &self.endpoint)
            .field("headers", &self.headers)
            .field("query_params", &self.query_params)
            .field("body", &self.body)
            .field("has_retriever", &self.retriever.is_some())
            .finish()
    }
}

/// Builder for [`LevelUpRequest`].
#[derive(Clone)]
pub struct LevelUpRequestBuilder {
    inner: LevelUpRequest,
}

impl LevelUpRequestBuilder {
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.inner.headers.insert(name.into(), value.into());
        self
    }

    pub fn query_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.inner.query_params.insert(name.into(), value.into());
        self
    }

    pub fn body(mut self, body: StringRequestBody) -> Self {
        self.inner.body = Some(body);
        self
    }

    pub fn access_token_retriever(mut self, retriever: AccessTokenRetrieverHandle) -> Self {
        self.inner.retriever = Some(retriever);
        self
    }

    pub fn build(mut self) -> LevelUpRequest {
        debug_assert!(
            self.inner.method.has_body() || self.inner.body.is_none(),
            "{} requests carry no body",
            self.inner.method
        );
        if !self.inner.method.has_body() {
            self.inner.body = None;
        }
        check_rep(&self.inner.headers, &self.inner.query_params);
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn token_retriever(token: &str, user_id: Option<u64>) -> AccessTokenRetrieverHandle {
        let token = AccessToken::new(token, user_id);
        Arc::new(move |_: &SdkContext| Some(token.clone()))
    }

    #[test]
    fn url_is_base_version_and_endpoint() {
        let ctx = SdkContext::default();
        let request = LevelUpRequest::builder(HttpMethod::Get, ApiVersion::V14, "/locations/3").build();
        assert_eq!(
            request.url(&ctx).unwrap().as_str(),
            "https://api.thelevelup.com/v14/locations/3"
        );
    }

    #[test]
    fn default_headers_are_present() {
        let ctx = SdkContext::default();
        let headers = LevelUpRequest::builder(HttpMethod::Get, ApiVersion::V15, "apps").build().request_headers(&ctx);

        assert_eq!(headers[HEADER_ACCEPT], "application/json");
        assert_eq!(headers[HEADER_CONTENT_TYPE], JSON_CONTENT_TYPE);
        assert_eq!(headers[HEADER_USER_AGENT], ctx.config().user_agent);
        assert_eq!(headers[HEADER_DEVICE_MODEL], "unknown");
        assert!(!headers.contains_key(HEADER_AUTHORIZATION));
    }

    #[test]
    fn caller_headers_override_defaults_case_insensitively() {
        let ctx = SdkContext::default();
        let headers = LevelUpRequest::builder(HttpMethod::Get, ApiVersion::V15, "apps")
            .header("accept", "text/plain")
            .build()
            .request_headers(&ctx);

        assert_eq!(headers.get("accept").map(String::as_str), Some("text/plain"));
        assert!(!headers.contains_key(HEADER_ACCEPT));
    }

    #[test]
    fn body_sets_content_type() {
        let ctx = SdkContext::default();
        let request = LevelUpRequest::builder(HttpMethod::Post, ApiVersion::V14, "access_tokens")
            .body(StringRequestBody::form(vec![("username", "u"), ("password", "p")]))
            .build();

        assert!(request.request_headers(&ctx)[HEADER_CONTENT_TYPE].starts_with("application/x-www-form-urlencoded"));
        assert_eq!(request.body_length(), "password=p&username=u".len());
    }

    #[test]
    fn v15_puts_token_in_authorization_header() {
        let ctx = SdkContext::default();
        let request = LevelUpRequest::builder(HttpMethod::Get, ApiVersion::V15, "users")
            .access_token_retriever(token_retriever("abc", None))
            .build();

        assert_eq!(request.request_headers(&ctx)[HEADER_AUTHORIZATION], "token abc");
        assert!(!request.query_params(&ctx).contains_key(PARAM_ACCESS_TOKEN));
    }

    #[test]
    fn legacy_versions_put_token_in_query() {
        let ctx = SdkContext::default();
        let request = LevelUpRequest::builder(HttpMethod::Get, ApiVersion::V13, "users")
            .query_param("zzz", "1")
            .access_token_retriever(token_retriever("abc", None))
            .build();

        assert!(!request.request_headers(&ctx).contains_key(HEADER_AUTHORIZATION));
        assert_eq!(request.url(&ctx).unwrap().query(), Some("access_token=abc&zzz=1"));
    }

    #[test]
    fn token_is_resolved_on_every_access() {
        let ctx = SdkContext::default();
        let current: Arc<Mutex<Option<AccessToken>>> = Arc::new(Mutex::new(None));
        let source = current.clone();
        let request = LevelUpRequest::builder(HttpMethod::Get, ApiVersion::V15, "users")
            .access_token_retriever(Arc::new(move |_: &SdkContext| source.lock().unwrap().clone()))
            .build();

        assert!(!request.request_headers(&ctx).contains_key(HEADER_AUTHORIZATION));

        *current.lock().unwrap() = Some(AccessToken::new("fresh", None));
        assert_eq!(request.request_headers(&ctx)[HEADER_AUTHORIZATION], "token fresh");
    }

    #[test]
    fn user_id_placeholder_is_replaced() {
        let ctx = SdkContext::default();
        let request = LevelUpRequest::builder(HttpMethod::Get, ApiVersion::V15, "users/{user_id}/loyalties")
            .access_token_retriever(token_retriever("abc", Some(99)))
            .build();
        assert_eq!(request.url(&ctx).unwrap().path(), "/v15/users/99/loyalties");
    }

    #[test]
    fn user_id_placeholder_without_user_is_bad_request() {
        let ctx = SdkContext::default();
        let no_retriever = LevelUpRequest::builder(HttpMethod::Get, ApiVersion::V15, "users/{user_id}").build();
        assert!(matches!(no_retriever.url(&ctx), Err(LevelUpError::BadRequest(_))));

        let no_user_id = LevelUpRequest::builder(HttpMethod::Get, ApiVersion::V15, "users/{user_id}")
            .access_token_retriever(token_retriever("abc", None))
            .build();
        assert!(matches!(no_user_id.url(&ctx), Err(LevelUpError::BadRequest(_))));
    }

    #[test]
    fn get_requests_drop_bodies_in_release() {
        if cfg!(debug_assertions) {
            return;
        }
        let request = LevelUpRequest::builder(HttpMethod::Get, ApiVersion::V15, "apps")
            .body(StringRequestBody::new("text/plain", "ignored"))
            .build();
        assert_eq!(request.body_length(), 0);
    }

    #[test]
    fn serde_round_trip_skips_retriever() {
        let request = LevelUpRequest::builder(HttpMethod::Post, ApiVersion::V15, "orders")
            .header("X-Trace", "1")
            .query_param("b", "2")
            .body(StringRequestBody::json(&json!({ "order": { "spend_amount": 1000 } })).unwrap())
            .access_token_retriever(token_retriever("abc", Some(1)))
            .build();

        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("abc"));

        let back: LevelUpRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, request);
        assert!(back.access_token_retriever().is_none());

        let reattached = back.with_access_token_retriever(token_retriever("abc", Some(1)));
        let ctx = SdkContext::default();
        assert_eq!(reattached.request_headers(&ctx)[HEADER_AUTHORIZATION], "token abc");
    }

    #[test]
    fn decoding_rejects_invalid_headers_and_get_bodies() {
        let bad_header = json!({
            "method": "POST", "api_version": "v15", "endpoint": "orders",
            "headers": { "bad header": "x" }, "query_params": {}, "body": null,
        });
        let err = serde_json::from_value::<LevelUpRequest>(bad_header).unwrap_err();
        assert!(err.to_string().contains("invalid header name"));

        let get_with_body = json!({
            "method": "GET", "api_version": "v15", "endpoint": "apps",
            "headers": {}, "query_params": {},
            "body": { "content_type": "text/plain", "content": "x" },
        });
        let err = serde_json::from_value::<LevelUpRequest>(get_with_body).unwrap_err();
        assert!(err.to_string().contains("carry no body"));

        let empty_param = json!({
            "method": "GET", "api_version": "v15", "endpoint": "apps",
            "query_params": { "": "x" },
        });
        assert!(serde_json::from_value::<LevelUpRequest>(empty_param).is_err());
    }
}
