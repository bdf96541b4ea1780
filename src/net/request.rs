//! Request abstraction and the plain buffered request.
//!
//! Every request answers the same questions at send time: which method, which
//! base URL, which headers, which query parameters and which body. Headers and
//! query parameters are kept in `BTreeMap`s so they are always iterated in
//! ascending key order; [`build_url`] relies on that to produce the same URL for
//! the same parameters no matter how they were inserted.
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::SdkContext;
use crate::errors::LevelUpError;
use crate::net::body::{RequestBody, StringRequestBody};
use crate::net::method::HttpMethod;

/// A request that can be resolved against an [`SdkContext`] and sent.
///
/// Implementations resolve headers and parameters lazily: nothing that depends
/// on the context (or on the logged-in user) is computed at construction.
pub trait AbstractRequest: Send + Sync + fmt::Debug {
    fn method(&self) -> HttpMethod;

    /// URL without query parameters. May fail when the request cannot be
    /// formed in the current state, e.g. it needs a logged-in user.
    fn base_url(&self, ctx: &SdkContext) -> Result<Url, LevelUpError>;

    fn request_headers(&self, ctx: &SdkContext) -> BTreeMap<String, String>;

    fn query_params(&self, ctx: &SdkContext) -> BTreeMap<String, String>;

    fn body(&self) -> Option<&dyn RequestBody>;

    /// Bytes the transport has to write. Always 0 for methods without a body.
    fn body_length(&self) -> usize {
        if !self.method().has_body() {
            return 0;
        }
        self.body().map_or(0, |b| b.content_length())
    }

    /// The final URL: base URL plus query parameters in ascending key order.
    fn url(&self, ctx: &SdkContext) -> Result<Url, LevelUpError> {
        Ok(build_url(self.base_url(ctx)?, &self.query_params(ctx)))
    }
}

/// Appends `params` to `base` in key order, after any query already present.
pub fn build_url(mut base: Url, params: &BTreeMap<String, String>) -> Url {
    if !params.is_empty() {
        base.query_pairs_mut().extend_pairs(params.iter());
    }
    base
}

/// Parses an absolute, hierarchical URL.
pub(crate) fn parse_absolute_url(url: &str) -> Result<Url, LevelUpError> {
    let parsed = Url::parse(url)?;
    if parsed.cannot_be_a_base() {
        return Err(LevelUpError::InvalidUrl(format!("{url} is not a hierarchical URL")));
    }
    Ok(parsed)
}

/// Checks that every header is sendable and no query parameter is unnamed.
pub(crate) fn validate_rep(
    headers: &BTreeMap<String, String>,
    query_params: &BTreeMap<String, String>,
) -> Result<(), LevelUpError> {
    for (name, value) in headers {
        if http::HeaderName::from_bytes(name.as_bytes()).is_err() {
            return Err(LevelUpError::BadRequest(format!("invalid header name {name:?}")));
        }
        if http::HeaderValue::from_str(value).is_err() {
            return Err(LevelUpError::BadRequest(format!("invalid value for header {name:?}")));
        }
    }
    if query_params.contains_key("") {
        return Err(LevelUpError::BadRequest("empty query parameter name".to_string()));
    }
    Ok(())
}

/// Representation check for header and parameter maps. Fatal in debug builds.
pub(crate) fn check_rep(headers: &BTreeMap<String, String>, query_params: &BTreeMap<String, String>) {
    if cfg!(debug_assertions) {
        if let Err(e) = validate_rep(headers, query_params) {
            panic!("{e}");
        }
    }
}

/// Rejects a body on a method that does not carry one.
pub(crate) fn validate_body(method: HttpMethod, body: Option<&StringRequestBody>) -> Result<(), LevelUpError> {
    if body.is_some() && !method.has_body() {
        return Err(LevelUpError::BadRequest(format!("{method} requests carry no body")));
    }
    Ok(())
}

/// A request against an absolute URL with an in-memory body and no
/// authentication.
///
/// Decoding applies the same URL, header and body checks as [`BufferedRequest::new`]
/// but reports violations as errors instead of panicking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "EncodedBufferedRequest")]
pub struct BufferedRequest {
    method: HttpMethod,
    url: Url,
    headers: BTreeMap<String, String>,
    query_params: BTreeMap<String, String>,
    body: Option<StringRequestBody>,
}

impl BufferedRequest {
    /// Creates a request for the absolute `url`.
    ///
    /// Missing maps become empty maps. A body passed with a method that does
    /// not carry one is a programming error.
    pub fn new(
        method: HttpMethod,
        url: &str,
        headers: Option<HashMap<String, String>>,
        query_params: Option<HashMap<String, String>>,
        body: Option<StringRequestBody>,
    ) -> Result<Self, LevelUpError> {
        debug_assert!(method.has_body() || body.is_none(), "{method} requests carry no body");

        let request = Self {
            method,
            url: parse_absolute_url(url)?,
            headers: headers.unwrap_or_default().into_iter().collect(),
            query_params: query_params.unwrap_or_default().into_iter().collect(),
            body: if method.has_body() { body } else { None },
        };
        check_rep(&request.headers, &request.query_params);
        Ok(request)
    }
}

#[derive(Deserialize)]
struct EncodedBufferedRequest {
    method: HttpMethod,
    url: String,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    #[serde(default)]
    query_params: BTreeMap<String, String>,
    #[serde(default)]
    body: Option<StringRequestBody>,
}

impl TryFrom<EncodedBufferedRequest> for BufferedRequest {
    type Error = LevelUpError;

    fn try_from(encoded: EncodedBufferedRequest) -> Result<Self, Self::Error> {
        validate_rep(&encoded.headers, &encoded.query_params)?;
        validate_body(encoded.method, encoded.body.as_ref())?;
        Ok(Self {
            method: encoded.method,
            url: parse_absolute_url(&encoded.url)?,
            headers: encoded.headers,
            query_params: encoded.query_params,
            body: encoded.body,
        })
    }
}

impl AbstractRequest for BufferedRequest {
    fn method(&self) -> HttpMethod {
        self.method
    }

    fn base_url(&self, _ctx: &SdkContext) -> Result<Url, LevelUpError> {
        Ok(self.url.clone())
    }

    fn request_headers(&self, _ctx: &SdkContext) -> BTreeMap<String, String> {
        self.headers.clone()
    }

    fn query_params(&self, _ctx: &SdkContext) -> BTreeMap<String, String> {
        self.query_params.clone()
    }

    fn body(&self) -> Option<&dyn RequestBody> {
        self.body.as_ref().map(|b| b as &dyn RequestBody)
    }
}
