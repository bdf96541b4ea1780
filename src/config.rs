//! SDK configuration and the context handed to requests at send time.
//!
//! [`SdkConfig`] holds everything a request needs to resolve itself against the
//! web service: the API base URL, the identity headers sent on every call and
//! the transport timeouts. It has sensible defaults via [`Default`] and a fluent
//! [`SdkConfig::builder()`] that validates on `build()`.
//!
//! [`SdkContext`] is a cheap, cloneable handle around a config that has been
//! through the same validation as `build()`. Requests
//! never capture the context; it is passed in when headers, query parameters and
//! the final URL are resolved.
//!
//! # Examples
//!
//! ```rust
//! use levelup_sdk::config::SdkConfig;
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = SdkConfig::builder()
//!     .api_base_url(url::Url::parse("https://sandbox.thelevelup.com/")?)
//!     .device_model("Pixel 8")
//!     .request_timeout_ms(20_000)
//!     .build()?;
//! assert_eq!(cfg.device_model, "Pixel 8");
//! # Ok(()) }
//! ```
//!
//! A config can also ship as a JSON resource; missing fields fall back to the
//! defaults:
//!
//! ```rust
//! use levelup_sdk::config::SdkConfig;
//! let cfg = SdkConfig::from_json(r#"{ "device_model": "iPhone" }"#).unwrap();
//! assert_eq!(cfg.api_base_url.as_str(), "https://api.thelevelup.com/");
//! ```
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

const DEFAULT_API_BASE_URL: &str = "https://api.thelevelup.com/";
const DEFAULT_DEVICE_MODEL: &str = "unknown";
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 15_000;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SdkConfig {
    /// Root of the web service; API versions and endpoints are joined onto it.
    pub api_base_url: Url,
    /// Sent as `User-Agent` on every request.
    pub user_agent: String,
    /// Sent as `X-Device-Model` on every request.
    pub device_model: String,
    /// Limit for establishing the TCP/TLS connection.
    pub connect_timeout_ms: u64,
    /// Limit for the whole exchange, from connecting until the body has been
    /// read. Not a per-read idle timeout.
    pub request_timeout_ms: u64,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            api_base_url: Url::parse(DEFAULT_API_BASE_URL).expect("default API base URL is valid"),
            user_agent: default_user_agent(),
            device_model: DEFAULT_DEVICE_MODEL.to_string(),
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

fn default_user_agent() -> String {
    format!(
        "LevelUpSdk/{} ({}; {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

impl SdkConfig {
    pub fn builder() -> SdkConfigBuilder {
        SdkConfigBuilder::default()
    }

    /// Parses a JSON config resource and validates it.
    pub fn from_json(json: &str) -> Result<SdkConfig, SdkConfigError> {
        let cfg: SdkConfig = serde_json::from_str(json).map_err(|e| SdkConfigError::Malformed(e.to_string()))?;
        finish(cfg)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Builder for [`SdkConfig`].
#[derive(Debug, Clone, Default)]
pub struct SdkConfigBuilder {
    inner: SdkConfig,
}

impl SdkConfigBuilder {
    #[inline]
    fn map(mut self, f: impl FnOnce(&mut SdkConfig)) -> Self {
        f(&mut self.inner);
        self
    }

    pub fn api_base_url(self, url: Url) -> Self { self.map(|c| c.api_base_url = url) }
    pub fn user_agent<S: Into<String>>(self, ua: S) -> Self { self.map(|c| c.user_agent = ua.into()) }
    pub fn device_model<S: Into<String>>(self, model: S) -> Self { self.map(|c| c.device_model = model.into()) }
    pub fn connect_timeout_ms(self, ms: u64) -> Self { self.map(|c| c.connect_timeout_ms = ms) }
    pub fn request_timeout_ms(self, ms: u64) -> Self { self.map(|c| c.request_timeout_ms = ms) }

    /// Apply multiple changes in one go.
    pub fn with(self, f: impl FnOnce(&mut SdkConfig)) -> Self { self.map(f) }

    /// Validate and build the final config.
    pub fn build(self) -> Result<SdkConfig, SdkConfigError> {
        finish(self.inner)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SdkConfigError {
    #[error("api_base_url {0} must be an absolute http(s) URL")]
    InvalidBaseUrl(String),

    #[error("user_agent must not be empty")]
    EmptyUserAgent,

    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("malformed config: {0}")]
    Malformed(String),
}

fn finish(mut c: SdkConfig) -> Result<SdkConfig, SdkConfigError> {
    validate(&c)?;
    // Endpoints are joined relative to the base, which drops the last path
    // segment unless the base ends in a slash.
    if !c.api_base_url.path().ends_with('/') {
        let path = format!("{}/", c.api_base_url.path());
        c.api_base_url.set_path(&path);
    }
    Ok(c)
}

fn validate(c: &SdkConfig) -> Result<(), SdkConfigError> {
    let scheme = c.api_base_url.scheme();
    if (scheme != "http" && scheme != "https") || c.api_base_url.cannot_be_a_base() {
        return Err(SdkConfigError::InvalidBaseUrl(c.api_base_url.to_string()));
    }
    if c.user_agent.trim().is_empty() {
        return Err(SdkConfigError::EmptyUserAgent);
    }
    if c.connect_timeout_ms == 0 {
        return Err(SdkConfigError::ZeroTimeout("connect_timeout_ms"));
    }
    if c.request_timeout_ms == 0 {
        return Err(SdkConfigError::ZeroTimeout("request_timeout_ms"));
    }
    Ok(())
}

/// Shared, read-only view of the SDK configuration.
#[derive(Debug, Clone, Default)]
pub struct SdkContext {
    config: Arc<SdkConfig>,
}

impl SdkContext {
    /// Validates and normalizes `config`, so a hand-assembled config gets the
    /// same treatment as one from [`SdkConfigBuilder::build`].
    pub fn new(config: SdkConfig) -> Result<Self, SdkConfigError> {
        Ok(Self { config: Arc::new(finish(config)?) })
    }

    pub fn config(&self) -> &SdkConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = SdkConfig::builder().build().unwrap();
        assert_eq!(cfg, SdkConfig::default());
        assert!(cfg.user_agent.starts_with("LevelUpSdk/"));
    }

    #[test]
    fn base_url_gets_trailing_slash() {
        let cfg = SdkConfig::builder()
            .api_base_url(Url::parse("https://example.com/api").unwrap())
            .build()
            .unwrap();
        assert_eq!(cfg.api_base_url.as_str(), "https://example.com/api/");
    }

    #[test]
    fn rejects_non_http_base_url() {
        let err = SdkConfig::builder()
            .api_base_url(Url::parse("mailto:someone@example.com").unwrap())
            .build()
            .unwrap_err();
        assert!(matches!(err, SdkConfigError::InvalidBaseUrl(_)));
    }

    #[test]
    fn rejects_empty_user_agent_and_zero_timeouts() {
        assert_eq!(
            SdkConfig::builder().user_agent("  ").build().unwrap_err(),
            SdkConfigError::EmptyUserAgent
        );
        assert_eq!(
            SdkConfig::builder().request_timeout_ms(0).build().unwrap_err(),
            SdkConfigError::ZeroTimeout("request_timeout_ms")
        );
    }

    #[test]
    fn from_json_fills_in_defaults() {
        let cfg = SdkConfig::from_json(r#"{ "device_model": "Pixel", "request_timeout_ms": 500 }"#).unwrap();
        assert_eq!(cfg.device_model, "Pixel");
        assert_eq!(cfg.request_timeout(), Duration::from_millis(500));
        assert_eq!(cfg.connect_timeout_ms, DEFAULT_CONNECT_TIMEOUT_MS);
    }

    #[test]
    fn context_normalizes_struct_literal_configs() {
        let config = SdkConfig {
            api_base_url: Url::parse("https://example.com/api").unwrap(),
            ..SdkConfig::default()
        };
        let ctx = SdkContext::new(config).unwrap();
        assert_eq!(ctx.config().api_base_url.as_str(), "https://example.com/api/");
        assert_eq!(
            ctx.config().api_base_url.join("v15/apps").unwrap().as_str(),
            "https://example.com/api/v15/apps"
        );
    }

    #[test]
    fn context_rejects_invalid_configs() {
        let config = SdkConfig { request_timeout_ms: 0, ..SdkConfig::default() };
        assert_eq!(
            SdkContext::new(config).unwrap_err(),
            SdkConfigError::ZeroTimeout("request_timeout_ms")
        );
    }

    #[test]
    fn from_json_reports_garbage() {
        assert!(matches!(SdkConfig::from_json("{ not json"), Err(SdkConfigError::Malformed(_))));
    }
}
