//! Entry point for sending LevelUp requests.
//!
//! [`LevelUpConnection::send`] resolves the request URL, consults the
//! connection's [`ConnectionHooks`], and otherwise hands the request to its
//! [`Transport`]. The result is always a [`LevelUpResponse`]; failures show up
//! in its status, never as a panic or an `Err`.
//!
//! ## Test hooks
//! [`ConnectionHooks`] lets tests observe and stub traffic without a server:
//! - every sent request is recorded under its URL and as the latest request;
//! - a response registered for a URL (or for any URL) is returned instead of
//!   touching the network, once, and then forgotten;
//! - with network access disabled, a send that has no registered response
//!   panics. This points at a test that forgot to stub a call.
//!
//! Hooks are shared through an `Arc`, so a test can keep a handle while the code
//! under test owns the connection.
//!
//! ```rust
//! use levelup_sdk::config::SdkContext;
//! use levelup_sdk::net::{ApiVersion, ConnectionHooks, HttpMethod, LevelUpConnection, LevelUpRequest, LevelUpResponse, LevelUpStatus};
//! use std::sync::Arc;
//!
//! let hooks = Arc::new(ConnectionHooks::offline());
//! hooks.set_next_response(None, LevelUpResponse::with_data(200, "[]"));
//!
//! let connection = LevelUpConnection::new(SdkContext::default()).unwrap().with_hooks(hooks.clone());
//! let request = LevelUpRequest::builder(HttpMethod::Get, ApiVersion::V15, "locations").build();
//!
//! assert_eq!(connection.send(&request).status(), LevelUpStatus::Ok);
//! assert_eq!(hooks.last_request().unwrap(), request);
//! ```
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::SdkContext;
use crate::errors::LevelUpError;
use crate::net::levelup_request::LevelUpRequest;
use crate::net::levelup_response::LevelUpResponse;
use crate::net::request::AbstractRequest;
use crate::net::transport::{NetworkConnection, Transport};

#[derive(Debug, Default)]
struct RecordedRequests {
    by_url: HashMap<String, LevelUpRequest>,
    last: Option<LevelUpRequest>,
}

/// Request recording and canned responses for a [`LevelUpConnection`].
///
/// The recorded requests and the canned responses sit behind separate locks;
/// neither is held while the other is taken.
#[derive(Debug)]
pub struct ConnectionHooks {
    requests: Mutex<RecordedRequests>,
    /// Keyed by URL; `None` matches any URL.
    responses: Mutex<HashMap<Option<String>, LevelUpResponse>>,
    network_enabled: AtomicBool,
}

impl Default for ConnectionHooks {
    fn default() -> Self {
        Self {
            requests: Mutex::new(RecordedRequests::default()),
            responses: Mutex::new(HashMap::new()),
            network_enabled: AtomicBool::new(true),
        }
    }
}

impl ConnectionHooks {
    /// Hooks that let unstubbed requests through to the transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hooks that panic on any request without a canned response.
    pub fn offline() -> Self {
        let hooks = Self::default();
        hooks.set_network_enabled(false);
        hooks
    }

    pub fn set_network_enabled(&self, enabled: bool) {
        self.network_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_network_enabled(&self) -> bool {
        self.network_enabled.load(Ordering::SeqCst)
    }

    /// Registers the response for the next request to `url`, or to any URL when
    /// `url` is `None`. Replaces an earlier registration for the same key.
    pub fn set_next_response(&self, url: Option<&str>, response: LevelUpResponse) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.map(str::to_string), response);
    }

    /// Registers the response for the next request to `request`'s URL.
    ///
    /// Returns `false` when the URL cannot be resolved in `ctx`.
    pub fn set_next_response_for(&self, ctx: &SdkContext, request: &LevelUpRequest, response: LevelUpResponse) -> bool {
        match request.url(ctx) {
            Ok(url) => {
                self.set_next_response(Some(url.as_str()), response);
                true
            }
            Err(_) => false,
        }
    }

    /// The most recent request sent to `url`.
    pub fn last_request_to(&self, url: &str) -> Option<LevelUpRequest> {
        self.requests.lock().unwrap().by_url.get(url).cloned()
    }

    /// The most recent request sent to any URL.
    pub fn last_request(&self) -> Option<LevelUpRequest> {
        self.requests.lock().unwrap().last.clone()
    }

    /// Forgets recorded requests and canned responses.
    pub fn clear(&self) {
        *self.requests.lock().unwrap() = RecordedRequests::default();
        self.responses.lock().unwrap().clear();
    }

    fn record(&self, url: Option<&str>, request: &LevelUpRequest) {
        let mut recorded = self.requests.lock().unwrap();
        if let Some(url) = url {
            recorded.by_url.insert(url.to_string(), request.clone());
        }
        recorded.last = Some(request.clone());
    }

    /// Takes the response registered for `url`, falling back to the one
    /// registered for any URL.
    fn take_next_response(&self, url: Option<&str>) -> Option<LevelUpResponse> {
        let mut responses = self.responses.lock().unwrap();
        url.and_then(|u| responses.remove(&Some(u.to_string())))
            .or_else(|| responses.remove(&None))
    }
}

/// Sends [`LevelUpRequest`]s and wraps the outcome as [`LevelUpResponse`]s.
#[derive(Clone)]
pub struct LevelUpConnection {
    ctx: SdkContext,
    transport: Arc<dyn Transport>,
    hooks: Arc<ConnectionHooks>,
}

impl LevelUpConnection {
    /// A connection over the network, with pass-through hooks.
    ///
    /// Fails with [`LevelUpError::ClientSetup`] when the HTTP client cannot be
    /// built.
    pub fn new(ctx: SdkContext) -> Result<Self, LevelUpError> {
        let transport = NetworkConnection::new(&ctx)?;
        Ok(Self::with_transport(ctx, Arc::new(transport)))
    }

    pub fn with_transport(ctx: SdkContext, transport: Arc<dyn Transport>) -> Self {
        Self {
            ctx,
            transport,
            hooks: Arc::new(ConnectionHooks::new()),
        }
    }

    pub fn with_hooks(mut self, hooks: Arc<ConnectionHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn context(&self) -> &SdkContext {
        &self.ctx
    }

    pub fn hooks(&self) -> &Arc<ConnectionHooks> {
        &self.hooks
    }

    /// Sends `request` and blocks until the response has been buffered.
    ///
    /// # Panics
    /// Panics when network access is disabled on the hooks and no canned
    /// response matches the request.
    pub fn send(&self, request: &LevelUpRequest) -> LevelUpResponse {
        let url = match request.url(&self.ctx) {
            Ok(url) => Some(url.to_string()),
            Err(e) => {
                log::debug!("Cannot resolve URL for {}: {}", request.endpoint(), e);
                None
            }
        };

        self.hooks.record(url.as_deref(), request);

        if let Some(response) = self.hooks.take_next_response(url.as_deref()) {
            log::debug!("Returning canned response for {}", request.endpoint());
            return response;
        }

        if !self.hooks.is_network_enabled() {
            panic!(
                "network access is disabled and no response is registered for {} {}",
                request.method(),
                url.as_deref().unwrap_or(request.endpoint())
            );
        }

        LevelUpResponse::from_streaming(self.transport.send(&self.ctx, request))
    }
}

impl fmt::Debug for LevelUpConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LevelUpConnection")
            .field("ctx", &self.ctx)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}
