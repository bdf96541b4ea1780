//! Sending requests over the network.
//!
//! [`Transport`] is the seam between request orchestration and actual I/O.
//! [`NetworkConnection`] is the real implementation, backed by the blocking
//! [`reqwest`] client: `send` blocks the calling thread for the whole exchange,
//! so call it off any UI thread.
//!
//! A transport never fails with `Err` and never panics. Anything that goes wrong
//! (a request that cannot be formed, a refused connection, a timeout) comes
//! back as a [`StreamingResponse`] carrying the error.
use std::time::Instant;

use http::HeaderMap;

use crate::config::SdkContext;
use crate::errors::LevelUpError;
use crate::net::request::AbstractRequest;
use crate::net::response::{ResponseHeaders, StreamingResponse};

/// Performs one request/response exchange.
pub trait Transport: Send + Sync {
    fn send(&self, ctx: &SdkContext, request: &dyn AbstractRequest) -> StreamingResponse;
}

/// [`Transport`] backed by [`reqwest::blocking`].
///
/// The client, with its connection pool and runtime thread, is built once and
/// shared by every send and every clone.
#[derive(Debug, Clone)]
pub struct NetworkConnection {
    client: reqwest::blocking::Client,
}

impl NetworkConnection {
    /// Builds the client from the context's timeouts. Later contexts passed to
    /// `send` do not change them.
    pub fn new(ctx: &SdkContext) -> Result<Self, LevelUpError> {
        let config = ctx.config();
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| LevelUpError::ClientSetup(e.to_string()))?;
        Ok(Self { client })
    }

    /// A connection that always sends through `client`. The context's timeouts
    /// are not applied.
    pub fn from_client(client: reqwest::blocking::Client) -> Self {
        Self { client }
    }

    fn try_send(&self, ctx: &SdkContext, request: &dyn AbstractRequest) -> Result<StreamingResponse, LevelUpError> {
        let url = request.url(ctx)?;
        let method = request.method();
        // The query may hold an access token; only the path is logged.
        log::debug!("{} {}{}", method, url.origin().ascii_serialization(), url.path());

        let started = Instant::now();
        let mut builder = self.client.request(method.into(), url);
        for (name, value) in request.request_headers(ctx) {
            builder = builder.header(name, value);
        }

        let length = request.body_length();
        if length > 0 {
            if let Some(body) = request.body() {
                let mut buf = Vec::with_capacity(length);
                body.write_to(&mut buf)?;
                builder = builder.body(buf);
            }
        }

        let response = builder.send()?;
        let status = i32::from(response.status().as_u16());
        log::debug!("{} {} -> {} in {:?}", method, response.url().path(), status, started.elapsed());

        let headers = collect_headers(response.headers());
        Ok(StreamingResponse::new(status, headers, Box::new(response)))
    }
}

impl Transport for NetworkConnection {
    fn send(&self, ctx: &SdkContext, request: &dyn AbstractRequest) -> StreamingResponse {
        match self.try_send(ctx, request) {
            Ok(response) => response,
            Err(e) => {
                log::warn!("{} request failed: {}", request.method(), e);
                StreamingResponse::from_error(e)
            }
        }
    }
}

fn collect_headers(headers: &HeaderMap) -> ResponseHeaders {
    let mut collected = ResponseHeaders::new();
    for (name, value) in headers {
        collected
            .entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    collected
}
