//! Access tokens and the capability that looks them up.
//!
//! Requests do not store a token. They hold an [`AccessTokenRetriever`] and ask
//! it for the current token each time headers or query parameters are resolved,
//! so a request built before login (or persisted and restored later) always goes
//! out with fresh credentials, and the lookup itself happens on whatever thread
//! performs the send.
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::SdkContext;

/// Credential identifying a logged-in user.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    pub user_id: Option<u64>,
}

impl AccessToken {
    pub fn new(access_token: impl Into<String>, user_id: Option<u64>) -> Self {
        Self {
            access_token: access_token.into(),
            user_id,
        }
    }
}

// Keep the secret out of logs.
impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("access_token", &"<redacted>")
            .field("user_id", &self.user_id)
            .finish()
    }
}

/// Supplies the current access token, or `None` when nobody is logged in.
pub trait AccessTokenRetriever: Send + Sync {
    fn access_token(&self, ctx: &SdkContext) -> Option<AccessToken>;
}

impl<F> AccessTokenRetriever for F
where
    F: Fn(&SdkContext) -> Option<AccessToken> + Send + Sync,
{
    fn access_token(&self, ctx: &SdkContext) -> Option<AccessToken> {
        self(ctx)
    }
}

/// Shared handle to a retriever, as held by requests.
pub type AccessTokenRetrieverHandle = Arc<dyn AccessTokenRetriever>;
