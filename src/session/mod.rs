//! # Session Module
//!
//! How the edge holds, locates and refreshes tokens issued by the backend:
//! - `codec`: unverified claims decoding for display
//! - `store`: credential storage per token class (client side)
//! - `locator`: access token lookup on inbound requests
//! - `gateway`: outbound calls with a single refresh-and-retry
//! - `server`: per-request token source used by the edge routes
//! - `writer`: httpOnly session cookies

pub mod codec;
pub mod gateway;
pub mod locator;
pub mod server;
pub mod store;
pub mod writer;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::common::safe_token_log;

pub use codec::TokenClaims;
pub use gateway::{ApiClientError, CallOptions, SessionGateway, TokenSource};
pub use server::{RefreshOutcome, RequestSession};
pub use store::{CredentialStore, TokenClass};
pub use writer::CookieSessionWriter;

/// Access token plus the refresh token that can replace it
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl TokenPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &safe_token_log(&self.access_token))
            .field("refresh_token", &safe_token_log(&self.refresh_token))
            .finish()
    }
}
