//! Authentication data models

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::common::safe_email_log;
use crate::session::TokenPair;

/// Email/password login body, forwarded to the backend as-is
#[derive(Serialize, Deserialize, Clone, Default)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &safe_email_log(&self.email))
            .field("password", &"***")
            .finish()
    }
}

/// Backend login reply; the edge returns the same shape
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    #[serde(default)]
    pub user: Value,
    pub access_token: String,
    pub refresh_token: String,
}

impl LoginResponse {
    pub fn token_pair(&self) -> TokenPair {
        TokenPair::new(self.access_token.clone(), self.refresh_token.clone())
    }
}

/// Query string of the external provider redirect back to the edge
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct OAuthCallbackQuery {
    #[serde(alias = "token", alias = "access_token")]
    pub access_token: Option<String>,
    #[serde(alias = "refresh_token")]
    pub refresh_token: Option<String>,
    pub error: Option<String>,
    pub next: Option<String>,
}

impl OAuthCallbackQuery {
    /// Both tokens, when both are present and non-empty
    pub fn token_pair(&self) -> Option<TokenPair> {
        let access = self.access_token.as_deref().filter(|t| !t.is_empty())?;
        let refresh = self.refresh_token.as_deref().filter(|t| !t.is_empty())?;
        Some(TokenPair::new(access, refresh))
    }
}

/// Optional body of `POST /api/auth/refresh`; the cookie wins when present
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

/// Optional body of `POST /api/auth/logout`
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
}
