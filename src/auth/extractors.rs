//! Session extractors for Axum

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use std::convert::Infallible;
use tracing::{debug, warn};

use crate::common::{safe_token_log, ApiError};
use crate::services::BackendService;
use crate::session::locator::{self, TokenOrigin};
use crate::session::RequestSession;

/// Whatever tokens the request carries; never rejects
#[derive(Debug, Clone, Default)]
pub struct SessionCredentials {
    pub access_token: Option<String>,
    pub origin: Option<TokenOrigin>,
    pub refresh_token: Option<String>,
}

#[async_trait]
impl<S> FromRequestParts<S> for SessionCredentials
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let located = locator::locate(&parts.headers);
        Ok(SessionCredentials {
            origin: located.as_ref().map(|l| l.origin),
            access_token: located.map(|l| l.token),
            refresh_token: locator::refresh_cookie(&parts.headers),
        })
    }
}

/// Authenticated session extractor
///
/// Rejects with `401 {"error":"Unauthorized"}` before any backend call when
/// the request carries no access token. The token itself is not verified
/// here; the backend decides.
#[derive(Debug, Clone)]
pub struct AuthedSession {
    pub access_token: String,
    pub origin: TokenOrigin,
    pub refresh_token: Option<String>,
}

impl AuthedSession {
    /// Token source for the backend calls of this request. Whatever carried
    /// the access token, a `refresh_token` cookie on the request lets the
    /// edge refresh on a 401.
    pub fn into_request_session(self, backend: BackendService) -> RequestSession {
        RequestSession::new(backend, Some(self.access_token), self.refresh_token)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthedSession
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(located) = locator::locate(&parts.headers) else {
            warn!(path = %parts.uri.path(), "Authentication failed: no access token on request");
            return Err(ApiError::unauthorized());
        };

        debug!(
            origin = ?located.origin,
            token = %safe_token_log(&located.token),
            "Access token located"
        );

        Ok(AuthedSession {
            access_token: located.token,
            origin: located.origin,
            refresh_token: locator::refresh_cookie(&parts.headers),
        })
    }
}
