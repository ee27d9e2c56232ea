//! Per-request token source for the edge routes
//!
//! Built from the tokens located on the inbound request. A refresh goes to
//! the backend's cookie-authenticated refresh endpoint, shared with any
//! other request presenting the same refresh cookie; its outcome is kept so
//! the route can commit or revoke cookies on the response it returns.

use async_trait::async_trait;
use axum::http::{HeaderMap, StatusCode};
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::gateway::{ApiClientError, TokenSource};
use super::writer::CookieSessionWriter;
use super::TokenPair;
use crate::services::BackendService;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    NotAttempted,
    Refreshed(TokenPair),
    Failed,
}

#[derive(Debug)]
pub struct RequestSession {
    backend: BackendService,
    access: RwLock<Option<String>>,
    refresh_token: Option<String>,
    outcome: RwLock<RefreshOutcome>,
}

impl RequestSession {
    pub fn new(
        backend: BackendService,
        access_token: Option<String>,
        refresh_token: Option<String>,
    ) -> Self {
        Self {
            backend,
            access: RwLock::new(access_token),
            refresh_token,
            outcome: RwLock::new(RefreshOutcome::NotAttempted),
        }
    }

    pub async fn outcome(&self) -> RefreshOutcome {
        self.outcome.read().await.clone()
    }

    /// Mirrors the refresh outcome into the cookies of the outgoing response.
    /// A refresh followed by a terminal 401 ends the session as well.
    pub async fn apply_to(
        &self,
        writer: &CookieSessionWriter,
        headers: &mut HeaderMap,
        final_status: StatusCode,
    ) {
        match self.outcome().await {
            RefreshOutcome::NotAttempted => {}
            RefreshOutcome::Refreshed(_) if final_status == StatusCode::UNAUTHORIZED => {
                warn!("Unauthorized after a successful refresh, revoking session cookies");
                writer.revoke(headers);
            }
            RefreshOutcome::Refreshed(pair) => {
                if let Err(e) = writer.commit(headers, &pair) {
                    warn!(error = %e, "Could not commit refreshed tokens, revoking instead");
                    writer.revoke(headers);
                }
            }
            RefreshOutcome::Failed => writer.revoke(headers),
        }
    }
}

#[async_trait]
impl TokenSource for RequestSession {
    async fn access_token(&self) -> Option<String> {
        self.access.read().await.clone()
    }

    /// Without a refresh token nothing is attempted and the cookies are left
    /// alone. An unreachable backend says nothing about the session either.
    async fn refresh(&self, _rejected: Option<&str>) -> Result<(), ApiClientError> {
        let Some(refresh_token) = self.refresh_token.as_deref() else {
            return Err(ApiClientError::unauthorized("No refresh token"));
        };

        match self.backend.refresh_shared(refresh_token).await {
            Ok(pair) => {
                info!("Access token refreshed for inbound request");
                *self.access.write().await = Some(pair.access_token.clone());
                *self.outcome.write().await = RefreshOutcome::Refreshed(pair);
                Ok(())
            }
            Err(e) if e.is_transport() => Err(e),
            Err(e) => {
                *self.outcome.write().await = RefreshOutcome::Failed;
                Err(e)
            }
        }
    }
}
