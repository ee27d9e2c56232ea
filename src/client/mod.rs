//! # Client Module
//!
//! Typed client for the edge API, used by `edgectl` and integration tests.
//! The access token lives in memory only; the refresh token goes to the
//! persistent slot of the [`CredentialStore`]. Cookies set by the edge are
//! mirrored into the same store so both mechanisms stay in step, and a pair
//! the edge rotated while serving a call replaces the held tokens.

use async_trait::async_trait;
use cookie::Cookie;
use reqwest::header::SET_COOKIE;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::auth::models::{LoginRequest, LoginResponse};
use crate::common::safe_email_log;
use crate::session::codec;
use crate::session::gateway::{Anonymous, ApiClientError, CallOptions, SessionGateway, TokenSource};
use crate::session::store::{StoreError, ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME};
use crate::session::{CredentialStore, TokenClaims, TokenClass};


pub const LOGIN_PATH: &str = "/api/auth/login";
pub const LOGOUT_PATH: &str = "/api/auth/logout";
pub const REFRESH_PATH: &str = "/api/auth/refresh";
pub const ME_PATH: &str = "/api/auth/me";

const STORE_ERROR: &str = "STORE_ERROR";

fn store_error(err: StoreError) -> ApiClientError {
    ApiClientError::new(500, err.to_string()).with_code(STORE_ERROR)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshReply {
    access_token: String,
    refresh_token: Option<String>,
}

/// Token source backed by the credential store
///
/// Concurrent 401s share one refresh: callers queue on `refresh_lock`, and
/// whoever gets it after a completed refresh sees a token different from
/// the one it was rejected with and retries without refreshing again.
#[derive(Debug)]
pub struct ClientSession {
    store: CredentialStore,
    http: Client,
    refresh_url: String,
    refresh_lock: Mutex<()>,
}

impl ClientSession {
    pub fn new(store: CredentialStore, http: Client, refresh_url: String) -> Self {
        Self {
            store,
            http,
            refresh_url,
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    fn end_session(&self) {
        if let Err(e) = self.store.clear_all() {
            warn!(error = %e, "Failed to clear credentials after refresh failure");
        }
    }
}

#[async_trait]
impl TokenSource for ClientSession {
    async fn access_token(&self) -> Option<String> {
        self.store.get(TokenClass::Access)
    }

    async fn refresh(&self, rejected: Option<&str>) -> Result<(), ApiClientError> {
        let _guard = self.refresh_lock.lock().await;

        let current = self.store.get(TokenClass::Access);
        if current.is_some() && current.as_deref() != rejected {
            debug!("Token already refreshed by a concurrent call");
            return Ok(());
        }

        let mut request = self.http.post(&self.refresh_url);
        if let Some(refresh) = self.store.get(TokenClass::Refresh) {
            request = request.json(&json!({ "refreshToken": refresh }));
        } else if !self.store.cookies().contains(TokenClass::Refresh.cookie_name()) {
            debug!("No refresh token held, cannot refresh");
            return Err(ApiClientError::unauthorized("No refresh token"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiClientError::network(e, REFRESH_PATH))?;

        if !response.status().is_success() {
            let err = ApiClientError::from_response(response, REFRESH_PATH).await;
            if !err.is_transport() {
                warn!(status = err.status, "Refresh refused, ending session");
                self.end_session();
            }
            return Err(err);
        }

        let reply: RefreshReply = response
            .json()
            .await
            .map_err(|e| ApiClientError::decode(e, REFRESH_PATH))?;

        self.store
            .set(TokenClass::Access, &reply.access_token)
            .map_err(store_error)?;
        if let Some(refresh) = reply.refresh_token.as_deref().filter(|t| !t.is_empty()) {
            self.store
                .set(TokenClass::Refresh, refresh)
                .map_err(store_error)?;
        }
        info!("🔄 Client session refreshed");
        Ok(())
    }

    /// Removal cookies are ignored here; a refused refresh ends the session.
    async fn observe(&self, response: &Response) {
        for value in response.headers().get_all(SET_COOKIE) {
            let Some(parsed) = value
                .to_str()
                .ok()
                .and_then(|raw| Cookie::parse(raw.to_string()).ok())
            else {
                continue;
            };
            if parsed.value().is_empty() {
                continue;
            }
            let class = match parsed.name() {
                ACCESS_COOKIE_NAME => TokenClass::Access,
                REFRESH_COOKIE_NAME => TokenClass::Refresh,
                _ => continue,
            };
            match self.store.set(class, parsed.value()) {
                Ok(()) => debug!(class = %class, "Adopted token rotated by the edge"),
                Err(e) => warn!(class = %class, error = %e, "Could not store token set by the edge"),
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    gateway: SessionGateway,
    session: Arc<ClientSession>,
}

impl ApiClient {
    pub fn new(base_url: &str, store: CredentialStore) -> Result<Self, ApiClientError> {
        let http = Client::builder()
            .cookie_provider(store.cookies())
            .build()
            .map_err(|e| ApiClientError::network(e, "client setup"))?;
        let gateway = SessionGateway::new(http.clone(), base_url);
        let session = ClientSession::new(store, http, gateway.url(REFRESH_PATH));

        Ok(Self {
            gateway,
            session: Arc::new(session),
        })
    }

    pub fn store(&self) -> &CredentialStore {
        self.session.store()
    }

    /// Logs in and stores both tokens; returns the user
    pub async fn login(&self, email: &str, password: &str) -> Result<Value, ApiClientError> {
        let payload = LoginRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
        };
        let body = serde_json::to_value(&payload)
            .map_err(|e| ApiClientError::decode(e, LOGIN_PATH))?;

        let login: LoginResponse = self
            .gateway
            .call_json(&Anonymous, LOGIN_PATH, &CallOptions::post(body))
            .await?;

        let store = self.store();
        store
            .set(TokenClass::Access, &login.access_token)
            .map_err(store_error)?;
        store
            .set(TokenClass::Refresh, &login.refresh_token)
            .map_err(store_error)?;

        info!(email = %safe_email_log(email), "✅ Logged in");
        Ok(login.user)
    }

    /// Best-effort upstream logout; local credentials are cleared whatever
    /// the edge answers
    pub async fn logout(&self) -> Result<(), ApiClientError> {
        let store = self.store();
        let mut request = self.gateway.http().post(self.gateway.url(LOGOUT_PATH));
        if let Some(access) = store.get(TokenClass::Access) {
            request = request.bearer_auth(access);
        }
        if let Some(refresh) = store.get(TokenClass::Refresh) {
            request = request.json(&json!({ "refreshToken": refresh }));
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => debug!("Edge logout accepted"),
            Ok(response) => warn!(status = %response.status(), "Edge logout refused"),
            Err(e) => warn!(error = %e, "Edge logout failed"),
        }

        store.clear_all().map_err(store_error)?;
        info!("👋 Logged out");
        Ok(())
    }

    pub async fn call(
        &self,
        endpoint: &str,
        options: &CallOptions,
    ) -> Result<reqwest::Response, ApiClientError> {
        self.gateway.call(self.session.as_ref(), endpoint, options).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiClientError> {
        self.gateway
            .call_json(self.session.as_ref(), endpoint, &CallOptions::get())
            .await
    }

    /// Current user as seen by the edge
    pub async fn me(&self) -> Result<Value, ApiClientError> {
        let mut body: Value = self.get_json(ME_PATH).await?;
        if let Some(user) = body.get_mut("user") {
            return Ok(user.take());
        }
        Ok(body)
    }

    /// Unverified claims of the held access token, for display only
    pub fn claims(&self) -> Option<TokenClaims> {
        self.store()
            .get(TokenClass::Access)
            .and_then(|token| codec::decode(&token))
    }
}
