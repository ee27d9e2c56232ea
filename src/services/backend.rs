// src/services/backend.rs
//! Typed access to the backend's auth contract.
//! Resource endpoints go through [`BackendService::gateway`].

use cookie::Cookie;
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::auth::models::{LoginRequest, LoginResponse};
use crate::common::safe_email_log;
use crate::session::gateway::{Anonymous, ApiClientError, CallOptions, SessionGateway, TokenSource};
use crate::session::store::{ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME};
use crate::session::TokenPair;

use super::shared_refresh::SharedRefresh;

pub const LOGIN_ENDPOINT: &str = "/auth/login";
pub const LOGOUT_ENDPOINT: &str = "/auth/logout";
pub const REFRESH_ENDPOINT: &str = "/auth/refresh";
pub const ME_ENDPOINT: &str = "/auth/me";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshBody {
    access_token: Option<String>,
    refresh_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BackendService {
    gateway: SessionGateway,
    refreshes: Arc<SharedRefresh>,
}

impl BackendService {
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            gateway: SessionGateway::new(http, base_url),
            refreshes: Arc::new(SharedRefresh::default()),
        }
    }

    pub fn gateway(&self) -> &SessionGateway {
        &self.gateway
    }

    /// URL a browser is sent to when starting an external provider login
    pub fn oauth_start_url(&self, provider: &str) -> String {
        self.gateway
            .url(&format!("/auth/{}", urlencoding::encode(provider)))
    }

    pub async fn login(&self, payload: &LoginRequest) -> Result<LoginResponse, ApiClientError> {
        debug!(email = %safe_email_log(&payload.email), "Forwarding login to backend");
        let body = serde_json::to_value(payload)
            .map_err(|e| ApiClientError::decode(e, LOGIN_ENDPOINT))?;
        let response: LoginResponse = self
            .gateway
            .call_json(&Anonymous, LOGIN_ENDPOINT, &CallOptions::post(body))
            .await?;
        info!(email = %safe_email_log(&payload.email), "Backend accepted login");
        Ok(response)
    }

    /// Server-side refresh token invalidation
    pub async fn logout(
        &self,
        access_token: Option<&str>,
        refresh_token: &str,
    ) -> Result<(), ApiClientError> {
        let mut request = self
            .gateway
            .http()
            .post(self.gateway.url(LOGOUT_ENDPOINT))
            .json(&serde_json::json!({ "refreshToken": refresh_token }));
        if let Some(token) = access_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiClientError::network(e, LOGOUT_ENDPOINT))?;
        if !response.status().is_success() {
            return Err(ApiClientError::from_response(response, LOGOUT_ENDPOINT).await);
        }
        Ok(())
    }

    /// Exchanges a refresh token for a new pair. The refresh token is only
    /// ever sent here, as a cookie. New tokens are read from `Set-Cookie`
    /// first and from a JSON body second; an unrotated refresh token is
    /// carried over.
    /// [`refresh`](Self::refresh), shared with concurrent and recent
    /// requests presenting the same refresh token
    pub async fn refresh_shared(&self, refresh_token: &str) -> Result<TokenPair, ApiClientError> {
        self.refreshes
            .run(refresh_token, || self.refresh(refresh_token))
            .await
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ApiClientError> {
        let response = self
            .gateway
            .http()
            .post(self.gateway.url(REFRESH_ENDPOINT))
            .header(COOKIE, format!("{}={}", REFRESH_COOKIE_NAME, refresh_token))
            .send()
            .await
            .map_err(|e| ApiClientError::network(e, REFRESH_ENDPOINT))?;

        if !response.status().is_success() {
            let err = ApiClientError::from_response(response, REFRESH_ENDPOINT).await;
            warn!(status = err.status, error = %err, "Backend refused refresh");
            return Err(err);
        }

        let mut from_cookies = RefreshBody::default();
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
            match parsed.name() {
                ACCESS_COOKIE_NAME => from_cookies.access_token = Some(parsed.value().to_string()),
                REFRESH_COOKIE_NAME => {
                    from_cookies.refresh_token = Some(parsed.value().to_string())
                }
                _ => {}
            }
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiClientError::network(e, REFRESH_ENDPOINT))?;
        let from_body: RefreshBody = if bytes.iter().all(u8::is_ascii_whitespace) {
            RefreshBody::default()
        } else {
            serde_json::from_slice(&bytes).unwrap_or_default()
        };

        let access_token = from_cookies
            .access_token
            .or(from_body.access_token)
            .ok_or_else(|| {
                ApiClientError::decode("refresh response carried no access token", REFRESH_ENDPOINT)
            })?;
        let refresh_token = from_cookies
            .refresh_token
            .or(from_body.refresh_token)
            .unwrap_or_else(|| refresh_token.to_string());

        Ok(TokenPair::new(access_token, refresh_token))
    }

    /// Current user; the backend may wrap it as `{user}`
    pub async fn me<S>(&self, source: &S) -> Result<Value, ApiClientError>
    where
        S: TokenSource + ?Sized,
    {
        let body: Value = self
            .gateway
            .call_json(source, ME_ENDPOINT, &CallOptions::get())
            .await?;
        Ok(match body {
            Value::Object(mut map) if map.contains_key("user") => {
                map.remove("user").unwrap_or(Value::Null)
            }
            other => other,
        })
    }
}
