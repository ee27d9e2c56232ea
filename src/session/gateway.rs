//! Outbound calls with one refresh-and-retry on 401
//!
//! The gateway asks a [`TokenSource`] for the current access token, issues
//! the call, and when the reply is `401 Unauthorized` asks the source to
//! refresh exactly once. A successful refresh is followed by exactly one
//! retry whose response is returned as-is. A failed refresh returns the
//! original 401 untouched.

use async_trait::async_trait;
use reqwest::{header::HeaderName, header::HeaderValue, Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

use crate::common::safe_token_log;

pub const NETWORK_ERROR: &str = "NETWORK_ERROR";
pub const DECODE_ERROR: &str = "DECODE_ERROR";

/// Typed failure of a backend call
#[derive(Debug, Clone, Error)]
#[error("{message} (status {status})")]
pub struct ApiClientError {
    pub status: u16,
    pub code: Option<String>,
    pub context: Option<String>,
    pub message: String,
}

impl ApiClientError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            code: None,
            context: None,
            message: message.into(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// The backend could not be reached or the connection broke
    pub fn network(err: impl fmt::Display, context: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY.as_u16(), err.to_string())
            .with_code(NETWORK_ERROR)
            .with_context(context)
    }

    /// A response arrived but its body could not be decoded
    pub fn decode(err: impl fmt::Display, context: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY.as_u16(), err.to_string())
            .with_code(DECODE_ERROR)
            .with_context(context)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED.as_u16(), message)
    }

    /// No usable HTTP status from the backend
    pub fn is_transport(&self) -> bool {
        matches!(self.code.as_deref(), Some(NETWORK_ERROR) | Some(DECODE_ERROR))
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED.as_u16()
    }

    /// Builds the error from a non-2xx status and its (possibly empty) body.
    /// The backend reports `{message, code?}`; edge routes report `{error}`.
    pub fn from_body(status: u16, body: &[u8], context: impl Into<String>) -> Self {
        let parsed: Option<Value> = serde_json::from_slice(body).ok();
        let message = parsed
            .as_ref()
            .and_then(|v| {
                v.get("message")
                    .or_else(|| v.get("error"))
                    .and_then(Value::as_str)
            })
            .map(str::to_string)
            .unwrap_or_else(|| {
                StatusCode::from_u16(status)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .unwrap_or("Request failed")
                    .to_string()
            });
        let code = parsed
            .as_ref()
            .and_then(|v| v.get("code"))
            .and_then(Value::as_str)
            .map(str::to_string);

        Self {
            status,
            code,
            context: Some(context.into()),
            message,
        }
    }

    /// Consumes a non-2xx response
    pub async fn from_response(response: Response, context: impl Into<String>) -> Self {
        let context = context.into();
        let status = response.status().as_u16();
        match response.bytes().await {
            Ok(body) => Self::from_body(status, &body, context),
            Err(e) => Self::network(e, context),
        }
    }
}

/// Everything needed to issue (and re-issue) one call
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub method: Method,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub headers: Vec<(HeaderName, HeaderValue)>,
}

impl CallOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post(body: Value) -> Self {
        Self {
            method: Method::POST,
            body: Some(body),
            ..Self::default()
        }
    }

    pub fn put(body: Value) -> Self {
        Self {
            method: Method::PUT,
            body: Some(body),
            ..Self::default()
        }
    }

    pub fn delete() -> Self {
        Self {
            method: Method::DELETE,
            ..Self::default()
        }
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }
}

/// Where the gateway gets its access token and how it refreshes it
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Option<String>;

    /// One refresh attempt. `rejected` is the token the 401 was received with.
    async fn refresh(&self, rejected: Option<&str>) -> Result<(), ApiClientError>;

    /// Sees every response before it is acted on, so a source can pick up
    /// tokens the server handed out on it.
    async fn observe(&self, _response: &Response) {}
}

/// No token and nothing to refresh with, for public endpoints such as login
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymous;

#[async_trait]
impl TokenSource for Anonymous {
    async fn access_token(&self) -> Option<String> {
        None
    }

    async fn refresh(&self, _rejected: Option<&str>) -> Result<(), ApiClientError> {
        Err(ApiClientError::unauthorized("Not authenticated"))
    }
}

#[derive(Debug, Clone)]
pub struct SessionGateway {
    http: Client,
    base_url: String,
}

impl SessionGateway {
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    pub fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    async fn send(
        &self,
        endpoint: &str,
        options: &CallOptions,
        token: Option<&str>,
    ) -> Result<Response, ApiClientError> {
        let mut request = self.http.request(options.method.clone(), self.url(endpoint));
        if !options.query.is_empty() {
            request = request.query(&options.query);
        }
        for (name, value) in &options.headers {
            request = request.header(name.clone(), value.clone());
        }
        if let Some(body) = &options.body {
            request = request.json(body);
        }
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        request
            .send()
            .await
            .map_err(|e| ApiClientError::network(e, endpoint))
    }

    pub async fn call<S>(
        &self,
        source: &S,
        endpoint: &str,
        options: &CallOptions,
    ) -> Result<Response, ApiClientError>
    where
        S: TokenSource + ?Sized,
    {
        let token = source.access_token().await;
        debug!(
            method = %options.method,
            endpoint = %endpoint,
            authenticated = token.is_some(),
            "Issuing backend call"
        );

        let response = self.send(endpoint, options, token.as_deref()).await?;
        source.observe(&response).await;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        debug!(
            endpoint = %endpoint,
            token = %token.as_deref().map(safe_token_log).unwrap_or_default(),
            "Call rejected with 401, attempting one refresh"
        );

        if let Err(e) = source.refresh(token.as_deref()).await {
            warn!(
                endpoint = %endpoint,
                status = e.status,
                error = %e,
                "Refresh failed, surfacing the original 401"
            );
            return Ok(response);
        }

        let retry_token = source.access_token().await;
        let retried = self.send(endpoint, options, retry_token.as_deref()).await?;
        source.observe(&retried).await;
        if retried.status() == StatusCode::UNAUTHORIZED {
            warn!(endpoint = %endpoint, "Still unauthorized after refresh, session is over");
        }
        Ok(retried)
    }

    /// [`call`](Self::call) plus status check and JSON decoding
    pub async fn call_json<S, T>(
        &self,
        source: &S,
        endpoint: &str,
        options: &CallOptions,
    ) -> Result<T, ApiClientError>
    where
        S: TokenSource + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.call(source, endpoint, options).await?;
        if !response.status().is_success() {
            return Err(ApiClientError::from_response(response, endpoint).await);
        }
        response
            .json::<T>()
            .await
            .map_err(|e| ApiClientError::decode(e, endpoint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_body_prefers_backend_message_and_code() {
        let err = ApiClientError::from_body(
            409,
            br#"{"message":"Already applied","code":"DUPLICATE"}"#,
            "/campaigns/1",
        );
        assert_eq!(err.status, 409);
        assert_eq!(err.message, "Already applied");
        assert_eq!(err.code.as_deref(), Some("DUPLICATE"));
        assert_eq!(err.context.as_deref(), Some("/campaigns/1"));
        assert!(!err.is_transport());
    }

    #[test]
    fn test_from_body_accepts_edge_error_shape() {
        let err = ApiClientError::from_body(401, br#"{"error":"Unauthorized"}"#, "/api/auth/me");
        assert_eq!(err.message, "Unauthorized");
        assert!(err.is_unauthorized());
    }

    #[test]
    fn test_from_body_falls_back_to_reason_phrase() {
        let err = ApiClientError::from_body(503, b"<html>down</html>", "/creators");
        assert_eq!(err.message, "Service Unavailable");
        assert!(err.code.is_none());
    }

    #[test]
    fn test_network_error_is_transport() {
        let err = ApiClientError::network("connection refused", "/auth/login");
        assert!(err.is_transport());
        assert_eq!(err.status, 502);
        assert_eq!(err.code.as_deref(), Some(NETWORK_ERROR));
    }

    #[test]
    fn test_gateway_url_joins_without_double_slash() {
        let gateway = SessionGateway::new(Client::new(), "http://backend:4000/");
        assert_eq!(gateway.url("/campaigns"), "http://backend:4000/campaigns");
    }
}
