// src/logging_middleware.rs
//! Request ids and debug-level body logging
//!
//! Every request gets an `x-request-id` (the caller's, or a fresh UUID)
//! that is echoed on the response. Bodies are only buffered when debug
//! logging is enabled, and secrets are masked before they are printed.

use axum::body::to_bytes;
use axum::{
    body::Body,
    extract::Request,
    http::{HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use serde_json::Value;
use tracing::{debug, info_span, Instrument, Level};
use uuid::Uuid;

use crate::common::redact_secrets;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Pretty JSON with secrets masked; non-JSON text is logged as-is
fn render(bytes: &[u8]) -> Option<String> {
    let body_str = std::str::from_utf8(bytes).ok()?;
    match serde_json::from_str::<Value>(body_str) {
        Ok(mut json) => {
            redact_secrets(&mut json);
            Some(serde_json::to_string_pretty(&json).unwrap_or_else(|_| json.to_string()))
        }
        Err(_) if body_str.contains("password") || body_str.contains("token") => {
            Some("<redacted>".to_string())
        }
        Err(_) => Some(body_str.to_string()),
    }
}

fn request_id(request: &Request) -> HeaderValue {
    request
        .headers()
        .get(&REQUEST_ID_HEADER)
        .filter(|v| !v.is_empty() && v.len() <= 128)
        .cloned()
        .unwrap_or_else(|| {
            HeaderValue::from_str(&Uuid::new_v4().to_string())
                .unwrap_or_else(|_| HeaderValue::from_static("unknown"))
        })
}

/// Middleware to tag requests with an id and log bodies in debug mode
pub async fn log_request_response(
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let id = request_id(&request);
    request.headers_mut().insert(REQUEST_ID_HEADER, id.clone());
    let span = info_span!(
        "request",
        request_id = %id.to_str().unwrap_or_default(),
        method = %request.method(),
        path = %request.uri().path(),
    );

    async move {
        let mut response = if tracing::enabled!(Level::DEBUG) {
            log_bodies(request, next).await?
        } else {
            next.run(request).await
        };
        response.headers_mut().insert(REQUEST_ID_HEADER, id);
        Ok(response)
    }
    .instrument(span)
    .await
}

async fn log_bodies(request: Request, next: Next) -> Result<Response, StatusCode> {
    let (parts, body) = request.into_parts();

    // Read request body
    let bytes = to_bytes(body, usize::MAX)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    if !bytes.is_empty() {
        if let Some(rendered) = render(&bytes) {
            debug!(uri = %parts.uri, request_body = %rendered, "📥 Request");
        }
    }

    let request = Request::from_parts(parts, Body::from(bytes));
    let response = next.run(request).await;

    let (parts, body) = response.into_parts();
    let bytes = to_bytes(body, usize::MAX)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    if !bytes.is_empty() {
        if let Some(rendered) = render(&bytes) {
            debug!(status = %parts.status, response_body = %rendered, "📤 Response");
        }
    }

    Ok(Response::from_parts(parts, Body::from(bytes)))
}
