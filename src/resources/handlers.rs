//! Authenticated proxy handlers for campaigns, creators and the profile

use axum::{
    extract::{rejection::JsonRejection, Extension, Json, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::normalize::Shape;
use crate::auth::AuthedSession;
use crate::common::{ApiError, AppState};
use crate::session::{ApiClientError, CallOptions};

type QueryPairs = Query<Vec<(String, String)>>;

fn json_body(payload: Result<Json<Value>, JsonRejection>) -> Result<Value, ApiError> {
    payload.map(|Json(v)| v).map_err(|e| {
        warn!(error = %e, "Malformed request body");
        ApiError::BadRequest("Invalid request body".to_string())
    })
}

fn item_endpoint(collection: &str, id: &str) -> String {
    format!("{}/{}", collection, urlencoding::encode(id))
}

/// Turns a backend reply into the edge reply. Non-2xx becomes
/// `{error, code?}` with the backend status; 2xx bodies are normalized.
async fn relay(upstream: reqwest::Response, endpoint: &str, shape: Shape) -> Response {
    let upstream_status = upstream.status();
    if !upstream_status.is_success() {
        return ApiError::from(ApiClientError::from_response(upstream, endpoint).await)
            .into_response();
    }

    let status = StatusCode::from_u16(upstream_status.as_u16()).unwrap_or(StatusCode::OK);
    if status == StatusCode::NO_CONTENT {
        return status.into_response();
    }

    let bytes = match upstream.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => return ApiError::from(ApiClientError::network(e, endpoint)).into_response(),
    };
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return (status, Json(json!({ "success": true }))).into_response();
    }

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(body) => (status, Json(shape.apply(body))).into_response(),
        Err(e) => ApiError::from(ApiClientError::decode(e, endpoint)).into_response(),
    }
}

/// One authenticated backend call on behalf of the inbound request, with
/// the session cookies updated to whatever the refresh cycle decided.
async fn forward(
    state: &AppState,
    session: AuthedSession,
    endpoint: &str,
    options: CallOptions,
    shape: Shape,
) -> Response {
    debug!(method = %options.method, endpoint = %endpoint, origin = ?session.origin, "Proxying to backend");
    let request_session = session.into_request_session(state.backend.clone());

    let mut response = match state
        .backend
        .gateway()
        .call(&request_session, endpoint, &options)
        .await
    {
        Ok(upstream) => relay(upstream, endpoint, shape).await,
        Err(e) => ApiError::from(e).into_response(),
    };

    let status = response.status();
    request_session
        .apply_to(&state.cookies, response.headers_mut(), status)
        .await;
    response
}

// ============================================================================
// Campaigns
// ============================================================================

/// GET /api/campaigns
pub async fn list_campaigns(
    Extension(state): Extension<Arc<AppState>>,
    session: AuthedSession,
    Query(query): QueryPairs,
) -> Response {
    let options = CallOptions::get().with_query(query);
    forward(&state, session, "/campaigns", options, Shape::Campaign).await
}

/// POST /api/campaigns
pub async fn create_campaign(
    Extension(state): Extension<Arc<AppState>>,
    session: AuthedSession,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    let body = json_body(payload)?;
    Ok(forward(&state, session, "/campaigns", CallOptions::post(body), Shape::Campaign).await)
}

/// GET /api/campaigns/:id
pub async fn get_campaign(
    Extension(state): Extension<Arc<AppState>>,
    session: AuthedSession,
    Path(id): Path<String>,
) -> Response {
    let endpoint = item_endpoint("/campaigns", &id);
    forward(&state, session, &endpoint, CallOptions::get(), Shape::Campaign).await
}

/// PUT /api/campaigns/:id
pub async fn update_campaign(
    Extension(state): Extension<Arc<AppState>>,
    session: AuthedSession,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    let body = json_body(payload)?;
    let endpoint = item_endpoint("/campaigns", &id);
    Ok(forward(&state, session, &endpoint, CallOptions::put(body), Shape::Campaign).await)
}

/// DELETE /api/campaigns/:id
pub async fn delete_campaign(
    Extension(state): Extension<Arc<AppState>>,
    session: AuthedSession,
    Path(id): Path<String>,
) -> Response {
    let endpoint = item_endpoint("/campaigns", &id);
    forward(&state, session, &endpoint, CallOptions::delete(), Shape::Raw).await
}

// ============================================================================
// Creators
// ============================================================================

/// GET /api/creators
pub async fn list_creators(
    Extension(state): Extension<Arc<AppState>>,
    session: AuthedSession,
    Query(query): QueryPairs,
) -> Response {
    let options = CallOptions::get().with_query(query);
    forward(&state, session, "/creators", options, Shape::Creator).await
}

/// GET /api/creators/:id
pub async fn get_creator(
    Extension(state): Extension<Arc<AppState>>,
    session: AuthedSession,
    Path(id): Path<String>,
) -> Response {
    let endpoint = item_endpoint("/creators", &id);
    forward(&state, session, &endpoint, CallOptions::get(), Shape::Creator).await
}

// ============================================================================
// Profile
// ============================================================================

/// GET /api/profile
pub async fn get_profile(
    Extension(state): Extension<Arc<AppState>>,
    session: AuthedSession,
) -> Response {
    forward(&state, session, "/profile", CallOptions::get(), Shape::Raw).await
}

/// PUT /api/profile
/// A successful update drops the cached identity of this user
pub async fn update_profile(
    Extension(state): Extension<Arc<AppState>>,
    session: AuthedSession,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    let body = json_body(payload)?;
    let token = session.access_token.clone();

    let response = forward(&state, session, "/profile", CallOptions::put(body), Shape::Raw).await;
    if response.status().is_success() {
        if let Some(subject) = state.identity_cache.subject_for(&token).await {
            state.identity_cache.invalidate_subject(&subject).await;
        }
        state.identity_cache.invalidate_token(&token).await;
        info!("Profile updated, cached identity dropped");
    }
    Ok(response)
}
