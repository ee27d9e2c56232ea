// src/lib.rs
//! Session edge for the campaign platform web app.
//!
//! Holds backend-issued tokens in httpOnly cookies, proxies authenticated
//! calls to the backend and refreshes expired sessions once per call.

use axum::{
    extract::Extension,
    http::{header, HeaderName, HeaderValue, Method},
    middleware,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

// ============================================================================
// MODULE IMPORTS
// ============================================================================

pub mod auth;
pub mod client;
pub mod common;
pub mod logging_middleware;
pub mod resources;
pub mod services;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

use common::AppState;
use session::locator::FALLBACK_TOKEN_HEADER;

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.trim().parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            logging_middleware::REQUEST_ID_HEADER,
            HeaderName::from_static(FALLBACK_TOKEN_HEADER),
        ])
        .allow_credentials(true)
}

// ============================================================================
// ROUTER COMPOSITION
// ============================================================================

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    Router::new()
        .route("/health", get(health))
        // ====================================================================
        // AUTHENTICATION ROUTES (login, provider callback, refresh, logout)
        // ====================================================================
        .merge(auth::auth_routes())
        // ====================================================================
        // RESOURCE ROUTES (campaigns, creators, profile)
        // ====================================================================
        .merge(resources::resource_routes())
        // ====================================================================
        // MIDDLEWARE AND LAYERS
        // ====================================================================
        .layer(middleware::from_fn(logging_middleware::log_request_response))
        .layer(Extension(Arc::new(state)))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
