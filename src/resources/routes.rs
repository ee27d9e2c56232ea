//! Resource proxy routes

use axum::{routing::get, Router};

use super::handlers;

/// Creates and returns the resource router
///
/// Every route requires an access token (header or cookie); without one
/// the request is answered with 401 before the backend is called.
pub fn resource_routes() -> Router {
    Router::new()
        .route(
            "/api/campaigns",
            get(handlers::list_campaigns).post(handlers::create_campaign),
        )
        .route(
            "/api/campaigns/:id",
            get(handlers::get_campaign)
                .put(handlers::update_campaign)
                .delete(handlers::delete_campaign),
        )
        .route("/api/creators", get(handlers::list_creators))
        .route("/api/creators/:id", get(handlers::get_creator))
        .route(
            "/api/profile",
            get(handlers::get_profile).put(handlers::update_profile),
        )
}
