//! Authentication routes

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers;

/// Creates and returns the authentication router
///
/// # Routes
/// - `POST /api/auth/login` - Email/password login, sets session cookies
/// - `GET /api/auth/oauth/:provider` - Start an external provider login
/// - `GET /api/auth/callback` - Provider redirect target, sets session cookies
/// - `POST /api/auth/refresh` - Exchange the refresh cookie for a new pair
/// - `POST /api/auth/logout` - Invalidate upstream and clear cookies
/// - `GET /api/auth/me` - Current user information
pub fn auth_routes() -> Router {
    Router::new()
        .route("/api/auth/login", post(handlers::login_handler))
        .route("/api/auth/oauth/:provider", get(handlers::oauth_start))
        .route("/api/auth/callback", get(handlers::oauth_callback))
        .route("/api/auth/refresh", post(handlers::refresh_handler))
        .route("/api/auth/logout", post(handlers::logout_handler))
        .route("/api/auth/me", get(handlers::me_handler))
}
