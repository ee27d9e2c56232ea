//! Authentication handlers

use axum::{
    extract::{rejection::JsonRejection, Extension, Json, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::extractors::{AuthedSession, SessionCredentials};
use super::models::{LoginRequest, LogoutRequest, OAuthCallbackQuery, RefreshRequest};
use super::validators::{is_valid_provider, safe_redirect_target, LoginValidator};
use crate::common::{safe_email_log, safe_token_log, ApiError, AppState, Validator};
use crate::session::TokenSource;

/// Sends the browser back to the login page with a reason and no session
fn login_redirect(state: &AppState, reason: &str) -> Response {
    let target = format!(
        "{}?error={}",
        state.config.login_path,
        urlencoding::encode(reason)
    );
    let mut response = Redirect::to(&target).into_response();
    state.cookies.revoke(response.headers_mut());
    response
}

/// POST /api/auth/login
///
/// # Request Body
/// ```json
/// { "email": "a@b.com", "password": "..." }
/// ```
///
/// # Response
/// ```json
/// { "user": { ... }, "accessToken": "...", "refreshToken": "..." }
/// ```
/// Both tokens are also set as httpOnly cookies. A rejected login clears
/// whatever session cookies the browser still had.
pub async fn login_handler(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(mut payload) = payload.map_err(|e| {
        warn!(error = %e, "Malformed login body");
        ApiError::BadRequest("Invalid request body".to_string())
    })?;
    payload.email = payload.email.trim().to_string();

    info!(email = %safe_email_log(&payload.email), "🔐 Received login request");
    LoginValidator.validate(&payload).into_result()?;

    match state.backend.login(&payload).await {
        Ok(login) => {
            let pair = login.token_pair();
            let mut response = Json(&login).into_response();
            if let Err(e) = state.cookies.commit(response.headers_mut(), &pair) {
                let mut response = e.into_response();
                state.cookies.revoke(response.headers_mut());
                return Ok(response);
            }

            state
                .identity_cache
                .insert(&pair.access_token, login.user.clone())
                .await;
            info!(email = %safe_email_log(&payload.email), "✅ Login successful, session cookies set");
            Ok(response)
        }
        Err(e) => {
            warn!(
                email = %safe_email_log(&payload.email),
                status = e.status,
                error = %e,
                "Login rejected"
            );
            let error = if e.is_transport() || !e.message.is_empty() {
                ApiError::from(e)
            } else {
                ApiError::Upstream {
                    status: e.status,
                    message: "Login failed".to_string(),
                    code: e.code,
                }
            };
            let mut response = error.into_response();
            state.cookies.revoke(response.headers_mut());
            Ok(response)
        }
    }
}

/// GET /api/auth/oauth/:provider
/// Hands the browser to the backend's provider login
pub async fn oauth_start(
    Extension(state): Extension<Arc<AppState>>,
    Path(provider): Path<String>,
) -> Response {
    if !is_valid_provider(&provider) {
        warn!(provider = %provider, "Rejected unknown OAuth provider name");
        return login_redirect(&state, "unsupported_provider");
    }

    debug!(provider = %provider, "Starting provider login");
    Redirect::to(&state.backend.oauth_start_url(&provider)).into_response()
}

/// GET /api/auth/callback?accessToken=..&refreshToken=..&next=..
/// GET /api/auth/callback?error=..
///
/// Landing point of the provider flow. Tokens become cookies and the
/// browser continues to `next` (same-site paths only) or the dashboard.
pub async fn oauth_callback(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<OAuthCallbackQuery>,
) -> Response {
    if let Some(error) = query.error.as_deref().filter(|e| !e.is_empty()) {
        warn!(error = %error, "Provider login failed");
        return login_redirect(&state, error);
    }

    let Some(pair) = query.token_pair() else {
        warn!("Provider callback without both tokens");
        return login_redirect(&state, "missing_tokens");
    };

    let target = safe_redirect_target(query.next.as_deref())
        .unwrap_or(state.config.post_login_path.as_str())
        .to_string();
    let mut response = Redirect::to(&target).into_response();
    if state.cookies.commit(response.headers_mut(), &pair).is_err() {
        return login_redirect(&state, "session_error");
    }

    info!(
        token = %safe_token_log(&pair.access_token),
        target = %target,
        "✅ Provider login complete"
    );
    response
}

/// POST /api/auth/refresh
///
/// Exchanges the refresh cookie (or, for non-browser clients, a
/// `refreshToken` body field) for a new pair. A refusal clears the cookies.
pub async fn refresh_handler(
    Extension(state): Extension<Arc<AppState>>,
    credentials: SessionCredentials,
    body: Option<Json<RefreshRequest>>,
) -> Response {
    let refresh_token = credentials.refresh_token.or_else(|| {
        body.and_then(|Json(b)| b.refresh_token)
            .filter(|t| !t.is_empty())
    });

    let Some(refresh_token) = refresh_token else {
        debug!("Refresh requested without a refresh token");
        let mut response = ApiError::unauthorized().into_response();
        state.cookies.revoke(response.headers_mut());
        return response;
    };

    match state.backend.refresh_shared(&refresh_token).await {
        Ok(pair) => {
            let mut response = Json(&pair).into_response();
            if let Err(e) = state.cookies.commit(response.headers_mut(), &pair) {
                let mut response = e.into_response();
                state.cookies.revoke(response.headers_mut());
                return response;
            }
            info!("🔄 Session refreshed");
            response
        }
        Err(e) => {
            let transport = e.is_transport();
            let mut response = ApiError::from(e).into_response();
            if !transport {
                state.cookies.revoke(response.headers_mut());
            }
            response
        }
    }
}

/// POST /api/auth/logout
///
/// Best-effort backend invalidation, then the session cookies are cleared
/// no matter how the backend answered.
pub async fn logout_handler(
    Extension(state): Extension<Arc<AppState>>,
    credentials: SessionCredentials,
    body: Option<Json<LogoutRequest>>,
) -> Response {
    let refresh_token = credentials.refresh_token.clone().or_else(|| {
        body.and_then(|Json(b)| b.refresh_token)
            .filter(|t| !t.is_empty())
    });

    match refresh_token.as_deref() {
        Some(refresh) => {
            if let Err(e) = state
                .backend
                .logout(credentials.access_token.as_deref(), refresh)
                .await
            {
                warn!(status = e.status, error = %e, "Backend logout failed, clearing cookies anyway");
            }
        }
        None => debug!("Logout without a refresh token, nothing to invalidate upstream"),
    }

    if let Some(access) = credentials.access_token.as_deref() {
        if let Some(subject) = state.identity_cache.subject_for(access).await {
            state.identity_cache.invalidate_subject(&subject).await;
        }
        state.identity_cache.invalidate_token(access).await;
    }

    let mut response = (
        StatusCode::OK,
        Json(json!({ "success": true, "message": "Logged out" })),
    )
        .into_response();
    state.cookies.revoke(response.headers_mut());
    info!("👋 Session logged out");
    response
}

/// GET /api/auth/me
/// Current user, cached briefly per access token
pub async fn me_handler(
    Extension(state): Extension<Arc<AppState>>,
    session: AuthedSession,
) -> Response {
    if let Some(user) = state.identity_cache.get(&session.access_token).await {
        return Json(json!({ "user": user })).into_response();
    }

    let request_session = session.into_request_session(state.backend.clone());
    let mut response = match state.backend.me(&request_session).await {
        Ok(user) => {
            if let Some(token) = request_session.access_token().await {
                state.identity_cache.insert(&token, user.clone()).await;
            }
            Json(json!({ "user": user })).into_response()
        }
        Err(e) => ApiError::from(e).into_response(),
    };

    let status = response.status();
    request_session
        .apply_to(&state.cookies, response.headers_mut(), status)
        .await;
    response
}
