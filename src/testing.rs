//! Test support: an in-process fake of the backend API and helpers to serve
//! the edge router on an ephemeral port.

use axum::{
    extract::{Extension, Path, Query},
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use cookie::Cookie;
use reqwest::Client;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::RwLock;

use crate::common::{AppState, GatewayConfig};
use crate::session::locator::{read_cookie, resolve};

#[derive(Debug)]
pub struct FakeBackend {
    pub current_access: RwLock<String>,
    pub current_refresh: RwLock<String>,
    pub refresh_enabled: AtomicBool,
    pub logout_fails: AtomicBool,
    rotations: AtomicUsize,
    hits: Mutex<HashMap<String, usize>>,
}

impl FakeBackend {
    fn new() -> Self {
        Self {
            current_access: RwLock::new("A".to_string()),
            current_refresh: RwLock::new("R".to_string()),
            refresh_enabled: AtomicBool::new(true),
            logout_fails: AtomicBool::new(false),
            rotations: AtomicUsize::new(0),
            hits: Mutex::new(HashMap::new()),
        }
    }

    fn hit(&self, key: &str) {
        *self.hits.lock().unwrap().entry(key.to_string()).or_insert(0) += 1;
    }

    /// Calls seen for `"METHOD /path"`
    pub fn hits(&self, key: &str) -> usize {
        self.hits.lock().unwrap().get(key).copied().unwrap_or(0)
    }

    pub fn total_hits(&self) -> usize {
        self.hits.lock().unwrap().values().sum()
    }

    /// Simulates access token expiry
    pub async fn expire_access(&self) {
        *self.current_access.write().await = "expired-elsewhere".to_string();
    }

    async fn authorized(&self, headers: &HeaderMap) -> bool {
        let current = self.current_access.read().await.clone();
        resolve(headers).as_deref() == Some(current.as_str())
    }
}

fn unauthorized(message: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "message": message }))).into_response()
}

async fn login(Extension(fake): Extension<Arc<FakeBackend>>, Json(body): Json<Value>) -> Response {
    fake.hit("POST /auth/login");
    if body["email"] == "a@b.com" && body["password"] == "12345678" {
        Json(json!({
            "user": { "id": "u1", "email": "a@b.com", "name": "Ada" },
            "accessToken": *fake.current_access.read().await,
            "refreshToken": *fake.current_refresh.read().await,
        }))
        .into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Invalid credentials", "code": "INVALID_CREDENTIALS" })),
        )
            .into_response()
    }
}

async fn refresh(Extension(fake): Extension<Arc<FakeBackend>>, headers: HeaderMap) -> Response {
    fake.hit("POST /auth/refresh");
    let presented = read_cookie(&headers, "refresh_token");
    let current = fake.current_refresh.read().await.clone();
    if !fake.refresh_enabled.load(Ordering::SeqCst) || presented.as_deref() != Some(current.as_str()) {
        return unauthorized("Invalid refresh token");
    }

    let n = fake.rotations.fetch_add(1, Ordering::SeqCst) + 1;
    let access = format!("A-{}", n);
    let rotated = format!("R-{}", n);
    *fake.current_access.write().await = access.clone();
    *fake.current_refresh.write().await = rotated.clone();

    let mut response = Json(json!({ "success": true })).into_response();
    for (name, value) in [("access_token", access), ("refresh_token", rotated)] {
        let cookie = Cookie::build((name, value)).http_only(true).path("/").build();
        response
            .headers_mut()
            .append(SET_COOKIE, cookie.to_string().parse().unwrap());
    }
    response
}

async fn logout(Extension(fake): Extension<Arc<FakeBackend>>, Json(_body): Json<Value>) -> Response {
    fake.hit("POST /auth/logout");
    if fake.logout_fails.load(Ordering::SeqCst) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "message": "boom" })),
        )
            .into_response();
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn me(Extension(fake): Extension<Arc<FakeBackend>>, headers: HeaderMap) -> Response {
    fake.hit("GET /auth/me");
    if !fake.authorized(&headers).await {
        return unauthorized("Token expired");
    }
    Json(json!({ "user": { "id": "u1", "email": "a@b.com", "name": "Ada" } })).into_response()
}

async fn list_campaigns(
    Extension(fake): Extension<Arc<FakeBackend>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    fake.hit("GET /campaigns");
    if !fake.authorized(&headers).await {
        return unauthorized("Token expired");
    }
    let all = vec![
        json!({ "_id": 1, "campaignName": "Spring Launch", "brand": { "name": "Acme" }, "status": "active" }),
        json!({ "id": "c2", "title": "Winter Sale", "brandName": "Globex", "status": "draft" }),
    ];
    let items: Vec<Value> = match query.get("status") {
        Some(status) => all.into_iter().filter(|c| c["status"] == *status).collect(),
        None => all,
    };
    Json(Value::Array(items)).into_response()
}

async fn create_campaign(
    Extension(fake): Extension<Arc<FakeBackend>>,
    headers: HeaderMap,
    Json(mut body): Json<Value>,
) -> Response {
    fake.hit("POST /campaigns");
    if !fake.authorized(&headers).await {
        return unauthorized("Token expired");
    }
    body["_id"] = json!("c-new");
    (StatusCode::CREATED, Json(body)).into_response()
}

async fn get_campaign(
    Extension(fake): Extension<Arc<FakeBackend>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    fake.hit("GET /campaigns/:id");
    if !fake.authorized(&headers).await {
        return unauthorized("Token expired");
    }
    if id == "missing" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "Campaign not found", "code": "NOT_FOUND" })),
        )
            .into_response();
    }
    Json(json!({ "data": { "campaignId": id, "name": "Found" } })).into_response()
}

async fn delete_campaign(
    Extension(fake): Extension<Arc<FakeBackend>>,
    headers: HeaderMap,
) -> Response {
    fake.hit("DELETE /campaigns/:id");
    if !fake.authorized(&headers).await {
        return unauthorized("Token expired");
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn list_creators(Extension(fake): Extension<Arc<FakeBackend>>, headers: HeaderMap) -> Response {
    fake.hit("GET /creators");
    if !fake.authorized(&headers).await {
        return unauthorized("Token expired");
    }
    Json(json!({
        "data": [
            { "creatorId": "cr1", "displayName": "Bea", "avatarUrl": "https://cdn/bea.png" },
            { "userId": 9, "username": "cal" }
        ],
        "total": 2
    }))
    .into_response()
}

async fn get_creator(
    Extension(fake): Extension<Arc<FakeBackend>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    fake.hit("GET /creators/:id");
    if !fake.authorized(&headers).await {
        return unauthorized("Token expired");
    }
    Json(json!({ "_id": id, "fullName": "Bea Creator" })).into_response()
}

async fn get_profile(Extension(fake): Extension<Arc<FakeBackend>>, headers: HeaderMap) -> Response {
    fake.hit("GET /profile");
    if !fake.authorized(&headers).await {
        return unauthorized("Token expired");
    }
    Json(json!({ "id": "u1", "bio": "hello" })).into_response()
}

async fn update_profile(
    Extension(fake): Extension<Arc<FakeBackend>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    fake.hit("PUT /profile");
    if !fake.authorized(&headers).await {
        return unauthorized("Token expired");
    }
    Json(body).into_response()
}

/// Always answers 401, whatever the token
async fn locked(Extension(fake): Extension<Arc<FakeBackend>>) -> Response {
    fake.hit("GET /locked");
    unauthorized("Locked")
}

async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service()).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Starts the fake backend; returns its base URL and handle
pub async fn spawn_backend() -> (String, Arc<FakeBackend>) {
    let fake = Arc::new(FakeBackend::new());
    let router = Router::new()
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
        .route("/campaigns", get(list_campaigns).post(create_campaign))
        .route("/campaigns/:id", get(get_campaign).delete(delete_campaign))
        .route("/creators", get(list_creators))
        .route("/creators/:id", get(get_creator))
        .route("/profile", get(get_profile).put(update_profile))
        .route("/locked", get(locked))
        .layer(Extension(fake.clone()));
    (serve(router).await, fake)
}

pub fn test_config(backend_url: &str) -> GatewayConfig {
    GatewayConfig {
        backend_url: backend_url.to_string(),
        ..GatewayConfig::default()
    }
}

/// Starts the edge in front of `backend_url`; returns its base URL
pub async fn spawn_edge(backend_url: &str) -> String {
    let state = AppState::new(test_config(backend_url), Client::new());
    serve(crate::build_router(state)).await
}

/// Edge + fake backend
pub async fn spawn_stack() -> (String, Arc<FakeBackend>) {
    let (backend_url, fake) = spawn_backend().await;
    let edge_url = spawn_edge(&backend_url).await;
    (edge_url, fake)
}

/// A browser stand-in that neither stores cookies nor follows redirects
pub fn raw_client() -> Client {
    Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

/// `Set-Cookie` headers of a response keyed by cookie name
pub fn set_cookies(response: &reqwest::Response) -> HashMap<String, Cookie<'static>> {
    response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .map(|v| Cookie::parse(v.to_str().unwrap().to_string()).unwrap())
        .map(|c| (c.name().to_string(), c))
        .collect()
}

/// True when the named cookie is being deleted
pub fn is_removal(cookie: &Cookie<'_>) -> bool {
    cookie.value().is_empty() && cookie.max_age() == Some(cookie::time::Duration::ZERO)
}

/// An address nothing listens on
pub async fn dead_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}
