//! Edge configuration loaded from the environment
//!
//! Every value has a default; environment variables override it.

use cookie::SameSite;
use std::env;
use std::str::FromStr;

/// Cookie attributes shared by both session cookies
#[derive(Debug, Clone)]
pub struct CookieConfig {
    pub access_max_age_secs: i64,
    pub refresh_max_age_secs: i64,
    pub secure: bool,
    pub same_site: SameSite,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            access_max_age_secs: 15 * 60,           // 15 minutes
            refresh_max_age_secs: 30 * 24 * 60 * 60, // 30 days
            secure: true,
            same_site: SameSite::Lax,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub backend_url: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub cookies: CookieConfig,
    pub identity_cache_ttl_secs: i64,
    pub identity_cache_capacity: usize,
    pub login_path: String,
    pub post_login_path: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:4000".to_string(),
            port: 3000,
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(),
            ],
            cookies: CookieConfig::default(),
            identity_cache_ttl_secs: 60,
            identity_cache_capacity: 1024,
            login_path: "/login".to_string(),
            post_login_path: "/dashboard".to_string(),
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

fn parse_same_site(value: &str) -> Option<SameSite> {
    match value.trim().to_lowercase().as_str() {
        "lax" => Some(SameSite::Lax),
        "strict" => Some(SameSite::Strict),
        _ => None,
    }
}

impl GatewayConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = env::var("BACKEND_URL") {
            let url = url.trim().trim_end_matches('/');
            if !url.is_empty() {
                config.backend_url = url.to_string();
            }
        }

        if let Some(port) = env_parse::<u16>("PORT") {
            config.port = port;
        }

        if let Ok(origins) = env::var("CORS_ORIGINS") {
            config.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Some(secs) = env_parse::<i64>("ACCESS_TOKEN_MAX_AGE_SECS").filter(|s| *s > 0) {
            config.cookies.access_max_age_secs = secs;
        }

        if let Some(secs) = env_parse::<i64>("REFRESH_TOKEN_MAX_AGE_SECS").filter(|s| *s > 0) {
            config.cookies.refresh_max_age_secs = secs;
        }

        // COOKIE_SECURE=false is only meant for plain-http local development
        if let Ok(secure) = env::var("COOKIE_SECURE") {
            config.cookies.secure = secure.trim().to_lowercase() != "false";
        }

        if let Some(same_site) = env::var("COOKIE_SAME_SITE")
            .ok()
            .and_then(|v| parse_same_site(&v))
        {
            config.cookies.same_site = same_site;
        }

        if let Some(ttl) = env_parse::<i64>("IDENTITY_CACHE_TTL_SECS").filter(|t| *t >= 0) {
            config.identity_cache_ttl_secs = ttl;
        }

        if let Some(capacity) = env_parse::<usize>("IDENTITY_CACHE_CAPACITY").filter(|c| *c > 0) {
            config.identity_cache_capacity = capacity;
        }

        if let Ok(path) = env::var("LOGIN_PATH") {
            if path.starts_with('/') {
                config.login_path = path;
            }
        }

        if let Ok(path) = env::var("POST_LOGIN_PATH") {
            if path.starts_with('/') {
                config.post_login_path = path;
            }
        }

        config
    }
}
