// Application state shared across all route modules

use reqwest::Client;
use std::sync::Arc;

use super::config::GatewayConfig;
use crate::services::{BackendService, IdentityCache};
use crate::session::CookieSessionWriter;

/// Configuration plus the services every handler needs
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub backend: BackendService,
    pub cookies: CookieSessionWriter,
    pub identity_cache: Arc<IdentityCache>,
}

impl AppState {
    pub fn new(config: GatewayConfig, http: Client) -> Self {
        let backend = BackendService::new(http, config.backend_url.clone());
        let cookies = CookieSessionWriter::new(config.cookies.clone());
        let identity_cache = Arc::new(IdentityCache::new(
            config.identity_cache_ttl_secs,
            config.identity_cache_capacity,
        ));

        Self {
            config: Arc::new(config),
            backend,
            cookies,
            identity_cache,
        }
    }
}
