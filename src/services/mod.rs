// src/services/mod.rs
//
// Shared services injected into the route handlers

pub mod backend;
pub mod identity_cache;
pub mod shared_refresh;

// Re-export commonly used types for convenience
pub use backend::BackendService;
pub use identity_cache::IdentityCache;
pub use shared_refresh::SharedRefresh;
