//! # Auth Module
//!
//! Session lifecycle at the edge:
//! - Email/password and external provider login
//! - httpOnly session cookies, refresh and logout
//! - `AuthedSession` extractor for protected routes

pub mod extractors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod validators;


pub use extractors::{AuthedSession, SessionCredentials};
pub use models::{LoginRequest, LoginResponse};
pub use routes::auth_routes;
