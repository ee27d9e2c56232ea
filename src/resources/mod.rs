//! # Resources Module
//!
//! Authenticated pass-through to the backend's campaign, creator and
//! profile endpoints, with field names normalized on the way back.

pub mod handlers;
pub mod normalize;
pub mod routes;


pub use routes::resource_routes;
