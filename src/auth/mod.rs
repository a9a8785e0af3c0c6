//! # Auth Module
//!
//! HTTP boundary of the authentication core:
//! - OAuth login / callback endpoints
//! - access-token refresh and logout
//! - AuthedUser extractor for protected routes

pub mod extractors;
pub mod handlers;
pub mod models;
pub mod routes;

#[cfg(test)]
mod tests;

pub use extractors::AuthedUser;
pub use models::User;
pub use routes::auth_routes;
