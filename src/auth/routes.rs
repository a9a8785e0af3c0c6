//! Authentication routes

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers;

/// Creates and returns the authentication router
///
/// # Routes
/// - `GET /auth/google` - Start the OAuth login flow (redirect to provider)
/// - `GET /auth/google/callback` - Provider redirect target
/// - `POST /auth/refresh` - Rotate refresh token, issue new access token
/// - `POST /auth/logout` - Invalidate refresh token, clear cookies
/// - `GET /api/me` - Current user information (authenticated)
pub fn auth_routes() -> Router {
    Router::new()
        .route("/auth/google", get(handlers::login_handler))
        .route("/auth/google/callback", get(handlers::callback_handler))
        .route("/auth/refresh", post(handlers::refresh_handler))
        .route("/auth/logout", post(handlers::logout_handler))
        .route("/api/me", get(handlers::me_handler))
}
