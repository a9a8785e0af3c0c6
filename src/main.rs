// src/main.rs
use anyhow::Context;
use axum::{extract::Extension, Router};
use dotenv::dotenv;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::env;
use std::{net::SocketAddr, str::FromStr, sync::Arc};
use tokio::{net::TcpListener, sync::RwLock};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod auth;
mod common;
mod services;

use common::AppState;
use services::{
    AuthService, GoogleProvider, RefreshTokenStore, SessionCookieService, StateStore,
    TokenService, UserDirectory,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // ========================================================================
    // ENVIRONMENT CONFIGURATION
    //
    // Key material is validated here; a bad configuration kills the process
    // before it ever accepts a request.
    // ========================================================================

    let database_url =
        env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://authgate.db".to_string());
    let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

    let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
    let google_client_id =
        env::var("GOOGLE_CLIENT_ID").context("GOOGLE_CLIENT_ID must be set")?;
    let google_client_secret =
        env::var("GOOGLE_CLIENT_SECRET").context("GOOGLE_CLIENT_SECRET must be set")?;
    let google_redirect_url =
        env::var("GOOGLE_REDIRECT_URL").context("GOOGLE_REDIRECT_URL must be set")?;
    let google_hosted_domain = env::var("GOOGLE_HOSTED_DOMAIN").ok().filter(|s| !s.is_empty());

    let cookie_secure = env::var("COOKIE_SECURE")
        .map(|v| v == "true")
        .unwrap_or(false);

    let session_cookies = Arc::new(
        SessionCookieService::from_env()
            .context("SESSION_HASH_KEY / SESSION_BLOCK_KEY must be base64-encoded 32-byte keys")?,
    );

    // ========================================================================
    // DATABASE SETUP
    // ========================================================================

    let connect_options = SqliteConnectOptions::from_str(&database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .connect_with(connect_options)
        .await?;

    common::migrations::run_migrations(&pool).await?;

    // ========================================================================
    // SERVICE INITIALIZATION
    // ========================================================================

    let state_store = Arc::new(StateStore::new());
    let sweeper = StateStore::start_sweeper(state_store.clone());
    info!("StateStore initialized, sweeper running");

    let refresh_tokens = RefreshTokenStore::new(pool.clone());
    if let Err(e) = refresh_tokens.sweep_expired().await {
        warn!(error = %e, "Failed to sweep expired refresh tokens at startup");
    }

    let provider = Arc::new(
        GoogleProvider::new(
            google_client_id,
            google_client_secret,
            google_redirect_url,
            google_hosted_domain,
        )
        .context("failed to build provider HTTP client")?,
    );
    info!("GoogleProvider initialized");

    let auth_service = Arc::new(AuthService::new(
        state_store,
        TokenService::new(&jwt_secret),
        refresh_tokens,
        UserDirectory::new(pool),
        provider,
    ));
    info!("AuthService initialized");

    // ========================================================================
    // APPLICATION STATE AND ROUTER
    // ========================================================================

    let app_state = AppState {
        auth: auth_service,
        session_cookies,
        cookie_secure,
    };

    let shared = Arc::new(RwLock::new(app_state));

    let app = Router::new()
        .merge(auth::auth_routes())
        .layer(Extension(shared))
        .layer(TraceLayer::new_for_http())
        .layer({
            let cors_origins = env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3000,http://localhost:5173".to_string());

            let origins: Vec<axum::http::HeaderValue> = cors_origins
                .split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect();

            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
                .allow_headers([
                    axum::http::header::AUTHORIZATION,
                    axum::http::header::CONTENT_TYPE,
                ])
                .allow_credentials(true)
        });

    // ========================================================================
    // SERVER STARTUP
    // ========================================================================

    let addr: SocketAddr = bind_addr.parse().context("invalid BIND_ADDR")?;
    let listener = TcpListener::bind(addr).await?;
    info!("Server is running on http://{}", addr);

    axum::serve(listener, app).await?;

    sweeper.abort();
    Ok(())
}
