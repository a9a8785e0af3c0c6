//! Authentication handlers
//!
//! Thin HTTP boundary over the auth orchestrator: every operation returns
//! its credentials both as JSON and as encrypted cookies, and the client
//! picks whichever transport it uses. Cookie and header forms carry the
//! same canonical tokens.

use axum::{
    extract::{Extension, Query},
    http::{
        header::{HeaderName, SET_COOKIE},
        HeaderMap,
    },
    response::{AppendHeaders, IntoResponse, Redirect},
    Json,
};
use cookie::{Cookie, SameSite};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use super::extractors::AuthedUser;
use super::models::{CallbackParams, RefreshRequest, SessionPayload};
use crate::common::{ApiError, AppState};

pub const SESSION_COOKIE: &str = "session";
pub const REFRESH_COOKIE: &str = "refresh";

/// Session cookie tracks the access-token lifetime, refresh cookie the
/// refresh-token lifetime.
const SESSION_COOKIE_MAX_AGE_SECS: i64 = 24 * 60 * 60;
const REFRESH_COOKIE_MAX_AGE_SECS: i64 = 30 * 24 * 60 * 60;

/// GET /auth/google
/// Starts the OAuth flow: issues a CSRF state and redirects to the provider.
pub async fn login_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
) -> Result<Redirect, ApiError> {
    let state = state_lock.read().await.clone();

    let url = state.auth.begin_login();
    info!("Starting OAuth login, redirecting to provider");

    Ok(Redirect::temporary(&url))
}

/// GET /auth/google/callback
/// Redirect target for the provider. Validates state, exchanges the code,
/// resolves the user and issues credentials.
///
/// # Response
/// ```json
/// {
///   "token": "<jwt>",
///   "refreshToken": "<opaque value>",
///   "user": { ... }
/// }
/// ```
/// plus `Set-Cookie: session=...` and `Set-Cookie: refresh=...`.
pub async fn callback_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Query(params): Query<CallbackParams>,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await.clone();

    if let Some(provider_error) = params.error {
        warn!(oauth_error = %provider_error, "Provider returned error on callback");
        return Err(ApiError::Unauthorized(
            "provider denied authorization".to_string(),
        ));
    }

    let oauth_state = params
        .state
        .ok_or_else(|| ApiError::BadRequest("missing state parameter".to_string()))?;
    let code = params
        .code
        .ok_or_else(|| ApiError::BadRequest("missing code parameter".to_string()))?;

    let tokens = state.auth.handle_callback(&oauth_state, &code).await?;

    let session_value = state
        .session_cookies
        .encode(SESSION_COOKIE, &SessionPayload::from(&tokens.user))
        .map_err(|e| {
            error!(error = %e, "Failed to encode session cookie");
            ApiError::InternalServer("failed to create session".to_string())
        })?;
    let refresh_value = state
        .session_cookies
        .encode(REFRESH_COOKIE, &tokens.refresh_token)
        .map_err(|e| {
            error!(error = %e, "Failed to encode refresh cookie");
            ApiError::InternalServer("failed to create session".to_string())
        })?;

    let headers = AppendHeaders([
        (
            SET_COOKIE,
            build_cookie(
                SESSION_COOKIE,
                &session_value,
                SESSION_COOKIE_MAX_AGE_SECS,
                state.cookie_secure,
            ),
        ),
        (
            SET_COOKIE,
            build_cookie(
                REFRESH_COOKIE,
                &refresh_value,
                REFRESH_COOKIE_MAX_AGE_SECS,
                state.cookie_secure,
            ),
        ),
    ]);

    Ok((
        headers,
        Json(serde_json::json!({
            "token": tokens.token,
            "refreshToken": tokens.refresh_token,
            "user": tokens.user,
        })),
    ))
}

/// POST /auth/refresh
/// Rotates the refresh token and issues a new access token. The refresh
/// value comes from the JSON body or, absent that, the `refresh` cookie.
/// The response always carries the freshly rotated value.
pub async fn refresh_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    headers: HeaderMap,
    body: Option<Json<RefreshRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await.clone();

    let old_refresh_token = match body {
        Some(Json(request)) => request.refresh_token,
        None => refresh_token_from_cookie(&state, &headers)
            .ok_or_else(|| ApiError::Unauthorized("invalid refresh token".to_string()))?,
    };

    let pair = state.auth.refresh(&old_refresh_token).await?;

    // The rotation is committed at this point, so everything below is
    // best-effort: a cookie that cannot be renewed is skipped, never allowed
    // to turn an already-rotated refresh into an error response that would
    // strand the client without the new value.
    let mut cookies: Vec<(HeaderName, String)> = Vec::new();

    match state.auth.user_by_id(&pair.user_id).await {
        Ok(user) => match state
            .session_cookies
            .encode(SESSION_COOKIE, &SessionPayload::from(&user))
        {
            Ok(session_value) => cookies.push((
                SET_COOKIE,
                build_cookie(
                    SESSION_COOKIE,
                    &session_value,
                    SESSION_COOKIE_MAX_AGE_SECS,
                    state.cookie_secure,
                ),
            )),
            Err(e) => warn!(error = %e, "Failed to encode session cookie during refresh"),
        },
        Err(e) => warn!(error = %e, "Failed to load profile during refresh"),
    }

    match state
        .session_cookies
        .encode(REFRESH_COOKIE, &pair.refresh_token)
    {
        Ok(refresh_value) => cookies.push((
            SET_COOKIE,
            build_cookie(
                REFRESH_COOKIE,
                &refresh_value,
                REFRESH_COOKIE_MAX_AGE_SECS,
                state.cookie_secure,
            ),
        )),
        Err(e) => warn!(error = %e, "Failed to encode refresh cookie during refresh"),
    }

    let set_cookies = AppendHeaders(cookies);

    Ok((
        set_cookies,
        Json(serde_json::json!({
            "token": pair.token,
            "refreshToken": pair.refresh_token,
        })),
    ))
}

/// POST /auth/logout
/// Invalidates the refresh token (best-effort) and clears both cookies.
/// Always succeeds from the client's point of view.
pub async fn logout_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    headers: HeaderMap,
    body: Option<Json<RefreshRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await.clone();

    let refresh_token = match body {
        Some(Json(request)) => Some(request.refresh_token),
        None => refresh_token_from_cookie(&state, &headers),
    };

    if let Some(token) = refresh_token {
        state.auth.logout(&token).await;
    }

    info!("User logout successful");

    let cleared = AppendHeaders([
        (SET_COOKIE, clear_cookie(SESSION_COOKIE, state.cookie_secure)),
        (SET_COOKIE, clear_cookie(REFRESH_COOKIE, state.cookie_secure)),
    ]);

    Ok((
        cleared,
        Json(serde_json::json!({
            "message": "Logout successful"
        })),
    ))
}

/// GET /api/me
/// Returns the current authenticated user's information
pub async fn me_handler(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    authed: AuthedUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let state = state_lock.read().await.clone();

    let user = state.auth.user_by_id(&authed.id).await?;

    Ok(Json(serde_json::json!({ "user": user })))
}

// ---- Cookie helpers ----

fn build_cookie(name: &str, value: &str, max_age_secs: i64, secure: bool) -> String {
    let mut cookie = Cookie::new(name.to_string(), value.to_string());
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_secure(secure);
    cookie.set_max_age(cookie::time::Duration::seconds(max_age_secs));
    cookie.to_string()
}

fn clear_cookie(name: &str, secure: bool) -> String {
    build_cookie(name, "", 0, secure)
}

/// Finds a cookie by name in the request's Cookie headers.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(axum::http::header::COOKIE)?.to_str().ok()?;
    Cookie::split_parse(raw.to_string())
        .filter_map(|c| c.ok())
        .find(|c| c.name() == name)
        .map(|c| c.value().to_string())
}

/// Decodes the encrypted `refresh` cookie into the refresh-token value.
fn refresh_token_from_cookie(state: &AppState, headers: &HeaderMap) -> Option<String> {
    let value = read_cookie(headers, REFRESH_COOKIE)?;
    state.session_cookies.decode(REFRESH_COOKIE, &value).ok()
}
