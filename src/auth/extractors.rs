//! Authentication extractors for Axum

use async_trait::async_trait;
use axum::{
    extract::{Extension, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::handlers::read_cookie;
use super::models::SessionPayload;
use crate::common::{safe_email_log, ApiError, AppState};

/// Authenticated user extractor
///
/// Resolves the caller from a `Bearer` access token or, failing that, from
/// the encrypted `session` cookie, then confirms the user still exists.
/// Every token/cookie failure is the same uniform 401 - the response never
/// says whether a credential was missing, expired or tampered with.
#[derive(Debug)]
pub struct AuthedUser {
    pub id: String,
    pub email: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Extension(state_lock): Extension<Arc<RwLock<AppState>>> =
            Extension::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::InternalServer("missing app state".to_string()))?;

        let app_state = state_lock.read().await.clone();

        let user_id = match bearer_token(parts) {
            Some(token) => app_state.auth.authenticate(&token).map_err(|e| {
                warn!(error = %e, "Access token validation failed");
                ApiError::Unauthorized("invalid token".into())
            })?,
            None => {
                let cookie_value = read_cookie(&parts.headers, "session").ok_or_else(|| {
                    warn!("Authentication failed: no bearer token or session cookie");
                    ApiError::Unauthorized("invalid token".into())
                })?;

                let payload: SessionPayload = app_state
                    .session_cookies
                    .decode("session", &cookie_value)
                    .map_err(|_| {
                        warn!("Session cookie validation failed");
                        ApiError::Unauthorized("invalid token".into())
                    })?;
                payload.user_id
            }
        };

        let user = app_state.auth.user_by_id(&user_id).await.map_err(|_| {
            warn!(user_id = %user_id, "Authentication failed: user not found");
            ApiError::Unauthorized("invalid token".into())
        })?;

        debug!(
            user_id = %user.id,
            email = %safe_email_log(&user.email),
            "User authenticated"
        );

        Ok(AuthedUser {
            id: user.id,
            email: user.email,
        })
    }
}

/// Pulls the token out of the Authorization header, accepting both
/// "Bearer <token>" and a raw token.
fn bearer_token(parts: &Parts) -> Option<String> {
    let header = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    Some(
        header
            .strip_prefix("Bearer ")
            .unwrap_or(header)
            .to_string(),
    )
}
