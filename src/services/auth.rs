// src/services/auth.rs
//! Auth orchestrator: composes the state store, token codec, refresh-token
//! store, user directory and identity-provider client into the login,
//! callback, refresh and logout operations. The HTTP layer stays thin and
//! picks the transport (JSON body, cookies); all credential logic lives here.

use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::auth::models::User;
use crate::common::{retry_with_backoff, safe_email_log};
use crate::services::google::{AuthProvider, ProviderError};
use crate::services::refresh_token::{RefreshTokenError, RefreshTokenStore};
use crate::services::state_store::StateStore;
use crate::services::token::{TokenError, TokenService};
use crate::services::users::{UserDirectory, UserDirectoryError};

/// Bounded attempts for the get-or-create user step; datastore contention
/// there is typically transient.
const USER_DIRECTORY_ATTEMPTS: u32 = 3;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid state parameter")]
    InvalidState,

    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("user directory error: {0}")]
    UserDirectory(#[from] UserDirectoryError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    RefreshToken(#[from] RefreshTokenError),
}

/// Credentials issued after a successful callback.
#[derive(Debug)]
pub struct AuthTokens {
    pub user: User,
    pub token: String,
    pub refresh_token: String,
}

/// Credentials issued after a successful refresh.
#[derive(Debug)]
pub struct TokenPair {
    pub user_id: String,
    pub token: String,
    pub refresh_token: String,
}

pub struct AuthService {
    state_store: Arc<StateStore>,
    tokens: TokenService,
    refresh_tokens: RefreshTokenStore,
    users: UserDirectory,
    provider: Arc<dyn AuthProvider>,
}

impl AuthService {
    pub fn new(
        state_store: Arc<StateStore>,
        tokens: TokenService,
        refresh_tokens: RefreshTokenStore,
        users: UserDirectory,
        provider: Arc<dyn AuthProvider>,
    ) -> Self {
        Self {
            state_store,
            tokens,
            refresh_tokens,
            users,
            provider,
        }
    }

    /// Starts a login attempt: issues a CSRF state and returns the provider
    /// authorization URL bound to it.
    pub fn begin_login(&self) -> String {
        let state = self.state_store.issue_state();
        self.provider.auth_url(&state)
    }

    /// Completes the OAuth callback.
    ///
    /// The state is validated and consumed before anything else happens - an
    /// unknown, expired or replayed state fails without a single provider
    /// call. The get-or-create user step is retried with bounded backoff
    /// since it is idempotent by construction.
    pub async fn handle_callback(&self, state: &str, code: &str) -> Result<AuthTokens, AuthError> {
        if !self.state_store.validate_state(state) {
            warn!("Callback rejected: invalid OAuth state");
            return Err(AuthError::InvalidState);
        }

        let provider_token = self.provider.exchange_code(code).await?;
        let profile = self.provider.user_info(&provider_token).await?;

        let user = retry_with_backoff(
            || {
                self.users.get_or_create_user(
                    &profile.email,
                    profile.first_name.as_deref(),
                    profile.last_name.as_deref(),
                    profile.picture_url.as_deref(),
                )
            },
            USER_DIRECTORY_ATTEMPTS,
        )
        .await?;

        let token = self.tokens.issue(&user.id)?;
        let refresh_token = self.refresh_tokens.store(&user.id).await?;

        info!(
            user_id = %user.id,
            email = %safe_email_log(&user.email),
            "User authentication successful"
        );

        Ok(AuthTokens {
            user,
            token,
            refresh_token,
        })
    }

    /// Rotates a refresh token and issues a fresh access token.
    ///
    /// The old value is logically consumed the moment this succeeds; the
    /// conditional rotation guarantees at most one of two concurrent
    /// refreshes with the same value can win. The returned pair always
    /// carries the freshly rotated value.
    pub async fn refresh(&self, old_refresh_token: &str) -> Result<TokenPair, AuthError> {
        let user_id = self.refresh_tokens.verify(old_refresh_token).await?;

        let new_value = RefreshTokenStore::new_token_value();
        self.refresh_tokens
            .rotate(old_refresh_token, &new_value)
            .await?;

        let token = self.tokens.issue(&user_id)?;

        info!(user_id = %user_id, "Refreshed access token");

        Ok(TokenPair {
            user_id,
            token,
            refresh_token: new_value,
        })
    }

    /// Invalidates a refresh token. Best-effort: the client discards its
    /// credentials regardless, so failures are logged and swallowed.
    pub async fn logout(&self, refresh_token: &str) {
        if let Err(e) = self.refresh_tokens.invalidate(refresh_token).await {
            warn!(error = %e, "Failed to invalidate refresh token during logout");
        }
    }

    /// Verifies an access token and returns its subject.
    pub fn authenticate(&self, access_token: &str) -> Result<String, AuthError> {
        Ok(self.tokens.verify(access_token)?)
    }

    /// Loads a user's profile for authenticated requests.
    pub async fn user_by_id(&self, user_id: &str) -> Result<User, AuthError> {
        Ok(self.users.get_user_by_id(user_id).await?)
    }
}
