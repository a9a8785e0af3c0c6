// src/services/refresh_token.rs
//! Persisted refresh tokens with rotation-on-use.
//!
//! Exactly one active token value maps to a user under the rotation policy:
//! every refresh replaces the value in place, and a value that has been
//! rotated away or invalidated can never authenticate again. Rotation is a
//! single conditional UPDATE keyed on the old value, so two concurrent
//! refreshes of the same stale token cannot both succeed - the loser finds
//! zero matching rows. Rotation-on-use doubles as a replay defense: a stolen
//! token burns on first use and the legitimate client's next refresh fails,
//! which is an observable signal of compromise.

use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::common::{generate_token_id, safe_token_log};

/// Refresh-token lifetime; reset on every rotation.
const REFRESH_TOKEN_TTL_DAYS: i64 = 30;

#[derive(Debug, Error)]
pub enum RefreshTokenError {
    #[error("invalid refresh token")]
    TokenInvalid,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone)]
pub struct RefreshTokenStore {
    pool: SqlitePool,
}

impl RefreshTokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Generates a fresh unguessable token value.
    pub fn new_token_value() -> String {
        Uuid::new_v4().to_string()
    }

    /// Persists a new refresh token for `user_id` and returns its value.
    pub async fn store(&self, user_id: &str) -> Result<String, RefreshTokenError> {
        let token = Self::new_token_value();
        let expires_at = Utc::now() + Duration::days(REFRESH_TOKEN_TTL_DAYS);

        sqlx::query(
            "INSERT INTO refresh_tokens (id, user_id, token, expires_at) VALUES (?, ?, ?, ?)",
        )
        .bind(generate_token_id())
        .bind(user_id)
        .bind(&token)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        info!(user_id = %user_id, "Stored refresh token");
        Ok(token)
    }

    /// Resolves a token value to its user.
    ///
    /// Absent and expired tokens are both `TokenInvalid`; stale tokens are
    /// never silently extended.
    pub async fn verify(&self, token: &str) -> Result<String, RefreshTokenError> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT user_id FROM refresh_tokens WHERE token = ? AND expires_at > ?",
        )
        .bind(token)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some((user_id,)) => Ok(user_id),
            None => Err(RefreshTokenError::TokenInvalid),
        }
    }

    /// Atomically replaces `old` with `new`, resetting the expiry.
    ///
    /// The match-on-old-value condition makes rotation single-use: once a
    /// value has been rotated away, a second rotation attempt with it
    /// matches nothing and fails.
    pub async fn rotate(&self, old: &str, new: &str) -> Result<(), RefreshTokenError> {
        let expires_at = Utc::now() + Duration::days(REFRESH_TOKEN_TTL_DAYS);

        let result = sqlx::query(
            "UPDATE refresh_tokens SET token = ?, expires_at = ? WHERE token = ? AND expires_at > ?",
        )
        .bind(new)
        .bind(expires_at)
        .bind(old)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RefreshTokenError::TokenInvalid);
        }

        debug!(old = %safe_token_log(old), "Rotated refresh token");
        Ok(())
    }

    /// Deletes a token. Idempotent for callers; a missing row is only a
    /// debug-level observation.
    pub async fn invalidate(&self, token: &str) -> Result<(), RefreshTokenError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            debug!(token = %safe_token_log(token), "Refresh token already gone");
        } else {
            info!("Invalidated refresh token");
        }
        Ok(())
    }

    /// Removes expired rows. Run at startup; expiry is re-checked on every
    /// lookup regardless.
    pub async fn sweep_expired(&self) -> Result<u64, RefreshTokenError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= ?")
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        let removed = result.rows_affected();
        if removed > 0 {
            info!(removed, "Swept expired refresh tokens");
        }
        Ok(removed)
    }
}
