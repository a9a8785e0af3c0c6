// src/services/users.rs
//! User directory: lazy get-or-create keyed by unique email.

use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, info};

use crate::auth::models::User;
use crate::common::{generate_user_id, safe_email_log};

#[derive(Debug, Error)]
pub enum UserDirectoryError {
    #[error("user not found")]
    NotFound,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone)]
pub struct UserDirectory {
    pool: SqlitePool,
}

impl UserDirectory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Returns the user for `email`, creating one on first login.
    ///
    /// Idempotent: the UNIQUE constraint on email plus the conflict-ignoring
    /// insert means concurrent first logins for the same address converge on
    /// a single row, and repeated calls always return the same user.
    pub async fn get_or_create_user(
        &self,
        email: &str,
        first_name: Option<&str>,
        last_name: Option<&str>,
        picture_url: Option<&str>,
    ) -> Result<User, UserDirectoryError> {
        if let Some(user) = self.get_user_by_email(email).await? {
            debug!(email = %safe_email_log(email), "Found existing user");
            return Ok(user);
        }

        let id = generate_user_id();
        sqlx::query(
            r#"
            INSERT INTO users (id, email, first_name, last_name, picture_url)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(email) DO NOTHING
            "#,
        )
        .bind(&id)
        .bind(email)
        .bind(first_name)
        .bind(last_name)
        .bind(picture_url)
        .execute(&self.pool)
        .await?;

        // re-read: a concurrent insert may have won the conflict
        let user = self
            .get_user_by_email(email)
            .await?
            .ok_or(UserDirectoryError::NotFound)?;

        if user.id == id {
            info!(
                user_id = %user.id,
                email = %safe_email_log(email),
                "Created new user account"
            );
        }

        Ok(user)
    }

    pub async fn get_user_by_id(&self, id: &str) -> Result<User, UserDirectoryError> {
        let user: Option<User> = sqlx::query_as(
            "SELECT id, email, first_name, last_name, picture_url FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        user.ok_or(UserDirectoryError::NotFound)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, UserDirectoryError> {
        let user: Option<User> = sqlx::query_as(
            "SELECT id, email, first_name, last_name, picture_url FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_directory() -> UserDirectory {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::common::migrations::run_migrations(&pool).await.unwrap();
        UserDirectory::new(pool)
    }

    #[tokio::test]
    async fn test_get_or_create_is_idempotent() {
        let directory = test_directory().await;

        let first = directory
            .get_or_create_user("ada@example.com", Some("Ada"), Some("Lovelace"), None)
            .await
            .unwrap();
        let second = directory
            .get_or_create_user("ada@example.com", Some("Ada"), Some("Lovelace"), None)
            .await
            .unwrap();

        assert_eq!(first.id, second.id);

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&directory.pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_distinct_emails_get_distinct_users() {
        let directory = test_directory().await;

        let a = directory
            .get_or_create_user("a@example.com", None, None, None)
            .await
            .unwrap();
        let b = directory
            .get_or_create_user("b@example.com", None, None, None)
            .await
            .unwrap();

        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn test_get_user_by_id() {
        let directory = test_directory().await;

        let created = directory
            .get_or_create_user("ada@example.com", Some("Ada"), None, Some("http://pic"))
            .await
            .unwrap();

        let fetched = directory.get_user_by_id(&created.id).await.unwrap();
        assert_eq!(fetched.email, "ada@example.com");
        assert_eq!(fetched.first_name.as_deref(), Some("Ada"));
        assert_eq!(fetched.picture_url.as_deref(), Some("http://pic"));

        assert!(matches!(
            directory.get_user_by_id("U_MISSING").await,
            Err(UserDirectoryError::NotFound)
        ));
    }
}
