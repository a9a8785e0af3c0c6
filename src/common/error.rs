// Error handling types for the API

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::fmt;
use tracing::error;

use crate::services::auth::AuthError;
use crate::services::refresh_token::RefreshTokenError;
use crate::services::token::TokenError;
use crate::services::users::UserDirectoryError;

/// API error types
#[derive(Debug)]
pub enum ApiError {
    Unauthorized(String),
    BadRequest(String),
    NotFound(String),
    InternalServer(String),
    ServiceUnavailable(String),
    DatabaseError(sqlx::Error),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            ApiError::InternalServer(msg) => write!(f, "Internal Server Error: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service Unavailable: {}", msg),
            ApiError::DatabaseError(e) => write!(f, "Database Error: {}", e),
        }
    }
}

/// JSON error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_message, code) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg, "UNAUTHORIZED"),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, "BAD_REQUEST"),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, "NOT_FOUND"),
            ApiError::InternalServer(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                msg,
                "INTERNAL_SERVER_ERROR",
            ),
            ApiError::ServiceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                msg,
                "SERVICE_UNAVAILABLE",
            ),
            ApiError::DatabaseError(e) => {
                error!(error = %e, "Database error occurred");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database operation failed".to_string(),
                    "DATABASE_ERROR",
                )
            }
        };

        let error_response = ErrorResponse {
            error: error_message,
            code: code.to_string(),
        };

        (status, Json(error_response)).into_response()
    }
}

/// Maps auth service failures onto HTTP responses.
///
/// Validation failures (state, access token, refresh token, session cookie)
/// collapse into uniform 401 bodies that never echo internal detail; provider
/// and user-directory failures surface as 500-class after the service layer
/// has exhausted its retries.
impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidState => {
                ApiError::Unauthorized("invalid state parameter".to_string())
            }
            AuthError::Provider(e) => {
                error!(error = %e, "Identity provider call failed");
                ApiError::InternalServer("authentication provider error".to_string())
            }
            AuthError::UserDirectory(UserDirectoryError::NotFound) => {
                ApiError::Unauthorized("user not found".to_string())
            }
            AuthError::UserDirectory(UserDirectoryError::Database(e)) => {
                ApiError::DatabaseError(e)
            }
            AuthError::Token(TokenError::Encoding(e)) => {
                error!(error = %e, "JWT encoding error");
                ApiError::InternalServer("failed to generate token".to_string())
            }
            AuthError::Token(_) => ApiError::Unauthorized("invalid token".to_string()),
            AuthError::RefreshToken(RefreshTokenError::TokenInvalid) => {
                ApiError::Unauthorized("invalid refresh token".to_string())
            }
            AuthError::RefreshToken(RefreshTokenError::Database(e)) => ApiError::DatabaseError(e),
        }
    }
}
