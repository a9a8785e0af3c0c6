// src/services/token.rs
//! Access-token codec: signed, self-contained JWTs.
//!
//! Tokens carry `sub` and a 24 hour `exp` and are signed with a server-held
//! symmetric secret. HS256 is pinned on both the issue and verify paths;
//! a token whose header names any other algorithm fails verification before
//! its claims are ever read. There is no server-side revocation - the short
//! expiry is the only mitigation, faster cutoff comes from the refresh layer.

use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use thiserror::Error;
use tracing::warn;

use crate::auth::models::Claims;

/// Access-token lifetime.
const ACCESS_TOKEN_TTL_HOURS: i64 = 24;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("malformed token")]
    Malformed,

    #[error("token encoding failed: {0}")]
    Encoding(#[source] jsonwebtoken::errors::Error),
}

pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl TokenService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Issues a signed token for `subject`, valid for 24 hours.
    pub fn issue(&self, subject: &str) -> Result<String, TokenError> {
        let exp = (Utc::now() + Duration::hours(ACCESS_TOKEN_TTL_HOURS)).timestamp() as usize;
        let claims = Claims {
            sub: subject.to_string(),
            exp,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(TokenError::Encoding)
    }

    /// Verifies a token and returns its subject.
    ///
    /// The pinned HS256 validation rejects algorithm-confusion attempts as
    /// `InvalidSignature`; expiry and structural failures map to `Expired`
    /// and `Malformed` respectively.
    pub fn verify(&self, token: &str) -> Result<String, TokenError> {
        let data = decode::<Claims>(
            token,
            &self.decoding_key,
            &Validation::new(Algorithm::HS256),
        )
        .map_err(|e| {
            warn!(error = %e, "JWT verification failed");
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature
                | ErrorKind::InvalidAlgorithm
                | ErrorKind::InvalidAlgorithmName => TokenError::InvalidSignature,
                _ => TokenError::Malformed,
            }
        })?;

        Ok(data.claims.sub)
    }
}
