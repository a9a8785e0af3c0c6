// src/services/google.rs
//! Identity-provider client abstraction and the Google implementation.
//!
//! The orchestrator only ever sees the `AuthProvider` capability set
//! (auth URL, code exchange, profile fetch); which provider backs it is a
//! configuration-time choice, and tests substitute a mock.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

/// Request-scoped timeout for all provider calls.
const PROVIDER_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("code exchange failed: {0}")]
    ExchangeFailed(String),

    #[error("user info fetch failed: {0}")]
    UserInfoFailed(String),

    #[error("http request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
}

/// Token returned by the provider's code exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
}

/// Profile fields fetched from the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderUser {
    pub email: String,
    #[serde(rename = "given_name")]
    pub first_name: Option<String>,
    #[serde(rename = "family_name")]
    pub last_name: Option<String>,
    #[serde(rename = "picture")]
    pub picture_url: Option<String>,
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Authorization URL carrying the given CSRF state.
    fn auth_url(&self, state: &str) -> String;

    /// Exchanges an authorization code for a provider token.
    async fn exchange_code(&self, code: &str) -> Result<ProviderToken, ProviderError>;

    /// Fetches the authenticated user's profile.
    async fn user_info(&self, token: &ProviderToken) -> Result<ProviderUser, ProviderError>;
}

#[derive(Debug, Clone)]
pub struct GoogleProvider {
    client_id: String,
    client_secret: String,
    redirect_url: String,
    hosted_domain: Option<String>,
    client: Client,
}

impl GoogleProvider {
    /// Fails if the HTTP client cannot be built; the provider is never
    /// constructed without its request timeout.
    pub fn new(
        client_id: String,
        client_secret: String,
        redirect_url: String,
        hosted_domain: Option<String>,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(PROVIDER_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client_id,
            client_secret,
            redirect_url,
            hosted_domain,
            client,
        })
    }
}

#[async_trait]
impl AuthProvider for GoogleProvider {
    fn auth_url(&self, state: &str) -> String {
        let mut url = format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}&access_type=offline",
            GOOGLE_AUTH_URL,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_url),
            urlencoding::encode("openid email profile"),
            urlencoding::encode(state),
        );

        // restrict sign-in to a Workspace domain when configured
        if let Some(hd) = &self.hosted_domain {
            url.push_str(&format!("&hd={}", urlencoding::encode(hd)));
        }

        url
    }

    async fn exchange_code(&self, code: &str) -> Result<ProviderToken, ProviderError> {
        debug!("Exchanging authorization code with Google");

        let response = self
            .client
            .post(GOOGLE_TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", &self.client_id),
                ("client_secret", &self.client_secret),
                ("redirect_uri", &self.redirect_url),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(http_status = %status, "Google token endpoint rejected code exchange");
            return Err(ProviderError::ExchangeFailed(format!(
                "token endpoint returned {}: {}",
                status, body
            )));
        }

        response
            .json::<ProviderToken>()
            .await
            .map_err(|e| ProviderError::ExchangeFailed(format!("malformed token response: {}", e)))
    }

    async fn user_info(&self, token: &ProviderToken) -> Result<ProviderUser, ProviderError> {
        let response = self
            .client
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(&token.access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(http_status = %status, "Google userinfo endpoint returned error");
            return Err(ProviderError::UserInfoFailed(format!(
                "userinfo endpoint returned {}",
                status
            )));
        }

        response
            .json::<ProviderUser>()
            .await
            .map_err(|e| ProviderError::UserInfoFailed(format!("malformed profile: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(hosted_domain: Option<&str>) -> GoogleProvider {
        GoogleProvider::new(
            "client-id".to_string(),
            "client-secret".to_string(),
            "http://localhost:8080/auth/google/callback".to_string(),
            hosted_domain.map(str::to_string),
        )
        .unwrap()
    }

    #[test]
    fn test_auth_url_carries_state_and_scopes() {
        let url = provider(None).auth_url("state-123");

        assert!(url.starts_with(GOOGLE_AUTH_URL));
        assert!(url.contains("state=state-123"));
        assert!(url.contains("client_id=client-id"));
        assert!(url.contains("scope=openid%20email%20profile"));
        assert!(url.contains("access_type=offline"));
        assert!(!url.contains("hd="));
    }

    #[test]
    fn test_auth_url_includes_hosted_domain() {
        let url = provider(Some("example.com")).auth_url("s");
        assert!(url.contains("&hd=example.com"));
    }

    #[test]
    fn test_redirect_uri_is_encoded() {
        let url = provider(None).auth_url("s");
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Fauth%2Fgoogle%2Fcallback"));
    }
}
