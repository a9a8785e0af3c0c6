//! Tests for the auth module
//!
//! End-to-end scenarios over the orchestrator with a mocked identity
//! provider and an in-memory database: login, callback, refresh rotation,
//! logout, and the CSRF-state contract.

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::services::auth::{AuthError, AuthService};
    use crate::services::google::{AuthProvider, ProviderError, ProviderToken, ProviderUser};
    use crate::services::refresh_token::{RefreshTokenError, RefreshTokenStore};
    use crate::services::state_store::StateStore;
    use crate::services::token::TokenService;
    use crate::services::users::UserDirectory;

    struct MockProvider {
        email: String,
        exchange_calls: AtomicUsize,
    }

    impl MockProvider {
        fn new(email: &str) -> Arc<Self> {
            Arc::new(Self {
                email: email.to_string(),
                exchange_calls: AtomicUsize::new(0),
            })
        }

        fn exchanges(&self) -> usize {
            self.exchange_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AuthProvider for MockProvider {
        fn auth_url(&self, state: &str) -> String {
            format!("https://provider.test/authorize?state={}", state)
        }

        async fn exchange_code(&self, code: &str) -> Result<ProviderToken, ProviderError> {
            self.exchange_calls.fetch_add(1, Ordering::SeqCst);
            if code == "bad-code" {
                return Err(ProviderError::ExchangeFailed("rejected".to_string()));
            }
            Ok(ProviderToken {
                access_token: format!("provider-access-{}", code),
                refresh_token: None,
                expires_in: Some(3600),
                token_type: Some("Bearer".to_string()),
                scope: None,
            })
        }

        async fn user_info(&self, _token: &ProviderToken) -> Result<ProviderUser, ProviderError> {
            Ok(ProviderUser {
                email: self.email.clone(),
                first_name: Some("Ada".to_string()),
                last_name: Some("Lovelace".to_string()),
                picture_url: Some("https://provider.test/pic.jpg".to_string()),
            })
        }
    }

    async fn service_with(provider: Arc<MockProvider>) -> AuthService {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::common::migrations::run_migrations(&pool).await.unwrap();

        AuthService::new(
            Arc::new(StateStore::new()),
            TokenService::new("test_secret_key"),
            RefreshTokenStore::new(pool.clone()),
            UserDirectory::new(pool),
            provider,
        )
    }

    fn state_from_url(url: &str) -> String {
        url.split("state=").nth(1).unwrap().to_string()
    }

    #[tokio::test]
    async fn test_login_callback_issues_working_credentials() {
        let provider = MockProvider::new("ada@example.com");
        let service = service_with(provider.clone()).await;

        let url = service.begin_login();
        let state = state_from_url(&url);

        let tokens = service.handle_callback(&state, "c1").await.unwrap();

        assert_eq!(tokens.user.email, "ada@example.com");
        assert_eq!(tokens.user.first_name.as_deref(), Some("Ada"));
        assert_eq!(provider.exchanges(), 1);

        // the issued access token resolves back to the same user
        let subject = service.authenticate(&tokens.token).unwrap();
        assert_eq!(subject, tokens.user.id);
    }

    #[tokio::test]
    async fn test_callback_with_unknown_state_fails_before_exchange() {
        let provider = MockProvider::new("ada@example.com");
        let service = service_with(provider.clone()).await;

        let result = service.handle_callback("never-issued", "c1").await;

        assert!(matches!(result, Err(AuthError::InvalidState)));
        assert_eq!(provider.exchanges(), 0, "provider must not be contacted");
    }

    #[tokio::test]
    async fn test_state_is_single_use() {
        let provider = MockProvider::new("ada@example.com");
        let service = service_with(provider.clone()).await;

        let state = state_from_url(&service.begin_login());

        service.handle_callback(&state, "c1").await.unwrap();
        let replay = service.handle_callback(&state, "c2").await;

        assert!(matches!(replay, Err(AuthError::InvalidState)));
        assert_eq!(provider.exchanges(), 1);
    }

    #[tokio::test]
    async fn test_failed_exchange_still_consumes_state() {
        let provider = MockProvider::new("ada@example.com");
        let service = service_with(provider.clone()).await;

        let state = state_from_url(&service.begin_login());

        let result = service.handle_callback(&state, "bad-code").await;
        assert!(matches!(result, Err(AuthError::Provider(_))));

        // retrying with the same state must fail as a replay
        let retry = service.handle_callback(&state, "c1").await;
        assert!(matches!(retry, Err(AuthError::InvalidState)));
    }

    #[tokio::test]
    async fn test_refresh_rotates_and_old_value_is_dead() {
        let provider = MockProvider::new("ada@example.com");
        let service = service_with(provider).await;

        let state = state_from_url(&service.begin_login());
        let tokens = service.handle_callback(&state, "c1").await.unwrap();
        let r1 = tokens.refresh_token;

        let pair = service.refresh(&r1).await.unwrap();
        let r2 = pair.refresh_token.clone();
        assert_ne!(r1, r2, "refresh must return the freshly rotated value");
        assert_eq!(service.authenticate(&pair.token).unwrap(), tokens.user.id);

        // the consumed value never authenticates again
        let replay = service.refresh(&r1).await;
        assert!(matches!(
            replay,
            Err(AuthError::RefreshToken(RefreshTokenError::TokenInvalid))
        ));

        // while the rotated value keeps working
        service.refresh(&r2).await.unwrap();
    }

    #[tokio::test]
    async fn test_logout_invalidates_refresh_token() {
        let provider = MockProvider::new("ada@example.com");
        let service = service_with(provider).await;

        let state = state_from_url(&service.begin_login());
        let tokens = service.handle_callback(&state, "c1").await.unwrap();

        service.logout(&tokens.refresh_token).await;

        let result = service.refresh(&tokens.refresh_token).await;
        assert!(matches!(
            result,
            Err(AuthError::RefreshToken(RefreshTokenError::TokenInvalid))
        ));

        // logging out twice is fine
        service.logout(&tokens.refresh_token).await;
    }

    #[tokio::test]
    async fn test_repeated_logins_reuse_the_same_user() {
        let provider = MockProvider::new("ada@example.com");
        let service = service_with(provider).await;

        let first = {
            let state = state_from_url(&service.begin_login());
            service.handle_callback(&state, "c1").await.unwrap()
        };
        let second = {
            let state = state_from_url(&service.begin_login());
            service.handle_callback(&state, "c2").await.unwrap()
        };

        assert_eq!(first.user.id, second.user.id);

        // each login still gets its own refresh token
        assert_ne!(first.refresh_token, second.refresh_token);
    }

    // ---- HTTP boundary ----

    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tokio::sync::RwLock;
    use tower::ServiceExt;

    use crate::auth::models::SessionPayload;
    use crate::common::AppState;
    use crate::services::auth::AuthTokens;
    use crate::services::session_cookie::SessionCookieService;

    async fn app_with(provider: Arc<MockProvider>) -> (axum::Router, sqlx::SqlitePool, AppState) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::common::migrations::run_migrations(&pool).await.unwrap();

        let auth = Arc::new(AuthService::new(
            Arc::new(StateStore::new()),
            TokenService::new("test_secret_key"),
            RefreshTokenStore::new(pool.clone()),
            UserDirectory::new(pool.clone()),
            provider,
        ));
        let session_cookies = Arc::new(
            SessionCookieService::from_keys(
                &SessionCookieService::generate_key(),
                &SessionCookieService::generate_key(),
            )
            .unwrap(),
        );

        let app_state = AppState {
            auth,
            session_cookies,
            cookie_secure: false,
        };
        let app = crate::auth::auth_routes().layer(axum::extract::Extension(Arc::new(
            RwLock::new(app_state.clone()),
        )));

        (app, pool, app_state)
    }

    async fn login(state: &AppState) -> AuthTokens {
        let oauth_state = state_from_url(&state.auth.begin_login());
        state.auth.handle_callback(&oauth_state, "c1").await.unwrap()
    }

    fn set_cookie_values(response: &axum::http::Response<Body>) -> Vec<String> {
        response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_string)
            .collect()
    }

    #[tokio::test]
    async fn test_me_accepts_bearer_and_raw_authorization_header() {
        let provider = MockProvider::new("ada@example.com");
        let (app, _pool, state) = app_with(provider).await;
        let tokens = login(&state).await;

        for value in [format!("Bearer {}", tokens.token), tokens.token.clone()] {
            let response = app
                .clone()
                .oneshot(
                    Request::builder()
                        .uri("/api/me")
                        .header(header::AUTHORIZATION, value)
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }

    #[tokio::test]
    async fn test_me_accepts_session_cookie_and_rejects_anonymous() {
        let provider = MockProvider::new("ada@example.com");
        let (app, _pool, state) = app_with(provider).await;
        let tokens = login(&state).await;

        let session_value = state
            .session_cookies
            .encode("session", &SessionPayload::from(&tokens.user))
            .unwrap();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/me")
                    .header(header::COOKIE, format!("session={}", session_value))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let anonymous = app
            .oneshot(Request::builder().uri("/api/me").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_refresh_renews_both_cookies() {
        let provider = MockProvider::new("ada@example.com");
        let (app, _pool, state) = app_with(provider).await;
        let tokens = login(&state).await;

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/refresh")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        serde_json::json!({ "refreshToken": tokens.refresh_token }).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let cookies = set_cookie_values(&response);
        assert!(cookies.iter().any(|c| c.starts_with("session=")));
        assert!(cookies.iter().any(|c| c.starts_with("refresh=")));
    }

    #[tokio::test]
    async fn test_refresh_delivers_rotated_value_even_without_profile() {
        let provider = MockProvider::new("ada@example.com");
        let (app, pool, state) = app_with(provider).await;
        let tokens = login(&state).await;

        // the subject row disappearing must not strand the rotation
        sqlx::query("PRAGMA foreign_keys = OFF")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(&tokens.user.id)
            .execute(&pool)
            .await
            .unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/auth/refresh")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        serde_json::json!({ "refreshToken": tokens.refresh_token }).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let cookies = set_cookie_values(&response);
        assert!(cookies.iter().any(|c| c.starts_with("refresh=")));
        assert!(!cookies.iter().any(|c| c.starts_with("session=")));

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let new_value = json["refreshToken"].as_str().unwrap().to_string();
        assert_ne!(new_value, tokens.refresh_token);

        // the delivered value is live; the consumed one is not
        state.auth.refresh(&new_value).await.unwrap();
        assert!(state.auth.refresh(&tokens.refresh_token).await.is_err());
    }

    #[tokio::test]
    async fn test_authenticate_rejects_foreign_tokens() {
        let provider = MockProvider::new("ada@example.com");
        let service = service_with(provider).await;

        let foreign = TokenService::new("some_other_secret")
            .issue("U_FORGED")
            .unwrap();

        assert!(matches!(
            service.authenticate(&foreign),
            Err(AuthError::Token(_))
        ));
        assert!(matches!(
            service.authenticate("garbage"),
            Err(AuthError::Token(_))
        ));
    }
}
