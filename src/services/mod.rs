// src/services/mod.rs
//
// Shared services module containing the authentication core:
// CSRF state management, token codecs, refresh-token rotation,
// the user directory and the identity-provider client.

pub mod auth;
pub mod google;
pub mod refresh_token;
pub mod session_cookie;
pub mod state_store;
pub mod token;
pub mod users;

// Re-export commonly used types for convenience
pub use auth::AuthService;
pub use google::{AuthProvider, GoogleProvider};
pub use refresh_token::RefreshTokenStore;
pub use session_cookie::SessionCookieService;
pub use state_store::StateStore;
pub use token::TokenService;
pub use users::UserDirectory;
