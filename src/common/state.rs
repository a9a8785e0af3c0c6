// Application state shared across all modules

use std::sync::Arc;

use crate::services::auth::AuthService;
use crate::services::session_cookie::SessionCookieService;

/// Application state containing services and configuration
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub session_cookies: Arc<SessionCookieService>,
    pub cookie_secure: bool,
}
