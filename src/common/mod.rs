// Common module - shared types and utilities across all modules

pub mod error;
pub mod helpers;
pub mod id_generator;
pub mod migrations;
pub mod state;

// Re-export commonly used types for convenience
pub use error::ApiError;
pub use helpers::{retry_with_backoff, safe_email_log, safe_token_log};
pub use id_generator::*;
pub use state::AppState;
