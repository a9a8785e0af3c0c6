// Helper functions for safe logging and bounded retries

use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Masks email addresses for safe logging
/// Prevents sensitive data exposure while preserving debugging utility
///
/// # Example
/// ```
/// let masked = safe_email_log("user@example.com");
/// // Returns: "u***@example.com"
/// ```
pub fn safe_email_log(email: &str) -> String {
    if email.len() > 3 {
        let parts: Vec<&str> = email.split('@').collect();
        if parts.len() == 2 {
            // char-wise so multi-byte local parts stay on a boundary
            match parts[0].chars().next() {
                Some(first) => format!("{}***@{}", first, parts[1]),
                None => "***@***.***".to_string(),
            }
        } else {
            "***@***.***".to_string()
        }
    } else {
        "***@***.***".to_string()
    }
}

/// Masks tokens for safe logging
/// Shows only first and last 4 characters
///
/// # Example
/// ```
/// let masked = safe_token_log("eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9");
/// // Returns: "eyJh...kpXVCJ9"
/// ```
pub fn safe_token_log(token: &str) -> String {
    if token.len() > 8 {
        format!("{}...{}", &token[..4], &token[token.len() - 4..])
    } else {
        "***".to_string()
    }
}

/// Retries an async operation with exponential backoff and jitter.
///
/// Used around transient datastore contention (the get-or-create user step
/// during OAuth callbacks). Sleeps 1s, 2s, 4s... plus up to a second of
/// jitter between attempts; the last error is returned once `max_attempts`
/// is exhausted.
pub async fn retry_with_backoff<T, E, F, Fut>(mut operation: F, max_attempts: u32) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempt += 1;
                if attempt >= max_attempts {
                    return Err(err);
                }
                let jitter_ms = rand::thread_rng().gen_range(0..1000u64);
                let delay =
                    Duration::from_secs(1 << (attempt - 1)) + Duration::from_millis(jitter_ms);
                tokio::time::sleep(delay).await;
            }
        }
    }
}
