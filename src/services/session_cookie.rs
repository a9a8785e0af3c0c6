// src/services/session_cookie.rs
//! Authenticated-encrypted session cookies.
//!
//! Payloads are serialized to JSON and sealed with AES-256-GCM keyed by the
//! block key. The hash key and the logical cookie name are mixed into the
//! associated data, so a ciphertext minted for the `session` cookie can never
//! decode as the `refresh` cookie and both keys stay mandatory. Every decode
//! failure - bad base64, truncation, tag mismatch, wrong name, bad JSON -
//! collapses into the single `InvalidCookie` error so callers cannot tell
//! tampering from malformed input.

use aes_gcm::{
    aead::{Aead, KeyInit, OsRng, Payload},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::RngCore;
use serde::{de::DeserializeOwned, Serialize};
use std::env;
use thiserror::Error;

const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum CookieError {
    #[error("cookie keys not configured")]
    KeysNotConfigured,

    #[error("invalid cookie key format")]
    InvalidKeyFormat,

    #[error("cookie encoding failed")]
    EncodingFailed,

    #[error("invalid cookie")]
    InvalidCookie,
}

pub struct SessionCookieService {
    cipher: Aes256Gcm,
    hash_key: [u8; KEY_LEN],
}

impl std::fmt::Debug for SessionCookieService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCookieService")
            .field("keys", &"<redacted>")
            .finish()
    }
}

impl SessionCookieService {
    /// Initialize from `SESSION_HASH_KEY` / `SESSION_BLOCK_KEY`.
    ///
    /// Both must be base64-encoded 32-byte keys. This runs at startup and a
    /// failure here is fatal for the process - key problems are never
    /// surfaced at request time.
    pub fn from_env() -> Result<Self, CookieError> {
        let hash_key =
            env::var("SESSION_HASH_KEY").map_err(|_| CookieError::KeysNotConfigured)?;
        let block_key =
            env::var("SESSION_BLOCK_KEY").map_err(|_| CookieError::KeysNotConfigured)?;

        Self::from_keys(&hash_key, &block_key)
    }

    pub fn from_keys(hash_key_b64: &str, block_key_b64: &str) -> Result<Self, CookieError> {
        let hash_key = decode_key(hash_key_b64)?;
        let block_key = decode_key(block_key_b64)?;

        let key = aes_gcm::Key::<Aes256Gcm>::from_slice(&block_key);
        let cipher = Aes256Gcm::new(key);

        Ok(Self { cipher, hash_key })
    }

    /// Generate a new random key (base64-encoded, 32 bytes)
    pub fn generate_key() -> String {
        let mut key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        BASE64.encode(key)
    }

    /// Serializes and seals `payload`, bound to the cookie `name`.
    pub fn encode<T: Serialize>(&self, name: &str, payload: &T) -> Result<String, CookieError> {
        let plaintext = serde_json::to_vec(payload).map_err(|_| CookieError::EncodingFailed)?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let aad = self.binding(name);
        let ciphertext = self
            .cipher
            .encrypt(
                nonce,
                Payload {
                    msg: &plaintext,
                    aad: &aad,
                },
            )
            .map_err(|_| CookieError::EncodingFailed)?;

        let mut combined = nonce_bytes.to_vec();
        combined.extend_from_slice(&ciphertext);

        Ok(BASE64.encode(combined))
    }

    /// Opens a sealed cookie value bound to `name`.
    pub fn decode<T: DeserializeOwned>(&self, name: &str, value: &str) -> Result<T, CookieError> {
        let combined = BASE64
            .decode(value.as_bytes())
            .map_err(|_| CookieError::InvalidCookie)?;

        if combined.len() < NONCE_LEN {
            return Err(CookieError::InvalidCookie);
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        let aad = self.binding(name);
        let plaintext = self
            .cipher
            .decrypt(
                nonce,
                Payload {
                    msg: ciphertext,
                    aad: &aad,
                },
            )
            .map_err(|_| CookieError::InvalidCookie)?;

        serde_json::from_slice(&plaintext).map_err(|_| CookieError::InvalidCookie)
    }

    fn binding(&self, name: &str) -> Vec<u8> {
        let mut aad = self.hash_key.to_vec();
        aad.extend_from_slice(name.as_bytes());
        aad
    }
}

fn decode_key(key_b64: &str) -> Result<[u8; KEY_LEN], CookieError> {
    let bytes = BASE64
        .decode(key_b64.as_bytes())
        .map_err(|_| CookieError::InvalidKeyFormat)?;

    bytes
        .try_into()
        .map_err(|_| CookieError::InvalidKeyFormat)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::SessionPayload;

    fn service() -> SessionCookieService {
        SessionCookieService::from_keys(
            &SessionCookieService::generate_key(),
            &SessionCookieService::generate_key(),
        )
        .unwrap()
    }

    fn payload() -> SessionPayload {
        SessionPayload {
            user_id: "U_ABC123".to_string(),
            email: "user@example.com".to_string(),
            first_name: Some("Ada".to_string()),
            last_name: Some("Lovelace".to_string()),
            picture_url: None,
        }
    }

    #[test]
    fn test_round_trip() {
        let service = service();
        let encoded = service.encode("session", &payload()).unwrap();
        let decoded: SessionPayload = service.decode("session", &encoded).unwrap();
        assert_eq!(decoded, payload());
    }

    #[test]
    fn test_name_binding() {
        let service = service();
        let encoded = service.encode("session", &payload()).unwrap();

        let swapped: Result<SessionPayload, _> = service.decode("refresh", &encoded);
        assert!(matches!(swapped, Err(CookieError::InvalidCookie)));
    }

    #[test]
    fn test_any_single_byte_mutation_fails() {
        let service = service();
        let encoded = service.encode("session", &payload()).unwrap();

        let mut raw = BASE64.decode(encoded.as_bytes()).unwrap();
        for i in 0..raw.len() {
            raw[i] ^= 0x01;
            let mutated = BASE64.encode(&raw);
            let result: Result<SessionPayload, _> = service.decode("session", &mutated);
            assert!(
                matches!(result, Err(CookieError::InvalidCookie)),
                "mutation at byte {} was accepted",
                i
            );
            raw[i] ^= 0x01;
        }
    }

    #[test]
    fn test_different_hash_key_fails() {
        let block_key = SessionCookieService::generate_key();
        let a = SessionCookieService::from_keys(&SessionCookieService::generate_key(), &block_key)
            .unwrap();
        let b = SessionCookieService::from_keys(&SessionCookieService::generate_key(), &block_key)
            .unwrap();

        let encoded = a.encode("session", &payload()).unwrap();
        let result: Result<SessionPayload, _> = b.decode("session", &encoded);
        assert!(matches!(result, Err(CookieError::InvalidCookie)));
    }

    #[test]
    fn test_wrong_length_key_rejected() {
        let short = BASE64.encode([0u8; 16]);
        let ok = SessionCookieService::generate_key();
        assert!(matches!(
            SessionCookieService::from_keys(&short, &ok),
            Err(CookieError::InvalidKeyFormat)
        ));
        assert!(matches!(
            SessionCookieService::from_keys(&ok, "not base64!!!"),
            Err(CookieError::InvalidKeyFormat)
        ));
    }

    #[test]
    fn test_truncated_and_garbage_values_fail() {
        let service = service();
        let short: Result<SessionPayload, _> = service.decode("session", &BASE64.encode([1u8; 4]));
        assert!(matches!(short, Err(CookieError::InvalidCookie)));

        let garbage: Result<SessionPayload, _> = service.decode("session", "%%%not-base64%%%");
        assert!(matches!(garbage, Err(CookieError::InvalidCookie)));
    }
}
