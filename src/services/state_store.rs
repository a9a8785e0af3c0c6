// src/services/state_store.rs
//! One-time CSRF state tokens for the OAuth redirect flow.
//!
//! Each login attempt gets an unguessable state value with a 30 minute TTL.
//! Validation consumes the entry under a single lock acquisition, so a state
//! can never validate twice even under concurrent callbacks. A periodic
//! sweeper bounds memory growth from abandoned login attempts; the TTL is
//! re-checked at validation regardless.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

/// How long an issued state remains valid.
const STATE_TTL_MINUTES: i64 = 30;

/// Interval between sweeps of expired entries.
const SWEEP_INTERVAL_SECS: u64 = 5 * 60;

#[derive(Debug, Default)]
pub struct StateStore {
    states: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generates a new state value and records it with its expiry.
    pub fn issue_state(&self) -> String {
        let state = Uuid::new_v4().to_string();
        let expires_at = Utc::now() + Duration::minutes(STATE_TTL_MINUTES);

        let mut states = self.states.lock().expect("state store lock poisoned");
        states.insert(state.clone(), expires_at);
        debug!(pending = states.len(), "Issued OAuth state");

        state
    }

    /// Validates and consumes a state value.
    ///
    /// Unknown and expired states are deliberately indistinguishable to the
    /// caller. The remove-then-check sequence runs under one lock, which is
    /// what makes the state single-use.
    pub fn validate_state(&self, state: &str) -> bool {
        let mut states = self.states.lock().expect("state store lock poisoned");
        match states.remove(state) {
            Some(expires_at) if expires_at > Utc::now() => true,
            Some(_) => {
                warn!("OAuth state presented after expiry");
                false
            }
            None => false,
        }
    }

    /// Removes all expired entries. Advisory cleanup, not a correctness
    /// requirement.
    pub fn sweep(&self) {
        let now = Utc::now();
        let mut states = self.states.lock().expect("state store lock poisoned");
        let before = states.len();
        states.retain(|_, expires_at| *expires_at > now);
        let removed = before - states.len();
        if removed > 0 {
            debug!(removed, pending = states.len(), "Swept expired OAuth states");
        }
    }

    /// Spawns the periodic sweep task. The caller owns the handle and aborts
    /// it at shutdown; nothing here is process-global.
    pub fn start_sweeper(store: Arc<StateStore>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(std::time::Duration::from_secs(SWEEP_INTERVAL_SECS));
            // the first tick fires immediately; skip it
            interval.tick().await;
            loop {
                interval.tick().await;
                store.sweep();
            }
        })
    }

    #[cfg(test)]
    fn insert_with_expiry(&self, state: &str, expires_at: DateTime<Utc>) {
        self.states
            .lock()
            .unwrap()
            .insert(state.to_string(), expires_at);
    }

    #[cfg(test)]
    fn pending(&self) -> usize {
        self.states.lock().unwrap().len()
    }
}
