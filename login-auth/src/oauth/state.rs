//! Single-use state tokens for OAuth login attempts.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::*;
use rand::Rng;
use tokio::task::JoinHandle;

use super::pkce::PkceVerifier;
use crate::error::{invalid_state_error, Error};

/// Issue this many tokens between lazy sweeps of the in-memory store.
const LAZY_SWEEP_EVERY: usize = 256;

/// Data bound to a login attempt when it is started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingLogin {
    /// Provider the attempt was started against.
    pub provider_id: String,
    /// Caller-supplied tag, e.g. the target application.
    pub tag: Option<String>,
    /// PKCE verifier if the provider uses PKCE.
    pub pkce_verifier: Option<PkceVerifier>,
}

/// A recorded login attempt.
#[derive(Debug, Clone)]
pub struct LoginAttempt {
    pub token: String,
    pub login: PendingLogin,
    pub created_at: DateTime<Utc>,
    pub used: bool,
}

impl LoginAttempt {
    /// A TTL reaching past the representable calendar never expires.
    fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        match self.created_at.checked_add_signed(ttl) {
            Some(deadline) => now > deadline,
            None => false,
        }
    }
}

/// Issues and validates single-use state tokens.
///
/// `validate` must check and consume a token as one atomic step: two concurrent
/// callbacks carrying the same token must not both succeed.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Record a new attempt and return its unguessable token.
    async fn issue(&self, login: PendingLogin) -> Result<String, Error>;

    /// Consume `token`, returning what was bound to it.
    ///
    /// Fails with `InvalidState` when the token is unknown, expired or already used,
    /// without changing any stored attempt.
    async fn validate(&self, token: &str) -> Result<PendingLogin, Error>;

    /// Drop expired attempts, returning how many were removed.
    async fn sweep(&self) -> usize;
}

/// In-process [`StateStore`] backed by a concurrent map.
///
/// Used attempts stay in the map, marked, until their TTL passes so that a replayed
/// callback is rejected the same way as a forged one.
pub struct MemoryStateStore {
    attempts: DashMap<String, LoginAttempt>,
    ttl: Duration,
    issued: AtomicUsize,
}

impl MemoryStateStore {
    /// Create a new state store with default TTL of 10 minutes.
    pub fn new() -> Self {
        Self::with_ttl(Duration::minutes(10))
    }

    /// Create a new state store with custom TTL.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            attempts: DashMap::new(),
            ttl,
            issued: AtomicUsize::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of attempts currently held, used or not.
    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    /// Look at an attempt without consuming it.
    pub fn attempt(&self, token: &str) -> Option<LoginAttempt> {
        self.attempts.get(token).map(|entry| entry.value().clone())
    }

    fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.attempts.len();
        self.attempts
            .retain(|_, attempt| !attempt.is_expired(self.ttl, now));
        before.saturating_sub(self.attempts.len())
    }

    /// Generate a cryptographically random state token (256 bits, hex encoded).
    fn generate_token() -> String {
        let random_bytes: [u8; 32] = rand::thread_rng().gen();
        hex::encode(random_bytes)
    }
}

impl Default for MemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn issue(&self, login: PendingLogin) -> Result<String, Error> {
        if self.issued.fetch_add(1, Ordering::Relaxed) % LAZY_SWEEP_EVERY == LAZY_SWEEP_EVERY - 1 {
            let removed = self.sweep_expired();
            trace!("Lazy sweep removed {} expired login attempts", removed);
        }

        loop {
            let token = Self::generate_token();
            if let Entry::Vacant(slot) = self.attempts.entry(token.clone()) {
                slot.insert(LoginAttempt {
                    token: token.clone(),
                    login,
                    created_at: Utc::now(),
                    used: false,
                });
                return Ok(token);
            }
        }
    }

    async fn validate(&self, token: &str) -> Result<PendingLogin, Error> {
        // The shard write lock is held until `attempt` drops, so check-and-mark is atomic.
        let mut attempt = self
            .attempts
            .get_mut(token)
            .ok_or_else(invalid_state_error)?;

        if attempt.used || attempt.is_expired(self.ttl, Utc::now()) {
            return Err(invalid_state_error());
        }

        attempt.used = true;
        Ok(attempt.login.clone())
    }

    async fn sweep(&self) -> usize {
        self.sweep_expired()
    }
}

/// Periodically sweep `store` on the current tokio runtime.
pub fn spawn_sweeper(store: Arc<dyn StateStore>, every: StdDuration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            let removed = store.sweep().await;
            if removed > 0 {
                debug!("Swept {} expired login attempts", removed);
            }
        }
    })
}
