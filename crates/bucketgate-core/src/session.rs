//! Session tokens issued after a successful password check
//!
//! Expiry is fixed at creation and never extended. Lookups always compare
//! against the expiry, so an expired token is rejected whether or not a sweep
//! has removed it yet. Sweeps run with a small probability on each session
//! creation and only reclaim memory.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rand::{Rng, RngCore};
use tracing::debug;

/// Default session lifetime (24 hours)
pub const DEFAULT_SESSION_TTL: std::time::Duration = std::time::Duration::from_secs(24 * 60 * 60);

/// Longest session lifetime a store will issue (one year)
pub const MAX_SESSION_TTL: std::time::Duration = std::time::Duration::from_secs(365 * 24 * 60 * 60);

/// Default probability that a session creation triggers a sweep
pub const DEFAULT_SWEEP_PROBABILITY: f64 = 0.05;

/// Random bytes per token (hex encoded to twice as many characters)
const TOKEN_BYTES: usize = 32;

/// A freshly issued session
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    /// Opaque bearer token
    pub token: String,
    /// Absolute expiry
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Check if the session has expired at `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Token table with fixed TTL
#[derive(Debug)]
pub struct SessionStore {
    sessions: DashMap<String, DateTime<Utc>>,
    ttl: Duration,
    sweep_probability: f64,
}

impl SessionStore {
    /// Create a store issuing sessions valid for `ttl`, capped at [`MAX_SESSION_TTL`]
    pub fn new(ttl: std::time::Duration) -> Self {
        let ttl = ttl.min(MAX_SESSION_TTL);
        Self {
            sessions: DashMap::new(),
            ttl: Duration::from_std(ttl).unwrap_or_else(|_| Duration::days(365)),
            sweep_probability: DEFAULT_SWEEP_PROBABILITY,
        }
    }

    /// Set the per-creation sweep probability (clamped to `0.0..=1.0`)
    pub fn with_sweep_probability(mut self, probability: f64) -> Self {
        self.sweep_probability = probability.clamp(0.0, 1.0);
        self
    }

    /// Session lifetime
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a new session now
    pub fn create(&self) -> Session {
        self.create_at(Utc::now())
    }

    /// Issue a new session as of `now`
    pub fn create_at(&self, now: DateTime<Utc>) -> Session {
        let mut raw = [0u8; TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut raw);
        let token = hex::encode(raw);
        let expires_at = now.checked_add_signed(self.ttl).unwrap_or(DateTime::<Utc>::MAX_UTC);

        self.sessions.insert(token.clone(), expires_at);

        if rand::thread_rng().gen_bool(self.sweep_probability) {
            self.sweep_expired(now);
        }

        Session { token, expires_at }
    }

    /// Check a token now
    pub fn validate(&self, token: &str) -> bool {
        self.validate_at(token, Utc::now())
    }

    /// Check a token as of `now`; expired entries are removed on sight
    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> bool {
        let expires_at = match self.sessions.get(token) {
            Some(entry) => *entry,
            None => return false,
        };

        if now < expires_at {
            return true;
        }

        self.sessions.remove_if(token, |_, exp| now >= *exp);
        false
    }

    /// Remove a session; returns whether it existed
    pub fn revoke(&self, token: &str) -> bool {
        self.sessions.remove(token).is_some()
    }

    /// Drop every session expired at `now`
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, expires_at| now < *expires_at);
        let removed = before.saturating_sub(self.sessions.len());
        if removed > 0 {
            debug!(removed, "Swept expired sessions");
        }
        removed
    }

    /// Number of stored sessions, expired or not
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Check if no sessions are stored
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL)
    }
}
