// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Server-side login sessions.
//!
//! A session is created after a successful Google sign-in and referenced by
//! an opaque id in the `CERTS_SESSION` cookie. Sessions live in an
//! in-process LRU bounded by capacity; each expires after `ttl` without use.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use base64ct::{Base64UrlUnpadded, Encoding};
use lru::LruCache;
use ring::rand::{SecureRandom, SystemRandom};
use tokio_util::sync::CancellationToken;

use super::claims::AuthenticatedUser;
use super::error::AuthError;
use super::roles::Role;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "CERTS_SESSION";

/// Random bytes per session id.
const SESSION_ID_BYTES: usize = 32;

/// How often expired sessions are purged.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

struct SessionEntry {
    email: String,
    name: String,
    role: Role,
    last_seen: Instant,
}

/// In-process session store.
pub struct SessionStore {
    sessions: Mutex<LruCache<String, SessionEntry>>,
    ttl: Duration,
    rng: SystemRandom,
}

impl SessionStore {
    /// Create a store holding at most `capacity` sessions (least recently
    /// used evicted first), each idle-expiring after `ttl`.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            sessions: Mutex::new(LruCache::new(capacity)),
            ttl,
            rng: SystemRandom::new(),
        }
    }

    /// Open a session for a signed-in user and return its id.
    pub fn create(&self, email: &str, name: &str, role: Role) -> Result<String, AuthError> {
        let mut bytes = [0u8; SESSION_ID_BYTES];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| AuthError::InternalError("Failed to generate session id".to_string()))?;
        let id = Base64UrlUnpadded::encode_string(&bytes);

        let mut sessions = self.lock()?;
        sessions.put(
            id.clone(),
            SessionEntry {
                email: email.to_string(),
                name: name.to_string(),
                role,
                last_seen: Instant::now(),
            },
        );
        Ok(id)
    }

    /// Resolve a session id, refreshing its idle timer.
    ///
    /// Returns `None` if unknown or expired.
    pub fn get(&self, id: &str) -> Option<AuthenticatedUser> {
        let mut sessions = self.sessions.lock().ok()?;
        let ttl = self.ttl;

        let entry = sessions.get_mut(id)?;
        if entry.last_seen.elapsed() >= ttl {
            sessions.pop(id);
            return None;
        }
        entry.last_seen = Instant::now();

        Some(AuthenticatedUser {
            email: entry.email.clone(),
            name: entry.name.clone(),
            role: entry.role,
            session_id: id.to_string(),
        })
    }

    /// End a session. Unknown ids are ignored.
    pub fn remove(&self, id: &str) {
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.pop(id);
        }
    }

    /// Drop every expired session and return how many were removed.
    pub fn purge_expired(&self) -> usize {
        let Ok(mut sessions) = self.sessions.lock() else {
            return 0;
        };

        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, entry)| entry.last_seen.elapsed() >= self.ttl)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &expired {
            sessions.pop(id);
        }
        expired.len()
    }

    /// Number of sessions held, including not yet purged expired ones.
    pub fn len(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, LruCache<String, SessionEntry>>, AuthError> {
        self.sessions
            .lock()
            .map_err(|_| AuthError::InternalError("Session store lock poisoned".to_string()))
    }

    /// Purge expired sessions every `interval` until `shutdown` fires.
    pub async fn run_sweeper(self: Arc<Self>, interval: Duration, shutdown: CancellationToken) {
        tracing::info!(interval_secs = interval.as_secs(), "Session sweeper started");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {},
                _ = shutdown.cancelled() => {
                    tracing::info!("Session sweeper shutting down");
                    return;
                }
            }

            let purged = self.purge_expired();
            if purged > 0 {
                tracing::debug!(purged, remaining = self.len(), "Purged expired sessions");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_get() {
        let store = SessionStore::new(10, Duration::from_secs(300));
        let id = store
            .create("registrar@acme.edu", "Registrar", Role::Institution)
            .unwrap();

        let user = store.get(&id).unwrap();
        assert_eq!(user.email, "registrar@acme.edu");
        assert_eq!(user.role, Role::Institution);
        assert_eq!(user.session_id, id);
    }

    #[test]
    fn ids_are_unique_and_url_safe() {
        let store = SessionStore::new(10, Duration::from_secs(300));
        let a = store.create("a@x.org", "A", Role::Regular).unwrap();
        let b = store.create("a@x.org", "A", Role::Regular).unwrap();

        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn unknown_id_is_none() {
        let store = SessionStore::new(10, Duration::from_secs(300));
        assert!(store.get("nope").is_none());
    }

    #[test]
    fn remove_ends_session() {
        let store = SessionStore::new(10, Duration::from_secs(300));
        let id = store.create("a@x.org", "A", Role::Regular).unwrap();

        store.remove(&id);
        assert!(store.get(&id).is_none());
        store.remove(&id);
    }

    #[test]
    fn ttl_expiry() {
        let store = SessionStore::new(10, Duration::from_millis(1));
        let id = store.create("a@x.org", "A", Role::Regular).unwrap();

        std::thread::sleep(Duration::from_millis(5));

        assert!(store.get(&id).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn capacity_evicts_least_recently_used() {
        let store = SessionStore::new(2, Duration::from_secs(300));
        let first = store.create("a@x.org", "A", Role::Regular).unwrap();
        let second = store.create("b@x.org", "B", Role::Regular).unwrap();

        // Touch the first so the second becomes the eviction candidate
        assert!(store.get(&first).is_some());
        let third = store.create("c@x.org", "C", Role::Regular).unwrap();

        assert!(store.get(&first).is_some());
        assert!(store.get(&second).is_none());
        assert!(store.get(&third).is_some());
    }

    #[test]
    fn purge_removes_only_expired() {
        let store = SessionStore::new(10, Duration::from_millis(50));
        store.create("a@x.org", "A", Role::Regular).unwrap();
        std::thread::sleep(Duration::from_millis(60));
        let fresh = store.create("b@x.org", "B", Role::Regular).unwrap();

        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.get(&fresh).is_some());
    }

    #[tokio::test]
    async fn sweeper_stops_on_cancel() {
        let store = Arc::new(SessionStore::new(10, Duration::from_secs(300)));
        let shutdown = CancellationToken::new();

        let handle = tokio::spawn(
            store
                .clone()
                .run_sweeper(Duration::from_millis(10), shutdown.clone()),
        );
        shutdown.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
