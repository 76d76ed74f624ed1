//! In-process session store.
//!
//! Sessions live only for the process lifetime: the map is constructed once
//! at server start, injected into the handlers, and never persisted. All
//! access goes through one reader/writer lock; readers run concurrently,
//! writers are exclusive. Expired entries are evicted lazily on read and by
//! a periodic sweeper owned by the server lifecycle.

use anyhow::{Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::debug;
use uuid::Uuid;

/// Sessions expire 24 hours after issuance.
pub const SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Cadence of the background sweep for expired sessions.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

const SESSION_TOKEN_BYTES: usize = 32;

/// An authenticated browser session, addressed by its opaque token.
#[derive(Clone, Debug)]
pub struct Session {
    pub user_id: Uuid,
    pub username: String,
    expires_at: Instant,
}

impl Session {
    fn expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Token → session map guarded by a single reader/writer lock.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    ttl: Duration,
}

impl SessionStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Mint a session for `user_id` and return its opaque token.
    ///
    /// # Errors
    ///
    /// Returns an error if the entropy source fails.
    pub async fn create(&self, user_id: Uuid, username: &str) -> Result<String> {
        let token = generate_token()?;
        let session = Session {
            user_id,
            username: username.to_string(),
            expires_at: Instant::now() + self.ttl,
        };

        let mut sessions = self.sessions.write().await;
        sessions.insert(token.clone(), session);
        Ok(token)
    }

    /// Look up a session; an expired entry is evicted and reported absent.
    pub async fn get(&self, token: &str) -> Option<Session> {
        {
            let sessions = self.sessions.read().await;
            match sessions.get(token) {
                Some(session) if !session.expired() => return Some(session.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // Expired: re-check under the write lock before evicting, the entry
        // may have been replaced since the read lock was released.
        let mut sessions = self.sessions.write().await;
        if sessions.get(token).is_some_and(Session::expired) {
            sessions.remove(token);
        }
        None
    }

    /// Remove a session. Idempotent: absent tokens are not an error.
    pub async fn delete(&self, token: &str) {
        let mut sessions = self.sessions.write().await;
        sessions.remove(token);
    }

    /// Evict every expired session, returning how many were removed.
    pub async fn cleanup(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| !session.expired());
        before - sessions.len()
    }

    /// Number of live entries, expired ones included until evicted.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

/// Spawn the periodic sweeper for `store`.
///
/// Started once at server construction; the caller aborts the handle at
/// graceful shutdown.
pub fn spawn_sweeper(store: Arc<SessionStore>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        // The first tick completes immediately; skip it so sweeps start one
        // full period after startup.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let evicted = store.cleanup().await;
            if evicted > 0 {
                debug!(evicted, "evicted expired sessions");
            }
        }
    })
}

fn generate_token() -> Result<String> {
    let mut bytes = [0u8; SESSION_TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session token")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tokio::time::sleep;

    fn user() -> Uuid {
        Uuid::new_v4()
    }

    #[tokio::test]
    async fn create_and_get_round_trip() {
        let store = SessionStore::new(SESSION_TTL);
        let id = user();
        let token = store.create(id, "alice").await.unwrap();

        let session = store.get(&token).await.unwrap();
        assert_eq!(session.user_id, id);
        assert_eq!(session.username, "alice");
    }

    #[tokio::test]
    async fn tokens_are_url_safe_and_unique() {
        let store = SessionStore::new(SESSION_TTL);
        let mut seen = HashSet::new();
        for _ in 0..64 {
            let token = store.create(user(), "alice").await.unwrap();
            // 32 bytes of entropy, unpadded url-safe base64.
            assert_eq!(token.len(), 43);
            assert!(token
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_'));
            assert!(seen.insert(token));
        }
    }

    #[tokio::test]
    async fn expired_session_is_absent_and_evicted() {
        let store = SessionStore::new(Duration::from_millis(5));
        let token = store.create(user(), "alice").await.unwrap();
        sleep(Duration::from_millis(20)).await;

        assert!(store.get(&token).await.is_none());
        // Lazy eviction removed the entry, not just hid it.
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = SessionStore::new(SESSION_TTL);
        let token = store.create(user(), "alice").await.unwrap();

        store.delete(&token).await;
        assert!(store.get(&token).await.is_none());
        // Second delete of the same token is a no-op.
        store.delete(&token).await;
        store.delete("unknown").await;
    }

    #[tokio::test]
    async fn cleanup_evicts_only_expired() {
        let store = SessionStore::new(Duration::from_millis(5));
        store.create(user(), "alice").await.unwrap();
        store.create(user(), "bob").await.unwrap();
        sleep(Duration::from_millis(20)).await;

        let long_lived = {
            let mut sessions = store.sessions.write().await;
            let token = "keeper".to_string();
            sessions.insert(
                token.clone(),
                Session {
                    user_id: user(),
                    username: "carol".to_string(),
                    expires_at: Instant::now() + SESSION_TTL,
                },
            );
            token
        };

        assert_eq!(store.cleanup().await, 2);
        assert_eq!(store.len().await, 1);
        assert!(store.get(&long_lived).await.is_some());
    }

    #[tokio::test]
    async fn sweeper_evicts_in_background() {
        let store = Arc::new(SessionStore::new(Duration::from_millis(5)));
        store.create(user(), "alice").await.unwrap();

        let handle = spawn_sweeper(store.clone(), Duration::from_millis(10));
        sleep(Duration::from_millis(50)).await;
        assert_eq!(store.len().await, 0);
        handle.abort();
    }
}
