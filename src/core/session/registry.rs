//! Volatile session registry.
//!
//! Sessions live only in process memory. The store is bounded two ways:
//! entries expire `ttl` after insertion, and the total number of entries is
//! capped. At capacity the least recently used session is evicted so a
//! freshly issued one is always admitted. Single-use consumption is driven
//! by the relay bridge through [`SessionRegistry::take`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::Expiry;
use moka::future::Cache;
use moka::policy::EvictionPolicy;
use time::OffsetDateTime;

use super::params::UpstreamConnectParams;

/// A registered upstream session.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub upstream_connect_params: UpstreamConnectParams,
    pub created_at: OffsetDateTime,
    /// Monotonic deadline after which the session can no longer be bridged
    pub expires_at: Instant,
}

impl Session {
    pub fn new(id: impl Into<String>, params: UpstreamConnectParams, ttl: Duration) -> Self {
        Self {
            id: id.into(),
            upstream_connect_params: params,
            created_at: OffsetDateTime::now_utc(),
            expires_at: Instant::now() + ttl,
        }
    }
}

/// Expires each entry at its session's own deadline, so a restored session
/// keeps the lifetime it was issued with.
struct SessionExpiry;

impl Expiry<String, Arc<Session>> for SessionExpiry {
    fn expire_after_create(
        &self,
        _id: &String,
        session: &Arc<Session>,
        created_at: Instant,
    ) -> Option<Duration> {
        Some(session.expires_at.saturating_duration_since(created_at))
    }
}

/// Concurrent, TTL-bounded map from session id to session.
///
/// Cloning is cheap; clones share the same underlying store.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Cache<String, Arc<Session>>,
    ttl: Duration,
}

impl SessionRegistry {
    /// Create a registry whose entries expire `ttl` after insertion.
    pub fn new(ttl: Duration, max_entries: u64) -> Self {
        let sessions = Cache::builder()
            .max_capacity(max_entries)
            .eviction_policy(EvictionPolicy::lru())
            .expire_after(SessionExpiry)
            .build();

        Self { sessions, ttl }
    }

    /// Store `params` under `id`, returning the stored session.
    pub async fn put(&self, id: impl Into<String>, params: UpstreamConnectParams) -> Arc<Session> {
        let session = Arc::new(Session::new(id, params, self.ttl));
        self.sessions
            .insert(session.id.clone(), session.clone())
            .await;
        tracing::debug!(session_id = %session.id, "Session registered");
        session
    }

    /// Look up a session. `None` when absent, expired or claimed.
    pub async fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.get(id).await
    }

    /// Remove and return a session in one step.
    ///
    /// Of any number of concurrent callers for the same id, at most one gets
    /// the session back.
    pub async fn take(&self, id: &str) -> Option<Arc<Session>> {
        let session = self.sessions.remove(id).await?;
        if session.expires_at <= Instant::now() {
            return None;
        }
        tracing::debug!(session_id = %id, "Session claimed");
        Some(session)
    }

    /// Put back a session obtained from [`take`](Self::take). It keeps its
    /// original deadline; an already expired session is dropped.
    pub async fn restore(&self, session: Arc<Session>) {
        if session.expires_at <= Instant::now() {
            return;
        }
        tracing::debug!(session_id = %session.id, "Session restored");
        self.sessions.insert(session.id.clone(), session).await;
    }

    /// Approximate number of live entries.
    pub async fn entry_count(&self) -> u64 {
        self.sessions.run_pending_tasks().await;
        self.sessions.entry_count()
    }

    /// Configured time-to-live.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
