//! Session Registry: the concurrency-safe map of user to live push channels.
//!
//! Each WebSocket session owns an unbounded sender; the socket writer task
//! drains the paired receiver. The registry is an injected instance shared
//! by connection handlers, the dispatcher and the sweep job. There is no
//! global.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::protocol::ServerEvent;

struct SessionEntry {
    session_id: Uuid,
    tx: UnboundedSender<ServerEvent>,
    connected_at: DateTime<Utc>,
    last_heartbeat: Instant,
}

/// Snapshot of one live session's push handle.
#[derive(Clone)]
pub struct SessionSender {
    pub session_id: Uuid,
    pub tx: UnboundedSender<ServerEvent>,
}

#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<DashMap<Uuid, Vec<SessionEntry>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session. Idempotent: re-registering the same session id
    /// replaces its sender instead of duplicating the entry.
    pub fn register(&self, user_id: Uuid, session_id: Uuid, tx: UnboundedSender<ServerEvent>) {
        let entry = SessionEntry {
            session_id,
            tx,
            connected_at: Utc::now(),
            last_heartbeat: Instant::now(),
        };
        let mut sessions = self.inner.entry(user_id).or_default();
        if let Some(existing) = sessions.iter_mut().find(|s| s.session_id == session_id) {
            *existing = entry;
        } else {
            sessions.push(entry);
        }
    }

    /// Remove a session. Idempotent; removing the last session for a user
    /// removes the map entry entirely.
    pub fn unregister(&self, user_id: Uuid, session_id: Uuid) {
        if let Some(mut sessions) = self.inner.get_mut(&user_id) {
            sessions.retain(|s| s.session_id != session_id);
        }
        self.inner.remove_if(&user_id, |_, sessions| sessions.is_empty());
    }

    /// Snapshot of the user's live push handles.
    pub fn sessions(&self, user_id: Uuid) -> Vec<SessionSender> {
        self.inner
            .get(&user_id)
            .map(|sessions| {
                sessions
                    .iter()
                    .map(|s| SessionSender {
                        session_id: s.session_id,
                        tx: s.tx.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of distinct users with at least one live session.
    pub fn connected_user_count(&self) -> usize {
        self.inner.len()
    }

    /// Total live sessions across all users.
    pub fn session_count(&self) -> usize {
        self.inner.iter().map(|e| e.value().len()).sum()
    }

    pub fn user_ids(&self) -> Vec<Uuid> {
        self.inner.iter().map(|e| *e.key()).collect()
    }

    /// Record a heartbeat for a session.
    pub fn touch(&self, user_id: Uuid, session_id: Uuid) {
        if let Some(mut sessions) = self.inner.get_mut(&user_id) {
            if let Some(s) = sessions.iter_mut().find(|s| s.session_id == session_id) {
                s.last_heartbeat = Instant::now();
            }
        }
    }

    /// Drop sessions whose last heartbeat is older than `timeout`. Returns
    /// the purged (user, session) pairs so the sweep job can log them.
    /// An ungracefully dropped connection lands here instead of lingering
    /// as a phantom push target.
    pub fn purge_stale(&self, timeout: Duration) -> Vec<(Uuid, Uuid)> {
        let mut purged = Vec::new();
        for mut entry in self.inner.iter_mut() {
            let user_id = *entry.key();
            entry.value_mut().retain(|s| {
                if s.last_heartbeat.elapsed() > timeout {
                    purged.push((user_id, s.session_id));
                    false
                } else {
                    true
                }
            });
        }
        self.inner.retain(|_, sessions| !sessions.is_empty());
        purged
    }

    /// Oldest connection time for a user, if connected. Surfaced in admin
    /// diagnostics.
    pub fn connected_since(&self, user_id: Uuid) -> Option<DateTime<Utc>> {
        self.inner
            .get(&user_id)
            .and_then(|sessions| sessions.iter().map(|s| s.connected_at).min())
    }
}
