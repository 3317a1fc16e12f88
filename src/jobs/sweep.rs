//! Background job: purge stale push sessions.
//!
//! Runs on the heartbeat interval. A session whose last heartbeat is older
//! than three intervals is treated as ungracefully dropped and removed, so
//! the registry never accumulates phantom push targets.

use std::time::Duration;

use tokio::time;

use crate::registry::SessionRegistry;

/// Spawn the sweep task. Call this once at startup.
pub fn spawn(registry: SessionRegistry, interval_secs: u64, timeout_secs: u64) {
    tokio::spawn(async move {
        let mut interval = time::interval(Duration::from_secs(interval_secs.max(1)));
        let timeout = Duration::from_secs(timeout_secs);
        loop {
            interval.tick().await;
            let purged = registry.purge_stale(timeout);
            if !purged.is_empty() {
                for (user_id, session_id) in &purged {
                    tracing::debug!(
                        user_id = %user_id,
                        session_id = %session_id,
                        "purged stale session"
                    );
                }
                tracing::info!(
                    purged = purged.len(),
                    remaining = registry.session_count(),
                    "stale session sweep"
                );
            }
        }
    });
}
