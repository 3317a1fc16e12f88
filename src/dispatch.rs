//! Delivery Dispatcher: turns domain events into persisted notifications
//! and best-effort live pushes.
//!
//! Contract with callers: persistence is synchronous. When `notify`
//! returns Ok the records exist, so a client that misses the push can
//! always catch up via pull. The actual socket writes happen in each
//! session's writer task; `notify` only enqueues, in creation order, which
//! preserves per-recipient FIFO without any lock spanning persist + push.

use std::collections::BTreeSet;

use uuid::Uuid;

use crate::errors::AppError;
use crate::gate::PreferenceGate;
use crate::models::notification::{NewNotification, Notification};
use crate::protocol::ServerEvent;
use crate::registry::SessionRegistry;
use crate::store::postgres::PgStore;

#[derive(Clone)]
pub struct Dispatcher {
    store: PgStore,
    registry: SessionRegistry,
    gate: PreferenceGate,
}

impl Dispatcher {
    pub fn new(store: PgStore, registry: SessionRegistry) -> Self {
        let gate = PreferenceGate::new(store.clone());
        Self {
            store,
            registry,
            gate,
        }
    }

    /// Persist one record per distinct recipient, then push to every live
    /// session of each recipient that the preference gate admits.
    ///
    /// A persistence failure aborts the whole operation and propagates;
    /// push is never attempted without a durable record. Push failures are
    /// swallowed: the store is the source of truth and pull reconciles.
    pub async fn notify(
        &self,
        recipients: &[Uuid],
        payload: NewNotification,
    ) -> Result<Vec<Notification>, AppError> {
        // Callers are asked to pre-deduplicate unions like "members ∪
        // admins"; the set makes it a guarantee.
        let distinct = dedupe_recipients(recipients);

        let mut created = Vec::with_capacity(distinct.len());
        for recipient in &distinct {
            let notification = self
                .store
                .create_notification(*recipient, &payload)
                .await
                .map_err(|e| {
                    tracing::error!(recipient = %recipient, "notification persist failed: {}", e);
                    AppError::Internal(e)
                })?;
            created.push(notification);
        }

        for notification in &created {
            self.push_live(notification).await;
        }

        Ok(created)
    }

    /// `notify` over the full known user population. A user who is offline
    /// at broadcast time still gets a record and sees it on next catch-up.
    pub async fn broadcast(&self, payload: NewNotification) -> Result<usize, AppError> {
        let recipients = self.store.list_user_ids().await.map_err(AppError::Internal)?;
        let created = self.notify(&recipients, payload).await?;
        tracing::info!(
            recipients = created.len(),
            kind = payload_kind(&created),
            "broadcast persisted"
        );
        Ok(created.len())
    }

    /// Enqueue one event per live session of the recipient. Dead sessions
    /// (receiver dropped mid-flight) are unregistered and otherwise
    /// ignored. This is the transient-delivery-failure path.
    async fn push_live(&self, notification: &Notification) {
        let recipient = notification.recipient_id;

        match self
            .gate
            .allows(recipient, notification.kind, notification.priority)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(
                    recipient = %recipient,
                    kind = notification.kind.as_str(),
                    "realtime suppressed by preference"
                );
                return;
            }
            Err(e) => {
                tracing::warn!(recipient = %recipient, "preference lookup failed, skipping push: {}", e);
                return;
            }
        }

        let sessions = self.registry.sessions(recipient);
        if sessions.is_empty() {
            return;
        }

        let mut delivered = 0usize;
        for session in &sessions {
            let event = ServerEvent::NewNotification {
                notification: notification.clone(),
            };
            if session.tx.send(event).is_ok() {
                delivered += 1;
            } else {
                tracing::debug!(
                    recipient = %recipient,
                    session_id = %session.session_id,
                    "dropping dead session during push"
                );
                self.registry.unregister(recipient, session.session_id);
            }
        }

        tracing::debug!(
            recipient = %recipient,
            notification_id = %notification.id,
            sessions = delivered,
            "notification pushed"
        );
    }
}

/// Distinct recipients, stable order. One domain event never yields two
/// records for the same user.
pub fn dedupe_recipients(recipients: &[Uuid]) -> BTreeSet<Uuid> {
    recipients.iter().copied().collect()
}

fn payload_kind(created: &[Notification]) -> &'static str {
    created.first().map(|n| n.kind.as_str()).unwrap_or("none")
}
