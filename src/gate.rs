//! Preference Gate: per-user, per-kind policy for the realtime channel.
//!
//! Consulted by the dispatcher before every live push. The stored record is
//! unaffected by the outcome; the gate only decides whether the event rides
//! the push channel.

use uuid::Uuid;

use crate::models::notification::{NotificationKind, Priority};
use crate::models::preferences::Preferences;
use crate::store::postgres::PgStore;

#[derive(Clone)]
pub struct PreferenceGate {
    store: PgStore,
}

impl PreferenceGate {
    pub fn new(store: PgStore) -> Self {
        Self { store }
    }

    /// Whether `user_id`'s realtime channel carries this kind/priority.
    /// Users without a stored record get the default shape (everything on).
    pub async fn allows(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        priority: Priority,
    ) -> anyhow::Result<bool> {
        let prefs = self
            .store
            .get_preferences(user_id)
            .await?
            .unwrap_or_default();
        Ok(Self::decide(&prefs, kind, priority))
    }

    /// Pure decision, separated from the lookup. Urgent bypasses realtime
    /// suppression.
    pub fn decide(prefs: &Preferences, kind: NotificationKind, priority: Priority) -> bool {
        prefs.realtime_allows(kind, priority)
    }
}
