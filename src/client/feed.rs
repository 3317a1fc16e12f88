//! The locally held, id-keyed, seq-ordered notification view.
//!
//! Invariants:
//!   - never two entries with the same id
//!   - ordered by `seq` descending (newest first); an update to a known id
//!     is applied in place without reordering
//!   - the unread count is always derived by re-filtering, never kept as a
//!     separate counter that could drift

use chrono::Utc;
use uuid::Uuid;

use crate::models::notification::Notification;

#[derive(Debug, Default)]
pub struct NotificationFeed {
    entries: Vec<Notification>,
}

impl NotificationFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one notification. A new id is inserted at its seq position
    /// (normally the front); a known id is updated in place.
    pub fn upsert(&mut self, notification: Notification) {
        if let Some(existing) = self.entries.iter_mut().find(|n| n.id == notification.id) {
            *existing = notification;
            return;
        }
        // Live pushes normally arrive in order, so this is a prepend; a
        // frame that lost a race with a list merge still lands sorted.
        let pos = self
            .entries
            .iter()
            .position(|n| n.seq < notification.seq)
            .unwrap_or(self.entries.len());
        self.entries.insert(pos, notification);
    }

    /// Merge a pulled page without dropping entries outside it.
    pub fn merge_page(&mut self, notifications: Vec<Notification>) {
        for n in notifications {
            self.upsert(n);
        }
    }

    /// Authoritative resync: server state wins any conflict with local
    /// optimistic state.
    pub fn resync(&mut self, mut notifications: Vec<Notification>) {
        notifications.sort_by(|a, b| b.seq.cmp(&a.seq));
        self.entries = notifications;
    }

    /// Optimistic local mark-read; reconciled by the next resync.
    pub fn mark_read(&mut self, id: Uuid) {
        if let Some(n) = self.entries.iter_mut().find(|n| n.id == id) {
            if !n.read {
                n.read = true;
                n.read_at = Some(Utc::now());
            }
        }
    }

    pub fn mark_all_read(&mut self) {
        let now = Utc::now();
        for n in self.entries.iter_mut().filter(|n| !n.read) {
            n.read = true;
            n.read_at = Some(now);
        }
    }

    pub fn remove(&mut self, id: Uuid) {
        self.entries.retain(|n| n.id != id);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Derived, never cached.
    pub fn unread_count(&self) -> usize {
        self.entries.iter().filter(|n| !n.read).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&Notification> {
        self.entries.iter().find(|n| n.id == id)
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.entries.iter().any(|n| n.id == id)
    }

    /// Newest first.
    pub fn iter(&self) -> impl Iterator<Item = &Notification> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::notification::{NewNotification, NotificationKind, Priority};

    fn notification(seq: i64) -> Notification {
        let payload = NewNotification::new(NotificationKind::General, "T", "M");
        Notification {
            id: Uuid::new_v4(),
            seq,
            recipient_id: Uuid::new_v4(),
            kind: payload.kind,
            title: payload.title,
            message: payload.message,
            priority: Priority::Medium,
            actionable: false,
            action: None,
            link: None,
            metadata: Default::default(),
            read: false,
            read_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn upsert_never_duplicates_ids() {
        let mut feed = NotificationFeed::new();
        let n = notification(1);
        feed.upsert(n.clone());
        feed.upsert(n.clone());
        assert_eq!(feed.len(), 1);
    }

    #[test]
    fn new_arrivals_prepend() {
        let mut feed = NotificationFeed::new();
        feed.upsert(notification(1));
        feed.upsert(notification(2));
        feed.upsert(notification(3));
        let seqs: Vec<i64> = feed.iter().map(|n| n.seq).collect();
        assert_eq!(seqs, vec![3, 2, 1]);
    }

    #[test]
    fn out_of_order_arrival_lands_sorted() {
        let mut feed = NotificationFeed::new();
        feed.upsert(notification(5));
        feed.upsert(notification(1));
        feed.upsert(notification(3));
        let seqs: Vec<i64> = feed.iter().map(|n| n.seq).collect();
        assert_eq!(seqs, vec![5, 3, 1]);
    }

    #[test]
    fn read_flip_updates_in_place_without_reordering() {
        let mut feed = NotificationFeed::new();
        let a = notification(1);
        let b = notification(2);
        feed.upsert(a.clone());
        feed.upsert(b.clone());

        let mut a_read = a.clone();
        a_read.read = true;
        feed.upsert(a_read);

        let order: Vec<Uuid> = feed.iter().map(|n| n.id).collect();
        assert_eq!(order, vec![b.id, a.id]);
        assert!(feed.get(a.id).unwrap().read);
        assert_eq!(feed.len(), 2);
    }

    #[test]
    fn unread_count_is_derived() {
        let mut feed = NotificationFeed::new();
        let a = notification(1);
        let b = notification(2);
        feed.upsert(a.clone());
        feed.upsert(b);
        assert_eq!(feed.unread_count(), 2);

        feed.mark_read(a.id);
        assert_eq!(feed.unread_count(), 1);
        // idempotent
        feed.mark_read(a.id);
        assert_eq!(feed.unread_count(), 1);

        feed.mark_all_read();
        assert_eq!(feed.unread_count(), 0);
    }

    #[test]
    fn resync_replaces_optimistic_state() {
        let mut feed = NotificationFeed::new();
        let a = notification(1);
        feed.upsert(a.clone());
        feed.mark_read(a.id);

        // Server still says unread: server wins.
        feed.resync(vec![a.clone()]);
        assert!(!feed.get(a.id).unwrap().read);
        assert_eq!(feed.unread_count(), 1);
    }

    #[test]
    fn resync_sorts_newest_first() {
        let mut feed = NotificationFeed::new();
        feed.resync(vec![notification(2), notification(9), notification(4)]);
        let seqs: Vec<i64> = feed.iter().map(|n| n.seq).collect();
        assert_eq!(seqs, vec![9, 4, 2]);
    }

    #[test]
    fn remove_and_clear() {
        let mut feed = NotificationFeed::new();
        let a = notification(1);
        feed.upsert(a.clone());
        feed.upsert(notification(2));

        feed.remove(a.id);
        assert!(!feed.contains(a.id));
        assert_eq!(feed.len(), 1);

        feed.clear();
        assert!(feed.is_empty());
    }
}
