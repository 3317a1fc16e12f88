use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::notification::{NotificationKind, Priority};

/// Realtime-channel switches. `sound` and `desktop` are presentation
/// side-channels the client honours; the server only reads `enabled`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealtimePrefs {
    pub enabled: bool,
    pub sound: bool,
    pub desktop: bool,
}

impl Default for RealtimePrefs {
    fn default() -> Self {
        Self {
            enabled: true,
            sound: true,
            desktop: true,
        }
    }
}

/// Per-user delivery policy, one record per user, full-replace on update.
///
/// `email` is carried for the mail worker (an external collaborator);
/// the realtime gate consults `push` and `realtime` only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub email: BTreeMap<NotificationKind, bool>,
    #[serde(default)]
    pub push: BTreeMap<NotificationKind, bool>,
    #[serde(default)]
    pub realtime: RealtimePrefs,
}

impl Default for Preferences {
    /// The default shape seeded for users without a stored record:
    /// everything on.
    fn default() -> Self {
        let all_on: BTreeMap<NotificationKind, bool> =
            NotificationKind::ALL.iter().map(|k| (*k, true)).collect();
        Self {
            email: all_on.clone(),
            push: all_on,
            realtime: RealtimePrefs::default(),
        }
    }
}

impl Preferences {
    /// Whether the realtime channel carries `kind` at `priority`.
    ///
    /// Urgent notifications bypass realtime suppression. The record is
    /// stored either way; this only decides the live push.
    pub fn realtime_allows(&self, kind: NotificationKind, priority: Priority) -> bool {
        if priority.is_urgent() {
            return true;
        }
        if !self.realtime.enabled {
            return false;
        }
        // Kinds missing from the map (added after the record was written)
        // default to enabled.
        self.push.get(&kind).copied().unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_shape_allows_everything() {
        let prefs = Preferences::default();
        for kind in NotificationKind::ALL {
            assert!(prefs.realtime_allows(kind, Priority::Medium));
        }
    }

    #[test]
    fn disabled_kind_is_suppressed() {
        let mut prefs = Preferences::default();
        prefs.push.insert(NotificationKind::TaskDue, false);
        assert!(!prefs.realtime_allows(NotificationKind::TaskDue, Priority::High));
        assert!(prefs.realtime_allows(NotificationKind::TaskAssigned, Priority::High));
    }

    #[test]
    fn realtime_off_suppresses_all_but_urgent() {
        let mut prefs = Preferences::default();
        prefs.realtime.enabled = false;
        assert!(!prefs.realtime_allows(NotificationKind::General, Priority::High));
        assert!(prefs.realtime_allows(NotificationKind::SystemAlert, Priority::Urgent));
    }

    #[test]
    fn urgent_bypasses_per_kind_suppression() {
        let mut prefs = Preferences::default();
        prefs.push.insert(NotificationKind::SystemAlert, false);
        assert!(prefs.realtime_allows(NotificationKind::SystemAlert, Priority::Urgent));
    }

    #[test]
    fn unknown_kind_defaults_to_enabled() {
        let prefs = Preferences {
            email: BTreeMap::new(),
            push: BTreeMap::new(),
            realtime: RealtimePrefs::default(),
        };
        assert!(prefs.realtime_allows(NotificationKind::MeetingReminder, Priority::Low));
    }

    #[test]
    fn json_roundtrip_preserves_toggles() {
        let mut prefs = Preferences::default();
        prefs.push.insert(NotificationKind::ProjectUpdate, false);
        prefs.realtime.sound = false;

        let json = serde_json::to_value(&prefs).unwrap();
        let back: Preferences = serde_json::from_value(json).unwrap();
        assert_eq!(back, prefs);
        assert_eq!(back.push.get(&NotificationKind::ProjectUpdate), Some(&false));
        assert!(!back.realtime.sound);
    }
}
