//! Push-channel wire protocol.
//!
//! Frames are JSON, internally tagged with `type`. The same enums serve
//! both ends: the server serializes [`ServerEvent`] and parses
//! [`ClientCommand`]; the sync engine does the inverse.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::notification::{Notification, NotificationFilter};
use crate::models::preferences::Preferences;

/// Server → client frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// A freshly persisted notification fanned out to one live session.
    NewNotification { notification: Notification },
    /// Catch-up summary, sent on every successful handshake.
    NotificationSummary {
        unread_count: i64,
        recent_notifications: Vec<Notification>,
    },
    /// Response to `get_notifications`.
    NotificationsList { notifications: Vec<Notification> },
    /// Acknowledges `update_notification_preferences`.
    PreferencesUpdated { success: bool },
}

/// Client → server frames. Mutations are fire-and-forget: the client has
/// already applied them optimistically and reconciles on the next resync.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientCommand {
    MarkNotificationRead { id: Uuid },
    MarkAllNotificationsRead,
    GetNotifications {
        #[serde(flatten)]
        filter: NotificationFilter,
    },
    UpdateNotificationPreferences { preferences: Preferences },
    Heartbeat,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::notification::{NewNotification, NotificationKind, Priority};

    fn sample_notification() -> Notification {
        let payload = NewNotification::new(NotificationKind::TaskAssigned, "T", "M")
            .priority(Priority::High);
        Notification {
            id: Uuid::new_v4(),
            seq: 7,
            recipient_id: Uuid::new_v4(),
            kind: payload.kind,
            title: payload.title,
            message: payload.message,
            priority: payload.priority,
            actionable: false,
            action: None,
            link: None,
            metadata: Default::default(),
            read: false,
            read_at: None,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn server_events_are_tagged() {
        let ev = ServerEvent::NewNotification {
            notification: sample_notification(),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "new_notification");
        assert_eq!(json["notification"]["kind"], "task_assigned");

        let ev = ServerEvent::NotificationSummary {
            unread_count: 3,
            recent_notifications: vec![],
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "notification_summary");
        assert_eq!(json["unread_count"], 3);
    }

    #[test]
    fn client_commands_parse_from_wire_shape() {
        let cmd: ClientCommand = serde_json::from_str(
            r#"{"type":"mark_notification_read","id":"8400e7e2-11d4-4a2e-b4b0-115a34d7f3a3"}"#,
        )
        .unwrap();
        assert!(matches!(cmd, ClientCommand::MarkNotificationRead { .. }));

        let cmd: ClientCommand =
            serde_json::from_str(r#"{"type":"mark_all_notifications_read"}"#).unwrap();
        assert!(matches!(cmd, ClientCommand::MarkAllNotificationsRead));

        let cmd: ClientCommand = serde_json::from_str(
            r#"{"type":"get_notifications","page":2,"limit":10,"unread_only":true}"#,
        )
        .unwrap();
        match cmd {
            ClientCommand::GetNotifications { filter } => {
                assert_eq!(filter.page, 2);
                assert_eq!(filter.limit, 10);
                assert!(filter.unread_only);
                assert!(filter.kind.is_none());
            }
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[test]
    fn get_notifications_defaults_apply() {
        let cmd: ClientCommand =
            serde_json::from_str(r#"{"type":"get_notifications"}"#).unwrap();
        match cmd {
            ClientCommand::GetNotifications { filter } => {
                assert_eq!(filter.page, 1);
                assert_eq!(filter.limit, 20);
                assert!(!filter.unread_only);
            }
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[test]
    fn event_roundtrip() {
        let ev = ServerEvent::NotificationsList {
            notifications: vec![sample_notification()],
        };
        let json = serde_json::to_string(&ev).unwrap();
        let back: ServerEvent = serde_json::from_str(&json).unwrap();
        match back {
            ServerEvent::NotificationsList { notifications } => {
                assert_eq!(notifications.len(), 1)
            }
            other => panic!("unexpected frame: {:?}", other),
        }
    }
}
