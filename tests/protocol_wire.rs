//! Wire-shape checks for both channels: the tagged push frames and the
//! `{success, message, data}` pull envelope. These pin the exact field
//! names clients depend on.

use uuid::Uuid;

use pulse::api::handlers::{ApiResponse, ListData, Pagination};
use pulse::models::notification::{
    NewNotification, Notification, NotificationKind, NotificationMeta, Priority,
};
use pulse::models::preferences::Preferences;
use pulse::protocol::{ClientCommand, ServerEvent};

fn sample() -> Notification {
    let payload = NewNotification::new(
        NotificationKind::FeedbackResponse,
        "New feedback response",
        "A client replied to your feedback",
    )
    .priority(Priority::High)
    .link("/projects/42/feedback")
    .metadata(NotificationMeta {
        project_id: Some(Uuid::new_v4()),
        feedback_id: Some(Uuid::new_v4()),
        ..Default::default()
    });

    Notification {
        id: Uuid::new_v4(),
        seq: 11,
        recipient_id: Uuid::new_v4(),
        kind: payload.kind,
        title: payload.title,
        message: payload.message,
        priority: payload.priority,
        actionable: payload.actionable,
        action: payload.action,
        link: payload.link,
        metadata: payload.metadata,
        read: false,
        read_at: None,
        created_at: chrono::Utc::now(),
    }
}

#[test]
fn new_notification_frame_shape() {
    let json = serde_json::to_value(ServerEvent::NewNotification {
        notification: sample(),
    })
    .unwrap();

    assert_eq!(json["type"], "new_notification");
    let n = &json["notification"];
    assert_eq!(n["kind"], "feedback_response");
    assert_eq!(n["priority"], "high");
    assert_eq!(n["read"], false);
    assert!(n["metadata"]["project_id"].is_string());
    // absent optionals are omitted, not null
    assert!(n.get("read_at").is_none());
    assert!(n.get("action").is_none());
}

#[test]
fn summary_and_list_frame_shapes() {
    let json = serde_json::to_value(ServerEvent::NotificationSummary {
        unread_count: 3,
        recent_notifications: vec![sample()],
    })
    .unwrap();
    assert_eq!(json["type"], "notification_summary");
    assert_eq!(json["unread_count"], 3);
    assert_eq!(json["recent_notifications"].as_array().unwrap().len(), 1);

    let json = serde_json::to_value(ServerEvent::NotificationsList {
        notifications: vec![sample(), sample()],
    })
    .unwrap();
    assert_eq!(json["type"], "notifications_list");
    assert_eq!(json["notifications"].as_array().unwrap().len(), 2);
}

#[test]
fn client_command_wire_compatibility() {
    // Frames as a hand-written browser client would produce them.
    let id = Uuid::new_v4();
    let cmd: ClientCommand = serde_json::from_str(&format!(
        r#"{{"type":"mark_notification_read","id":"{}"}}"#,
        id
    ))
    .unwrap();
    assert!(matches!(cmd, ClientCommand::MarkNotificationRead { id: got } if got == id));

    let cmd: ClientCommand = serde_json::from_str(
        r#"{"type":"get_notifications","unread_only":true,"kind":"task_due","priority":"urgent"}"#,
    )
    .unwrap();
    match cmd {
        ClientCommand::GetNotifications { filter } => {
            assert_eq!(filter.kind, Some(NotificationKind::TaskDue));
            assert_eq!(filter.priority, Some(Priority::Urgent));
            assert!(filter.unread_only);
        }
        other => panic!("unexpected frame: {:?}", other),
    }

    let prefs_json = serde_json::to_string(&Preferences::default()).unwrap();
    let cmd: ClientCommand = serde_json::from_str(&format!(
        r#"{{"type":"update_notification_preferences","preferences":{}}}"#,
        prefs_json
    ))
    .unwrap();
    assert!(matches!(
        cmd,
        ClientCommand::UpdateNotificationPreferences { .. }
    ));

    let cmd: ClientCommand = serde_json::from_str(r#"{"type":"heartbeat"}"#).unwrap();
    assert!(matches!(cmd, ClientCommand::Heartbeat));
}

#[test]
fn pull_envelope_shape() {
    let body = ApiResponse {
        success: true,
        message: "ok".to_string(),
        data: Some(ListData {
            notifications: vec![sample()],
            pagination: Pagination {
                page: 1,
                limit: 20,
                total: 1,
                total_pages: 1,
            },
            unread_count: 1,
        }),
    };
    let json = serde_json::to_value(&body).unwrap();

    assert_eq!(json["success"], true);
    assert_eq!(json["message"], "ok");
    assert_eq!(json["data"]["unread_count"], 1);
    assert_eq!(json["data"]["pagination"]["total_pages"], 1);
    assert_eq!(
        json["data"]["notifications"][0]["kind"],
        "feedback_response"
    );
}

#[test]
fn preferences_wire_shape() {
    let json = serde_json::to_value(Preferences::default()).unwrap();
    assert_eq!(json["realtime"]["enabled"], true);
    assert_eq!(json["realtime"]["sound"], true);
    assert_eq!(json["realtime"]["desktop"], true);
    assert_eq!(json["push"]["task_assigned"], true);
    assert_eq!(json["email"]["system_alert"], true);
}
