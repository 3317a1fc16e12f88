use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Notification categories produced by the domain controllers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    TaskAssigned,
    TaskDue,
    TaskCompleted,
    ProjectUpdate,
    ProjectMilestone,
    MeetingReminder,
    FeedbackResponse,
    SystemAlert,
    General,
}

impl NotificationKind {
    pub const ALL: [NotificationKind; 9] = [
        NotificationKind::TaskAssigned,
        NotificationKind::TaskDue,
        NotificationKind::TaskCompleted,
        NotificationKind::ProjectUpdate,
        NotificationKind::ProjectMilestone,
        NotificationKind::MeetingReminder,
        NotificationKind::FeedbackResponse,
        NotificationKind::SystemAlert,
        NotificationKind::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::TaskAssigned => "task_assigned",
            NotificationKind::TaskDue => "task_due",
            NotificationKind::TaskCompleted => "task_completed",
            NotificationKind::ProjectUpdate => "project_update",
            NotificationKind::ProjectMilestone => "project_milestone",
            NotificationKind::MeetingReminder => "meeting_reminder",
            NotificationKind::FeedbackResponse => "feedback_response",
            NotificationKind::SystemAlert => "system_alert",
            NotificationKind::General => "general",
        }
    }

    /// Unknown strings (e.g. rows written by a newer deploy) fold into
    /// `General` rather than failing the whole page.
    pub fn from_str(s: &str) -> Self {
        match s {
            "task_assigned" => NotificationKind::TaskAssigned,
            "task_due" => NotificationKind::TaskDue,
            "task_completed" => NotificationKind::TaskCompleted,
            "project_update" => NotificationKind::ProjectUpdate,
            "project_milestone" => NotificationKind::ProjectMilestone,
            "meeting_reminder" => NotificationKind::MeetingReminder,
            "feedback_response" => NotificationKind::FeedbackResponse,
            "system_alert" => NotificationKind::SystemAlert,
            _ => NotificationKind::General,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "low" => Priority::Low,
            "high" => Priority::High,
            "urgent" => Priority::Urgent,
            _ => Priority::Medium,
        }
    }

    pub fn is_urgent(&self) -> bool {
        matches!(self, Priority::Urgent)
    }
}

/// Opaque references back into the business entities that triggered the
/// notification. Pulse never dereferences these.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meeting_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
}

/// A persisted, single-recipient notification record.
///
/// Immutable after creation except for `read`/`read_at`. `seq` is assigned
/// at persist time and is the per-recipient delivery and merge order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub seq: i64,
    pub recipient_id: Uuid,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub priority: Priority,
    pub actionable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default)]
    pub metadata: NotificationMeta,
    pub read: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Payload handed to the dispatcher by a domain controller. Everything the
/// server assigns (id, seq, recipient, timestamps, read state) is absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNotification {
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    #[serde(default = "default_priority")]
    pub priority: Priority,
    #[serde(default)]
    pub actionable: bool,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub metadata: NotificationMeta,
}

fn default_priority() -> Priority {
    Priority::Medium
}

impl NewNotification {
    pub fn new(kind: NotificationKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            message: message.into(),
            priority: Priority::Medium,
            actionable: false,
            action: None,
            link: None,
            metadata: NotificationMeta::default(),
        }
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn actionable(mut self, action: impl Into<String>) -> Self {
        self.actionable = true;
        self.action = Some(action.into());
        self
    }

    pub fn link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub fn metadata(mut self, metadata: NotificationMeta) -> Self {
        self.metadata = metadata;
        self
    }

    /// Feedback responses inherit urgency from the source feedback:
    /// urgent feedback stays urgent, everything else lands as high.
    pub fn feedback_response(
        project_id: Uuid,
        feedback_id: Uuid,
        title: impl Into<String>,
        message: impl Into<String>,
        source_priority: Priority,
    ) -> Self {
        let priority = if source_priority.is_urgent() {
            Priority::Urgent
        } else {
            Priority::High
        };
        Self::new(NotificationKind::FeedbackResponse, title, message)
            .priority(priority)
            .metadata(NotificationMeta {
                project_id: Some(project_id),
                feedback_id: Some(feedback_id),
                ..Default::default()
            })
    }
}

/// Filters shared by the pull list endpoint and the `get_notifications`
/// control frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationFilter {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub unread_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<NotificationKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    20
}

impl Default for NotificationFilter {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 20,
            unread_only: false,
            kind: None,
            priority: None,
        }
    }
}

impl NotificationFilter {
    /// Page/limit clamped to sane bounds, offset derived.
    pub fn normalized(&self) -> (i64, i64) {
        let limit = self.limit.clamp(1, 100);
        let page = self.page.max(1);
        (limit, (page - 1) * limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_string_roundtrip() {
        for kind in NotificationKind::ALL {
            assert_eq!(NotificationKind::from_str(kind.as_str()), kind);
        }
        assert_eq!(
            NotificationKind::from_str("something_new"),
            NotificationKind::General
        );
    }

    #[test]
    fn priority_ordering() {
        assert!(Priority::Urgent > Priority::High);
        assert!(Priority::High > Priority::Medium);
        assert!(Priority::Medium > Priority::Low);
    }

    #[test]
    fn meta_serialization_skips_absent_fields() {
        let meta = NotificationMeta {
            task_id: Some(Uuid::new_v4()),
            ..Default::default()
        };
        let json = serde_json::to_value(&meta).unwrap();
        assert!(json.get("task_id").is_some());
        assert!(json.get("project_id").is_none());
    }

    #[test]
    fn feedback_response_priority_mapping() {
        let p = Uuid::new_v4();
        let f = Uuid::new_v4();
        let urgent =
            NewNotification::feedback_response(p, f, "t", "m", Priority::Urgent);
        assert_eq!(urgent.priority, Priority::Urgent);

        let routine = NewNotification::feedback_response(p, f, "t", "m", Priority::Low);
        assert_eq!(routine.priority, Priority::High);
        assert_eq!(routine.metadata.project_id, Some(p));
        assert_eq!(routine.metadata.feedback_id, Some(f));
    }

    #[test]
    fn filter_normalization_clamps() {
        let filter = NotificationFilter {
            page: 0,
            limit: 10_000,
            ..Default::default()
        };
        let (limit, offset) = filter.normalized();
        assert_eq!(limit, 100);
        assert_eq!(offset, 0);

        let filter = NotificationFilter {
            page: 3,
            limit: 20,
            ..Default::default()
        };
        assert_eq!(filter.normalized(), (20, 40));
    }
}
