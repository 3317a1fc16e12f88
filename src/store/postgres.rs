//! Durable notification store.
//!
//! Every single-record mutation carries the owner in its WHERE clause; a
//! record that exists but belongs to someone else is indistinguishable from
//! a missing one (`rows_affected == 0`), which the API surfaces as 404.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::notification::{
    NewNotification, Notification, NotificationFilter, NotificationKind, NotificationMeta,
    Priority,
};
use crate::models::preferences::Preferences;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

/// Raw row shape; `kind`/`priority` stay TEXT in the schema and are folded
/// into their enums on the way out.
#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    seq: i64,
    recipient_id: Uuid,
    kind: String,
    title: String,
    message: String,
    priority: String,
    actionable: bool,
    action: Option<String>,
    link: Option<String>,
    metadata: serde_json::Value,
    read: bool,
    read_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<NotificationRow> for Notification {
    fn from(row: NotificationRow) -> Self {
        let metadata: NotificationMeta =
            serde_json::from_value(row.metadata).unwrap_or_default();
        Notification {
            id: row.id,
            seq: row.seq,
            recipient_id: row.recipient_id,
            kind: NotificationKind::from_str(&row.kind),
            title: row.title,
            message: row.message,
            priority: Priority::from_str(&row.priority),
            actionable: row.actionable,
            action: row.action,
            link: row.link,
            metadata,
            read: row.read,
            read_at: row.read_at,
            created_at: row.created_at,
        }
    }
}

/// Admin aggregates for the stats endpoint. The connected-user count is
/// not stored; it comes from the session registry.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct NotificationStats {
    pub total: i64,
    pub unread: i64,
    pub urgent: i64,
    pub last_24h: i64,
}

const NOTIFICATION_COLUMNS: &str = "id, seq, recipient_id, kind, title, message, priority, \
     actionable, action, link, metadata, read, read_at, created_at";

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run pending migrations from the migrations/ directory.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    // -- Notification Operations --

    /// Persist one record for `recipient`. The returned notification carries
    /// the server-assigned id, seq and creation time.
    pub async fn create_notification(
        &self,
        recipient: Uuid,
        payload: &NewNotification,
    ) -> anyhow::Result<Notification> {
        let metadata = serde_json::to_value(&payload.metadata)?;
        let row = sqlx::query_as::<_, NotificationRow>(&format!(
            r#"INSERT INTO notifications
                   (recipient_id, kind, title, message, priority, actionable, action, link, metadata)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
               RETURNING {NOTIFICATION_COLUMNS}"#
        ))
        .bind(recipient)
        .bind(payload.kind.as_str())
        .bind(&payload.title)
        .bind(&payload.message)
        .bind(payload.priority.as_str())
        .bind(payload.actionable)
        .bind(&payload.action)
        .bind(&payload.link)
        .bind(metadata)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    pub async fn get_notification(
        &self,
        id: Uuid,
        owner: Uuid,
    ) -> anyhow::Result<Option<Notification>> {
        let row = sqlx::query_as::<_, NotificationRow>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = $1 AND recipient_id = $2"
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// One page, newest first. Filters are optional; NULL binds disable them.
    pub async fn list_notifications(
        &self,
        owner: Uuid,
        filter: &NotificationFilter,
    ) -> anyhow::Result<Vec<Notification>> {
        let (limit, offset) = filter.normalized();
        let rows = sqlx::query_as::<_, NotificationRow>(&format!(
            r#"SELECT {NOTIFICATION_COLUMNS} FROM notifications
               WHERE recipient_id = $1
                 AND (NOT $2 OR read = FALSE)
                 AND ($3::TEXT IS NULL OR kind = $3)
                 AND ($4::TEXT IS NULL OR priority = $4)
               ORDER BY seq DESC
               LIMIT $5 OFFSET $6"#
        ))
        .bind(owner)
        .bind(filter.unread_only)
        .bind(filter.kind.map(|k| k.as_str()))
        .bind(filter.priority.map(|p| p.as_str()))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Total matching the filter, ignoring pagination.
    pub async fn count_notifications(
        &self,
        owner: Uuid,
        filter: &NotificationFilter,
    ) -> anyhow::Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"SELECT COUNT(*) FROM notifications
               WHERE recipient_id = $1
                 AND (NOT $2 OR read = FALSE)
                 AND ($3::TEXT IS NULL OR kind = $3)
                 AND ($4::TEXT IS NULL OR priority = $4)"#,
        )
        .bind(owner)
        .bind(filter.unread_only)
        .bind(filter.kind.map(|k| k.as_str()))
        .bind(filter.priority.map(|p| p.as_str()))
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    pub async fn unread_count(&self, owner: Uuid) -> anyhow::Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE recipient_id = $1 AND read = FALSE",
        )
        .bind(owner)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Most recent `n`, for the connect-time summary.
    pub async fn recent_notifications(
        &self,
        owner: Uuid,
        n: i64,
    ) -> anyhow::Result<Vec<Notification>> {
        let rows = sqlx::query_as::<_, NotificationRow>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications \
             WHERE recipient_id = $1 ORDER BY seq DESC LIMIT $2"
        ))
        .bind(owner)
        .bind(n)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Idempotent: re-marking an already-read record reports success and
    /// keeps the original read_at.
    pub async fn mark_read(&self, id: Uuid, owner: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query(
            "UPDATE notifications SET read = TRUE, read_at = COALESCE(read_at, NOW()) \
             WHERE id = $1 AND recipient_id = $2",
        )
        .bind(id)
        .bind(owner)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Returns the number of records flipped to read.
    pub async fn mark_all_read(&self, owner: Uuid) -> anyhow::Result<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET read = TRUE, read_at = NOW() \
             WHERE recipient_id = $1 AND read = FALSE",
        )
        .bind(owner)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn delete_notification(&self, id: Uuid, owner: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND recipient_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_all_notifications(&self, owner: Uuid) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM notifications WHERE recipient_id = $1")
            .bind(owner)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn notification_stats(&self) -> anyhow::Result<NotificationStats> {
        let (total, unread, urgent, last_24h) =
            sqlx::query_as::<_, (i64, i64, i64, i64)>(
                r#"SELECT
                       COUNT(*),
                       COUNT(*) FILTER (WHERE read = FALSE),
                       COUNT(*) FILTER (WHERE priority = 'urgent'),
                       COUNT(*) FILTER (WHERE created_at > NOW() - INTERVAL '24 hours')
                   FROM notifications"#,
            )
            .fetch_one(&self.pool)
            .await?;

        Ok(NotificationStats {
            total,
            unread,
            urgent,
            last_24h,
        })
    }

    // -- Preference Operations --

    /// `None` means the user has never stored preferences; callers fall
    /// back to the default shape.
    pub async fn get_preferences(&self, user_id: Uuid) -> anyhow::Result<Option<Preferences>> {
        let value = sqlx::query_scalar::<_, serde_json::Value>(
            "SELECT prefs FROM notification_preferences WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        match value {
            Some(v) => Ok(Some(serde_json::from_value(v)?)),
            None => Ok(None),
        }
    }

    /// Full replace, as the preferences surface specifies.
    pub async fn put_preferences(
        &self,
        user_id: Uuid,
        prefs: &Preferences,
    ) -> anyhow::Result<()> {
        let value = serde_json::to_value(prefs)?;
        sqlx::query(
            r#"INSERT INTO notification_preferences (user_id, prefs, updated_at)
               VALUES ($1, $2, NOW())
               ON CONFLICT (user_id) DO UPDATE SET prefs = $2, updated_at = NOW()"#,
        )
        .bind(user_id)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // -- User Population (read-only; owned by the main application) --

    /// Every known user id, for broadcast fan-out.
    pub async fn list_user_ids(&self) -> anyhow::Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>("SELECT id FROM users")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }
}
