use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthedUser;
use crate::errors::AppError;
use crate::models::notification::{
    NewNotification, Notification, NotificationFilter, NotificationKind, Priority,
};
use crate::models::preferences::Preferences;
use crate::store::postgres::NotificationStats;
use crate::AppState;

// ── Response envelope ────────────────────────────────────────

/// Every pull-surface response uses the same `{success, message, data}`
/// envelope; errors produce the same shape through `AppError`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        success: true,
        message: "ok".to_string(),
        data: Some(data),
    })
}

// ── DTOs ─────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListData {
    pub notifications: Vec<Notification>,
    pub pagination: Pagination,
    pub unread_count: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SummaryData {
    pub unread_count: i64,
    pub recent_notifications: Vec<Notification>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ModifiedData {
    pub modified: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeletedData {
    pub deleted: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatsData {
    #[serde(flatten)]
    pub stats: NotificationStats,
    pub connected_users: usize,
}

#[derive(Debug, Deserialize)]
pub struct BroadcastRequest {
    pub kind: Option<NotificationKind>,
    pub title: Option<String>,
    pub message: Option<String>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub link: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BroadcastData {
    pub recipients: usize,
}

// ── Owner surface ────────────────────────────────────────────

/// GET /api/v1/notifications — paginated, filterable, newest first.
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthedUser>,
    Query(filter): Query<NotificationFilter>,
) -> Result<Json<ApiResponse<ListData>>, AppError> {
    let notifications = state.db.list_notifications(user.user_id, &filter).await?;
    let total = state.db.count_notifications(user.user_id, &filter).await?;
    let unread_count = state.db.unread_count(user.user_id).await?;

    let (limit, _) = filter.normalized();
    let pagination = Pagination {
        page: filter.page.max(1),
        limit,
        total,
        total_pages: (total + limit - 1) / limit,
    };

    Ok(ok(ListData {
        notifications,
        pagination,
        unread_count,
    }))
}

/// GET /api/v1/notifications/summary — unread count plus up to 5 recent.
pub async fn notification_summary(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthedUser>,
) -> Result<Json<ApiResponse<SummaryData>>, AppError> {
    let unread_count = state.db.unread_count(user.user_id).await?;
    let recent_notifications = state.db.recent_notifications(user.user_id, 5).await?;

    Ok(ok(SummaryData {
        unread_count,
        recent_notifications,
    }))
}

/// POST /api/v1/notifications/:id/read — 404 if absent or not owned.
pub async fn mark_notification_read(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthedUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let found = state.db.mark_read(id, user.user_id).await?;
    if !found {
        return Err(AppError::NotFound);
    }
    Ok(ok(()))
}

/// POST /api/v1/notifications/read-all — returns the modified count.
pub async fn mark_all_notifications_read(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthedUser>,
) -> Result<Json<ApiResponse<ModifiedData>>, AppError> {
    let modified = state.db.mark_all_read(user.user_id).await?;
    Ok(ok(ModifiedData { modified }))
}

/// DELETE /api/v1/notifications/:id — 404 if absent or not owned.
pub async fn delete_notification(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthedUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    let found = state.db.delete_notification(id, user.user_id).await?;
    if !found {
        return Err(AppError::NotFound);
    }
    Ok(ok(()))
}

/// DELETE /api/v1/notifications — clears the caller's notifications.
pub async fn delete_all_notifications(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthedUser>,
) -> Result<Json<ApiResponse<DeletedData>>, AppError> {
    let deleted = state.db.delete_all_notifications(user.user_id).await?;
    Ok(ok(DeletedData { deleted }))
}

/// GET /api/v1/preferences — default shape if the user never stored any.
pub async fn get_preferences(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthedUser>,
) -> Result<Json<ApiResponse<Preferences>>, AppError> {
    let prefs = state
        .db
        .get_preferences(user.user_id)
        .await?
        .unwrap_or_default();
    Ok(ok(prefs))
}

/// PUT /api/v1/preferences — full replace.
pub async fn update_preferences(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthedUser>,
    Json(prefs): Json<Preferences>,
) -> Result<Json<ApiResponse<Preferences>>, AppError> {
    state.db.put_preferences(user.user_id, &prefs).await?;
    Ok(ok(prefs))
}

// ── Admin surface ────────────────────────────────────────────

/// POST /api/v1/admin/test — self-targeted test notification.
pub async fn send_test_notification(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthedUser>,
) -> Result<Json<ApiResponse<Notification>>, AppError> {
    user.require_admin()?;

    let payload = NewNotification::new(
        NotificationKind::General,
        "Test notification",
        "This is a test notification from Pulse.",
    );
    let mut created = state.dispatcher.notify(&[user.user_id], payload).await?;
    let notification = created.pop().ok_or_else(|| {
        AppError::Internal(anyhow::anyhow!("test notification produced no record"))
    })?;

    Ok(ok(notification))
}

/// GET /api/v1/admin/stats — store aggregates plus the live connected
/// user count from the session registry.
pub async fn notification_stats(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthedUser>,
) -> Result<Json<ApiResponse<StatsData>>, AppError> {
    user.require_admin()?;

    let stats = state.db.notification_stats().await?;
    Ok(ok(StatsData {
        stats,
        connected_users: state.registry.connected_user_count(),
    }))
}

/// POST /api/v1/admin/broadcast — requires kind, title and message.
pub async fn broadcast(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthedUser>,
    Json(req): Json<BroadcastRequest>,
) -> Result<Json<ApiResponse<BroadcastData>>, AppError> {
    user.require_admin()?;

    let kind = req
        .kind
        .ok_or_else(|| AppError::Validation("broadcast requires a kind".into()))?;
    let title = req
        .title
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| AppError::Validation("broadcast requires a title".into()))?;
    let message = req
        .message
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| AppError::Validation("broadcast requires a message".into()))?;

    let mut payload = NewNotification::new(kind, title, message)
        .priority(req.priority.unwrap_or(Priority::Medium));
    if let Some(link) = req.link {
        payload = payload.link(link);
    }

    let recipients = state.dispatcher.broadcast(payload).await?;
    Ok(ok(BroadcastData { recipients }))
}
