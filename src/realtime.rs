//! Realtime push endpoint.
//!
//! Route: GET /ws
//!
//! The handler:
//!   1. Resolves the bearer token (header, or `?token=` for browser
//!      WebSocket clients that cannot set headers)
//!   2. Rejects the upgrade outright on auth failure; a bad token never
//!      reaches the registered state
//!   3. Registers the session, sends the catch-up summary
//!   4. Runs the writer (queue → socket) and reader (control frames)
//!      concurrently until either side ends
//!   5. Unregisters and logs a session summary on close

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::auth::{self, AuthedUser};
use crate::protocol::{ClientCommand, ServerEvent};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// GET /ws
pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<WsQuery>,
    ws: WebSocketUpgrade,
    headers: axum::http::HeaderMap,
) -> Result<Response, StatusCode> {
    let token = auth::bearer_from_headers(&headers)
        .or(params.token)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let user = auth::verify_token(&state.config.auth_secret, &token)
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    Ok(ws.on_upgrade(move |socket| handle_session(state, user, socket)))
}

async fn handle_session(state: Arc<AppState>, user: AuthedUser, socket: WebSocket) {
    let session_id = Uuid::new_v4();
    let user_id = user.user_id;
    let session_start = Instant::now();

    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();
    state.registry.register(user_id, session_id, tx.clone());

    tracing::info!(
        user_id = %user_id,
        session_id = %session_id,
        sessions = state.registry.session_count(),
        "session connected"
    );

    // Catch-up summary queues before anything else so the client can
    // reconcile its local state against server truth immediately.
    if let Err(e) = send_summary(&state, user_id, &tx).await {
        tracing::warn!(user_id = %user_id, "catch-up summary failed: {}", e);
    }

    let (mut sink, mut stream) = socket.split();

    let mut frames_out: u64 = 0;
    let writer = async {
        while let Some(event) = rx.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    tracing::error!("event serialize failed: {}", e);
                    continue;
                }
            };
            if sink.send(Message::Text(json)).await.is_err() {
                break;
            }
            frames_out += 1;
        }
    };

    let mut frames_in: u64 = 0;
    let reader = async {
        while let Some(Ok(msg)) = stream.next().await {
            match msg {
                Message::Text(text) => {
                    frames_in += 1;
                    match serde_json::from_str::<ClientCommand>(&text) {
                        Ok(cmd) => {
                            handle_command(&state, user_id, session_id, &tx, cmd).await
                        }
                        Err(e) => {
                            tracing::debug!(
                                user_id = %user_id,
                                "unparseable control frame: {}",
                                e
                            );
                        }
                    }
                }
                // Transport-level pings also count as liveness.
                Message::Ping(_) | Message::Pong(_) => {
                    state.registry.touch(user_id, session_id);
                }
                Message::Close(_) => break,
                Message::Binary(_) => {}
            }
        }
    };

    // Run both directions concurrently; stop when either ends.
    tokio::select! {
        _ = writer => {},
        _ = reader => {},
    }

    state.registry.unregister(user_id, session_id);

    tracing::info!(
        user_id = %user_id,
        session_id = %session_id,
        frames_in,
        frames_out,
        duration_ms = session_start.elapsed().as_millis() as u64,
        "session closed"
    );
}

async fn send_summary(
    state: &Arc<AppState>,
    user_id: Uuid,
    tx: &mpsc::UnboundedSender<ServerEvent>,
) -> anyhow::Result<()> {
    let unread_count = state.db.unread_count(user_id).await?;
    let recent_notifications = state.db.recent_notifications(user_id, 5).await?;
    let _ = tx.send(ServerEvent::NotificationSummary {
        unread_count,
        recent_notifications,
    });
    Ok(())
}

/// Control frames are best-effort: a mutation that fails (record already
/// deleted, DB hiccup) is logged and dropped; the client's next resync
/// reconciles it.
async fn handle_command(
    state: &Arc<AppState>,
    user_id: Uuid,
    session_id: Uuid,
    tx: &mpsc::UnboundedSender<ServerEvent>,
    cmd: ClientCommand,
) {
    state.registry.touch(user_id, session_id);

    match cmd {
        ClientCommand::MarkNotificationRead { id } => {
            match state.db.mark_read(id, user_id).await {
                Ok(found) => {
                    if !found {
                        tracing::debug!(
                            user_id = %user_id,
                            notification_id = %id,
                            "mark-read on missing or foreign record ignored"
                        );
                    }
                }
                Err(e) => tracing::warn!(user_id = %user_id, "mark-read failed: {}", e),
            }
        }
        ClientCommand::MarkAllNotificationsRead => {
            if let Err(e) = state.db.mark_all_read(user_id).await {
                tracing::warn!(user_id = %user_id, "mark-all-read failed: {}", e);
            }
        }
        ClientCommand::GetNotifications { filter } => {
            match state.db.list_notifications(user_id, &filter).await {
                Ok(notifications) => {
                    let _ = tx.send(ServerEvent::NotificationsList { notifications });
                }
                Err(e) => tracing::warn!(user_id = %user_id, "list failed: {}", e),
            }
        }
        ClientCommand::UpdateNotificationPreferences { preferences } => {
            let success = match state.db.put_preferences(user_id, &preferences).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(user_id = %user_id, "preference update failed: {}", e);
                    false
                }
            };
            let _ = tx.send(ServerEvent::PreferencesUpdated { success });
        }
        ClientCommand::Heartbeat => {
            // touch above already recorded it
        }
    }
}
