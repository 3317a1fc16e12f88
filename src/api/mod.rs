use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::auth;
use crate::errors::AppError;
use crate::AppState;

pub mod handlers;

/// Build the pull-surface router.
/// All routes are relative; the caller mounts this under `/api/v1`.
pub fn api_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/notifications",
            get(handlers::list_notifications).delete(handlers::delete_all_notifications),
        )
        .route("/notifications/summary", get(handlers::notification_summary))
        .route(
            "/notifications/read-all",
            post(handlers::mark_all_notifications_read),
        )
        .route(
            "/notifications/:id/read",
            post(handlers::mark_notification_read),
        )
        .route("/notifications/:id", delete(handlers::delete_notification))
        .route(
            "/preferences",
            get(handlers::get_preferences).put(handlers::update_preferences),
        )
        // Admin surface
        .route("/admin/test", post(handlers::send_test_notification))
        .route("/admin/stats", get(handlers::notification_stats))
        .route("/admin/broadcast", post(handlers::broadcast))
        .layer(middleware::from_fn_with_state(state, require_auth))
        .layer(TraceLayer::new_for_http())
}

/// Middleware: resolves the bearer token into an [`auth::AuthedUser`]
/// extension. Requests without a valid token never reach a handler.
async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token =
        auth::bearer_from_headers(req.headers()).ok_or(AppError::Unauthorized)?;
    let user = auth::verify_token(&state.config.auth_secret, &token)?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}
