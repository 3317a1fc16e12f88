//! Pulse: realtime notification fan-out for the Taskboard suite.
//!
//! Domain controllers (projects, tasks, meetings, feedback) hand events to
//! the [`dispatch::Dispatcher`]; Pulse persists one notification record per
//! distinct recipient, filters the realtime channel through per-user
//! preferences, and pushes to every live WebSocket session of each
//! recipient. Clients reconcile after disconnects through the pull surface
//! under `/api/v1`.

use std::sync::Arc;

pub mod api;
pub mod auth;
pub mod cli;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod errors;
pub mod gate;
pub mod jobs;
pub mod models;
pub mod protocol;
pub mod realtime;
pub mod registry;
pub mod store;

use dispatch::Dispatcher;
use registry::SessionRegistry;
use store::postgres::PgStore;

/// Shared application state passed to handlers and the WebSocket endpoint.
pub struct AppState {
    pub db: PgStore,
    pub registry: SessionRegistry,
    pub dispatcher: Dispatcher,
    pub config: config::Config,
}

pub type SharedState = Arc<AppState>;
