//! Client Sync Engine.
//!
//! A single cooperative event loop that authenticates a push channel,
//! requests catch-up state, merges live and pulled notifications into one
//! ordered [`feed::NotificationFeed`], and issues read/delete mutations
//! back over the control channel. When the push channel cannot be
//! re-established within the retry budget the engine degrades to periodic
//! polling through [`pull::PullClient`] instead of failing outright.

pub mod engine;
pub mod feed;
pub mod pull;

pub use engine::{ConnState, FeedEvent, SyncCommand, SyncConfig, SyncEngine, SyncHandle};
pub use feed::NotificationFeed;
pub use pull::PullClient;
