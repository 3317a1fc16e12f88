//! The sync engine event loop.
//!
//! One cooperative loop owns the feed; socket frames, user commands and
//! timers are serialized through `tokio::select!`, so the feed needs no
//! further synchronization. Connect attempts are time-bounded; reconnect
//! attempts are capped, and exhausting them degrades the engine to
//! poll-only mode instead of failing outright.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use rand::Rng;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{
    connect_async_tls_with_config, tungstenite::handshake::client::Request,
    tungstenite::Message as WsMessage, MaybeTlsStream, WebSocketStream,
};
use url::Url;
use uuid::Uuid;

use crate::models::notification::{Notification, NotificationFilter};
use crate::models::preferences::Preferences;
use crate::protocol::{ClientCommand, ServerEvent};

use super::feed::NotificationFeed;
use super::pull::PullClient;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Base server URL, e.g. `http://localhost:8090`.
    pub server_url: String,
    pub token: String,
    /// Bound on a single connect attempt.
    pub connect_timeout: Duration,
    /// Reconnect attempts per disconnect episode before degrading to
    /// poll-only mode.
    pub max_reconnect_attempts: u32,
    pub reconnect_delay: Duration,
    pub poll_interval: Duration,
    pub heartbeat_interval: Duration,
}

impl SyncConfig {
    pub fn new(server_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            token: token.into(),
            connect_timeout: Duration::from_secs(20),
            max_reconnect_attempts: 5,
            reconnect_delay: Duration::from_secs(3),
            poll_interval: Duration::from_secs(30),
            heartbeat_interval: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    /// Push channel given up; periodic list polling keeps the feed fresh.
    Polling,
}

/// User-triggered mutations, applied optimistically and forwarded
/// fire-and-forget.
#[derive(Debug, Clone)]
pub enum SyncCommand {
    MarkRead(Uuid),
    MarkAllRead,
    Delete(Uuid),
    Refresh(NotificationFilter),
    UpdatePreferences(Preferences),
    Shutdown,
}

/// What the embedding UI consumes. `sound`/`desktop` mirror the user's
/// realtime preferences so the UI can drive its side-channels without
/// another lookup.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    State(ConnState),
    Arrived {
        notification: Notification,
        sound: bool,
        desktop: bool,
    },
    Synced {
        unread_count: usize,
    },
}

/// Cheap cloneable handle for issuing commands into the engine loop.
#[derive(Clone)]
pub struct SyncHandle {
    tx: mpsc::UnboundedSender<SyncCommand>,
}

impl SyncHandle {
    pub fn mark_read(&self, id: Uuid) {
        let _ = self.tx.send(SyncCommand::MarkRead(id));
    }

    pub fn mark_all_read(&self) {
        let _ = self.tx.send(SyncCommand::MarkAllRead);
    }

    pub fn delete(&self, id: Uuid) {
        let _ = self.tx.send(SyncCommand::Delete(id));
    }

    pub fn refresh(&self, filter: NotificationFilter) {
        let _ = self.tx.send(SyncCommand::Refresh(filter));
    }

    pub fn update_preferences(&self, prefs: Preferences) {
        let _ = self.tx.send(SyncCommand::UpdatePreferences(prefs));
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(SyncCommand::Shutdown);
    }
}

pub struct SyncEngine {
    cfg: SyncConfig,
    feed: NotificationFeed,
    prefs: Preferences,
    pull: PullClient,
    state: ConnState,
    commands: mpsc::UnboundedReceiver<SyncCommand>,
    events: mpsc::UnboundedSender<FeedEvent>,
}

impl SyncEngine {
    pub fn new(
        cfg: SyncConfig,
    ) -> anyhow::Result<(Self, SyncHandle, mpsc::UnboundedReceiver<FeedEvent>)> {
        let pull = PullClient::new(&cfg.server_url, &cfg.token)?;
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let engine = Self {
            cfg,
            feed: NotificationFeed::new(),
            prefs: Preferences::default(),
            pull,
            state: ConnState::Disconnected,
            commands: cmd_rx,
            events: event_tx,
        };
        Ok((engine, SyncHandle { tx: cmd_tx }, event_rx))
    }

    pub fn state(&self) -> ConnState {
        self.state
    }

    pub fn feed(&self) -> &NotificationFeed {
        &self.feed
    }

    /// Drive the state machine until shutdown. Never returns an error:
    /// every failure path degrades (reconnect, then poll-only).
    pub async fn run(mut self) {
        let mut attempts: u32 = 0;

        loop {
            self.set_state(ConnState::Connecting);

            match timeout(self.cfg.connect_timeout, self.connect()).await {
                Ok(Ok(ws)) => {
                    attempts = 0;
                    self.set_state(ConnState::Connected);
                    if self.session_loop(ws).await {
                        self.set_state(ConnState::Disconnected);
                        return;
                    }
                    // Socket ended without a shutdown command.
                    self.set_state(ConnState::Reconnecting);
                }
                Ok(Err(e)) => {
                    tracing::warn!("push channel connect failed: {}", e);
                    attempts += 1;
                }
                Err(_) => {
                    tracing::warn!(
                        timeout_secs = self.cfg.connect_timeout.as_secs(),
                        "push channel connect timed out"
                    );
                    attempts += 1;
                }
            }

            if attempts > self.cfg.max_reconnect_attempts {
                tracing::warn!(
                    attempts,
                    "reconnect budget exhausted, degrading to poll-only mode"
                );
                self.poll_loop().await;
                return;
            }

            if attempts > 0 {
                self.set_state(ConnState::Reconnecting);
                let jitter = rand::thread_rng().gen_range(0..500u64);
                tokio::time::sleep(self.cfg.reconnect_delay + Duration::from_millis(jitter)).await;
            }
        }
    }

    async fn connect(&self) -> anyhow::Result<WsStream> {
        let ws_url = push_channel_url(&self.cfg.server_url)?;
        let request = Request::builder()
            .uri(ws_url.as_str())
            .header("Authorization", format!("Bearer {}", self.cfg.token))
            .header("User-Agent", "Pulse-Sync/1.0")
            .body(())?;

        let (ws, _resp) = connect_async_tls_with_config(request, None, false, None).await?;
        Ok(ws)
    }

    /// Returns true when the loop ended because of a shutdown command.
    async fn session_loop(&mut self, ws: WsStream) -> bool {
        let (mut sink, mut stream) = ws.split();

        // Every fresh Connected transition resyncs against server state;
        // the reply replaces local optimistic state wholesale.
        if let Ok(frame) = serde_json::to_string(&ClientCommand::GetNotifications {
            filter: resync_filter(),
        }) {
            if sink.send(WsMessage::Text(frame)).await.is_err() {
                return false;
            }
        }

        let mut heartbeat = tokio::time::interval(self.cfg.heartbeat_interval);
        heartbeat.tick().await; // first tick is immediate

        loop {
            tokio::select! {
                frame = stream.next() => match frame {
                    Some(Ok(WsMessage::Text(text))) => {
                        if let Some(reply) = self.handle_server_frame(&text) {
                            if let Ok(json) = serde_json::to_string(&reply) {
                                if sink.send(WsMessage::Text(json)).await.is_err() {
                                    return false;
                                }
                            }
                        }
                    }
                    Some(Ok(WsMessage::Ping(payload))) => {
                        let _ = sink.send(WsMessage::Pong(payload)).await;
                    }
                    Some(Ok(WsMessage::Close(_))) | None => return false,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!("push channel read error: {}", e);
                        return false;
                    }
                },
                cmd = self.commands.recv() => match cmd {
                    None | Some(SyncCommand::Shutdown) => {
                        let _ = sink.send(WsMessage::Close(None)).await;
                        return true;
                    }
                    Some(cmd) => {
                        if let Some(frame) = self.apply_command(cmd) {
                            if let Ok(json) = serde_json::to_string(&frame) {
                                if sink.send(WsMessage::Text(json)).await.is_err() {
                                    return false;
                                }
                            }
                        }
                    }
                },
                _ = heartbeat.tick() => {
                    if let Ok(json) = serde_json::to_string(&ClientCommand::Heartbeat) {
                        if sink.send(WsMessage::Text(json)).await.is_err() {
                            return false;
                        }
                    }
                }
            }
        }
    }

    /// Merge a server frame into the feed. Returns a control frame to send
    /// back when the frame calls for one.
    fn handle_server_frame(&mut self, text: &str) -> Option<ClientCommand> {
        let event = match serde_json::from_str::<ServerEvent>(text) {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!("unparseable server frame: {}", e);
                return None;
            }
        };

        match event {
            ServerEvent::NewNotification { notification } => {
                let fresh = !self.feed.contains(notification.id);
                self.feed.upsert(notification.clone());
                if fresh {
                    self.emit(FeedEvent::Arrived {
                        notification,
                        sound: self.prefs.realtime.sound,
                        desktop: self.prefs.realtime.desktop,
                    });
                }
                self.emit_synced();
                None
            }
            ServerEvent::NotificationSummary {
                unread_count,
                recent_notifications,
            } => {
                self.feed.merge_page(recent_notifications);
                self.emit_synced();
                // The summary only carries a window; when the server's
                // unread count disagrees with the local derivation the
                // offline gap is wider than the window, so pull a full page.
                if unread_count as usize != self.feed.unread_count() {
                    Some(ClientCommand::GetNotifications {
                        filter: resync_filter(),
                    })
                } else {
                    None
                }
            }
            ServerEvent::NotificationsList { notifications } => {
                self.feed.resync(notifications);
                self.emit_synced();
                None
            }
            ServerEvent::PreferencesUpdated { success } => {
                if !success {
                    tracing::warn!("server rejected preference update");
                }
                None
            }
        }
    }

    /// Optimistic local application; returns the control frame to forward.
    fn apply_command(&mut self, cmd: SyncCommand) -> Option<ClientCommand> {
        match cmd {
            SyncCommand::MarkRead(id) => {
                self.feed.mark_read(id);
                self.emit_synced();
                Some(ClientCommand::MarkNotificationRead { id })
            }
            SyncCommand::MarkAllRead => {
                self.feed.mark_all_read();
                self.emit_synced();
                Some(ClientCommand::MarkAllNotificationsRead)
            }
            SyncCommand::Delete(id) => {
                self.feed.remove(id);
                self.emit_synced();
                // The push protocol has no delete frame; the pull surface
                // carries it, fire-and-forget like the rest.
                let pull = self.pull.clone();
                tokio::spawn(async move {
                    if let Err(e) = pull.delete(id).await {
                        tracing::warn!(notification_id = %id, "delete failed: {}", e);
                    }
                });
                None
            }
            SyncCommand::Refresh(filter) => {
                Some(ClientCommand::GetNotifications { filter })
            }
            SyncCommand::UpdatePreferences(prefs) => {
                self.prefs = prefs.clone();
                Some(ClientCommand::UpdateNotificationPreferences {
                    preferences: prefs,
                })
            }
            SyncCommand::Shutdown => None,
        }
    }

    /// Pull-only fallback: periodic authoritative list polls, mutations
    /// forwarded over the pull surface. Runs until shutdown.
    async fn poll_loop(&mut self) {
        self.set_state(ConnState::Polling);
        let mut ticker = tokio::time::interval(self.cfg.poll_interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.pull.list(&resync_filter()).await {
                        Ok((notifications, _)) => {
                            self.feed.resync(notifications);
                            self.emit_synced();
                        }
                        Err(e) => tracing::warn!("poll failed: {}", e),
                    }
                }
                cmd = self.commands.recv() => match cmd {
                    None | Some(SyncCommand::Shutdown) => {
                        self.set_state(ConnState::Disconnected);
                        return;
                    }
                    Some(SyncCommand::MarkRead(id)) => {
                        self.feed.mark_read(id);
                        self.emit_synced();
                        let pull = self.pull.clone();
                        tokio::spawn(async move {
                            if let Err(e) = pull.mark_read(id).await {
                                tracing::warn!(notification_id = %id, "mark-read failed: {}", e);
                            }
                        });
                    }
                    Some(SyncCommand::MarkAllRead) => {
                        self.feed.mark_all_read();
                        self.emit_synced();
                        let pull = self.pull.clone();
                        tokio::spawn(async move {
                            if let Err(e) = pull.mark_all_read().await {
                                tracing::warn!("mark-all-read failed: {}", e);
                            }
                        });
                    }
                    Some(SyncCommand::Delete(id)) => {
                        self.feed.remove(id);
                        self.emit_synced();
                        let pull = self.pull.clone();
                        tokio::spawn(async move {
                            if let Err(e) = pull.delete(id).await {
                                tracing::warn!(notification_id = %id, "delete failed: {}", e);
                            }
                        });
                    }
                    Some(SyncCommand::Refresh(filter)) => {
                        match self.pull.list(&filter).await {
                            Ok((notifications, _)) => {
                                self.feed.merge_page(notifications);
                                self.emit_synced();
                            }
                            Err(e) => tracing::warn!("refresh failed: {}", e),
                        }
                    }
                    Some(SyncCommand::UpdatePreferences(prefs)) => {
                        self.prefs = prefs.clone();
                        let pull = self.pull.clone();
                        tokio::spawn(async move {
                            if let Err(e) = pull.update_preferences(&prefs).await {
                                tracing::warn!("preference update failed: {}", e);
                            }
                        });
                    }
                },
            }
        }
    }

    fn set_state(&mut self, state: ConnState) {
        if self.state != state {
            tracing::debug!(from = ?self.state, to = ?state, "sync state change");
            self.state = state;
            self.emit(FeedEvent::State(state));
        }
    }

    fn emit(&self, event: FeedEvent) {
        let _ = self.events.send(event);
    }

    fn emit_synced(&self) {
        self.emit(FeedEvent::Synced {
            unread_count: self.feed.unread_count(),
        });
    }
}

/// A resync asks for the biggest page the server allows.
fn resync_filter() -> NotificationFilter {
    NotificationFilter {
        limit: 100,
        ..Default::default()
    }
}

/// `http(s)://host[:port]` → `ws(s)://host[:port]/ws`
fn push_channel_url(base: &str) -> anyhow::Result<Url> {
    let mut url = Url::parse(base)?;
    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        _ => "ws",
    };
    url.set_scheme(scheme)
        .map_err(|_| anyhow::anyhow!("cannot derive ws scheme from {}", base))?;
    url.set_path("/ws");
    Ok(url)
}
