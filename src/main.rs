use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use clap::Parser;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pulse::auth::Role;
use pulse::cli::{Cli, Commands};
use pulse::dispatch::Dispatcher;
use pulse::models::notification::{NewNotification, NotificationKind, Priority};
use pulse::registry::SessionRegistry;
use pulse::store::postgres::PgStore;
use pulse::{api, config, jobs, realtime, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "pulse=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = config::load()?;
    let args = Cli::parse();

    let result = match args.command {
        Some(Commands::Serve { port }) => run_server(cfg, port).await,
        Some(Commands::Broadcast {
            kind,
            title,
            message,
            priority,
        }) => {
            let db = PgStore::connect(&cfg.database_url).await?;
            let dispatcher = Dispatcher::new(db, SessionRegistry::new());
            let payload = NewNotification::new(
                NotificationKind::from_str(&kind),
                title,
                message,
            )
            .priority(Priority::from_str(&priority));

            match dispatcher.broadcast(payload).await {
                Ok(recipients) => {
                    println!("Broadcast persisted for {} users.", recipients);
                    Ok(())
                }
                Err(e) => Err(anyhow::anyhow!("broadcast failed: {}", e)),
            }
        }
        Some(Commands::Stats) => {
            let db = PgStore::connect(&cfg.database_url).await?;
            let stats = db.notification_stats().await?;
            println!("{:<12} {:<12} {:<12} {:<12}", "TOTAL", "UNREAD", "URGENT", "24H");
            println!(
                "{:<12} {:<12} {:<12} {:<12}",
                stats.total, stats.unread, stats.urgent, stats.last_24h
            );
            Ok(())
        }
        Some(Commands::Token { user_id, role, ttl }) => {
            let token =
                pulse::auth::issue_token(&cfg.auth_secret, user_id, Role::from_str(&role), ttl)?;
            println!("Use: Authorization: Bearer {}", token);
            Ok(())
        }
        None => {
            let port = cfg.port;
            run_server(cfg, port).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

async fn run_server(cfg: config::Config, port: u16) -> anyhow::Result<()> {
    tracing::info!("Connecting to database...");
    let db = PgStore::connect(&cfg.database_url).await?;

    tracing::info!("Running migrations...");
    db.migrate().await?;

    let registry = SessionRegistry::new();
    let dispatcher = Dispatcher::new(db.clone(), registry.clone());

    let state = Arc::new(AppState {
        db,
        registry: registry.clone(),
        dispatcher,
        config: cfg.clone(),
    });

    let app = axum::Router::new()
        // Health endpoints (no auth)
        .route("/healthz", get(|| async { "ok" }))
        // Push channel
        .route("/ws", get(realtime::ws_handler))
        // Pull surface
        .nest("/api/v1", api::api_router(state.clone()))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer({
            use axum::http::{HeaderName, Method};
            use tower_http::cors::AllowOrigin;
            let dashboard_origin = std::env::var("DASHBOARD_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".to_string());
            CorsLayer::new()
                .allow_origin(AllowOrigin::predicate(move |origin, _| {
                    let origin_str = origin.to_str().unwrap_or("");
                    origin_str == dashboard_origin
                        || origin_str.starts_with("http://localhost:")
                        || origin_str.starts_with("http://127.0.0.1:")
                }))
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([
                    HeaderName::from_static("content-type"),
                    HeaderName::from_static("authorization"),
                ])
                .allow_credentials(true)
        });

    // Purge sessions that stopped heartbeating without a close frame.
    jobs::sweep::spawn(
        registry,
        cfg.heartbeat_interval_secs,
        cfg.heartbeat_timeout_secs(),
    );
    tracing::info!(
        interval_secs = cfg.heartbeat_interval_secs,
        "stale session sweep started"
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Pulse listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
