use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    /// HS256 secret shared with the auth service that issues bearer tokens.
    pub auth_secret: String,
    /// Seconds between client heartbeats. Sessions silent for
    /// `heartbeat_interval_secs * 3` are purged as stale.
    pub heartbeat_interval_secs: u64,
}

impl Config {
    pub fn heartbeat_timeout_secs(&self) -> u64 {
        self.heartbeat_interval_secs * 3
    }
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    let auth_secret =
        std::env::var("PULSE_AUTH_SECRET").unwrap_or_else(|_| "CHANGE_ME_DEV_SECRET".into());

    if auth_secret == "CHANGE_ME_DEV_SECRET" {
        let env_mode = std::env::var("PULSE_ENV")
            .or_else(|_| std::env::var("RUST_ENV"))
            .unwrap_or_default();
        if env_mode == "production" {
            anyhow::bail!(
                "PULSE_AUTH_SECRET is still the insecure placeholder. \
                 Set the secret shared with the auth service before running in production."
            );
        }
        eprintln!("⚠️  PULSE_AUTH_SECRET is not set, using insecure placeholder. Do not run production like this.");
    }

    Ok(Config {
        port: std::env::var("PULSE_PORT")
            .unwrap_or_else(|_| "8090".into())
            .parse()
            .unwrap_or(8090),
        database_url: std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/taskboard".into()),
        auth_secret,
        heartbeat_interval_secs: std::env::var("PULSE_HEARTBEAT_INTERVAL")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30),
    })
}
