use clap::{Parser, Subcommand};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "pulsed", about = "Pulse notification service")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the notification server
    Serve {
        #[arg(long, env = "PULSE_PORT", default_value_t = 8090)]
        port: u16,
    },
    /// Send a broadcast to every known user
    Broadcast {
        /// Notification kind (e.g. system_alert, general)
        #[arg(long, default_value = "system_alert")]
        kind: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        message: String,
        /// low | medium | high | urgent
        #[arg(long, default_value = "medium")]
        priority: String,
    },
    /// Print store-wide notification statistics
    Stats,
    /// Issue a development bearer token (local use only)
    Token {
        #[arg(long)]
        user_id: Uuid,
        /// admin | manager | member
        #[arg(long, default_value = "member")]
        role: String,
        /// Lifetime in seconds
        #[arg(long, default_value_t = 86_400)]
        ttl: u64,
    },
}
