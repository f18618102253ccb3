//! Application configuration

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use dropfour_domain::{BoardDimensions, DEFAULT_BOT_NAME, DEFAULT_COLS, DEFAULT_ROWS};

/// Application configuration loaded from environment
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Interface to bind
    pub server_host: String,
    /// HTTP/WebSocket server port
    pub server_port: u16,

    /// CORS allowed origins (comma-separated, or "*" for any); empty disables CORS
    pub cors_allowed_origins: Vec<String>,

    /// Identifier used for the automated opponent
    pub bot_name: String,

    /// Board size for new games
    pub board: BoardDimensions,

    /// Matchmaking configuration
    pub matchmaking: MatchmakingConfig,

    /// WebSocket connection configuration
    pub connection: ConnectionConfig,

    /// Completed game persistence configuration
    pub persistence: PersistenceConfig,
}

/// Matchmaking configuration
#[derive(Debug, Clone)]
pub struct MatchmakingConfig {
    /// How often the waiting list is paired
    pub tick_interval: Duration,
    /// How long a lone player waits before being paired with the bot
    pub bot_fallback_after: Duration,
}

/// WebSocket connection configuration
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Deadline for a single outbound write
    pub send_timeout: Duration,
    /// Connection is dropped when nothing arrives for this long
    pub idle_timeout: Duration,
    /// Interval between server pings
    pub ping_interval: Duration,
    /// Budget for close notifications at shutdown
    pub shutdown_grace: Duration,
}

/// Storage backend for completed games and win counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistenceBackend {
    Memory,
    Sqlite,
}

impl FromStr for PersistenceBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            other => bail!("unknown persistence backend '{other}' (expected memory or sqlite)"),
        }
    }
}

/// Completed game persistence configuration
#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    pub backend: PersistenceBackend,
    /// SQLite database path (if using sqlite backend)
    pub sqlite_path: String,
}

impl Default for MatchmakingConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(1000),
            bot_fallback_after: Duration::from_secs(10),
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            send_timeout: Duration::from_millis(5000),
            idle_timeout: Duration::from_secs(60),
            ping_interval: Duration::from_secs(25),
            shutdown_grace: Duration::from_millis(2000),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let rows = parse_var("BOARD_ROWS", DEFAULT_ROWS)?;
        let cols = parse_var("BOARD_COLS", DEFAULT_COLS)?;
        let board = BoardDimensions::new(rows, cols).context("invalid BOARD_ROWS/BOARD_COLS")?;

        let bot_name = env::var("BOT_NAME")
            .map(|s| s.trim().to_string())
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_BOT_NAME.to_string());

        Ok(Self {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .or_else(|_| env::var("PORT"))
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("SERVER_PORT must be a valid port number")?,

            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),

            bot_name,
            board,

            matchmaking: MatchmakingConfig {
                tick_interval: parse_nonzero_duration(
                    "MATCHMAKING_TICK_MS",
                    1000,
                    Duration::from_millis,
                )?,
                bot_fallback_after: Duration::from_secs(parse_var("BOT_FALLBACK_SECS", 10)?),
            },

            connection: ConnectionConfig {
                send_timeout: parse_nonzero_duration(
                    "WS_SEND_TIMEOUT_MS",
                    5000,
                    Duration::from_millis,
                )?,
                idle_timeout: parse_nonzero_duration(
                    "WS_IDLE_TIMEOUT_SECS",
                    60,
                    Duration::from_secs,
                )?,
                ping_interval: parse_nonzero_duration(
                    "WS_PING_INTERVAL_SECS",
                    25,
                    Duration::from_secs,
                )?,
                shutdown_grace: Duration::from_millis(parse_var("SHUTDOWN_GRACE_MS", 2000)?),
            },

            persistence: PersistenceConfig {
                backend: env::var("PERSISTENCE_BACKEND")
                    .unwrap_or_else(|_| "memory".to_string())
                    .parse()?,
                sqlite_path: env::var("SQLITE_PATH")
                    .unwrap_or_else(|_| "./data/dropfour.db".to_string()),
            },
        })
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} must be a valid number, got '{raw}'")),
        _ => Ok(default),
    }
}

/// Like [`parse_var`], but rejects zero. Used for periods handed to
/// `tokio::time::interval` and for deadlines that must be able to elapse.
fn parse_nonzero_duration(
    name: &str,
    default: u64,
    unit: fn(u64) -> Duration,
) -> Result<Duration> {
    let value: u64 = parse_var(name, default)?;
    if value == 0 {
        bail!("{name} must be greater than zero");
    }
    Ok(unit(value))
}
