//! Port traits for infrastructure boundaries.
//!
//! Ports exist for:
//! - Completed-game persistence (could swap SQLite -> Postgres)
//! - Outbound delivery to players (the matchmaker only needs "send to username")
//! - Clock (for testing)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dropfour_domain::{CompletedGame, LeaderboardEntry};
use dropfour_shared::ServerMessage;

// =============================================================================
// Error Types
// =============================================================================

/// Repository operation errors with context for debugging.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    /// Database operation failed - includes operation name for tracing.
    #[error("Database error in {operation}: {message}")]
    Database {
        operation: &'static str,
        message: String,
    },

    /// Serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Business constraint violated.
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),
}

impl RepoError {
    /// Create a Database error with operation context.
    pub fn database(operation: &'static str, message: impl ToString) -> Self {
        Self::Database {
            operation,
            message: message.to_string(),
        }
    }

    pub fn serialization(message: impl ToString) -> Self {
        Self::Serialization(message.to_string())
    }

    pub fn constraint(message: impl ToString) -> Self {
        Self::ConstraintViolation(message.to_string())
    }
}

/// Outbound delivery failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    #[error("send timed out")]
    SendTimeout,
    #[error("transport closed")]
    TransportClosed,
    #[error("failed to encode message: {0}")]
    Serialization(String),
}

// =============================================================================
// Clock
// =============================================================================

#[cfg_attr(test, mockall::automock)]
pub trait ClockPort: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

// =============================================================================
// Outbound Messaging
// =============================================================================

/// Capability to push a message to whoever is connected as `username`.
///
/// An offline player is not an error: implementations return `Ok(())` when
/// nobody is connected under that name.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_to_username(
        &self,
        username: &str,
        message: ServerMessage,
    ) -> Result<(), ConnectionError>;
}

// =============================================================================
// Completed Game Storage
// =============================================================================

/// Largest leaderboard page served.
pub const MAX_LEADERBOARD_LIMIT: u32 = 100;

/// Leaderboard page size when the caller asks for zero rows.
pub const DEFAULT_LEADERBOARD_LIMIT: u32 = 10;

/// Clamp a requested leaderboard size into `1..=MAX_LEADERBOARD_LIMIT`.
pub fn leaderboard_limit(requested: u32) -> u32 {
    match requested {
        0 => DEFAULT_LEADERBOARD_LIMIT,
        n => n.min(MAX_LEADERBOARD_LIMIT),
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GameRecordRepo: Send + Sync {
    /// Create the player's row if it does not exist yet.
    async fn ensure_player(&self, username: &str) -> Result<(), RepoError>;
    /// Add one win to the player, creating the row when missing.
    async fn increment_win(&self, username: &str) -> Result<(), RepoError>;
    async fn save_completed_game(&self, game: &CompletedGame) -> Result<(), RepoError>;
    /// Top players by wins, ties broken by username.
    async fn get_leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardEntry>, RepoError>;
}
