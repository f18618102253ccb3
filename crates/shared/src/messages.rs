//! WebSocket message types exchanged between the server and browser clients.
//!
//! Both directions are JSON objects tagged by a `type` field in
//! SCREAMING_SNAKE_CASE with camelCase payload fields.
//!
//! ## Versioning Policy
//!
//! - New variants can be added at the end (forward compatible)
//! - Renaming variants or fields is a breaking change
//! - Unknown client message types deserialize to `Unknown` so the server can
//!   answer with an informational message instead of a parse failure

use serde::{Deserialize, Serialize};

// =============================================================================
// Client Messages (browser → server)
// =============================================================================

/// Messages from a client to the server.
///
/// Payload fields are optional on the wire so that a request with a missing
/// field can be answered with a precise error rather than a parse failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    /// Drop a disc into a column of an active game.
    #[serde(rename_all = "camelCase")]
    MakeMove {
        #[serde(default)]
        game_id: Option<String>,
        #[serde(default)]
        col: Option<i64>,
    },
    /// Ask the server to resend the state of a game after reconnecting.
    #[serde(rename_all = "camelCase")]
    Reconnect {
        #[serde(default)]
        username: Option<String>,
        #[serde(default)]
        game_id: Option<String>,
    },
    /// Unknown message type for forward compatibility.
    #[serde(other)]
    Unknown,
}

// =============================================================================
// Server Messages (server → browser)
// =============================================================================

/// Per-recipient result carried by `GAME_OVER`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameResult {
    Win,
    Loss,
    Draw,
}

/// Messages from the server to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    /// Human-readable notice: welcome, acknowledgements, rejected requests.
    Info { message: String },
    /// A game was created; `seat` is the recipient's seat (1 or 2).
    #[serde(rename_all = "camelCase")]
    GameStart {
        game_id: String,
        #[serde(rename = "you")]
        seat: u8,
        opponent: String,
    },
    /// The board changed; `current_turn` is the seat to move next.
    #[serde(rename_all = "camelCase")]
    BoardUpdate {
        game_id: String,
        board: Vec<Vec<u8>>,
        current_turn: u8,
    },
    /// The game ended; `result` is from the recipient's perspective.
    #[serde(rename_all = "camelCase")]
    GameOver {
        game_id: String,
        board: Vec<Vec<u8>>,
        result: GameResult,
    },
}

impl ServerMessage {
    pub fn info(message: impl Into<String>) -> Self {
        Self::Info {
            message: message.into(),
        }
    }

    /// Wire tag of this message, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Info { .. } => "INFO",
            Self::GameStart { .. } => "GAME_START",
            Self::BoardUpdate { .. } => "BOARD_UPDATE",
            Self::GameOver { .. } => "GAME_OVER",
        }
    }
}
