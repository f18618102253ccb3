//! Value types exchanged with the persistence collaborator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::game_session::MoveRecord;
use crate::ids::GameId;

/// A finished match as stored for history and statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedGame {
    pub id: GameId,
    pub player_one: String,
    pub player_two: String,
    pub winner: Option<String>,
    pub is_draw: bool,
    pub moves: Vec<MoveRecord>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub username: String,
    pub wins: u64,
}
