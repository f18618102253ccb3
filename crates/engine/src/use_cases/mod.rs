//! Use cases - User story orchestration.
//!
//! Each module contains one player-facing flow. Use cases depend on stores
//! and on the port traits in `infrastructure::ports`, never on transports.

pub mod bot;
pub mod game_events;
pub mod game_record;
pub mod matchmaking;

pub use bot::{BotError, BotMove, BotPlayer};
pub use game_record::{RecordCompletedGame, RecordGameError};
pub use matchmaking::{Matchmaker, MatchmakingSettings};
