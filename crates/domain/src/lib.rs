//! dropfour domain: the board engine and the game session aggregate.
//!
//! Everything here is pure. Nothing logs, nothing performs I/O, and boards
//! are values that are replaced rather than mutated.

pub mod board;
pub mod game_session;
pub mod ids;
pub mod records;

pub use board::{
    Board, BoardDimensions, BoardError, MoveError, Seat, DEFAULT_COLS, DEFAULT_ROWS,
    MAX_DIMENSION,
};
pub use game_session::{ApplyMoveError, GameSession, MoveOutcome, MoveRecord};
pub use ids::{ConnectionId, GameId};
pub use records::{CompletedGame, LeaderboardEntry};

/// Identifier reserved for the automated opponent.
pub const DEFAULT_BOT_NAME: &str = "BOT";
