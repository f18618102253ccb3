//! Completed game and win counter storage.
//!
//! The in-memory repository is the default; SQLite is selected with
//! `PERSISTENCE_BACKEND=sqlite`.

mod memory;
mod sqlite;

pub use memory::InMemoryGameRecordRepo;
pub use sqlite::SqliteGameRecordRepo;

use dropfour_domain::CompletedGame;

use crate::infrastructure::ports::RepoError;

fn require_username(operation: &'static str, username: &str) -> Result<(), RepoError> {
    if username.trim().is_empty() {
        return Err(RepoError::constraint(format!("{operation}: username is required")));
    }
    Ok(())
}

fn validate_completed_game(game: &CompletedGame) -> Result<(), RepoError> {
    if game.player_one.trim().is_empty() || game.player_two.trim().is_empty() {
        return Err(RepoError::constraint("player names are required"));
    }
    Ok(())
}
