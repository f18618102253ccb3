//! In-memory game record storage.
//!
//! Used when no database is configured. Contents are lost on restart.

use std::collections::HashMap;

use async_trait::async_trait;
use dropfour_domain::{CompletedGame, LeaderboardEntry};
use tokio::sync::RwLock;

use super::{require_username, validate_completed_game};
use crate::infrastructure::ports::{leaderboard_limit, GameRecordRepo, RepoError};

#[derive(Default)]
struct Records {
    wins: HashMap<String, u64>,
    games: Vec<CompletedGame>,
}

#[derive(Default)]
pub struct InMemoryGameRecordRepo {
    inner: RwLock<Records>,
}

impl InMemoryGameRecordRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every saved game, oldest first.
    pub async fn completed_games(&self) -> Vec<CompletedGame> {
        self.inner.read().await.games.clone()
    }
}

#[async_trait]
impl GameRecordRepo for InMemoryGameRecordRepo {
    async fn ensure_player(&self, username: &str) -> Result<(), RepoError> {
        require_username("ensure_player", username)?;
        self.inner
            .write()
            .await
            .wins
            .entry(username.to_string())
            .or_insert(0);
        Ok(())
    }

    async fn increment_win(&self, username: &str) -> Result<(), RepoError> {
        require_username("increment_win", username)?;
        *self
            .inner
            .write()
            .await
            .wins
            .entry(username.to_string())
            .or_insert(0) += 1;
        Ok(())
    }

    async fn save_completed_game(&self, game: &CompletedGame) -> Result<(), RepoError> {
        validate_completed_game(game)?;
        let mut records = self.inner.write().await;
        if records.games.iter().any(|g| g.id == game.id) {
            return Err(RepoError::constraint(format!(
                "game {} already recorded",
                game.id
            )));
        }
        records.games.push(game.clone());
        Ok(())
    }

    async fn get_leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardEntry>, RepoError> {
        let limit = leaderboard_limit(limit) as usize;
        let records = self.inner.read().await;

        let mut entries: Vec<LeaderboardEntry> = records
            .wins
            .iter()
            .map(|(username, wins)| LeaderboardEntry {
                username: username.clone(),
                wins: *wins,
            })
            .collect();
        entries.sort_by(|a, b| b.wins.cmp(&a.wins).then_with(|| a.username.cmp(&b.username)));
        entries.truncate(limit);
        Ok(entries)
    }
}
