//! SQLite-backed completed game storage.

use async_trait::async_trait;
use dropfour_domain::{CompletedGame, LeaderboardEntry};
use sqlx::{Row, SqlitePool};

use super::{require_username, validate_completed_game};
use crate::infrastructure::ports::{leaderboard_limit, GameRecordRepo, RepoError};

/// SQLite implementation of the game record repository.
pub struct SqliteGameRecordRepo {
    pool: SqlitePool,
}

impl SqliteGameRecordRepo {
    pub async fn new(db_path: &str) -> Result<Self, RepoError> {
        let pool = SqlitePool::connect(&format!("sqlite:{}?mode=rwc", db_path))
            .await
            .map_err(|e| RepoError::database("connect", e))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS players (
                username TEXT PRIMARY KEY,
                wins INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| RepoError::database("migrate_players", e))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS games (
                id TEXT PRIMARY KEY,
                player1 TEXT NOT NULL,
                player2 TEXT NOT NULL,
                winner TEXT,
                is_draw INTEGER NOT NULL,
                moves TEXT NOT NULL,
                started_at TEXT NOT NULL,
                ended_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| RepoError::database("migrate_games", e))?;

        Ok(Self { pool })
    }

    /// Number of stored games. Used by diagnostics and tests.
    pub async fn game_count(&self) -> Result<u64, RepoError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM games")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RepoError::database("game_count", e))?;
        let n: i64 = row.get("n");
        Ok(n.max(0) as u64)
    }
}

#[async_trait]
impl GameRecordRepo for SqliteGameRecordRepo {
    async fn ensure_player(&self, username: &str) -> Result<(), RepoError> {
        require_username("ensure_player", username)?;

        sqlx::query("INSERT INTO players (username) VALUES (?) ON CONFLICT(username) DO NOTHING")
            .bind(username)
            .execute(&self.pool)
            .await
            .map_err(|e| RepoError::database("ensure_player", e))?;
        Ok(())
    }

    async fn increment_win(&self, username: &str) -> Result<(), RepoError> {
        require_username("increment_win", username)?;

        sqlx::query(
            r#"
            INSERT INTO players (username, wins) VALUES (?, 1)
            ON CONFLICT(username) DO UPDATE SET wins = wins + 1
            "#,
        )
        .bind(username)
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::database("increment_win", e))?;
        Ok(())
    }

    async fn save_completed_game(&self, game: &CompletedGame) -> Result<(), RepoError> {
        validate_completed_game(game)?;

        let moves = serde_json::to_string(&game.moves).map_err(RepoError::serialization)?;
        let winner = game.winner.as_deref().filter(|w| !w.is_empty());

        sqlx::query(
            r#"
            INSERT INTO games (id, player1, player2, winner, is_draw, moves, started_at, ended_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(game.id.to_string())
        .bind(&game.player_one)
        .bind(&game.player_two)
        .bind(winner)
        .bind(game.is_draw)
        .bind(moves)
        .bind(game.started_at.to_rfc3339())
        .bind(game.ended_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::database("save_completed_game", e))?;
        Ok(())
    }

    async fn get_leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardEntry>, RepoError> {
        let limit = leaderboard_limit(limit);

        let rows = sqlx::query(
            "SELECT username, wins FROM players ORDER BY wins DESC, username ASC LIMIT ?",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::database("get_leaderboard", e))?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let wins: i64 = row.get("wins");
                LeaderboardEntry {
                    username: row.get("username"),
                    wins: wins.max(0) as u64,
                }
            })
            .collect())
    }
}
