//! Recording finished games.

use std::sync::Arc;

use dropfour_domain::{CompletedGame, GameSession};

use crate::infrastructure::ports::{ClockPort, GameRecordRepo, RepoError};
use crate::stores::GameSessionStore;

#[derive(Debug, thiserror::Error)]
pub enum RecordGameError {
    #[error("game {0} is still in progress")]
    NotFinished(String),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Persist a concluded session and retire it from the active store.
///
/// Only human participants get player rows; the bot never appears on the
/// leaderboard.
pub struct RecordCompletedGame {
    repo: Arc<dyn GameRecordRepo>,
    sessions: Arc<GameSessionStore>,
    clock: Arc<dyn ClockPort>,
    bot_name: String,
}

impl RecordCompletedGame {
    pub fn new(
        repo: Arc<dyn GameRecordRepo>,
        sessions: Arc<GameSessionStore>,
        clock: Arc<dyn ClockPort>,
        bot_name: impl Into<String>,
    ) -> Self {
        Self {
            repo,
            sessions,
            clock,
            bot_name: bot_name.into(),
        }
    }

    /// The session is removed from the store even when persisting fails.
    pub async fn execute(&self, session: &GameSession) -> Result<CompletedGame, RecordGameError> {
        if !session.is_over() {
            return Err(RecordGameError::NotFinished(session.id.to_string()));
        }

        let record = session.conclude(self.clock.now());
        let result = self.persist(&record).await;
        self.sessions.remove(session.id);
        result.map(|()| record)
    }

    async fn persist(&self, record: &CompletedGame) -> Result<(), RecordGameError> {
        for player in [&record.player_one, &record.player_two] {
            if *player != self.bot_name {
                self.repo.ensure_player(player).await?;
            }
        }

        if let Some(winner) = record.winner.as_deref() {
            if winner != self.bot_name {
                self.repo.increment_win(winner).await?;
            }
        }

        self.repo.save_completed_game(record).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::FixedClock;
    use crate::infrastructure::ports::MockGameRecordRepo;
    use chrono::{TimeZone, Utc};
    use dropfour_domain::BoardDimensions;
    use mockall::predicate::eq;

    fn ended() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 18, 30, 0).unwrap()
    }

    fn setup(repo: MockGameRecordRepo) -> (Arc<GameSessionStore>, RecordCompletedGame) {
        let clock = Arc::new(FixedClock(ended()));
        let sessions = Arc::new(GameSessionStore::new(BoardDimensions::default(), clock.clone()));
        let use_case = RecordCompletedGame::new(Arc::new(repo), sessions.clone(), clock, "BOT");
        (sessions, use_case)
    }

    fn play_to_win(sessions: &GameSessionStore, p1: &str, p2: &str) -> GameSession {
        let game = sessions.create(p1, p2);
        for col in 0..3 {
            sessions.apply_move(game.id, p1, col).unwrap();
            sessions.apply_move(game.id, p2, col).unwrap();
        }
        sessions.apply_move(game.id, p1, 3).unwrap().0
    }

    #[tokio::test]
    async fn records_players_winner_and_moves() {
        let mut repo = MockGameRecordRepo::new();
        repo.expect_ensure_player()
            .with(eq("alice"))
            .times(1)
            .returning(|_| Ok(()));
        repo.expect_ensure_player()
            .with(eq("bob"))
            .times(1)
            .returning(|_| Ok(()));
        repo.expect_increment_win()
            .with(eq("alice"))
            .times(1)
            .returning(|_| Ok(()));
        repo.expect_save_completed_game()
            .withf(|game| {
                game.winner.as_deref() == Some("alice") && !game.is_draw && game.moves.len() == 7
            })
            .times(1)
            .returning(|_| Ok(()));
        let (sessions, use_case) = setup(repo);

        let finished = play_to_win(&sessions, "alice", "bob");
        let record = use_case.execute(&finished).await.unwrap();

        assert_eq!(record.ended_at, ended());
        assert_eq!(record.started_at, finished.created_at);
        assert!(sessions.get(finished.id).is_none());
    }

    #[tokio::test]
    async fn bot_never_gets_a_player_row_or_a_win() {
        let mut repo = MockGameRecordRepo::new();
        repo.expect_ensure_player()
            .with(eq("alice"))
            .times(1)
            .returning(|_| Ok(()));
        repo.expect_increment_win().times(0);
        repo.expect_save_completed_game()
            .times(1)
            .returning(|_| Ok(()));
        let (sessions, use_case) = setup(repo);

        let game = sessions.create("alice", "BOT");
        sessions.with_session_mut(game.id, |session| {
            session.winner = Some("BOT".into());
        });
        let finished = sessions.get(game.id).unwrap();

        use_case.execute(&finished).await.unwrap();
    }

    #[tokio::test]
    async fn unfinished_game_is_not_recorded() {
        let mut repo = MockGameRecordRepo::new();
        repo.expect_save_completed_game().times(0);
        let (sessions, use_case) = setup(repo);

        let game = sessions.create("alice", "bob");
        let err = use_case.execute(&game).await.unwrap_err();

        assert!(matches!(err, RecordGameError::NotFinished(_)));
        assert!(sessions.get(game.id).is_some());
    }

    #[tokio::test]
    async fn repository_failure_still_retires_the_session() {
        let mut repo = MockGameRecordRepo::new();
        repo.expect_ensure_player()
            .returning(|_| Err(RepoError::database("ensure_player", "disk full")));
        repo.expect_save_completed_game().times(0);
        let (sessions, use_case) = setup(repo);

        let finished = play_to_win(&sessions, "alice", "bob");
        let err = use_case.execute(&finished).await.unwrap_err();

        assert!(matches!(err, RecordGameError::Repo(RepoError::Database { .. })));
        assert!(sessions.get(finished.id).is_none());
    }
}
