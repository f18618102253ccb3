//! Application state and composition.

use std::sync::Arc;

use dropfour_domain::BoardDimensions;

use crate::infrastructure::config::MatchmakingConfig;
use crate::infrastructure::ports::{ClockPort, GameRecordRepo, MessageSender};
use crate::stores::GameSessionStore;
use crate::use_cases::{BotPlayer, Matchmaker, MatchmakingSettings, RecordCompletedGame};

/// Main application state.
///
/// Built once at startup and passed to HTTP/WebSocket handlers via Axum state.
pub struct App {
    pub sessions: Arc<GameSessionStore>,
    pub repositories: Repositories,
    pub use_cases: UseCases,
    pub bot_name: String,
}

/// Container for repository ports.
pub struct Repositories {
    pub game_records: Arc<dyn GameRecordRepo>,
}

/// Container for all use cases.
pub struct UseCases {
    pub matchmaking: Arc<Matchmaker>,
    pub bot: Arc<BotPlayer>,
    pub record_game: Arc<RecordCompletedGame>,
}

impl App {
    /// Create a new App with all dependencies wired up.
    pub fn new(
        bot_name: &str,
        board: BoardDimensions,
        matchmaking: &MatchmakingConfig,
        game_records: Arc<dyn GameRecordRepo>,
        sender: Arc<dyn MessageSender>,
        clock: Arc<dyn ClockPort>,
    ) -> Self {
        let sessions = Arc::new(GameSessionStore::new(board, clock.clone()));

        let matchmaker = Arc::new(Matchmaker::new(
            sessions.clone(),
            sender,
            clock.clone(),
            MatchmakingSettings {
                tick_interval: matchmaking.tick_interval,
                bot_fallback_after: matchmaking.bot_fallback_after,
                bot_name: bot_name.to_string(),
            },
        ));
        let bot = Arc::new(BotPlayer::new(sessions.clone(), bot_name));
        let record_game = Arc::new(RecordCompletedGame::new(
            game_records.clone(),
            sessions.clone(),
            clock,
            bot_name,
        ));

        Self {
            sessions,
            repositories: Repositories { game_records },
            use_cases: UseCases {
                matchmaking: matchmaker,
                bot,
                record_game,
            },
            bot_name: bot_name.to_string(),
        }
    }
}
