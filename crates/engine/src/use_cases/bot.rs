//! Automated opponent.
//!
//! The bot always sits in seat two. Its policy is deterministic: take an
//! immediate win, otherwise block the opponent's immediate win, otherwise play
//! the open column closest to the centre.

use std::sync::Arc;

use dropfour_domain::{ApplyMoveError, Board, GameId, GameSession, MoveOutcome, Seat};

use crate::stores::GameSessionStore;

const BOT_SEAT: Seat = Seat::Two;

#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error("game not found")]
    GameNotFound,
    #[error("game is not against bot")]
    NotABotGame,
    #[error("bot has no valid moves")]
    NoValidMoves,
    #[error(transparent)]
    Move(#[from] ApplyMoveError),
}

/// A move the bot made.
#[derive(Debug, Clone)]
pub struct BotMove {
    pub session: GameSession,
    pub outcome: MoveOutcome,
    pub column: usize,
}

pub struct BotPlayer {
    sessions: Arc<GameSessionStore>,
    bot_name: String,
}

impl BotPlayer {
    pub fn new(sessions: Arc<GameSessionStore>, bot_name: impl Into<String>) -> Self {
        Self {
            sessions,
            bot_name: bot_name.into(),
        }
    }

    /// Choose and play the bot's move in `game_id`.
    pub fn take_turn(&self, game_id: GameId) -> Result<BotMove, BotError> {
        let current = self.sessions.get(game_id).ok_or(BotError::GameNotFound)?;
        if !current.is_against(&self.bot_name) {
            return Err(BotError::NotABotGame);
        }

        let column = choose_column(&current.board).ok_or(BotError::NoValidMoves)?;
        let (session, outcome) = self
            .sessions
            .apply_move(game_id, &self.bot_name, column as i64)
            .map_err(|e| match e {
                ApplyMoveError::GameNotFound => BotError::GameNotFound,
                other => BotError::Move(other),
            })?;

        Ok(BotMove {
            session,
            outcome,
            column,
        })
    }
}

/// Column the bot would play on `board`, or `None` when every column is full.
pub fn choose_column(board: &Board) -> Option<usize> {
    let wins_for = |seat: Seat| {
        board.playable_columns().find(|&col| {
            board
                .drop_disc(col, seat)
                .is_ok_and(|(next, _)| next.check_win(seat))
        })
    };

    wins_for(BOT_SEAT)
        .or_else(|| wins_for(BOT_SEAT.other()))
        .or_else(|| {
            preference_order(board.cols())
                .into_iter()
                .find(|&col| !board.is_column_full(col))
        })
}

/// Columns ordered centre first, then alternating left and right outward.
///
/// For seven columns this is `3, 2, 4, 1, 5, 0, 6`.
pub fn preference_order(cols: usize) -> Vec<usize> {
    if cols == 0 {
        return Vec::new();
    }
    let centre = (cols - 1) / 2;
    let mut order = Vec::with_capacity(cols);
    order.push(centre);
    for distance in 1..cols {
        if distance <= centre {
            order.push(centre - distance);
        }
        if centre + distance < cols {
            order.push(centre + distance);
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::SystemClock;
    use dropfour_domain::BoardDimensions;

    fn rows(rows: &[&[u8]]) -> Board {
        let rows: Vec<Vec<u8>> = rows.iter().map(|r| r.to_vec()).collect();
        Board::from_rows(&rows).unwrap()
    }

    fn bot_game(board: Board, turn: Seat) -> (Arc<GameSessionStore>, BotPlayer, GameId) {
        let sessions = Arc::new(GameSessionStore::new(
            BoardDimensions::default(),
            Arc::new(SystemClock::new()),
        ));
        let game = sessions.create("alice", "BOT");
        sessions.with_session_mut(game.id, |session| {
            session.board = board;
            session.current_turn = turn;
        });
        let bot = BotPlayer::new(sessions.clone(), "BOT");
        (sessions, bot, game.id)
    }

    #[test]
    fn preference_order_spreads_from_the_centre() {
        assert_eq!(preference_order(7), vec![3, 2, 4, 1, 5, 0, 6]);
        assert_eq!(preference_order(6), vec![2, 1, 3, 0, 4, 5]);
        assert_eq!(preference_order(1), vec![0]);
    }

    #[test]
    fn empty_board_plays_the_centre() {
        assert_eq!(choose_column(&Board::standard()), Some(3));
    }

    #[test]
    fn takes_an_immediate_win_over_a_block() {
        let board = rows(&[
            &[0, 0, 0, 0, 0, 0, 0],
            &[0, 0, 0, 0, 0, 0, 0],
            &[0, 0, 0, 0, 0, 0, 0],
            &[0, 0, 0, 0, 0, 0, 2],
            &[0, 0, 0, 0, 0, 0, 2],
            &[1, 1, 1, 0, 0, 1, 2],
        ]);
        assert_eq!(choose_column(&board), Some(6));
    }

    #[test]
    fn skips_full_columns_in_preference_order() {
        let board = rows(&[
            &[0, 0, 0, 1, 0, 0, 0],
            &[0, 0, 0, 2, 0, 0, 0],
            &[0, 0, 0, 1, 0, 0, 0],
            &[0, 0, 0, 2, 0, 0, 0],
            &[0, 0, 0, 1, 0, 0, 0],
            &[0, 0, 0, 2, 0, 0, 0],
        ]);
        assert_eq!(choose_column(&board), Some(2));
    }

    #[test]
    fn full_board_has_no_move() {
        let board = rows(&[
            &[1, 2, 1, 2, 1, 2, 1],
            &[1, 2, 1, 2, 1, 2, 1],
            &[2, 1, 2, 1, 2, 1, 2],
            &[2, 1, 2, 1, 2, 1, 2],
            &[1, 2, 1, 2, 1, 2, 1],
            &[1, 2, 1, 2, 1, 2, 1],
        ]);
        assert_eq!(choose_column(&board), None);
    }

    #[test]
    fn blocks_a_bottom_row_threat() {
        let board = rows(&[
            &[0, 0, 0, 0, 0, 0, 0],
            &[0, 0, 0, 0, 0, 0, 0],
            &[0, 0, 0, 0, 0, 0, 0],
            &[0, 0, 0, 0, 0, 0, 0],
            &[0, 0, 0, 0, 0, 0, 0],
            &[1, 1, 1, 0, 0, 0, 0],
        ]);
        let (_, bot, game_id) = bot_game(board, Seat::Two);

        let played = bot.take_turn(game_id).unwrap();

        assert_eq!(played.column, 3);
        assert_eq!(played.outcome, MoveOutcome::Continue);
        assert_eq!(played.session.board.cell(5, 3), Some(Seat::Two));
        assert_eq!(played.session.current_turn, Seat::One);
    }

    #[test]
    fn unknown_game_is_reported() {
        let (_, bot, _) = bot_game(Board::standard(), Seat::Two);
        assert!(matches!(
            bot.take_turn(GameId::new()),
            Err(BotError::GameNotFound)
        ));
    }

    #[test]
    fn refuses_games_between_humans() {
        let (sessions, bot, _) = bot_game(Board::standard(), Seat::Two);
        let human_game = sessions.create("alice", "bob");
        assert!(matches!(
            bot.take_turn(human_game.id),
            Err(BotError::NotABotGame)
        ));
    }

    #[test]
    fn out_of_turn_bot_move_is_rejected_by_the_store() {
        let (_, bot, game_id) = bot_game(Board::standard(), Seat::One);
        assert!(matches!(
            bot.take_turn(game_id),
            Err(BotError::Move(ApplyMoveError::NotYourTurn))
        ));
    }
}
