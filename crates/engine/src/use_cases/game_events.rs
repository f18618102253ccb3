//! Server messages derived from a session snapshot.

use dropfour_domain::{GameSession, Seat};
use dropfour_shared::{GameResult, ServerMessage};

/// `GAME_START` as seen from `seat`.
pub fn game_start(session: &GameSession, seat: Seat) -> ServerMessage {
    ServerMessage::GameStart {
        game_id: session.id.to_string(),
        seat: seat.number(),
        opponent: session.opponent_of(seat).to_string(),
    }
}

pub fn board_update(session: &GameSession) -> ServerMessage {
    ServerMessage::BoardUpdate {
        game_id: session.id.to_string(),
        board: session.board.to_rows(),
        current_turn: session.current_turn.number(),
    }
}

/// `GAME_OVER` as seen from `seat`. Draw when there is no winner.
pub fn game_over(session: &GameSession, seat: Seat) -> ServerMessage {
    let result = match session.winner.as_deref() {
        Some(winner) if winner == session.player_in(seat) => GameResult::Win,
        Some(_) => GameResult::Loss,
        None => GameResult::Draw,
    };
    ServerMessage::GameOver {
        game_id: session.id.to_string(),
        board: session.board.to_rows(),
        result,
    }
}

/// Seats that have a transport behind them.
///
/// The bot never receives messages, so a bot game yields only seat one.
pub fn human_seats(session: &GameSession, bot_name: &str) -> Vec<Seat> {
    [Seat::One, Seat::Two]
        .into_iter()
        .filter(|seat| session.player_in(*seat) != bot_name)
        .collect()
}
