//! The game session aggregate and its move state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::board::{Board, BoardDimensions, MoveError, Seat};
use crate::ids::GameId;
use crate::records::CompletedGame;

/// Result of a successfully applied move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The game goes on; the turn passed to the other seat.
    Continue,
    /// The mover connected four; the winner is recorded.
    Win,
    /// The board filled without a winner.
    Draw,
}

/// Why a move was not applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyMoveError {
    #[error("game not found")]
    GameNotFound,
    #[error("game already finished")]
    GameAlreadyFinished,
    #[error("player not part of this game")]
    NotAParticipant,
    #[error("not your turn")]
    NotYourTurn,
    #[error(transparent)]
    Move(#[from] MoveError),
}

/// One entry of a session's move log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRecord {
    pub player: String,
    pub column: usize,
    pub move_number: u32,
}

/// An active match between two participants.
///
/// Participants are plain usernames; one of them may be the bot identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct GameSession {
    pub id: GameId,
    pub player_one: String,
    pub player_two: String,
    pub board: Board,
    pub current_turn: Seat,
    pub created_at: DateTime<Utc>,
    pub winner: Option<String>,
    pub moves: Vec<MoveRecord>,
}

impl GameSession {
    /// A fresh session: empty board, seat one to move, no winner.
    pub fn new(
        id: GameId,
        player_one: impl Into<String>,
        player_two: impl Into<String>,
        dims: BoardDimensions,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            player_one: player_one.into(),
            player_two: player_two.into(),
            board: Board::empty(dims),
            current_turn: Seat::One,
            created_at,
            winner: None,
            moves: Vec::new(),
        }
    }

    /// Seat held by `username`, if they play in this session.
    pub fn seat_of(&self, username: &str) -> Option<Seat> {
        if username == self.player_one {
            Some(Seat::One)
        } else if username == self.player_two {
            Some(Seat::Two)
        } else {
            None
        }
    }

    /// Username sitting in `seat`.
    pub fn player_in(&self, seat: Seat) -> &str {
        match seat {
            Seat::One => &self.player_one,
            Seat::Two => &self.player_two,
        }
    }

    /// Identifier of the participant facing `seat`.
    pub fn opponent_of(&self, seat: Seat) -> &str {
        self.player_in(seat.other())
    }

    /// Whether participant two is the given bot identifier.
    pub fn is_against(&self, bot_name: &str) -> bool {
        self.player_two == bot_name
    }

    pub fn involves(&self, a: &str, b: &str) -> bool {
        (self.player_one == a && self.player_two == b)
            || (self.player_one == b && self.player_two == a)
    }

    /// Won or drawn.
    pub fn is_over(&self) -> bool {
        self.winner.is_some() || self.board.is_full()
    }

    /// Validate and apply a move by `username` into `column`.
    ///
    /// `column` comes straight off the wire. Checks run in a fixed order and
    /// stop at the first failure: finished game, participant, turn, column
    /// range, then the drop itself. On `Win` and `Draw` the turn is left where
    /// it was.
    pub fn apply_move(&mut self, username: &str, column: i64) -> Result<MoveOutcome, ApplyMoveError> {
        if self.winner.is_some() {
            return Err(ApplyMoveError::GameAlreadyFinished);
        }

        let seat = self.seat_of(username).ok_or(ApplyMoveError::NotAParticipant)?;
        if seat != self.current_turn {
            return Err(ApplyMoveError::NotYourTurn);
        }

        let column = self.board.column_index(column)?;
        let (board, _row) = self.board.drop_disc(column, seat)?;
        self.board = board;
        self.moves.push(MoveRecord {
            player: username.to_string(),
            column,
            move_number: self.moves.len() as u32 + 1,
        });

        if self.board.check_win(seat) {
            self.winner = Some(username.to_string());
            return Ok(MoveOutcome::Win);
        }

        if self.board.is_full() {
            return Ok(MoveOutcome::Draw);
        }

        self.current_turn = seat.other();
        Ok(MoveOutcome::Continue)
    }

    /// Snapshot for the persistence collaborator.
    pub fn conclude(&self, ended_at: DateTime<Utc>) -> CompletedGame {
        CompletedGame {
            id: self.id,
            player_one: self.player_one.clone(),
            player_two: self.player_two.clone(),
            winner: self.winner.clone(),
            is_draw: self.winner.is_none() && self.board.is_full(),
            moves: self.moves.clone(),
            started_at: self.created_at,
            ended_at,
        }
    }
}
