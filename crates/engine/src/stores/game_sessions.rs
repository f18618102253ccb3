//! Authoritative storage for active game sessions.
//!
//! Every session mutation goes through [`GameSessionStore::apply_move`], which
//! holds the session's shard lock for the whole validate-then-mutate step and
//! hands back a snapshot taken under that same lock.

use std::sync::Arc;

use dashmap::DashMap;
use dropfour_domain::{ApplyMoveError, BoardDimensions, GameId, GameSession, MoveOutcome};

use crate::infrastructure::ports::ClockPort;

pub struct GameSessionStore {
    sessions: DashMap<GameId, GameSession>,
    dims: BoardDimensions,
    clock: Arc<dyn ClockPort>,
}

impl GameSessionStore {
    pub fn new(dims: BoardDimensions, clock: Arc<dyn ClockPort>) -> Self {
        Self {
            sessions: DashMap::new(),
            dims,
            clock,
        }
    }

    /// Start a new session with `player_one` to move.
    pub fn create(&self, player_one: &str, player_two: &str) -> GameSession {
        let session = GameSession::new(
            GameId::new(),
            player_one,
            player_two,
            self.dims,
            self.clock.now(),
        );
        self.sessions.insert(session.id, session.clone());
        session
    }

    pub fn get(&self, id: GameId) -> Option<GameSession> {
        self.sessions.get(&id).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, id: GameId) -> Option<GameSession> {
        self.sessions.remove(&id).map(|(_, session)| session)
    }

    /// Unordered lookup by participants.
    pub fn find_by_participants(&self, a: &str, b: &str) -> Option<GameSession> {
        self.sessions
            .iter()
            .find(|entry| entry.value().involves(a, b))
            .map(|entry| entry.value().clone())
    }

    /// Apply a move atomically and return the post-move snapshot.
    pub fn apply_move(
        &self,
        id: GameId,
        username: &str,
        column: i64,
    ) -> Result<(GameSession, MoveOutcome), ApplyMoveError> {
        let mut entry = self
            .sessions
            .get_mut(&id)
            .ok_or(ApplyMoveError::GameNotFound)?;
        let outcome = entry.apply_move(username, column)?;
        Ok((entry.value().clone(), outcome))
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Direct mutation for arranging test positions.
    #[cfg(test)]
    pub(crate) fn with_session_mut(&self, id: GameId, f: impl FnOnce(&mut GameSession)) -> bool {
        match self.sessions.get_mut(&id) {
            Some(mut entry) => {
                f(entry.value_mut());
                true
            }
            None => false,
        }
    }
}
