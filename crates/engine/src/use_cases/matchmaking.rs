//! Matchmaking use case.
//!
//! Players wait in FIFO order. Every tick pairs the two longest-waiting
//! players; a lone player who has waited past the fallback threshold is
//! paired with the bot instead.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dropfour_domain::{ConnectionId, GameSession};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use super::game_events;
use crate::infrastructure::ports::{ClockPort, MessageSender};
use crate::stores::GameSessionStore;

/// Tunables for the matchmaking loop.
#[derive(Debug, Clone)]
pub struct MatchmakingSettings {
    pub tick_interval: Duration,
    pub bot_fallback_after: Duration,
    pub bot_name: String,
}

#[derive(Debug, Clone)]
struct WaitingPlayer {
    username: String,
    /// Connection that owns the entry; only it may withdraw it.
    connection_id: ConnectionId,
    enqueued_at: DateTime<Utc>,
}

pub struct Matchmaker {
    waiting: Mutex<VecDeque<WaitingPlayer>>,
    sessions: Arc<GameSessionStore>,
    sender: Arc<dyn MessageSender>,
    clock: Arc<dyn ClockPort>,
    settings: MatchmakingSettings,
}

impl Matchmaker {
    pub fn new(
        sessions: Arc<GameSessionStore>,
        sender: Arc<dyn MessageSender>,
        clock: Arc<dyn ClockPort>,
        settings: MatchmakingSettings,
    ) -> Self {
        Self {
            waiting: Mutex::new(VecDeque::new()),
            sessions,
            sender,
            clock,
            settings,
        }
    }

    /// Add a player to the back of the queue on behalf of `connection_id`.
    ///
    /// Returns `false` when the player is already waiting. The entry keeps its
    /// place but is handed to the newer connection.
    pub async fn enqueue(&self, username: &str, connection_id: ConnectionId) -> bool {
        let mut waiting = self.waiting.lock().await;
        if let Some(existing) = waiting.iter_mut().find(|p| p.username == username) {
            existing.connection_id = connection_id;
            return false;
        }
        waiting.push_back(WaitingPlayer {
            username: username.to_string(),
            connection_id,
            enqueued_at: self.clock.now(),
        });
        tracing::info!(username = %username, waiting = waiting.len(), "Player queued for matchmaking");
        true
    }

    /// Remove the entry `connection_id` owns for `username`.
    ///
    /// Returns `false` if there is none, including when a newer connection
    /// has taken the entry over.
    pub async fn leave(&self, username: &str, connection_id: ConnectionId) -> bool {
        let mut waiting = self.waiting.lock().await;
        let before = waiting.len();
        waiting.retain(|p| !(p.username == username && p.connection_id == connection_id));
        let removed = waiting.len() != before;
        if removed {
            tracing::debug!(username = %username, %connection_id, "Player left the matchmaking queue");
        }
        removed
    }

    pub async fn waiting_count(&self) -> usize {
        self.waiting.lock().await.len()
    }

    /// Run one pairing pass and notify the players of every session created.
    pub async fn tick(&self) -> Vec<GameSession> {
        let created = {
            let mut waiting = self.waiting.lock().await;
            self.pair_waiting(&mut waiting)
        };

        for session in &created {
            self.announce(session).await;
        }
        created
    }

    /// Tick every `tick_interval` until `cancel` fires.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.settings.tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        tracing::info!(
            tick_ms = self.settings.tick_interval.as_millis() as u64,
            "Matchmaking loop started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Matchmaking loop stopped");
                    break;
                }
                _ = interval.tick() => {
                    self.tick().await;
                }
            }
        }
    }

    fn pair_waiting(&self, waiting: &mut VecDeque<WaitingPlayer>) -> Vec<GameSession> {
        let mut created = Vec::new();

        while waiting.len() >= 2 {
            let (Some(first), Some(second)) = (waiting.pop_front(), waiting.pop_front()) else {
                break;
            };
            let session = self.sessions.create(&first.username, &second.username);
            tracing::info!(
                game_id = %session.id,
                player_one = %session.player_one,
                player_two = %session.player_two,
                "Created game"
            );
            created.push(session);
        }

        let lone_player_expired = waiting.front().is_some_and(|player| {
            let waited = (self.clock.now() - player.enqueued_at)
                .to_std()
                .unwrap_or_default();
            waited >= self.settings.bot_fallback_after
        });

        if lone_player_expired {
            if let Some(player) = waiting.pop_front() {
                let session = self
                    .sessions
                    .create(&player.username, &self.settings.bot_name);
                tracing::info!(
                    game_id = %session.id,
                    username = %player.username,
                    bot = %self.settings.bot_name,
                    "Created bot game"
                );
                created.push(session);
            }
        }

        created
    }

    async fn announce(&self, session: &GameSession) {
        for seat in game_events::human_seats(session, &self.settings.bot_name) {
            let username = session.player_in(seat);
            if let Err(e) = self
                .sender
                .send_to_username(username, game_events::game_start(session, seat))
                .await
            {
                tracing::warn!(
                    game_id = %session.id,
                    username = %username,
                    error = %e,
                    "Failed to send GAME_START"
                );
            }
        }
    }
}
