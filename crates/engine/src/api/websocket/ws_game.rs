use super::*;

use dropfour_domain::{GameId, GameSession, MoveOutcome, Seat};

use crate::infrastructure::ports::MessageSender;
use crate::use_cases::game_events;

/// `MAKE_MOVE`: apply the sender's move, broadcast the result and, in a bot
/// game, answer with the bot's move.
pub(super) async fn handle_make_move(
    state: &WsState,
    connection: &Connection,
    game_id: Option<String>,
    col: Option<i64>,
) -> Result<(), RouterError> {
    let col = col.ok_or(RouterError::MissingColumn)?;
    let game_id = game_id
        .filter(|id| !id.trim().is_empty())
        .ok_or(RouterError::MissingGameId)?;
    let game_id: GameId = game_id.parse().map_err(|_| RouterError::UnknownGame)?;

    // The session range-checks `col` after the turn checks.
    let (session, outcome) = state
        .app
        .sessions
        .apply_move(game_id, connection.username(), col)?;

    tracing::info!(
        game_id = %game_id,
        username = %connection.username(),
        column = col,
        ?outcome,
        "Move applied"
    );

    publish_move(state, &session, outcome).await;

    if outcome == MoveOutcome::Continue
        && session.is_against(&state.app.bot_name)
        && session.current_turn == Seat::Two
    {
        play_bot_turn(state, game_id).await;
    }

    Ok(())
}

async fn play_bot_turn(state: &WsState, game_id: GameId) {
    match state.app.use_cases.bot.take_turn(game_id) {
        Ok(bot_move) => {
            tracing::info!(
                game_id = %game_id,
                column = bot_move.column,
                outcome = ?bot_move.outcome,
                "Bot moved"
            );
            publish_move(state, &bot_move.session, bot_move.outcome).await;
        }
        Err(e) => {
            tracing::warn!(game_id = %game_id, error = %e, "Bot failed to move");
        }
    }
}

/// Broadcast the board and, when the game ended, the per-seat result.
async fn publish_move(state: &WsState, session: &GameSession, outcome: MoveOutcome) {
    let seats = game_events::human_seats(session, &state.app.bot_name);

    let update = game_events::board_update(session);
    for seat in &seats {
        deliver(state, session.player_in(*seat), update.clone()).await;
    }

    if outcome == MoveOutcome::Continue {
        return;
    }

    for seat in &seats {
        deliver(
            state,
            session.player_in(*seat),
            game_events::game_over(session, *seat),
        )
        .await;
    }
    spawn_record(state, session.clone());
}

async fn deliver(state: &WsState, username: &str, message: ServerMessage) {
    let kind = message.kind();
    if let Err(e) = state.connections.send_to_username(username, message).await {
        tracing::warn!(username = %username, kind, error = %e, "Failed to deliver game event");
    }
}

/// Persist the finished game off the request path.
fn spawn_record(state: &WsState, session: GameSession) {
    let record_game = state.app.use_cases.record_game.clone();
    tokio::spawn(async move {
        match record_game.execute(&session).await {
            Ok(record) => tracing::info!(
                game_id = %record.id,
                winner = ?record.winner,
                is_draw = record.is_draw,
                "Game recorded"
            ),
            Err(e) => tracing::warn!(game_id = %session.id, error = %e, "Failed to record game"),
        }
    });
}
