use super::*;

use dropfour_domain::GameId;

use crate::use_cases::game_events;

/// Greet a new connection, then either resume its game or queue it.
pub(super) async fn on_connect(state: &WsState, connection: &Connection, game_id: Option<&str>) {
    send_info(state, connection, WELCOME).await;

    if let Some(game_id) = game_id {
        if let Some(id) = resync(state, connection, game_id).await {
            tracing::info!(
                connection_id = %connection.id(),
                game_id = %id,
                "Resumed game on connect"
            );
            return;
        }
    }

    state
        .app
        .use_cases
        .matchmaking
        .enqueue(connection.username(), connection.id())
        .await;
}

/// `RECONNECT`: resend game state if the named game is live.
pub(super) async fn handle_reconnect(
    state: &WsState,
    connection: &Connection,
    username: Option<String>,
    game_id: Option<String>,
) -> Result<(), RouterError> {
    let username = username
        .filter(|name| !name.trim().is_empty())
        .ok_or(RouterError::MissingUsername)?;
    if username.trim() != connection.username() {
        tracing::debug!(
            connection_id = %connection.id(),
            claimed = %username,
            "RECONNECT username differs from connection; using the connection's"
        );
    }

    if let Some(game_id) = game_id.as_deref().filter(|id| !id.trim().is_empty()) {
        if resync(state, connection, game_id).await.is_some() {
            state
                .app
                .use_cases
                .matchmaking
                .leave(connection.username(), connection.id())
                .await;
        }
    }

    send_info(state, connection, "Reconnect acknowledged").await;
    Ok(())
}

/// Send `GAME_START` and `BOARD_UPDATE` for an unfinished game the connection
/// plays in. Returns the game id when state was sent.
async fn resync(state: &WsState, connection: &Connection, game_id: &str) -> Option<GameId> {
    let id: GameId = game_id.parse().ok()?;
    let session = state.app.sessions.get(id).filter(|s| !s.is_over())?;
    let seat = session.seat_of(connection.username())?;

    send_info(state, connection, format!("Reconnect ack for game {id}")).await;
    send(state, connection, &game_events::game_start(&session, seat)).await;
    send(state, connection, &game_events::board_update(&session)).await;
    Some(id)
}
