//! WebSocket handling for player connections.
//!
//! One task per socket reads frames, dispatches client messages and drives
//! keepalive. All writes go through the [`ConnectionManager`], which owns the
//! write half of every socket.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use serde::Deserialize;
use tokio::time::{Instant, MissedTickBehavior};

mod ws_game;
mod ws_session;

#[cfg(test)]
pub(crate) mod test_support;


use dropfour_domain::ApplyMoveError;
use dropfour_shared::{ClientMessage, ServerMessage};

use super::connections::{
    Connection, ConnectionManager, FrameSink, OutboundFrame, Registered, CLOSE_NORMAL,
    CLOSE_POLICY,
};
use crate::app::App;
use crate::infrastructure::config::ConnectionConfig;
use crate::infrastructure::ports::ConnectionError;

const WELCOME: &str = "Welcome to Connect Four.";

/// Combined state for WebSocket handlers.
pub struct WsState {
    pub app: Arc<App>,
    pub connections: Arc<ConnectionManager>,
    pub settings: ConnectionConfig,
}

/// Query parameters accepted on the upgrade request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectParams {
    username: Option<String>,
    game_id: Option<String>,
}

/// Rejections answered to the client as `INFO`.
#[derive(Debug, thiserror::Error)]
pub(crate) enum RouterError {
    #[error("MAKE_MOVE missing col")]
    MissingColumn,
    #[error("MAKE_MOVE missing gameId")]
    MissingGameId,
    #[error("unknown game")]
    UnknownGame,
    #[error("RECONNECT missing username")]
    MissingUsername,
    #[error("unsupported message type")]
    UnsupportedMessageType,
    #[error(transparent)]
    Move(ApplyMoveError),
}

impl From<ApplyMoveError> for RouterError {
    fn from(e: ApplyMoveError) -> Self {
        match e {
            ApplyMoveError::GameNotFound => RouterError::UnknownGame,
            other => RouterError::Move(other),
        }
    }
}

/// Write half of an axum socket.
struct WsFrameSink(SplitSink<WebSocket, Message>);

#[async_trait]
impl FrameSink for WsFrameSink {
    async fn send_frame(&mut self, frame: OutboundFrame) -> Result<(), ConnectionError> {
        let message = match frame {
            OutboundFrame::Text(text) => Message::Text(text.into()),
            OutboundFrame::Ping(payload) => Message::Ping(payload.into()),
            OutboundFrame::Close { code, reason } => Message::Close(Some(CloseFrame {
                code,
                reason: reason.into(),
            })),
        };
        self.0
            .send(message)
            .await
            .map_err(|_| ConnectionError::TransportClosed)
    }
}

/// WebSocket upgrade handler.
///
/// A username is required and may not collide with the bot's.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<Arc<WsState>>,
) -> Response {
    let username = params
        .username
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty());
    let Some(username) = username else {
        return (StatusCode::BAD_REQUEST, "username query parameter is required").into_response();
    };
    if username == state.app.bot_name {
        return (StatusCode::BAD_REQUEST, "username is reserved").into_response();
    }

    let game_id = params
        .game_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty());
    ws.on_upgrade(move |socket| handle_socket(socket, state, username, game_id))
}

/// Handle an individual WebSocket connection.
async fn handle_socket(
    socket: WebSocket,
    state: Arc<WsState>,
    username: String,
    game_id: Option<String>,
) {
    let (ws_sender, mut ws_receiver) = socket.split();

    let Registered {
        connection,
        replaced,
    } = state
        .connections
        .register(&username, Box::new(WsFrameSink(ws_sender)))
        .await;

    tracing::info!(
        connection_id = %connection.id(),
        username = %username,
        "WebSocket connection established"
    );

    if let Some(previous) = replaced {
        tracing::info!(
            connection_id = %previous.id(),
            username = %username,
            "Closing superseded connection"
        );
        state
            .connections
            .close(
                &previous,
                CLOSE_POLICY,
                "superseded by a newer connection",
                state.settings.shutdown_grace,
            )
            .await;
    }

    ws_session::on_connect(&state, &connection, game_id.as_deref()).await;

    let idle_timeout = state.settings.idle_timeout;
    let idle = tokio::time::sleep(idle_timeout);
    tokio::pin!(idle);
    let mut keepalive = tokio::time::interval_at(
        Instant::now() + state.settings.ping_interval,
        state.settings.ping_interval,
    );
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = connection.cancel_token().cancelled() => {
                tracing::debug!(connection_id = %connection.id(), "Connection cancelled");
                break;
            }
            _ = &mut idle => {
                tracing::info!(connection_id = %connection.id(), "Connection idle, dropping");
                break;
            }
            _ = keepalive.tick() => {
                if let Err(e) = state.connections.ping(&connection).await {
                    tracing::info!(connection_id = %connection.id(), error = %e, "Keepalive failed");
                    break;
                }
            }
            frame = ws_receiver.next() => {
                let Some(frame) = frame else {
                    break;
                };
                idle.as_mut().reset(Instant::now() + idle_timeout);
                match frame {
                    Ok(Message::Text(text)) => {
                        handle_text(&state, &connection, text.as_str()).await;
                    }
                    Ok(Message::Close(_)) => {
                        tracing::info!(connection_id = %connection.id(), "WebSocket closed by client");
                        break;
                    }
                    // Pongs only refresh the idle deadline; pings are answered by axum.
                    Ok(_) => {}
                    Err(e) => {
                        tracing::debug!(connection_id = %connection.id(), error = %e, "WebSocket read failed");
                        break;
                    }
                }
            }
        }
    }

    state.connections.unregister(&connection).await;
    // Only withdraws an entry this connection still owns.
    state
        .app
        .use_cases
        .matchmaking
        .leave(&username, connection.id())
        .await;
    state
        .connections
        .close(&connection, CLOSE_NORMAL, "", state.settings.shutdown_grace)
        .await;

    tracing::info!(
        connection_id = %connection.id(),
        username = %username,
        "WebSocket connection terminated"
    );
}

/// Parse and route one text frame. Failures are reported back as `INFO`.
async fn handle_text(state: &WsState, connection: &Connection, text: &str) {
    let msg = match serde_json::from_str::<ClientMessage>(text) {
        Ok(msg) => msg,
        Err(e) => {
            tracing::debug!(connection_id = %connection.id(), error = %e, "Failed to parse message");
            send_info(state, connection, "Invalid message format").await;
            return;
        }
    };

    let result = match msg {
        ClientMessage::MakeMove { game_id, col } => {
            ws_game::handle_make_move(state, connection, game_id, col).await
        }
        ClientMessage::Reconnect { username, game_id } => {
            ws_session::handle_reconnect(state, connection, username, game_id).await
        }
        ClientMessage::Unknown => Err(RouterError::UnsupportedMessageType),
    };

    if let Err(e) = result {
        tracing::debug!(
            connection_id = %connection.id(),
            username = %connection.username(),
            error = %e,
            "Request rejected"
        );
        send_info(state, connection, e.to_string()).await;
    }
}

async fn send_info(state: &WsState, connection: &Connection, message: impl Into<String>) {
    send(state, connection, &ServerMessage::info(message)).await;
}

/// Deliver to one connection, logging rather than propagating failures.
async fn send(state: &WsState, connection: &Connection, message: &ServerMessage) {
    if let Err(e) = state.connections.send_to(connection, message).await {
        tracing::warn!(
            connection_id = %connection.id(),
            kind = message.kind(),
            error = %e,
            "Failed to send message"
        );
    }
}
