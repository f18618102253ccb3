use super::*;

use std::{net::SocketAddr, time::Duration};

use axum::routing::get;
use dropfour_domain::BoardDimensions;
use tokio::net::TcpListener;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};

use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::config::MatchmakingConfig;
use crate::infrastructure::persistence::InMemoryGameRecordRepo;
use crate::infrastructure::ports::{GameRecordRepo, MessageSender};

pub(crate) type WsClient =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

pub(crate) const BOT: &str = "BOT";

pub(crate) fn test_connection_config() -> ConnectionConfig {
    ConnectionConfig {
        send_timeout: Duration::from_secs(2),
        idle_timeout: Duration::from_secs(30),
        ping_interval: Duration::from_secs(15),
        shutdown_grace: Duration::from_millis(200),
    }
}

/// Matchmaking never ticks on its own; tests call `tick()` explicitly.
pub(crate) fn manual_matchmaking(bot_fallback_after: Duration) -> MatchmakingConfig {
    MatchmakingConfig {
        tick_interval: Duration::from_secs(3600),
        bot_fallback_after,
    }
}

pub(crate) fn build_ws_state(
    repo: Arc<dyn GameRecordRepo>,
    matchmaking: MatchmakingConfig,
) -> Arc<WsState> {
    let connections = Arc::new(ConnectionManager::new(test_connection_config().send_timeout));
    let sender: Arc<dyn MessageSender> = connections.clone();
    let app = App::new(
        BOT,
        BoardDimensions::default(),
        &matchmaking,
        repo,
        sender,
        Arc::new(SystemClock::new()),
    );
    Arc::new(WsState {
        app: Arc::new(app),
        connections,
        settings: test_connection_config(),
    })
}

pub(crate) fn build_default_ws_state() -> (Arc<WsState>, Arc<InMemoryGameRecordRepo>) {
    let repo = Arc::new(InMemoryGameRecordRepo::new());
    let state = build_ws_state(repo.clone(), manual_matchmaking(Duration::from_secs(10)));
    (state, repo)
}

pub(crate) async fn spawn_ws_server(
    state: Arc<WsState>,
) -> (SocketAddr, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = axum::Router::new().route("/ws", get(ws_handler).with_state(state));

    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (addr, handle)
}

pub(crate) fn ws_url(addr: SocketAddr, username: &str, game_id: Option<&str>) -> String {
    match game_id {
        Some(id) => format!("ws://{}/ws?username={}&gameId={}", addr, username, id),
        None => format!("ws://{}/ws?username={}", addr, username),
    }
}

pub(crate) async fn ws_connect(addr: SocketAddr, username: &str) -> WsClient {
    let (ws, _resp) = connect_async(ws_url(addr, username, None)).await.unwrap();
    ws
}

pub(crate) async fn ws_connect_to_game(addr: SocketAddr, username: &str, game_id: &str) -> WsClient {
    let (ws, _resp) = connect_async(ws_url(addr, username, Some(game_id)))
        .await
        .unwrap();
    ws
}

pub(crate) async fn ws_send_client(ws: &mut WsClient, msg: &ClientMessage) {
    let json = serde_json::to_string(msg).unwrap();
    ws_send_text(ws, &json).await;
}

pub(crate) async fn ws_send_text(ws: &mut WsClient, text: &str) {
    ws.send(WsMessage::Text(text.to_string())).await.unwrap();
}

pub(crate) async fn ws_recv_server(ws: &mut WsClient) -> ServerMessage {
    loop {
        let msg = ws.next().await.unwrap().unwrap();
        match msg {
            WsMessage::Text(text) => {
                return serde_json::from_str::<ServerMessage>(&text).unwrap();
            }
            WsMessage::Binary(bin) => {
                let text = String::from_utf8(bin).unwrap();
                return serde_json::from_str::<ServerMessage>(&text).unwrap();
            }
            WsMessage::Close(frame) => panic!("connection closed: {frame:?}"),
            _ => {}
        }
    }
}

pub(crate) async fn ws_expect_message<F>(
    ws: &mut WsClient,
    timeout: Duration,
    mut predicate: F,
) -> ServerMessage
where
    F: FnMut(&ServerMessage) -> bool,
{
    tokio::time::timeout(timeout, async {
        loop {
            let msg = ws_recv_server(ws).await;
            if predicate(&msg) {
                return msg;
            }
        }
    })
    .await
    .unwrap()
}

pub(crate) async fn ws_expect_info(ws: &mut WsClient, expected: &str) {
    ws_expect_message(ws, Duration::from_secs(2), |m| {
        matches!(m, ServerMessage::Info { message } if message == expected)
    })
    .await;
}

pub(crate) async fn ws_expect_no_message_matching<F>(
    ws: &mut WsClient,
    timeout: Duration,
    mut predicate: F,
) where
    F: FnMut(&ServerMessage) -> bool,
{
    let result = tokio::time::timeout(timeout, async {
        loop {
            let msg = ws_recv_server(ws).await;
            if predicate(&msg) {
                return msg;
            }
        }
    })
    .await;

    if let Ok(msg) = result {
        panic!("unexpected message: {msg:?}");
    }
}

/// Wait for the next close frame, skipping anything else.
pub(crate) async fn ws_expect_close(ws: &mut WsClient, timeout: Duration) -> Option<u16> {
    tokio::time::timeout(timeout, async {
        loop {
            match ws.next().await {
                Some(Ok(WsMessage::Close(frame))) => return frame.map(|f| u16::from(f.code)),
                Some(Ok(_)) => continue,
                Some(Err(_)) | None => return None,
            }
        }
    })
    .await
    .unwrap()
}

/// Poll until the matchmaker holds `expected` players.
pub(crate) async fn wait_for_waiting(state: &WsState, expected: usize) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while state.app.use_cases.matchmaking.waiting_count().await != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}
