//! Connection management for WebSocket clients.
//!
//! Tracks live connections by id and by username and owns outbound delivery.
//! Each connection serializes its own writes behind a per-connection lock, so
//! a bot-triggered broadcast and a player-triggered broadcast cannot interleave
//! on the same socket.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dropfour_domain::ConnectionId;
use dropfour_shared::ServerMessage;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use crate::infrastructure::ports::{ConnectionError, MessageSender};

/// Close code sent when the server is going away.
pub const CLOSE_GOING_AWAY: u16 = 1001;
/// Close code sent to a connection superseded by a newer one for the same user.
pub const CLOSE_POLICY: u16 = 1008;
/// Close code for an ordinary close.
pub const CLOSE_NORMAL: u16 = 1000;

/// A frame queued for the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Text(String),
    Ping(Vec<u8>),
    Close { code: u16, reason: String },
}

/// Write half of a transport.
#[async_trait]
pub trait FrameSink: Send {
    async fn send_frame(&mut self, frame: OutboundFrame) -> Result<(), ConnectionError>;
}

/// A registered client connection.
pub struct Connection {
    id: ConnectionId,
    username: String,
    sink: Mutex<Box<dyn FrameSink>>,
    closed: AtomicBool,
    cancel: CancellationToken,
}

impl Connection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Cancelled when the connection is closed or the server shuts down.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Result of [`ConnectionManager::register`].
#[derive(Debug)]
pub struct Registered {
    pub connection: Arc<Connection>,
    /// The connection previously indexed under the same username, if any.
    /// It is not closed by registration.
    pub replaced: Option<Arc<Connection>>,
}

/// Result of [`ConnectionManager::unregister`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unregistered {
    /// The connection was still indexed by id.
    pub removed: bool,
    /// The username index pointed at this connection and was cleared.
    pub released_username: bool,
}

#[derive(Default)]
struct Indices {
    by_id: HashMap<ConnectionId, Arc<Connection>>,
    by_username: HashMap<String, ConnectionId>,
}

/// Manages all active WebSocket connections.
pub struct ConnectionManager {
    indices: RwLock<Indices>,
    send_timeout: Duration,
    root: CancellationToken,
}

pub type SharedConnectionManager = Arc<ConnectionManager>;

impl ConnectionManager {
    /// Create a new connection manager.
    pub fn new(send_timeout: Duration) -> Self {
        Self {
            indices: RwLock::new(Indices::default()),
            send_timeout,
            root: CancellationToken::new(),
        }
    }

    /// Register a connection for `username`.
    pub async fn register(&self, username: &str, sink: Box<dyn FrameSink>) -> Registered {
        let connection = Arc::new(Connection {
            id: ConnectionId::new(),
            username: username.to_string(),
            sink: Mutex::new(sink),
            closed: AtomicBool::new(false),
            cancel: self.root.child_token(),
        });

        let mut indices = self.indices.write().await;
        indices.by_id.insert(connection.id, connection.clone());
        let replaced = indices
            .by_username
            .insert(username.to_string(), connection.id)
            .and_then(|old| indices.by_id.get(&old).cloned());
        drop(indices);

        tracing::debug!(
            connection_id = %connection.id,
            username = %username,
            replaced = replaced.is_some(),
            "Connection registered"
        );

        Registered {
            connection,
            replaced,
        }
    }

    /// Remove a connection from both indices. Safe to call more than once.
    ///
    /// The username entry is only dropped while it still points at this
    /// connection, so a superseded connection never evicts its replacement.
    pub async fn unregister(&self, connection: &Connection) -> Unregistered {
        let mut indices = self.indices.write().await;
        let removed = indices.by_id.remove(&connection.id).is_some();
        let released_username =
            indices.by_username.get(&connection.username) == Some(&connection.id);
        if released_username {
            indices.by_username.remove(&connection.username);
        }
        drop(indices);

        if removed {
            tracing::debug!(
                connection_id = %connection.id,
                released_username,
                "Connection unregistered"
            );
        }
        Unregistered {
            removed,
            released_username,
        }
    }

    /// Current connection for `username`.
    pub async fn get_by_username(&self, username: &str) -> Option<Arc<Connection>> {
        let indices = self.indices.read().await;
        indices
            .by_username
            .get(username)
            .and_then(|id| indices.by_id.get(id))
            .cloned()
    }

    /// Whether `connection` is the one currently indexed for its username.
    pub async fn is_current(&self, connection: &Connection) -> bool {
        self.indices.read().await.by_username.get(&connection.username) == Some(&connection.id)
    }

    pub async fn connection_count(&self) -> usize {
        self.indices.read().await.by_id.len()
    }

    /// Serialize and write `message` under the send deadline.
    pub async fn send_to(
        &self,
        connection: &Connection,
        message: &ServerMessage,
    ) -> Result<(), ConnectionError> {
        let json = serde_json::to_string(message)
            .map_err(|e| ConnectionError::Serialization(e.to_string()))?;
        self.send_frame(connection, OutboundFrame::Text(json)).await
    }

    pub async fn ping(&self, connection: &Connection) -> Result<(), ConnectionError> {
        self.send_frame(connection, OutboundFrame::Ping(Vec::new())).await
    }

    async fn send_frame(
        &self,
        connection: &Connection,
        frame: OutboundFrame,
    ) -> Result<(), ConnectionError> {
        if connection.is_closed() {
            return Err(ConnectionError::TransportClosed);
        }
        write_with_deadline(connection, frame, self.send_timeout).await
    }

    /// Send a close frame (best effort within `grace`) and stop the read loop.
    ///
    /// Only the first call has any effect.
    pub async fn close(&self, connection: &Connection, code: u16, reason: &str, grace: Duration) {
        if connection.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let frame = OutboundFrame::Close {
            code,
            reason: reason.to_string(),
        };
        if let Err(e) = write_with_deadline(connection, frame, grace).await {
            tracing::debug!(
                connection_id = %connection.id,
                error = %e,
                "Close frame not delivered"
            );
        }
        connection.cancel.cancel();
    }

    /// Close every connection within `grace` and clear both indices.
    pub async fn shutdown(&self, grace: Duration) {
        let connections: Vec<Arc<Connection>> = {
            let mut indices = self.indices.write().await;
            indices.by_username.clear();
            indices.by_id.drain().map(|(_, c)| c).collect()
        };

        tracing::info!(count = connections.len(), "Closing WebSocket connections");

        futures_util::future::join_all(
            connections
                .iter()
                .map(|c| self.close(c, CLOSE_GOING_AWAY, "server shutting down", grace)),
        )
        .await;

        self.root.cancel();
    }
}

async fn write_with_deadline(
    connection: &Connection,
    frame: OutboundFrame,
    deadline: Duration,
) -> Result<(), ConnectionError> {
    let write = async {
        let mut sink = connection.sink.lock().await;
        sink.send_frame(frame).await
    };
    match tokio::time::timeout(deadline, write).await {
        Ok(result) => result,
        Err(_) => Err(ConnectionError::SendTimeout),
    }
}

#[async_trait]
impl MessageSender for ConnectionManager {
    async fn send_to_username(
        &self,
        username: &str,
        message: ServerMessage,
    ) -> Result<(), ConnectionError> {
        match self.get_by_username(username).await {
            Some(connection) => self.send_to(&connection, &message).await,
            None => Ok(()),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_sinks::{channel_sink, StalledSink};
    use super::*;
    use std::sync::Mutex as StdMutex;

    fn manager() -> ConnectionManager {
        ConnectionManager::new(Duration::from_millis(200))
    }

    fn text_of(frame: OutboundFrame) -> ServerMessage {
        match frame {
            OutboundFrame::Text(json) => serde_json::from_str(&json).unwrap(),
            other => panic!("expected text frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn register_indexes_by_id_and_username() {
        let manager = manager();
        let (sink, _rx) = channel_sink();

        let registered = manager.register("alice", sink).await;

        assert!(registered.replaced.is_none());
        assert_eq!(manager.connection_count().await, 1);
        let found = manager.get_by_username("alice").await.unwrap();
        assert_eq!(found.id(), registered.connection.id());
        assert!(manager.is_current(&registered.connection).await);
    }

    #[tokio::test]
    async fn unregister_is_idempotent() {
        let manager = manager();
        let (sink, _rx) = channel_sink();
        let connection = manager.register("alice", sink).await.connection;

        assert_eq!(
            manager.unregister(&connection).await,
            Unregistered {
                removed: true,
                released_username: true
            }
        );
        assert_eq!(
            manager.unregister(&connection).await,
            Unregistered {
                removed: false,
                released_username: false
            }
        );
        assert!(manager.get_by_username("alice").await.is_none());
        assert_eq!(manager.connection_count().await, 0);
    }

    #[tokio::test]
    async fn reregistering_replaces_without_closing_the_old_connection() {
        let manager = manager();
        let (first_sink, _first_rx) = channel_sink();
        let (second_sink, _second_rx) = channel_sink();

        let first = manager.register("alice", first_sink).await.connection;
        let second = manager.register("alice", second_sink).await;

        let replaced = second.replaced.unwrap();
        assert_eq!(replaced.id(), first.id());
        assert!(!first.is_closed());
        assert!(!first.cancel_token().is_cancelled());

        assert_eq!(manager.connection_count().await, 2);

        // The stale connection's cleanup must not evict the new one.
        let unregistered = manager.unregister(&first).await;
        assert!(unregistered.removed);
        assert!(!unregistered.released_username);
        let current = manager.get_by_username("alice").await.unwrap();
        assert_eq!(current.id(), second.connection.id());
        assert!(!manager.is_current(&first).await);
    }

    #[tokio::test]
    async fn send_to_username_reaches_the_current_connection() {
        let manager = manager();
        let (sink, mut rx) = channel_sink();
        manager.register("alice", sink).await;

        manager
            .send_to_username("alice", ServerMessage::info("hello"))
            .await
            .unwrap();

        assert_eq!(text_of(rx.recv().await.unwrap()), ServerMessage::info("hello"));
    }

    #[tokio::test]
    async fn offline_username_is_not_an_error() {
        let manager = manager();
        assert_eq!(
            manager
                .send_to_username("nobody", ServerMessage::info("hi"))
                .await,
            Ok(())
        );
    }

    #[tokio::test]
    async fn stalled_transport_times_out() {
        let manager = ConnectionManager::new(Duration::from_millis(50));
        let connection = manager.register("alice", Box::new(StalledSink)).await.connection;

        let result = manager.send_to(&connection, &ServerMessage::info("hi")).await;

        assert_eq!(result, Err(ConnectionError::SendTimeout));
    }

    #[tokio::test]
    async fn dropped_receiver_is_transport_closed() {
        let manager = manager();
        let (sink, rx) = channel_sink();
        let connection = manager.register("alice", sink).await.connection;
        drop(rx);

        let result = manager.send_to(&connection, &ServerMessage::info("hi")).await;

        assert_eq!(result, Err(ConnectionError::TransportClosed));
    }

    /// Records the start and end of each write, yielding in between.
    struct InterleaveProbe(Arc<StdMutex<Vec<String>>>);

    #[async_trait]
    impl FrameSink for InterleaveProbe {
        async fn send_frame(&mut self, frame: OutboundFrame) -> Result<(), ConnectionError> {
            let OutboundFrame::Text(text) = frame else {
                return Ok(());
            };
            self.0.lock().unwrap().push(format!("start {text}"));
            tokio::time::sleep(Duration::from_millis(2)).await;
            self.0.lock().unwrap().push(format!("end {text}"));
            Ok(())
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writes_to_one_connection_do_not_interleave() {
        let log = Arc::new(StdMutex::new(Vec::new()));
        let manager = Arc::new(manager());
        let connection = manager
            .register("alice", Box::new(InterleaveProbe(log.clone())))
            .await
            .connection;

        let writers: Vec<_> = (0..8)
            .map(|i| {
                let manager = manager.clone();
                let connection = connection.clone();
                tokio::spawn(async move {
                    manager
                        .send_to(&connection, &ServerMessage::info(format!("m{i}")))
                        .await
                })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap().unwrap();
        }

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 16);
        for pair in log.chunks(2) {
            let started = pair[0].strip_prefix("start ").unwrap();
            let ended = pair[1].strip_prefix("end ").unwrap();
            assert_eq!(started, ended);
        }
    }

    #[tokio::test]
    async fn close_sends_one_close_frame_and_cancels() {
        let manager = manager();
        let (sink, mut rx) = channel_sink();
        let connection = manager.register("alice", sink).await.connection;

        manager
            .close(&connection, CLOSE_NORMAL, "bye", Duration::from_millis(100))
            .await;
        manager
            .close(&connection, CLOSE_NORMAL, "bye", Duration::from_millis(100))
            .await;

        assert_eq!(
            rx.recv().await.unwrap(),
            OutboundFrame::Close {
                code: CLOSE_NORMAL,
                reason: "bye".into()
            }
        );
        assert!(rx.try_recv().is_err());
        assert!(connection.cancel_token().is_cancelled());
        assert_eq!(
            manager.send_to(&connection, &ServerMessage::info("late")).await,
            Err(ConnectionError::TransportClosed)
        );
    }

    #[tokio::test]
    async fn shutdown_closes_everything_within_the_grace_period() {
        let manager = manager();
        let (sink, mut rx) = channel_sink();
        let healthy = manager.register("alice", sink).await.connection;
        let stalled = manager.register("bob", Box::new(StalledSink)).await.connection;

        tokio::time::timeout(
            Duration::from_secs(1),
            manager.shutdown(Duration::from_millis(50)),
        )
        .await
        .unwrap();

        assert!(matches!(
            rx.recv().await.unwrap(),
            OutboundFrame::Close {
                code: CLOSE_GOING_AWAY,
                ..
            }
        ));
        assert!(healthy.cancel_token().is_cancelled());
        assert!(stalled.cancel_token().is_cancelled());
        assert_eq!(manager.connection_count().await, 0);
        assert!(manager.get_by_username("alice").await.is_none());
    }
}
