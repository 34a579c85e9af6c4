//! WebSocket Snapshot Server
//!
//! Read-only feed for observers. Every connection gets the current snapshot
//! on connect, then each published snapshot and each round event as they
//! happen. Clients may send `ping` and `sync_request`; nothing they send
//! reaches the engine.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, instrument, warn};

use crate::config::env_or;
use crate::network::driver::EngineHandle;
use crate::network::protocol::{ClientMessage, ErrorCode, ServerMessage};

/// Outbound messages queued per client before the oldest producer waits.
const CLIENT_QUEUE_DEPTH: usize = 64;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_connections: 1000,
        }
    }
}

impl ServerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: env_or("CRASH_BIND_ADDR", defaults.bind_addr),
            max_connections: env_or("CRASH_MAX_CONNECTIONS", defaults.max_connections),
        }
    }
}

/// Snapshot server errors.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Message could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Connected client state.
struct ConnectedClient {
    /// Connection time.
    connected_at: Instant,
    /// Messages pushed so far.
    messages_sent: u64,
}

/// The snapshot feed server.
pub struct SnapshotServer {
    /// Server configuration.
    config: ServerConfig,
    /// Engine the feed mirrors.
    engine: EngineHandle,
    /// Connected clients.
    clients: Arc<RwLock<BTreeMap<SocketAddr, ConnectedClient>>>,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl SnapshotServer {
    /// Create a server mirroring `engine`.
    pub fn new(config: ServerConfig, engine: EngineHandle) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            engine,
            clients: Arc::new(RwLock::new(BTreeMap::new())),
            shutdown_tx,
        }
    }

    /// Bind the configured address and serve until shutdown.
    pub async fn run(&self) -> Result<(), SnapshotServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener until shutdown.
    #[instrument(skip_all, fields(addr = ?listener.local_addr().ok()))]
    pub async fn serve(&self, listener: TcpListener) -> Result<(), SnapshotServerError> {
        info!("Snapshot server listening");
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let clients_count = self.clients.read().await.len();
                            if clients_count >= self.config.max_connections {
                                warn!("Connection limit reached, rejecting {}", addr);
                                tokio::spawn(reject_connection(stream, addr));
                                continue;
                            }

                            info!("New connection from {}", addr);
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let clients = self.clients.clone();
        let engine = self.engine.clone();
        let mut snapshots = engine.snapshots();
        let mut events = engine.subscribe_events();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(CLIENT_QUEUE_DEPTH);

            // Register client
            {
                let mut clients = clients.write().await;
                clients.insert(addr, ConnectedClient {
                    connected_at: Instant::now(),
                    messages_sent: 0,
                });
            }

            // Spawn message sender task
            let sender_clients = clients.clone();
            let sender_task = tokio::spawn(async move {
                while let Some(msg) = msg_rx.recv().await {
                    let text = match msg.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            error!("Failed to serialize message: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                    if let Some(client) = sender_clients.write().await.get_mut(&addr) {
                        client.messages_sent += 1;
                    }
                }
                let _ = ws_sender.close().await;
            });

            let _ = msg_tx.send(ServerMessage::Snapshot((*snapshots.snapshot()).clone())).await;

            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                let reply = match ClientMessage::from_json(&text) {
                                    Ok(client_msg) => Self::handle_client_message(client_msg, &engine),
                                    Err(e) => {
                                        debug!("Invalid message from {}: {}", addr, e);
                                        ServerMessage::error(ErrorCode::InvalidInput, "Invalid message format")
                                    }
                                };
                                if msg_tx.send(reply).await.is_err() {
                                    break;
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("Client {} disconnected", addr);
                                break;
                            }
                            Some(Err(e)) => {
                                error!("WebSocket error for {}: {}", addr, e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    snapshot = snapshots.changed() => {
                        let Some(snapshot) = snapshot else {
                            let _ = msg_tx.send(ServerMessage::Shutdown {
                                reason: "Engine stopped".to_string(),
                            }).await;
                            break;
                        };
                        if msg_tx.send(ServerMessage::Snapshot((*snapshot).clone())).await.is_err() {
                            break;
                        }
                    }
                    event = events.recv() => {
                        match event {
                            Ok(event) => {
                                if msg_tx.send(ServerMessage::Event(event)).await.is_err() {
                                    break;
                                }
                            }
                            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                                warn!("Client {} lagging, skipped {} events", addr, skipped);
                            }
                            Err(broadcast::error::RecvError::Closed) => break,
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        let _ = msg_tx.send(ServerMessage::Shutdown {
                            reason: "Server shutting down".to_string(),
                        }).await;
                        break;
                    }
                }
            }

            // Let queued messages drain, then close
            drop(msg_tx);
            let _ = sender_task.await;

            if let Some(client) = clients.write().await.remove(&addr) {
                info!(
                    "Client {} cleaned up after {:?}, {} messages sent",
                    addr,
                    client.connected_at.elapsed(),
                    client.messages_sent
                );
            }
        });
    }

    /// Answer a client message.
    fn handle_client_message(msg: ClientMessage, engine: &EngineHandle) -> ServerMessage {
        match msg {
            ClientMessage::SyncRequest => ServerMessage::Snapshot((*engine.snapshot()).clone()),
            ClientMessage::Ping { timestamp } => ServerMessage::Pong {
                timestamp,
                server_time: chrono::Utc::now().timestamp_millis(),
            },
        }
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get active connection count.
    pub async fn connection_count(&self) -> usize {
        self.clients.read().await.len()
    }
}

/// Tell a client over the limit why it is being turned away.
async fn reject_connection(stream: TcpStream, addr: SocketAddr) {
    let mut ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            debug!("Handshake with rejected client {} failed: {}", addr, e);
            return;
        }
    };

    let msg = ServerMessage::error(ErrorCode::ServerOverloaded, "Connection limit reached");
    if let Ok(text) = msg.to_json() {
        let _ = ws_stream.send(Message::Text(text)).await;
    }
    let _ = ws_stream.close(None).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio_tungstenite::connect_async;

    use crate::core::rng::DeterministicRng;
    use crate::game::engine::{EngineConfig, RoundEngine};
    use crate::network::driver::EngineDriver;
    use crate::network::snapshot::SnapshotConfig;

    fn engine_handle() -> (EngineDriver, EngineHandle) {
        let engine = RoundEngine::new(
            EngineConfig::default(),
            DeterministicRng::new(7),
            tokio::time::Instant::now().into_std(),
        );
        EngineDriver::new(engine, SnapshotConfig::default())
    }

    async fn next_message<S>(ws: &mut S) -> ServerMessage
    where
        S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
    {
        loop {
            let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
                .await
                .expect("timed out waiting for server message")
                .expect("stream ended")
                .expect("websocket error");
            if let Message::Text(text) = msg {
                return ServerMessage::from_json(&text).unwrap();
            }
        }
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.max_connections, 1000);
    }

    #[test]
    fn test_server_config_from_env() {
        std::env::set_var("CRASH_BIND_ADDR", "127.0.0.1:9100");
        std::env::set_var("CRASH_MAX_CONNECTIONS", "not-a-number");
        let config = ServerConfig::from_env();
        std::env::remove_var("CRASH_BIND_ADDR");
        std::env::remove_var("CRASH_MAX_CONNECTIONS");

        assert_eq!(config.bind_addr, "127.0.0.1:9100".parse::<SocketAddr>().unwrap());
        assert_eq!(config.max_connections, 1000);
    }

    #[tokio::test]
    async fn test_server_creation() {
        let (_driver, handle) = engine_handle();
        let server = SnapshotServer::new(ServerConfig::default(), handle);

        assert_eq!(server.connection_count().await, 0);
        server.shutdown();
    }

    #[tokio::test]
    async fn test_feed_round_trip() {
        let (driver, handle) = engine_handle();
        let (engine_shutdown, _) = broadcast::channel(1);
        let engine_task = driver.spawn(engine_shutdown.subscribe());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = Arc::new(SnapshotServer::new(ServerConfig::default(), handle));
        let serving = server.clone();
        let server_task = tokio::spawn(async move { serving.serve(listener).await });

        let (mut ws, _) = connect_async(format!("ws://{}", addr)).await.unwrap();

        // Initial snapshot
        let ServerMessage::Snapshot(first) = next_message(&mut ws).await else {
            panic!("expected snapshot first");
        };
        assert_eq!(first.round_id, 1);
        assert_eq!(first.participants.len(), 6);

        ws.send(Message::Text(r#"{"type":"ping","timestamp":42}"#.into())).await.unwrap();
        loop {
            if let ServerMessage::Pong { timestamp, .. } = next_message(&mut ws).await {
                assert_eq!(timestamp, 42);
                break;
            }
        }

        ws.send(Message::Text("not json".into())).await.unwrap();
        loop {
            if let ServerMessage::Error(err) = next_message(&mut ws).await {
                assert_eq!(err.code, ErrorCode::InvalidInput);
                break;
            }
        }
        assert_eq!(server.connection_count().await, 1);

        server.shutdown();
        loop {
            if let ServerMessage::Shutdown { .. } = next_message(&mut ws).await {
                break;
            }
        }
        server_task.await.unwrap().unwrap();

        engine_shutdown.send(()).unwrap();
        engine_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_connection_limit() {
        let (_driver, handle) = engine_handle();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let config = ServerConfig {
            max_connections: 0,
            ..Default::default()
        };
        let server = Arc::new(SnapshotServer::new(config, handle));
        let serving = server.clone();
        tokio::spawn(async move { serving.serve(listener).await });

        let (mut ws, _) = connect_async(format!("ws://{}", addr)).await.unwrap();
        let ServerMessage::Error(err) = next_message(&mut ws).await else {
            panic!("expected overload error");
        };
        assert_eq!(err.code, ErrorCode::ServerOverloaded);

        server.shutdown();
    }
}
