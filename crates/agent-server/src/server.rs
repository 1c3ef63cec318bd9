//! Agent WebSocket server.
//!
//! Listens on a TCP port, upgrades every connection to WebSocket and runs
//! one device session per connection. A background sweeper evicts
//! abandoned transfers from the shared registry.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use deskbridge_protocol::constants::{DEFAULT_PORT, WS_MAX_MESSAGE_SIZE, WS_PING_PERIOD, WS_PONG_WAIT};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_tungstenite::accept_async_with_config;
use tokio_util::sync::CancellationToken;

use crate::ServerError;
use crate::capabilities::Capabilities;
use crate::connection::{self, SessionHandle, SessionMeta, SessionTimings};
use crate::router::Router;

/// Default idle time after which an unfinished transfer is evicted.
pub const DEFAULT_TRANSFER_TTL: Duration = Duration::from_secs(15 * 60);

/// Default interval between eviction sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: IpAddr,
    /// TCP port to listen on (0 = OS-assigned).
    pub port: u16,
    pub transfer_ttl: Duration,
    pub sweep_interval: Duration,
    /// Interval between WebSocket pings to each device.
    pub ping_period: Duration,
    /// Silence after which a device session is closed.
    pub pong_wait: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            transfer_ttl: DEFAULT_TRANSFER_TTL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            ping_period: WS_PING_PERIOD,
            pong_wait: WS_PONG_WAIT,
        }
    }
}

impl ServerConfig {
    fn session_timings(&self) -> SessionTimings {
        SessionTimings {
            ping_period: self.ping_period,
            pong_wait: self.pong_wait,
        }
    }
}

/// The agent WebSocket server.
///
/// Any number of devices may be connected at once; they share only the
/// router's transfer registry.
pub struct AgentServer<C: Capabilities> {
    config: ServerConfig,
    router: Arc<Router<C>>,
    sessions: Mutex<HashMap<String, SessionHandle>>,
    cancel: CancellationToken,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl<C: Capabilities> AgentServer<C> {
    pub fn new(config: ServerConfig, router: Router<C>) -> Arc<Self> {
        Arc::new(Self {
            config,
            router: Arc::new(router),
            sessions: Mutex::new(HashMap::new()),
            cancel: CancellationToken::new(),
            local_addr: Mutex::new(None),
        })
    }

    /// Creates a server whose lifetime is tied to an external token.
    pub fn with_cancel(config: ServerConfig, router: Router<C>, cancel: CancellationToken) -> Arc<Self> {
        Arc::new(Self {
            config,
            router: Arc::new(router),
            sessions: Mutex::new(HashMap::new()),
            cancel,
            local_addr: Mutex::new(None),
        })
    }

    pub fn router(&self) -> &Arc<Router<C>> {
        &self.router
    }

    /// Returns the local address the server is listening on.
    ///
    /// Only available after [`run`](Self::run) binds the socket.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock().await
    }

    /// Returns the listening port (0 if not yet bound).
    pub async fn port(&self) -> u16 {
        self.local_addr.lock().await.map(|a| a.port()).unwrap_or(0)
    }

    /// Number of live device sessions.
    pub async fn session_count(&self) -> usize {
        let mut sessions = self.sessions.lock().await;
        sessions.retain(|_, s| s.is_connected());
        sessions.len()
    }

    /// Gracefully shuts down the listener, the sweeper and all sessions.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Runs the server until cancellation.
    pub async fn run(self: &Arc<Self>) -> Result<(), ServerError> {
        let addr = SocketAddr::new(self.config.bind_addr, self.config.port);
        let listener = TcpListener::bind(addr).await?;

        let local_addr = listener.local_addr()?;
        *self.local_addr.lock().await = Some(local_addr);
        tracing::info!("agent server listening on {local_addr}");

        let sweeper = tokio::spawn(Arc::clone(self).sweep_loop());

        let result = loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("server shutting down");
                    break Ok(());
                }

                result = listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            let server = Arc::clone(self);
                            tokio::spawn(async move {
                                if let Err(e) = server.handle_connection(stream, peer_addr).await {
                                    tracing::warn!(%peer_addr, "connection error: {e}");
                                }
                            });
                        }
                        Err(e) => {
                            tracing::error!("accept error: {e}");
                        }
                    }
                }
            }
        };

        let sessions: Vec<SessionHandle> =
            self.sessions.lock().await.drain().map(|(_, s)| s).collect();
        for session in sessions {
            session.close_and_wait().await;
        }
        let _ = sweeper.await;
        result
    }

    /// Upgrades one TCP connection and registers its session.
    async fn handle_connection(
        self: &Arc<Self>,
        stream: tokio::net::TcpStream,
        peer_addr: SocketAddr,
    ) -> Result<(), ServerError> {
        let mut ws_config = tokio_tungstenite::tungstenite::protocol::WebSocketConfig::default();
        ws_config.max_message_size = Some(WS_MAX_MESSAGE_SIZE);
        ws_config.max_frame_size = Some(WS_MAX_MESSAGE_SIZE);
        let ws_stream = accept_async_with_config(stream, Some(ws_config)).await?;

        let conn_id = uuid::Uuid::new_v4().to_string();
        tracing::info!(%conn_id, %peer_addr, "device connected");

        let meta = SessionMeta {
            conn_id: conn_id.clone(),
            remote_addr: peer_addr.to_string(),
        };
        let session = connection::spawn_session(
            ws_stream,
            meta,
            Arc::clone(&self.router),
            self.config.session_timings(),
            self.cancel.clone(),
        );

        let mut sessions = self.sessions.lock().await;
        sessions.retain(|_, s| s.is_connected());
        if self.cancel.is_cancelled() {
            session.close();
        } else {
            sessions.insert(conn_id, session);
        }
        Ok(())
    }

    /// Periodically evicts transfers idle for longer than the TTL.
    async fn sweep_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.config.sweep_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        interval.reset();

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = interval.tick() => {
                    let evicted = self.router.registry().evict_stale(self.config.transfer_ttl);
                    if !evicted.is_empty() {
                        tracing::info!(count = evicted.len(), ids = ?evicted, "evicted stale transfers");
                    }
                }
            }
        }
    }
}
