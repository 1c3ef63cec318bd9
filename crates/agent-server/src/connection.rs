//! Device session: read/write pumps, ping/pong, ordered replies.

use std::sync::Arc;
use std::time::Duration;

use deskbridge_protocol::Reply;
use deskbridge_protocol::constants::{INVALID_JSON_MESSAGE, WS_PING_PERIOD, WS_PONG_WAIT};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_util::sync::CancellationToken;

use crate::SEND_BUFFER_SIZE;
use crate::capabilities::Capabilities;
use crate::router::{Router, SessionState};

/// Metadata about a connected device.
#[derive(Debug, Clone)]
pub struct SessionMeta {
    pub conn_id: String,
    pub remote_addr: String,
}

/// Keepalive timing for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimings {
    /// Interval between server pings.
    pub ping_period: Duration,
    /// Close the session after this long without any inbound frame.
    pub pong_wait: Duration,
}

impl Default for SessionTimings {
    fn default() -> Self {
        Self {
            ping_period: WS_PING_PERIOD,
            pong_wait: WS_PONG_WAIT,
        }
    }
}

/// Handle for sending replies to one device.
#[derive(Clone)]
pub struct Sender {
    tx: mpsc::Sender<WsMessage>,
}

impl Sender {
    /// Queues a reply as JSON text.
    ///
    /// Waits for buffer space, so replies leave in the order they were
    /// produced. Fails only when the write pump has stopped.
    pub async fn send_reply(&self, reply: &Reply) -> Result<(), SendError> {
        let json = reply.to_json().map_err(|_| SendError)?;
        self.tx
            .send(WsMessage::Text(json.into()))
            .await
            .map_err(|_| SendError)
    }

    /// Returns `true` if the send channel is still open.
    pub fn is_connected(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Error returned when the connection is closed.
#[derive(Debug, thiserror::Error)]
#[error("send failed: connection closed")]
pub struct SendError;

/// Active device session.
///
/// Owns the pump tasks; dropping the handle does not stop them.
pub struct SessionHandle {
    pub meta: SessionMeta,
    sender: Sender,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub fn sender(&self) -> Sender {
        self.sender.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.sender.is_connected() && !self.task.is_finished()
    }

    /// Signals shutdown without waiting.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Signals shutdown and waits for the read pump to exit.
    pub async fn close_and_wait(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

/// Starts a device session on an upgraded WebSocket.
///
/// The server `hello` is queued before any inbound frame is read. The pumps
/// run as background tasks until the device disconnects, the pong deadline
/// passes, or `server_cancel` fires.
pub fn spawn_session<S, C>(
    ws_stream: S,
    meta: SessionMeta,
    router: Arc<Router<C>>,
    timings: SessionTimings,
    server_cancel: CancellationToken,
) -> SessionHandle
where
    S: futures_util::Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>>
        + futures_util::Sink<WsMessage, Error = tokio_tungstenite::tungstenite::Error>
        + Send
        + 'static,
    C: Capabilities,
{
    let (tx, rx) = mpsc::channel::<WsMessage>(SEND_BUFFER_SIZE);
    let cancel = server_cancel.child_token();
    let sender = Sender { tx };

    let (ws_sink, ws_stream) = ws_stream.split();

    tokio::spawn(write_pump(ws_sink, rx, timings, cancel.clone()));

    let read_cancel = cancel.clone();
    let read_sender = sender.clone();
    let read_meta = meta.clone();
    let task = tokio::spawn(async move {
        if read_sender.send_reply(&router.greeting()).await.is_ok() {
            let state = SessionState::new(&read_meta.conn_id, &read_meta.remote_addr);
            read_pump(ws_stream, read_sender, router, state, timings, read_cancel.clone()).await;
        }
        // Stop the write pump once reading ends.
        read_cancel.cancel();
        tracing::info!(
            conn_id = %read_meta.conn_id,
            peer_addr = %read_meta.remote_addr,
            "device disconnected"
        );
    });

    SessionHandle {
        meta,
        sender,
        cancel,
        task,
    }
}

/// Write pump: drains the send channel and sends WS pings.
async fn write_pump<S>(
    mut sink: S,
    mut rx: mpsc::Receiver<WsMessage>,
    timings: SessionTimings,
    cancel: CancellationToken,
) where
    S: futures_util::Sink<WsMessage, Error = tokio_tungstenite::tungstenite::Error> + Send + Unpin,
{
    let mut ping_interval = tokio::time::interval(timings.ping_period);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                // Replies queued before the read pump stopped still go out.
                let flush = async {
                    while let Ok(ws_msg) = rx.try_recv() {
                        if sink.send(ws_msg).await.is_err() {
                            break;
                        }
                    }
                };
                let _ = tokio::time::timeout(timings.ping_period, flush).await;
                break;
            }

            msg = rx.recv() => {
                match msg {
                    Some(ws_msg) => {
                        if let Err(e) = sink.send(ws_msg).await {
                            tracing::error!("write pump send error: {e}");
                            break;
                        }
                    }
                    None => break,
                }
            }

            _ = ping_interval.tick() => {
                if let Err(e) = sink.send(WsMessage::Ping(Vec::new().into())).await {
                    tracing::debug!("write pump ping error: {e}");
                    break;
                }
            }
        }
    }

    // Best-effort close frame.
    let _ = sink.close().await;
}

/// Read pump: decodes frames one at a time and sends each reply before
/// reading the next frame.
async fn read_pump<S, C>(
    mut stream: S,
    sender: Sender,
    router: Arc<Router<C>>,
    mut state: SessionState,
    timings: SessionTimings,
    cancel: CancellationToken,
) where
    S: futures_util::Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>>
        + Send
        + Unpin,
    C: Capabilities,
{
    // Any inbound frame counts as liveness, not only pongs.
    let deadline = tokio::time::sleep(timings.pong_wait);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            _ = &mut deadline => {
                tracing::warn!(conn_id = %state.conn_id, "pong timeout, closing connection");
                break;
            }

            frame = stream.next() => {
                let ws_msg = match frame {
                    Some(Ok(m)) => m,
                    Some(Err(e)) => {
                        tracing::warn!(conn_id = %state.conn_id, "read pump error: {e}");
                        break;
                    }
                    None => break,
                };
                deadline.as_mut().reset(Instant::now() + timings.pong_wait);

                let reply = match ws_msg {
                    WsMessage::Text(text) => router.dispatch(&mut state, &text).await,
                    WsMessage::Binary(data) => match std::str::from_utf8(&data) {
                        Ok(text) => router.dispatch(&mut state, text).await,
                        Err(_) => Reply::error(INVALID_JSON_MESSAGE),
                    },
                    WsMessage::Pong(_) | WsMessage::Ping(_) => continue, // tungstenite answers pings.
                    WsMessage::Close(_) => {
                        tracing::debug!(conn_id = %state.conn_id, "received close frame");
                        break;
                    }
                    WsMessage::Frame(_) => continue,
                };

                if sender.send_reply(&reply).await.is_err() {
                    break;
                }
                // Time spent handling the request is not silence.
                deadline.as_mut().reset(Instant::now() + timings.pong_wait);
            }
        }
    }
}
