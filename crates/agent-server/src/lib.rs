//! WebSocket session server for the DeskBridge agent.
//!
//! Accepts device connections over WebSocket, greets each with the pairing
//! token, routes every JSON request through the [`Router`] and sends back
//! exactly one reply per request. Host-side effects are delegated to a
//! [`Capabilities`] implementation supplied by the binary.

mod capabilities;
mod connection;
mod input;
mod pairing;
mod router;
mod server;

pub use capabilities::{
    Capabilities, CapabilityError, CapabilityFuture, CommandOutput, MediaKey,
};
pub use connection::{SendError, Sender, SessionHandle, SessionMeta, SessionTimings};
pub use input::{CursorMove, translate};
pub use pairing::{generate_token, issue_pairing_info, local_ip, validate_token};
pub use router::{DEFAULT_COMMAND_TIMEOUT, Router, RouterOptions, SessionState};
pub use server::{AgentServer, DEFAULT_SWEEP_INTERVAL, DEFAULT_TRANSFER_TTL, ServerConfig};

/// Send buffer capacity per session.
///
/// Replies are queued with backpressure, so this bounds memory per slow
/// client rather than dropping messages.
pub const SEND_BUFFER_SIZE: usize = 256;

/// Errors produced by the agent server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}
