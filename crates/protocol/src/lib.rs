//! Wire protocol for the DeskBridge device session.
//!
//! Every message is a UTF-8 JSON object with a mandatory `type` string.
//! Inbound messages decode into the closed [`Request`] enum and every
//! request is answered with exactly one [`Reply`].

pub mod constants;
pub mod envelope;
pub mod messages;
pub mod types;

// Re-export primary types for convenience.
pub use envelope::{DecodeError, Reply, Request, decode_request};
pub use types::{ClipboardAction, FileEntry, MediaAction, PairingInfo};
