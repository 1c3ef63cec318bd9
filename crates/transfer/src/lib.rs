//! Chunked file uploads: the shared transfer registry and the assembler
//! that persists completed uploads.
//!
//! Uploads arrive as `file_start`, any number of base64 `file_chunk`
//! fragments, then `file_end`. The [`TransferRegistry`] is the only state
//! shared between device connections.

mod assembler;
mod progress;
mod registry;
mod types;
mod validation;

pub use assembler::{FileAssembler, MAX_NAME_ATTEMPTS};
pub use progress::{percent_of, should_report};
pub use registry::{RegistryLimits, TransferRegistry, decode_chunk};
pub use types::{ChunkProgress, CompletedTransfer, TransferSnapshot, TransferStatus};
pub use validation::sanitize_file_name;

/// Default cap on bytes buffered for a single transfer: 2 GiB.
pub const DEFAULT_MAX_TRANSFER_BYTES: u64 = 2 * 1024 * 1024 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transfer not found: {0}")]
    TransferNotFound(String),

    #[error("invalid chunk data: {0}")]
    InvalidChunk(String),

    #[error("transfer {id} exceeds the {limit} byte limit")]
    TooLarge { id: String, limit: u64 },

    #[error("transfer {id} failed: {reason}")]
    Failed { id: String, reason: String },

    #[error("invalid file name: {0}")]
    InvalidName(String),

    #[error("no free file name for {0}")]
    NameExhausted(String),
}
