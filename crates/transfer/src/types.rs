use std::time::Instant;

/// Lifecycle of an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    Receiving,
    Completed,
    Failed,
}

/// In-progress upload owned by the registry.
#[derive(Debug)]
pub(crate) struct TransferSession {
    pub id: String,
    pub name: String,
    pub declared_size: u64,
    pub mime: String,
    /// Decoded fragments in arrival order.
    pub fragments: Vec<Vec<u8>>,
    pub received: u64,
    pub last_reported: u8,
    pub status: TransferStatus,
    pub error: String,
    pub created_at: Instant,
    pub updated_at: Instant,
}

impl TransferSession {
    pub fn new(id: String, name: String, declared_size: u64, mime: String) -> Self {
        let now = Instant::now();
        Self {
            id,
            name,
            declared_size,
            mime,
            fragments: Vec::new(),
            received: 0,
            last_reported: 0,
            status: TransferStatus::Receiving,
            error: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Marks the session failed and releases its buffered fragments.
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.status = TransferStatus::Failed;
        self.error = reason.into();
        self.fragments = Vec::new();
        self.updated_at = Instant::now();
    }

    pub fn snapshot(&self) -> TransferSnapshot {
        TransferSnapshot {
            id: self.id.clone(),
            name: self.name.clone(),
            declared_size: self.declared_size,
            received: self.received,
            fragments: self.fragments.len(),
            last_reported: self.last_reported,
            status: self.status,
            age: self.created_at.elapsed(),
        }
    }
}

/// Outcome of accepting one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkProgress {
    /// Total decoded bytes received so far.
    pub received: u64,
    /// New percentage, present only when it should be reported.
    pub percent: Option<u8>,
}

/// Read-only view of a registered transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSnapshot {
    pub id: String,
    pub name: String,
    pub declared_size: u64,
    pub received: u64,
    pub fragments: usize,
    pub last_reported: u8,
    pub status: TransferStatus,
    pub age: std::time::Duration,
}

/// A finished upload removed from the registry, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedTransfer {
    pub id: String,
    pub name: String,
    pub mime: String,
    pub data: Vec<u8>,
}

impl CompletedTransfer {
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}
