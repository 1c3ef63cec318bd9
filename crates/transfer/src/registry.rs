use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use base64::{Engine, engine::general_purpose::STANDARD};

use crate::progress::{percent_of, should_report};
use crate::types::{
    ChunkProgress, CompletedTransfer, TransferSession, TransferSnapshot, TransferStatus,
};
use crate::{DEFAULT_MAX_TRANSFER_BYTES, TransferError};

/// Limits applied to every transfer in a registry.
#[derive(Debug, Clone, Copy)]
pub struct RegistryLimits {
    /// Maximum decoded bytes buffered for one transfer.
    pub max_transfer_bytes: u64,
}

impl Default for RegistryLimits {
    fn default() -> Self {
        Self {
            max_transfer_bytes: DEFAULT_MAX_TRANSFER_BYTES,
        }
    }
}

/// Decodes the base64 payload of a `file_chunk`.
pub fn decode_chunk(data: &str) -> Result<Vec<u8>, TransferError> {
    STANDARD
        .decode(data.trim())
        .map_err(|e| TransferError::InvalidChunk(e.to_string()))
}

/// Transfer id → in-progress upload, shared by all connections.
///
/// Each operation holds the lock for its whole duration, so `begin`,
/// `append_chunk` and `finish` are atomic with respect to each other.
pub struct TransferRegistry {
    sessions: Mutex<HashMap<String, TransferSession>>,
    limits: RegistryLimits,
}

impl Default for TransferRegistry {
    fn default() -> Self {
        Self::new(RegistryLimits::default())
    }
}

impl TransferRegistry {
    pub fn new(limits: RegistryLimits) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            limits,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, TransferSession>> {
        // A panic mid-operation leaves the map itself consistent.
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a new upload in `Receiving` state.
    ///
    /// An existing transfer with the same id is replaced.
    pub fn begin(&self, id: &str, name: &str, size: u64, mime: &str) {
        let session = TransferSession::new(id.into(), name.into(), size, mime.into());
        if self.lock().insert(id.to_string(), session).is_some() {
            tracing::warn!(transfer_id = id, "transfer id reused, previous upload discarded");
        }
        tracing::info!(transfer_id = id, name, size, "transfer started");
    }

    /// Decodes a base64 `file_chunk` payload and appends it.
    ///
    /// A payload that does not decode fails the whole transfer, so the
    /// following `finish` reports an error instead of a truncated file.
    pub fn append_encoded(
        &self,
        id: &str,
        index: u64,
        data: &str,
    ) -> Result<ChunkProgress, TransferError> {
        let mut sessions = self.lock();
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| TransferError::TransferNotFound(id.to_string()))?;

        match decode_chunk(data) {
            Ok(bytes) => self.store(session, index, bytes),
            Err(err) => {
                if session.status != TransferStatus::Failed {
                    tracing::warn!(transfer_id = id, index, "{err}");
                    session.fail(err.to_string());
                }
                Err(err)
            }
        }
    }

    /// Appends one decoded fragment.
    ///
    /// Fragments are kept in call order; `index` is informational only.
    /// The returned percentage is throttled (see [`should_report`]) but the
    /// fragment is always stored.
    pub fn append_chunk(
        &self,
        id: &str,
        index: u64,
        bytes: Vec<u8>,
    ) -> Result<ChunkProgress, TransferError> {
        let mut sessions = self.lock();
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| TransferError::TransferNotFound(id.to_string()))?;
        self.store(session, index, bytes)
    }

    fn store(
        &self,
        session: &mut TransferSession,
        index: u64,
        bytes: Vec<u8>,
    ) -> Result<ChunkProgress, TransferError> {
        let id = session.id.as_str();

        if session.status == TransferStatus::Failed {
            return Err(TransferError::Failed {
                id: id.to_string(),
                reason: session.error.clone(),
            });
        }

        let len = bytes.len() as u64;
        let limit = self.limits.max_transfer_bytes;
        if session.received.saturating_add(len) > limit {
            let err = TransferError::TooLarge {
                id: id.to_string(),
                limit,
            };
            tracing::warn!(transfer_id = id, index, "{err}");
            session.fail(err.to_string());
            return Err(err);
        }

        session.fragments.push(bytes);
        session.received += len;
        session.updated_at = Instant::now();

        let current = percent_of(session.received, session.declared_size);
        let percent = if should_report(current, session.last_reported) {
            session.last_reported = current;
            Some(current)
        } else {
            None
        };

        Ok(ChunkProgress {
            received: session.received,
            percent,
        })
    }

    /// Removes the upload and concatenates its fragments.
    ///
    /// The entry is removed whether or not assembly succeeds. An unknown id
    /// leaves the registry untouched.
    pub fn finish(&self, id: &str) -> Result<CompletedTransfer, TransferError> {
        let mut session = self
            .lock()
            .remove(id)
            .ok_or_else(|| TransferError::TransferNotFound(id.to_string()))?;

        if session.status == TransferStatus::Failed {
            return Err(TransferError::Failed {
                id: session.id,
                reason: session.error,
            });
        }

        let data = session.fragments.concat();
        session.status = TransferStatus::Completed;
        tracing::debug!(
            transfer_id = id,
            bytes = data.len(),
            declared = session.declared_size,
            elapsed_ms = session.created_at.elapsed().as_millis() as u64,
            "transfer assembled"
        );

        Ok(CompletedTransfer {
            id: session.id,
            name: session.name,
            mime: session.mime,
            data,
        })
    }

    /// Drops transfers with no activity for longer than `ttl`.
    ///
    /// Returns the evicted ids.
    pub fn evict_stale(&self, ttl: Duration) -> Vec<String> {
        let mut sessions = self.lock();
        let stale: Vec<String> = sessions
            .values()
            .filter(|s| s.updated_at.elapsed() > ttl)
            .map(|s| s.id.clone())
            .collect();
        for id in &stale {
            sessions.remove(id);
            tracing::info!(transfer_id = %id, "evicted abandoned transfer");
        }
        stale
    }

    /// Returns a view of a registered transfer.
    pub fn snapshot(&self, id: &str) -> Option<TransferSnapshot> {
        self.lock().get(id).map(TransferSession::snapshot)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn begin_registers_receiving_session() {
        let reg = TransferRegistry::default();
        reg.begin("a", "x.bin", 4, "application/octet-stream");
        let snap = reg.snapshot("a").unwrap();
        assert_eq!(snap.status, TransferStatus::Receiving);
        assert_eq!(snap.name, "x.bin");
        assert_eq!(snap.received, 0);
    }

    #[test]
    fn begin_overwrites_existing_id() {
        let reg = TransferRegistry::default();
        reg.begin("a", "first.bin", 10, "");
        reg.append_chunk("a", 0, b"12345".to_vec()).unwrap();
        reg.begin("a", "second.bin", 20, "");

        let snap = reg.snapshot("a").unwrap();
        assert_eq!(snap.name, "second.bin");
        assert_eq!(snap.received, 0);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn append_unknown_id_fails() {
        let reg = TransferRegistry::default();
        let err = reg.append_chunk("missing", 0, vec![1]).unwrap_err();
        assert!(matches!(err, TransferError::TransferNotFound(id) if id == "missing"));
    }

    #[test]
    fn progress_reported_on_boundaries() {
        let reg = TransferRegistry::default();
        reg.begin("a", "x.bin", 4, "");
        let p1 = reg.append_chunk("a", 0, b"AB".to_vec()).unwrap();
        assert_eq!(p1, ChunkProgress { received: 2, percent: Some(50) });
        let p2 = reg.append_chunk("a", 1, b"CD".to_vec()).unwrap();
        assert_eq!(p2, ChunkProgress { received: 4, percent: Some(100) });
    }

    #[test]
    fn throttled_chunks_are_still_stored() {
        let reg = TransferRegistry::default();
        reg.begin("a", "x.bin", 300, "");
        // 1 byte of 300 is 0%, 4 bytes is 1%: neither is reported.
        assert_eq!(reg.append_chunk("a", 0, vec![0]).unwrap().percent, None);
        assert_eq!(reg.append_chunk("a", 1, vec![0; 3]).unwrap().percent, None);
        let snap = reg.snapshot("a").unwrap();
        assert_eq!(snap.fragments, 2);
        assert_eq!(snap.received, 4);
    }

    #[test]
    fn progress_is_monotonic_and_bounded() {
        let reg = TransferRegistry::default();
        reg.begin("a", "x.bin", 97, "");
        let mut last = 0u8;
        for i in 0..150u64 {
            if let Some(p) = reg.append_chunk("a", i, vec![7]).unwrap().percent {
                assert!(p <= 100);
                assert!(p > last, "progress went from {last} to {p}");
                last = p;
            }
        }
        assert_eq!(last, 100);
    }

    #[test]
    fn zero_declared_size_never_reports() {
        let reg = TransferRegistry::default();
        reg.begin("a", "empty.bin", 0, "");
        let p = reg.append_chunk("a", 0, b"data".to_vec()).unwrap();
        assert_eq!(p.percent, None);
        assert_eq!(p.received, 4);
    }

    #[test]
    fn finish_concatenates_in_arrival_order() {
        let reg = TransferRegistry::default();
        reg.begin("a", "x.bin", 6, "text/plain");
        // Indices arrive out of order; bytes follow call order.
        reg.append_chunk("a", 2, b"EF".to_vec()).unwrap();
        reg.append_chunk("a", 0, b"AB".to_vec()).unwrap();
        reg.append_chunk("a", 1, b"CD".to_vec()).unwrap();

        let done = reg.finish("a").unwrap();
        assert_eq!(done.data, b"EFABCD");
        assert_eq!(done.size(), 6);
        assert_eq!(done.mime, "text/plain");
        assert!(!reg.contains("a"));
    }

    #[test]
    fn finish_unknown_id_leaves_registry_untouched() {
        let reg = TransferRegistry::default();
        reg.begin("a", "x.bin", 4, "");
        let err = reg.finish("b").unwrap_err();
        assert!(matches!(err, TransferError::TransferNotFound(_)));
        assert_eq!(reg.len(), 1);
        assert!(reg.contains("a"));
    }

    #[test]
    fn finish_twice_fails_second_time() {
        let reg = TransferRegistry::default();
        reg.begin("a", "x.bin", 0, "");
        reg.finish("a").unwrap();
        assert!(matches!(reg.finish("a"), Err(TransferError::TransferNotFound(_))));
    }

    #[test]
    fn oversized_transfer_fails_and_is_removed_on_finish() {
        let reg = TransferRegistry::new(RegistryLimits {
            max_transfer_bytes: 4,
        });
        reg.begin("a", "x.bin", 4, "");
        reg.append_chunk("a", 0, b"ABC".to_vec()).unwrap();
        let err = reg.append_chunk("a", 1, b"DE".to_vec()).unwrap_err();
        assert!(matches!(err, TransferError::TooLarge { limit: 4, .. }));

        let snap = reg.snapshot("a").unwrap();
        assert_eq!(snap.status, TransferStatus::Failed);
        assert_eq!(snap.fragments, 0);

        assert!(matches!(
            reg.append_chunk("a", 2, b"F".to_vec()),
            Err(TransferError::Failed { .. })
        ));
        assert!(matches!(reg.finish("a"), Err(TransferError::Failed { .. })));
        assert!(reg.is_empty());
    }

    #[test]
    fn evict_stale_removes_idle_transfers() {
        let reg = TransferRegistry::default();
        reg.begin("old", "a.bin", 1, "");
        std::thread::sleep(Duration::from_millis(30));
        reg.begin("fresh", "b.bin", 1, "");

        let evicted = reg.evict_stale(Duration::from_millis(15));
        assert_eq!(evicted, vec!["old".to_string()]);
        assert!(reg.contains("fresh"));
        assert!(!reg.contains("old"));
    }

    #[test]
    fn decode_chunk_rejects_invalid_base64() {
        assert_eq!(decode_chunk("QUI=").unwrap(), b"AB");
        assert!(matches!(
            decode_chunk("not base64!!"),
            Err(TransferError::InvalidChunk(_))
        ));
    }

    #[test]
    fn undecodable_chunk_fails_the_transfer() {
        let reg = TransferRegistry::default();
        reg.begin("a", "x.bin", 6, "");
        reg.append_encoded("a", 0, "QUI=").unwrap();

        let err = reg.append_encoded("a", 1, "***").unwrap_err();
        assert!(matches!(err, TransferError::InvalidChunk(_)));
        assert_eq!(reg.snapshot("a").unwrap().status, TransferStatus::Failed);

        // Later good chunks are refused and nothing is assembled.
        assert!(matches!(
            reg.append_encoded("a", 2, "RUY="),
            Err(TransferError::Failed { .. })
        ));
        assert!(matches!(reg.finish("a"), Err(TransferError::Failed { .. })));
        assert!(reg.is_empty());
    }

    #[test]
    fn append_encoded_unknown_id_is_not_found() {
        let reg = TransferRegistry::default();
        let err = reg.append_encoded("missing", 0, "***").unwrap_err();
        assert!(matches!(err, TransferError::TransferNotFound(id) if id == "missing"));
        assert!(reg.is_empty());
    }

    #[test]
    fn concurrent_appends_are_all_counted() {
        let reg = Arc::new(TransferRegistry::default());
        reg.begin("a", "x.bin", 1000, "");

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let r = Arc::clone(&reg);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        r.append_chunk("a", i, vec![1]).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let done = reg.finish("a").unwrap();
        assert_eq!(done.size(), 1000);
    }
}
