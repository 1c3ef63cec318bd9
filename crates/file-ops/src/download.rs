//! Host → device file download.

use std::path::Path;

use base64::{Engine, engine::general_purpose::STANDARD};
use deskbridge_protocol::messages::FileDownloadResponse;

use crate::FileOpsError;

/// Default cap on a single download: 32 MiB, well below the frame limit
/// once base64 inflation is accounted for.
pub const DEFAULT_MAX_DOWNLOAD_BYTES: u64 = 32 * 1024 * 1024;

/// A host file read into memory for sending to the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub file_name: String,
    pub file_path: String,
    pub mime: String,
    pub data: Vec<u8>,
}

impl DownloadedFile {
    /// Builds the reply payload, base64-encoding the contents.
    pub fn into_response(self) -> FileDownloadResponse {
        FileDownloadResponse {
            file_size: self.data.len() as u64,
            file_name: self.file_name,
            file_path: self.file_path,
            mime: self.mime,
            data: STANDARD.encode(&self.data),
        }
    }
}

/// Reads a regular file of at most `max_bytes`.
pub fn read_for_download(path: &Path, max_bytes: u64) -> Result<DownloadedFile, FileOpsError> {
    let metadata = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(FileOpsError::NotFound(path.display().to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    if !metadata.is_file() {
        return Err(FileOpsError::NotAFile(path.display().to_string()));
    }
    if metadata.len() > max_bytes {
        return Err(FileOpsError::TooLarge {
            size: metadata.len(),
            limit: max_bytes,
        });
    }

    let data = std::fs::read(path)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mime = mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string();

    tracing::info!(path = %path.display(), bytes = data.len(), "file read for download");

    Ok(DownloadedFile {
        file_name,
        file_path: path.to_string_lossy().into_owned(),
        mime,
        data,
    })
}
