use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::TransferError;
use crate::validation::sanitize_file_name;

/// Upper bound on `_N` suffixes tried before giving up on a name.
pub const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Writes completed uploads into the downloads directory.
#[derive(Debug, Clone)]
pub struct FileAssembler {
    downloads_dir: PathBuf,
}

impl FileAssembler {
    pub fn new(downloads_dir: impl Into<PathBuf>) -> Self {
        Self {
            downloads_dir: downloads_dir.into(),
        }
    }

    pub fn downloads_dir(&self) -> &Path {
        &self.downloads_dir
    }

    /// Persists `data` under `name`, returning the path written.
    ///
    /// When the name is taken, `_1`, `_2`, ... is inserted before the
    /// extension. Files are created with `create_new`, so two concurrent
    /// uploads of the same name never overwrite each other.
    pub fn persist(&self, name: &str, data: &[u8]) -> Result<PathBuf, TransferError> {
        let file_name = sanitize_file_name(name)?;
        std::fs::create_dir_all(&self.downloads_dir)?;

        for attempt in 0..=MAX_NAME_ATTEMPTS {
            let candidate = self.downloads_dir.join(candidate_name(&file_name, attempt));
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&candidate)
            {
                Ok(mut file) => {
                    file.write_all(data)?;
                    file.sync_all()?;
                    tracing::info!(path = %candidate.display(), bytes = data.len(), "file saved");
                    return Ok(candidate);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(TransferError::NameExhausted(file_name))
    }
}

/// `report.txt` → `report_3.txt` for attempt 3; attempt 0 is the name itself.
fn candidate_name(file_name: &str, attempt: u32) -> String {
    if attempt == 0 {
        return file_name.to_string();
    }
    let path = Path::new(file_name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string());
    match path.extension() {
        Some(ext) => format!("{stem}_{attempt}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{attempt}"),
    }
}
