//! Filesystem access for paired devices: directory listing and file
//! download.
//!
//! Functions here are blocking; callers on the async runtime run them
//! through `spawn_blocking`.

mod browse;
mod download;

pub use browse::list_directory;
pub use download::{DownloadedFile, DEFAULT_MAX_DOWNLOAD_BYTES, read_for_download};

/// Default downloads directory name under `$HOME/Downloads`.
pub const DEFAULT_DOWNLOADS_DIR: &str = "deskbridge";

/// Errors produced by file operations.
#[derive(Debug, thiserror::Error)]
pub enum FileOpsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("path not found: {0}")]
    NotFound(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("not a file: {0}")]
    NotAFile(String),

    #[error("file too large: {size} bytes (limit {limit})")]
    TooLarge { size: u64, limit: u64 },
}

/// Resolves the default downloads directory.
///
/// Returns `$HOME/Downloads/deskbridge`, falling back to the temp directory
/// when no home is set.
pub fn default_downloads_dir() -> std::path::PathBuf {
    home_dir().join("Downloads").join(DEFAULT_DOWNLOADS_DIR)
}

/// Returns the user's home directory.
fn home_dir() -> std::path::PathBuf {
    #[cfg(windows)]
    let var = "USERPROFILE";
    #[cfg(not(windows))]
    let var = "HOME";

    std::env::var(var)
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| std::env::temp_dir())
}

/// Expands a leading `~` to the home directory.
pub fn expand_path(path: &str) -> std::path::PathBuf {
    match path.strip_prefix('~') {
        Some(rest) => home_dir().join(rest.trim_start_matches(['/', '\\'])),
        None => std::path::PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_path_home() {
        let expanded = expand_path("~/Downloads");
        assert!(expanded.ends_with("Downloads"));
        assert!(!expanded.to_string_lossy().starts_with('~'));
    }

    #[test]
    fn expand_path_absolute_untouched() {
        assert_eq!(expand_path("/srv/data"), std::path::PathBuf::from("/srv/data"));
    }

    #[test]
    fn default_downloads_dir_name() {
        assert!(default_downloads_dir().ends_with(DEFAULT_DOWNLOADS_DIR));
    }
}
