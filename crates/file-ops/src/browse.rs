//! Filesystem browser for the device's file picker.

use std::path::Path;

use deskbridge_protocol::FileEntry;

use crate::FileOpsError;

/// Lists the contents of a directory.
///
/// Returns files and directories, directories first, each group sorted
/// case-insensitively. Hidden entries (starting with `.`) are excluded.
/// Entries whose metadata cannot be read are skipped.
pub fn list_directory(path: &Path) -> Result<Vec<FileEntry>, FileOpsError> {
    let abs = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::fs::canonicalize(path)
            .map_err(|_| FileOpsError::NotFound(path.display().to_string()))?
    };

    if !abs.exists() {
        return Err(FileOpsError::NotFound(abs.display().to_string()));
    }
    if !abs.is_dir() {
        return Err(FileOpsError::NotADirectory(abs.display().to_string()));
    }

    let mut result: Vec<FileEntry> = std::fs::read_dir(&abs)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                return None;
            }
            let metadata = entry.metadata().ok()?;
            Some(FileEntry {
                path: abs.join(&name).to_string_lossy().to_string(),
                name,
                is_dir: metadata.is_dir(),
                size: if metadata.is_dir() { 0 } else { metadata.len() },
            })
        })
        .collect();

    result.sort_by(|a, b| {
        b.is_dir
            .cmp(&a.is_dir)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });

    tracing::debug!(path = %abs.display(), entries = result.len(), "listed directory");
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_directory_includes_files_and_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let base = tmp.path();

        std::fs::create_dir(base.join("alpha")).unwrap();
        std::fs::write(base.join("notes.txt"), "data").unwrap();
        std::fs::create_dir(base.join(".hidden")).unwrap();
        std::fs::write(base.join(".secret"), "x").unwrap();

        let entries = list_directory(base).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "alpha");
        assert!(entries[0].is_dir);
        assert_eq!(entries[0].size, 0);
        assert_eq!(entries[1].name, "notes.txt");
        assert!(!entries[1].is_dir);
        assert_eq!(entries[1].size, 4);
    }

    #[test]
    fn list_directory_dirs_first_then_case_insensitive() {
        let tmp = tempfile::tempdir().unwrap();
        let base = tmp.path();

        std::fs::write(base.join("apple.txt"), "").unwrap();
        std::fs::create_dir(base.join("Zebra")).unwrap();
        std::fs::create_dir(base.join("beta")).unwrap();
        std::fs::write(base.join("Banana.txt"), "").unwrap();

        let names: Vec<String> = list_directory(base)
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();

        assert_eq!(names, ["beta", "Zebra", "apple.txt", "Banana.txt"]);
    }

    #[test]
    fn list_directory_nonexistent() {
        let result = list_directory(Path::new("/definitely/not/real"));
        assert!(matches!(result, Err(FileOpsError::NotFound(_))));
    }

    #[test]
    fn list_directory_file_not_dir() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let result = list_directory(tmp.path());
        assert!(matches!(result, Err(FileOpsError::NotADirectory(_))));
    }

    #[test]
    fn list_directory_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let entries = list_directory(tmp.path()).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn entry_paths_are_absolute() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.txt"), "").unwrap();
        let entries = list_directory(tmp.path()).unwrap();
        assert!(Path::new(&entries[0].path).is_absolute());
    }
}
