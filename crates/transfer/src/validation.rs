use std::path::{Component, Path};

use crate::TransferError;

/// Reduces a device-supplied name to a bare file name.
///
/// Directory parts are dropped (`../../etc/passwd` becomes `passwd`,
/// `C:\docs\a.txt` becomes `a.txt`) so uploads always land directly in the
/// downloads directory. Rejects names with no usable final component.
pub fn sanitize_file_name(name: &str) -> Result<String, TransferError> {
    // Treat backslashes as separators regardless of host platform.
    let unified = name.trim().replace('\\', "/");
    if unified.is_empty() {
        return Err(TransferError::InvalidName("empty name".into()));
    }

    let last = match Path::new(&unified).components().last() {
        Some(Component::Normal(part)) => part,
        _ => return Err(TransferError::InvalidName(name.to_string())),
    };

    let last = last.to_string_lossy();
    // Drive prefixes such as `C:` survive as a plain component on Unix.
    let cleaned = match last.rsplit_once(':') {
        Some((_, rest)) => rest.to_string(),
        None => last.into_owned(),
    };

    if cleaned.is_empty() || cleaned == "." || cleaned == ".." || cleaned.contains('\0') {
        return Err(TransferError::InvalidName(name.to_string()));
    }

    Ok(cleaned)
}
