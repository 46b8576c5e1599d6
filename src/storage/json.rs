//! Whole-file JSON persistence

use super::traits::StorageResult;
use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Read a JSON file, treating a missing or malformed file as the empty value.
pub fn read_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "snapshot missing, starting empty");
            return T::default();
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "snapshot unreadable, starting empty");
            return T::default();
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "snapshot malformed, starting empty");
            T::default()
        }
    }
}

/// Serialize `value` as pretty JSON and replace `path` with it.
pub fn write_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> StorageResult<()> {
    let body = serde_json::to_string_pretty(value)?;
    write_text_atomic(path, &body)
}

/// Replace `path` with `body` via a sibling temp file and a rename.
pub fn write_text_atomic(path: &Path, body: &str) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let tmp = temp_path(path);
    fs::write(&tmp, body)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
