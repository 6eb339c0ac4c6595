use std::fs;
use std::path::{Path, PathBuf};

use crate::repositories::StoreError;

const PROBE_FILE: &str = ".brewbot-write-probe";

/// Creates `dir` (and parents) if it does not exist yet.
pub fn ensure_data_dir(dir: &Path) -> Result<PathBuf, StoreError> {
    fs::create_dir_all(dir).map_err(|source| StoreError::Io { path: dir.to_path_buf(), source })?;
    Ok(dir.to_path_buf())
}

/// Confirms the data directory accepts writes by creating and removing a
/// probe file.
pub fn probe_writable(dir: &Path) -> Result<(), StoreError> {
    ensure_data_dir(dir)?;
    let probe = dir.join(PROBE_FILE);
    fs::write(&probe, b"ok").map_err(|source| StoreError::Io { path: probe.clone(), source })?;
    fs::remove_file(&probe).map_err(|source| StoreError::Io { path: probe, source })
}

pub(crate) async fn ensure_parent_dir(file: &Path) -> Result<(), StoreError> {
    match file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| StoreError::Io { path: parent.to_path_buf(), source }),
        _ => Ok(()),
    }
}
