use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use brewbot_core::domain::reminder::Reminder;

use super::{log_corrupt, ReminderStore, StoreError};
use crate::data_dir::ensure_parent_dir;
use crate::lock::{LockOptions, StoreLock};

/// Reminders stored as a pretty-printed JSON array in a single file.
#[derive(Clone, Debug)]
pub struct JsonReminderStore {
    path: PathBuf,
    lock_options: LockOptions,
}

impl JsonReminderStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock_options: LockOptions::default() }
    }

    pub fn with_lock_options(mut self, lock_options: LockOptions) -> Self {
        self.lock_options = lock_options;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ReminderStore for JsonReminderStore {
    async fn load(&self) -> Vec<Reminder> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => return Vec::new(),
            Err(source) => {
                log_corrupt(&StoreError::Io { path: self.path.clone(), source });
                return Vec::new();
            }
        };

        match decode_reminders(&raw) {
            Ok(reminders) => reminders,
            Err(reason) => {
                log_corrupt(&StoreError::Corrupt { path: self.path.clone(), reason });
                Vec::new()
            }
        }
    }

    async fn save(&self, reminders: &[Reminder]) -> Result<(), StoreError> {
        ensure_parent_dir(&self.path).await?;
        let encoded = serde_json::to_string_pretty(reminders)
            .map_err(|source| StoreError::Serialize { what: "reminders", source })?;
        tokio::fs::write(&self.path, encoded)
            .await
            .map_err(|source| StoreError::Io { path: self.path.clone(), source })
    }

    async fn acquire_lock(&self) -> Result<StoreLock, StoreError> {
        StoreLock::acquire(&self.path, &self.lock_options).await
    }
}

fn decode_reminders(raw: &str) -> Result<Vec<Reminder>, String> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }

    let document: Value = serde_json::from_str(raw).map_err(|error| error.to_string())?;
    let Value::Array(items) = document else {
        return Err("expected a JSON array of reminders".to_owned());
    };

    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<Reminder>(item) {
            Ok(reminder) => Some(reminder),
            Err(error) => {
                warn!(
                    event_name = "store.reminders.entry_skipped",
                    error = %error,
                    "skipping malformed reminder entry"
                );
                None
            }
        })
        .collect())
}
