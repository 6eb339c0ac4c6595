use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use brewbot_core::clock::{Clock, SystemClock};
use brewbot_core::domain::pairing::PairingHistory;

use super::{log_corrupt, PairingHistoryStore, StoreError};
use crate::data_dir::ensure_parent_dir;

/// Pairing history as a JSON object keyed by participant id. Legacy records are
/// upgraded in memory on every load and written back in the new shape on the
/// next save.
#[derive(Clone)]
pub struct JsonPairingHistoryStore {
    path: PathBuf,
    clock: Arc<dyn Clock>,
}

impl JsonPairingHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), clock: Arc::new(SystemClock) }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl PairingHistoryStore for JsonPairingHistoryStore {
    async fn load(&self) -> PairingHistory {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => return PairingHistory::new(),
            Err(source) => {
                log_corrupt(&StoreError::Io { path: self.path.clone(), source });
                return PairingHistory::new();
            }
        };
        if raw.trim().is_empty() {
            return PairingHistory::new();
        }

        let decoded = serde_json::from_str::<Value>(&raw)
            .map_err(|error| error.to_string())
            .and_then(|document| {
                PairingHistory::from_json(document, self.clock.now_ms())
                    .map_err(|error| error.to_string())
            });

        match decoded {
            Ok(history) => history,
            Err(reason) => {
                log_corrupt(&StoreError::Corrupt { path: self.path.clone(), reason });
                PairingHistory::new()
            }
        }
    }

    async fn save(&self, history: &PairingHistory) -> Result<(), StoreError> {
        ensure_parent_dir(&self.path).await?;
        let encoded = serde_json::to_string_pretty(history)
            .map_err(|source| StoreError::Serialize { what: "pairing history", source })?;
        tokio::fs::write(&self.path, encoded)
            .await
            .map_err(|source| StoreError::Io { path: self.path.clone(), source })
    }
}
