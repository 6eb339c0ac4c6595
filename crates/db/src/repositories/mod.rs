use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use brewbot_core::domain::pairing::PairingHistory;
use brewbot_core::domain::reminder::Reminder;
use brewbot_core::errors::ApplicationError;

use crate::lock::StoreLock;

pub mod memory;
pub mod pairing_history;
pub mod reminders;

pub use memory::{InMemoryPairingHistoryStore, InMemoryReminderStore};
pub use pairing_history::JsonPairingHistoryStore;
pub use reminders::JsonReminderStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store file `{path}` is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },
    #[error("i/o failure on `{path}`: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("could not serialize {what}: {source}")]
    Serialize { what: &'static str, source: serde_json::Error },
    #[error("could not acquire lock `{path}` after {attempts} attempts")]
    LockUnavailable { path: PathBuf, attempts: u32 },
}

impl From<StoreError> for ApplicationError {
    fn from(error: StoreError) -> Self {
        ApplicationError::Persistence(error.to_string())
    }
}

/// Persisted list of pending reminders.
///
/// `load` never fails: a missing or unreadable document reads as empty. Writers
/// that read-modify-write must hold the lock from [`ReminderStore::acquire_lock`]
/// across the whole sequence.
#[async_trait]
pub trait ReminderStore: Send + Sync {
    async fn load(&self) -> Vec<Reminder>;
    async fn save(&self, reminders: &[Reminder]) -> Result<(), StoreError>;
    async fn acquire_lock(&self) -> Result<StoreLock, StoreError>;
}

/// Persisted pairing history. Unlocked: concurrent writers from separate
/// processes can lose each other's updates.
#[async_trait]
pub trait PairingHistoryStore: Send + Sync {
    async fn load(&self) -> PairingHistory;
    async fn save(&self, history: &PairingHistory) -> Result<(), StoreError>;
}

pub(crate) fn log_corrupt(error: &StoreError) {
    tracing::warn!(event_name = "store.load.corrupt", error = %error, "treating store as empty");
}
