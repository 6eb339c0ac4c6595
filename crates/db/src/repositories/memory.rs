use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use brewbot_core::domain::pairing::PairingHistory;
use brewbot_core::domain::reminder::Reminder;

use super::{PairingHistoryStore, ReminderStore, StoreError};
use crate::lock::StoreLock;

#[derive(Default)]
pub struct InMemoryReminderStore {
    reminders: RwLock<Vec<Reminder>>,
    lock: Arc<Mutex<()>>,
    lock_unavailable: AtomicBool,
    fail_saves: AtomicBool,
    saves: AtomicUsize,
}

impl InMemoryReminderStore {
    pub fn with_reminders(reminders: Vec<Reminder>) -> Self {
        Self { reminders: RwLock::new(reminders), ..Self::default() }
    }

    /// Makes `acquire_lock` fail so callers exercise their unlocked fallback.
    pub fn set_lock_unavailable(&self, unavailable: bool) {
        self.lock_unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub async fn snapshot(&self) -> Vec<Reminder> {
        self.reminders.read().await.clone()
    }
}

#[async_trait::async_trait]
impl ReminderStore for InMemoryReminderStore {
    async fn load(&self) -> Vec<Reminder> {
        self.reminders.read().await.clone()
    }

    async fn save(&self, reminders: &[Reminder]) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Io {
                path: PathBuf::from("memory://reminders"),
                source: std::io::Error::other("simulated write failure"),
            });
        }
        *self.reminders.write().await = reminders.to_vec();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn acquire_lock(&self) -> Result<StoreLock, StoreError> {
        if self.lock_unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::LockUnavailable {
                path: PathBuf::from("memory://reminders.lock"),
                attempts: 0,
            });
        }
        let guard = Arc::clone(&self.lock).lock_owned().await;
        Ok(StoreLock::in_memory(guard))
    }
}

#[derive(Default)]
pub struct InMemoryPairingHistoryStore {
    history: RwLock<PairingHistory>,
    fail_saves: AtomicBool,
    saves: AtomicUsize,
}

impl InMemoryPairingHistoryStore {
    pub fn with_history(history: PairingHistory) -> Self {
        Self { history: RwLock::new(history), ..Self::default() }
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub async fn snapshot(&self) -> PairingHistory {
        self.history.read().await.clone()
    }
}

#[async_trait::async_trait]
impl PairingHistoryStore for InMemoryPairingHistoryStore {
    async fn load(&self) -> PairingHistory {
        self.history.read().await.clone()
    }

    async fn save(&self, history: &PairingHistory) -> Result<(), StoreError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StoreError::Io {
                path: PathBuf::from("memory://pairing-history"),
                source: std::io::Error::other("simulated write failure"),
            });
        }
        *self.history.write().await = history.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
