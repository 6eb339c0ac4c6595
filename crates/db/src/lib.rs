pub mod data_dir;
pub mod lock;
pub mod repositories;

pub use data_dir::{ensure_data_dir, probe_writable};
pub use lock::{lock_path_for, with_lock, LockOptions, StoreLock};
pub use repositories::{
    InMemoryPairingHistoryStore, InMemoryReminderStore, JsonPairingHistoryStore,
    JsonReminderStore, PairingHistoryStore, ReminderStore, StoreError,
};
