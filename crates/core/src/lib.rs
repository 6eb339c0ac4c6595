pub mod clock;
pub mod config;
pub mod domain;
pub mod duration;
pub mod errors;
pub mod pairing;
pub mod retry;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AppConfig, ConfigError, LoadOptions, PairingCadence};
pub use domain::pairing::{PairingHistory, PairingHistoryEntry, PairingRecord, HISTORY_CAP};
pub use domain::participant::{Member, Participant, ParticipantId};
pub use domain::reminder::{Reminder, ReminderId};
pub use duration::{parse_duration, split_time_and_message, DurationParseError};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use pairing::{cooldown_violations, pair_up_with_cooldown, PairingGroup};
pub use retry::{retry_with_backoff, BackoffPolicy};
