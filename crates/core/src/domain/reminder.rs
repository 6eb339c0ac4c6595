use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReminderId(pub String);

impl ReminderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReminderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A one-shot delayed notification, persisted as `{ id, userId, msg, time }`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub id: ReminderId,
    pub user_id: String,
    pub msg: String,
    /// Absolute fire time in epoch milliseconds.
    pub time: i64,
}

impl Reminder {
    /// Same owner, same trimmed text, and fire times within `tolerance_ms`.
    pub fn is_duplicate_of(&self, other: &Reminder, tolerance_ms: i64) -> bool {
        self.user_id == other.user_id
            && self.msg.trim() == other.msg.trim()
            && self.time.abs_diff(other.time) <= tolerance_ms.unsigned_abs()
    }

    pub fn is_overdue(&self, now_ms: i64) -> bool {
        self.time <= now_ms
    }

    pub fn remaining_ms(&self, now_ms: i64) -> u64 {
        u64::try_from(self.time.saturating_sub(now_ms)).unwrap_or(0)
    }
}
