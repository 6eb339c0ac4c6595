use brewbot_core::clock::{Clock, SystemClock};
use brewbot_core::config::{AppConfig, LoadOptions};
use brewbot_core::domain::reminder::Reminder;
use brewbot_db::{JsonReminderStore, ReminderStore};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::json;

use super::{block_on, CommandResult, EXIT_CONFIG, EXIT_RUNTIME};

const COMMAND: &str = "reminders";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReminderView {
    id: String,
    user_id: String,
    msg: String,
    time: i64,
    due_at: Option<String>,
    overdue: bool,
}

pub fn run(options: LoadOptions, user: Option<&str>) -> CommandResult {
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(COMMAND, "config_validation", error.to_string(), EXIT_CONFIG)
        }
    };

    let store = JsonReminderStore::new(config.storage.reminders_path());
    match block_on(store.load()) {
        Ok(reminders) => {
            let views = select(reminders, user, SystemClock.now_ms());
            CommandResult::data(
                COMMAND,
                json!({
                    "path": store.path().display().to_string(),
                    "user": user,
                    "count": views.len(),
                    "reminders": views,
                }),
            )
        }
        Err(error) => CommandResult::failure(COMMAND, "runtime", format!("{error:#}"), EXIT_RUNTIME),
    }
}

/// Filters to `user` when given and orders by fire time, soonest first.
fn select(reminders: Vec<Reminder>, user: Option<&str>, now_ms: i64) -> Vec<ReminderView> {
    let mut selected: Vec<Reminder> = reminders
        .into_iter()
        .filter(|reminder| user.map_or(true, |user| reminder.user_id == user))
        .collect();
    selected.sort_by(|a, b| a.time.cmp(&b.time).then_with(|| a.id.cmp(&b.id)));

    selected
        .into_iter()
        .map(|reminder| ReminderView {
            due_at: format_millis(reminder.time),
            overdue: reminder.is_overdue(now_ms),
            id: reminder.id.0,
            user_id: reminder.user_id,
            msg: reminder.msg,
            time: reminder.time,
        })
        .collect()
}

fn format_millis(ms: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|at| at.to_rfc3339_opts(SecondsFormat::Secs, true))
}
