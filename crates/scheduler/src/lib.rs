//! Scheduler - reminders and coffee pairings
//!
//! This crate holds the bot's long-running behaviour:
//! - **Reminders** (`reminders`) - persisted one-shot reminders with timers, restart recovery and sweeping
//! - **Coffee pairing** (`coffee`) - member resolution, cooldown-aware pairing, notification and history
//! - **Leaderboard** (`leaderboard`) - member level lookups for the optional level filter
//! - **Trigger** (`trigger`) - cron schedule with an ISO-week cadence guard
//! - **Alerts** (`alerts`) - best-effort admin notifications
//! - **Service** (`service`) - the `BotCommandService` behind the slash commands
//!
//! # Architecture
//!
//! ```text
//! cron trigger ─┐
//!               ├→ CoffeeOrchestrator → pairing engine → PairingHistoryStore
//! /coffee-pair ─┘          ↓
//!                     DirectMessenger
//!
//! /remindme → ReminderService → ReminderStore (locked) → timers → DirectMessenger
//! ```

pub mod alerts;
pub mod coffee;
pub mod leaderboard;
pub mod reminders;
pub mod service;
pub mod trigger;

pub use alerts::OperatorAlerts;
pub use coffee::{
    CoffeeOrchestrator, PairingResult, PairingRunReport, PairingSettings, PairingSource, SkipReason,
};
pub use leaderboard::{LeaderboardError, LevelProvider, Mee6LeaderboardClient};
pub use reminders::{CreateOutcome, ReminderService, ReminderSettings, RescheduleReport, SweepReport};
pub use service::SchedulerCommandService;
pub use trigger::{spawn_pairing_job, PairingJob, PairingTrigger, TriggerError};
