use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, Utc};
use croner::Cron;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use brewbot_core::config::{CoffeeConfig, PairingCadence};

use crate::alerts::OperatorAlerts;
use crate::coffee::{CoffeeOrchestrator, PairingRunReport, PairingSource, SkipReason};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TriggerError {
    #[error("invalid cron expression `{expression}`: {reason}")]
    InvalidCron { expression: String, reason: String },
}

/// Cron schedule plus an ISO-week cadence guard for scheduled pairings.
pub struct PairingTrigger {
    expression: String,
    cron: Cron,
    cadence: PairingCadence,
}

impl PairingTrigger {
    pub fn new(expression: &str, cadence: PairingCadence) -> Result<Self, TriggerError> {
        let cron = expression.parse::<Cron>().map_err(|error| TriggerError::InvalidCron {
            expression: expression.to_owned(),
            reason: error.to_string(),
        })?;
        Ok(Self { expression: expression.to_owned(), cron, cadence })
    }

    pub fn from_config(config: &CoffeeConfig) -> Result<Self, TriggerError> {
        Self::new(&config.cron, config.cadence)
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn cadence(&self) -> PairingCadence {
        self.cadence
    }

    /// First cron occurrence strictly after `after`, evaluated in UTC.
    pub fn next_occurrence(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.cron.find_next_occurrence(&after, false).ok()
    }

    pub fn allows(&self, at: DateTime<Utc>) -> bool {
        self.cadence.allows_iso_week(at.iso_week().week())
    }
}

/// A scheduled pairing for one guild and role.
pub struct PairingJob {
    pub trigger: PairingTrigger,
    pub orchestrator: Arc<CoffeeOrchestrator>,
    pub alerts: Arc<OperatorAlerts>,
    pub guild_id: String,
    pub role: String,
}

impl PairingJob {
    /// Runs the pairing for an occurrence at `at` unless the cadence skips
    /// that week. The outcome is forwarded to the operator channel.
    pub async fn run_at(&self, at: DateTime<Utc>) -> Option<PairingRunReport> {
        if !self.trigger.allows(at) {
            info!(
                event_name = "coffee.schedule.cadence_skip",
                guild_id = %self.guild_id,
                iso_week = at.iso_week().week(),
                cadence = self.trigger.cadence().as_str(),
                "scheduled pairing skipped this week"
            );
            return None;
        }

        let report =
            self.orchestrator.run_pairing(&self.guild_id, &self.role, PairingSource::Scheduled).await;
        self.alerts.notify(&scheduled_run_summary(&report)).await;
        Some(report)
    }
}

pub fn spawn_pairing_job(job: PairingJob) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            event_name = "coffee.schedule.started",
            guild_id = %job.guild_id,
            cron = job.trigger.expression(),
            cadence = job.trigger.cadence().as_str(),
            "scheduled coffee pairing job started"
        );

        loop {
            let now = Utc::now();
            let Some(next) = job.trigger.next_occurrence(now) else {
                warn!(
                    event_name = "coffee.schedule.exhausted",
                    cron = job.trigger.expression(),
                    "cron expression has no further occurrences; stopping job"
                );
                return;
            };

            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            tokio::time::sleep(wait).await;
            job.run_at(next).await;
        }
    })
}

pub fn scheduled_run_summary(report: &PairingRunReport) -> String {
    match report.skipped {
        Some(SkipReason::NotEnoughParticipants) => {
            "Scheduled coffee pairing skipped: not enough eligible members.".to_owned()
        }
        Some(SkipReason::LevelLookupFailed) => {
            "Scheduled coffee pairing aborted: member levels could not be checked.".to_owned()
        }
        Some(SkipReason::AlreadyRunning) => {
            "Scheduled coffee pairing skipped: another run was already in progress.".to_owned()
        }
        None => {
            let mut summary = format!("Scheduled coffee pairing created {} groups.", report.groups.len());
            if report.failed_notifications > 0 {
                summary.push_str(&format!(" {} DMs failed.", report.failed_notifications));
            }
            if !report.history_persisted {
                summary.push_str(" Pairing history was NOT saved.");
            }
            summary
        }
    }
}
