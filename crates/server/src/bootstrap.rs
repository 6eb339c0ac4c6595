use std::sync::Arc;

use brewbot_chat::{
    command_dispatcher, CommandRouter, DirectMessenger, GatewayRunner, MembershipDirectory,
    NoopDirectMessenger, NoopGatewayTransport, NoopMembershipDirectory,
};
use brewbot_core::clock::{Clock, SystemClock};
use brewbot_core::config::{AppConfig, ConfigError};
use brewbot_core::retry::BackoffPolicy;
use tokio::task::JoinHandle;
use brewbot_db::{
    ensure_data_dir, JsonPairingHistoryStore, JsonReminderStore, LockOptions, StoreError,
};
use brewbot_scheduler::{
    CoffeeOrchestrator, LeaderboardError, Mee6LeaderboardClient, OperatorAlerts, PairingJob,
    PairingSettings, PairingTrigger, ReminderService, ReminderSettings, SchedulerCommandService,
    TriggerError,
};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

pub struct Application {
    pub config: AppConfig,
    pub instance_id: Uuid,
    pub reminders: ReminderService,
    /// False when no messenger was supplied and direct messages are refused.
    pub delivers_messages: bool,
    pub gateway: GatewayRunner,
    /// `None` when no guild is configured; scheduled pairings need one.
    pub pairing_job: Option<PairingJob>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("data directory is not usable: {0}")]
    Storage(#[from] StoreError),
    #[error(transparent)]
    Trigger(#[from] TriggerError),
    #[error("leaderboard client could not be built: {0}")]
    Leaderboard(#[from] LeaderboardError),
}

/// Platform collaborators the bot talks through. No concrete chat client ships
/// with the workspace, so the defaults see no members and send nothing.
pub struct Collaborators {
    pub directory: Arc<dyn MembershipDirectory>,
    pub messenger: Option<Arc<dyn DirectMessenger>>,
    pub clock: Arc<dyn Clock>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self { directory: Arc::new(NoopMembershipDirectory), messenger: None, clock: Arc::new(SystemClock) }
    }
}

impl Application {
    /// Re-arms persisted reminders and starts the sweeper. Without a messenger
    /// both are skipped: firing would remove reminders nobody received.
    pub async fn start_reminders(&self) -> Option<JoinHandle<()>> {
        if !self.delivers_messages {
            warn!(
                event_name = "system.server.reminders_disabled",
                correlation_id = %self.instance_id,
                "no messenger configured; persisted reminders are left untouched"
            );
            return None;
        }

        let recovered = self.reminders.reschedule_all().await;
        info!(
            event_name = "system.server.reminders_recovered",
            correlation_id = %self.instance_id,
            armed = recovered.armed,
            overdue = recovered.overdue,
            "persisted reminders re-armed"
        );
        Some(self.reminders.spawn_sweeper(self.config.reminders.sweep_interval()))
    }
}

pub async fn bootstrap_with_config(
    config: AppConfig,
    collaborators: Collaborators,
) -> Result<Application, BootstrapError> {
    let instance_id = Uuid::new_v4();
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = %instance_id,
        data_dir = %config.storage.data_dir.display(),
        "starting application bootstrap"
    );

    ensure_data_dir(&config.storage.data_dir)?;
    let Collaborators { directory, messenger, clock } = collaborators;
    let delivers_messages = messenger.is_some();
    let messenger: Arc<dyn DirectMessenger> =
        messenger.unwrap_or_else(|| Arc::new(NoopDirectMessenger));

    let alerts =
        Arc::new(OperatorAlerts::new(messenger.clone(), config.chat.admin_user_id.clone()));

    let reminder_store = JsonReminderStore::new(config.storage.reminders_path())
        .with_lock_options(LockOptions::from_config(&config.storage));
    let reminders = ReminderService::new(
        Arc::new(reminder_store),
        messenger.clone(),
        clock.clone(),
        alerts.clone(),
        ReminderSettings::from_config(&config.reminders),
    );

    let history_store =
        JsonPairingHistoryStore::new(config.storage.pairing_history_path()).with_clock(clock.clone());
    let mut orchestrator = CoffeeOrchestrator::new(
        directory,
        messenger.clone(),
        Arc::new(history_store),
        alerts.clone(),
        clock.clone(),
        PairingSettings::from_config(&config.coffee),
    );
    if config.coffee.min_level > 0 {
        let leaderboard = Mee6LeaderboardClient::new(config.coffee.leaderboard_base_url.clone())?;
        orchestrator = orchestrator.with_level_provider(Arc::new(leaderboard));
    }
    let coffee = Arc::new(orchestrator);

    let trigger = PairingTrigger::from_config(&config.coffee)?;
    let pairing_job = config.chat.guild_id.clone().map(|guild_id| PairingJob {
        trigger,
        orchestrator: coffee.clone(),
        alerts: alerts.clone(),
        guild_id,
        role: config.coffee.role_name.clone(),
    });

    let service = SchedulerCommandService::new(
        reminders.clone(),
        coffee,
        messenger,
        clock,
        alerts,
        config.coffee.role_name.clone(),
    )
    .with_default_guild_id(config.chat.guild_id.clone());
    let router = CommandRouter::new(service).with_allowed_user_ids(config.chat.allowed_user_ids.clone());
    let gateway = GatewayRunner::new(
        Arc::new(NoopGatewayTransport),
        command_dispatcher(router),
        BackoffPolicy::default(),
    );

    info!(
        event_name = "system.bootstrap.completed",
        correlation_id = %instance_id,
        scheduled_pairing = pairing_job.is_some(),
        delivers_messages,
        level_filter = config.coffee.min_level > 0,
        "application services constructed"
    );

    Ok(Application { config, instance_id, reminders, delivers_messages, gateway, pairing_job })
}
