use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use brewbot_chat::commands::{BotCommandService, CancelTarget, CommandEnvelope, CommandRouteError};
use brewbot_chat::platform::DirectMessenger;
use brewbot_chat::replies::{self, Reply};
use brewbot_core::clock::Clock;
use brewbot_core::errors::{ApplicationError, DomainError};

use crate::alerts::OperatorAlerts;
use crate::coffee::{CoffeeOrchestrator, PairingSource, SkipReason};
use crate::reminders::{CreateOutcome, ReminderService};

/// Slash-command backend: turns parsed commands into reminder and pairing
/// operations and their user-facing replies.
pub struct SchedulerCommandService {
    reminders: ReminderService,
    coffee: Arc<CoffeeOrchestrator>,
    messenger: Arc<dyn DirectMessenger>,
    clock: Arc<dyn Clock>,
    alerts: Arc<OperatorAlerts>,
    role_name: String,
    default_guild_id: Option<String>,
}

impl SchedulerCommandService {
    pub fn new(
        reminders: ReminderService,
        coffee: Arc<CoffeeOrchestrator>,
        messenger: Arc<dyn DirectMessenger>,
        clock: Arc<dyn Clock>,
        alerts: Arc<OperatorAlerts>,
        role_name: impl Into<String>,
    ) -> Self {
        Self {
            reminders,
            coffee,
            messenger,
            clock,
            alerts,
            role_name: role_name.into(),
            default_guild_id: None,
        }
    }

    /// Guild used when a command arrives without one, e.g. from a DM.
    pub fn with_default_guild_id(mut self, guild_id: Option<String>) -> Self {
        self.default_guild_id = guild_id;
        self
    }

    fn guild_for<'a>(&'a self, envelope: &'a CommandEnvelope) -> Option<&'a str> {
        envelope.guild_id.as_deref().or(self.default_guild_id.as_deref())
    }
}

#[async_trait]
impl BotCommandService for SchedulerCommandService {
    async fn remind_me(
        &self,
        time: &str,
        message: &str,
        envelope: &CommandEnvelope,
    ) -> Result<Reply, CommandRouteError> {
        let reply = match self.reminders.create(&envelope.user_id, time, message).await {
            Ok(CreateOutcome::Created(reminder)) => replies::reminder_set(time, reminder.id.as_str()),
            Ok(CreateOutcome::Duplicate(existing)) => replies::duplicate_reminder(existing.id.as_str()),
            Err(ApplicationError::Domain(DomainError::InvalidDuration(_))) => {
                replies::invalid_time_format()
            }
            Err(ApplicationError::Domain(DomainError::EmptyReminderMessage)) => {
                replies::empty_reminder_message()
            }
            Err(error) => {
                self.alerts.report_error("Failed to schedule reminder", &error).await;
                replies::reminder_failed()
            }
        };
        Ok(reply)
    }

    async fn cancel_reminder(
        &self,
        target: &CancelTarget,
        envelope: &CommandEnvelope,
    ) -> Result<Reply, CommandRouteError> {
        let reply = match (self.reminders.cancel(&envelope.user_id, target).await, target) {
            (Ok(count), CancelTarget::All) => replies::canceled_all(count),
            (Ok(0), CancelTarget::Id(id)) => replies::reminder_not_found(id),
            (Ok(_), CancelTarget::Id(id)) => replies::reminder_canceled(id),
            (Err(error), _) => {
                warn!(
                    event_name = "reminder.cancel.failed",
                    user_id = %envelope.user_id,
                    correlation_id = %envelope.request_id,
                    error = %error,
                    "cancel failed"
                );
                replies::cancel_failed()
            }
        };
        Ok(reply)
    }

    async fn list_reminders(&self, envelope: &CommandEnvelope) -> Result<Reply, CommandRouteError> {
        let reminders = self.reminders.list(&envelope.user_id).await;
        if reminders.is_empty() {
            return Ok(replies::no_pending_reminders());
        }

        let text = replies::reminder_list_text(&reminders, self.clock.now_ms());
        match self.messenger.send_direct_message(&envelope.user_id, &text).await {
            Ok(()) => Ok(replies::reminder_list_sent()),
            Err(error) => {
                warn!(
                    event_name = "reminder.list.dm_failed",
                    user_id = %envelope.user_id,
                    correlation_id = %envelope.request_id,
                    error = %error,
                    "could not DM reminder list"
                );
                Ok(replies::reminder_list_dm_failed())
            }
        }
    }

    async fn coffee_pair(&self, envelope: &CommandEnvelope) -> Result<Reply, CommandRouteError> {
        let Some(guild_id) = self.guild_for(envelope) else {
            return Ok(replies::guild_only());
        };

        let report = self.coffee.run_pairing(guild_id, &self.role_name, PairingSource::Manual).await;
        Ok(match report.skipped {
            Some(SkipReason::NotEnoughParticipants) => replies::no_pairings(),
            Some(SkipReason::LevelLookupFailed) => replies::pairing_level_lookup_failed(),
            Some(SkipReason::AlreadyRunning) => replies::pairing_already_running(),
            None => replies::paired_groups(report.groups.len(), report.failed_notifications),
        })
    }

    async fn coffee_list(&self, envelope: &CommandEnvelope) -> Result<Reply, CommandRouteError> {
        let Some(guild_id) = self.guild_for(envelope) else {
            return Ok(replies::guild_only());
        };

        let participants = self.coffee.list_eligible(guild_id, &self.role_name).await;
        Ok(replies::coffee_list(&self.role_name, &participants))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use brewbot_chat::commands::{
        BotCommand, BotCommandService, CancelTarget, CommandEnvelope, CommandRouter,
    };
    use brewbot_chat::platform::{ChatError, MembershipDirectory};
    use brewbot_chat::replies;
    use brewbot_core::clock::ManualClock;
    use brewbot_core::domain::participant::{Member, Participant};
    use brewbot_db::repositories::{InMemoryPairingHistoryStore, InMemoryReminderStore};

    use super::SchedulerCommandService;
    use crate::alerts::testing::RecordingMessenger;
    use crate::alerts::OperatorAlerts;
    use crate::coffee::{CoffeeOrchestrator, PairingSettings};
    use crate::reminders::{ReminderService, ReminderSettings};

    const NOW: i64 = 1_700_000_000_000;

    struct StaticDirectory(Vec<Member>);

    #[async_trait]
    impl MembershipDirectory for StaticDirectory {
        async fn fetch_members_with_role(&self, _guild_id: &str, _role: &str) -> Result<Vec<Member>, ChatError> {
            Ok(self.0.clone())
        }

        async fn cached_members_with_role(&self, _guild_id: &str, _role: &str) -> Vec<Member> {
            self.0.clone()
        }
    }

    struct Harness {
        service: SchedulerCommandService,
        messenger: Arc<RecordingMessenger>,
        store: Arc<InMemoryReminderStore>,
    }

    fn harness(members: Vec<Member>, messenger: RecordingMessenger) -> Harness {
        let messenger = Arc::new(messenger);
        let store = Arc::new(InMemoryReminderStore::default());
        let clock = Arc::new(ManualClock::new(NOW));
        let alerts = Arc::new(OperatorAlerts::disabled());
        let reminders = ReminderService::new(
            store.clone(),
            messenger.clone(),
            clock.clone(),
            alerts.clone(),
            ReminderSettings::default(),
        );
        let coffee = CoffeeOrchestrator::new(
            Arc::new(StaticDirectory(members)),
            messenger.clone(),
            Arc::new(InMemoryPairingHistoryStore::default()),
            alerts.clone(),
            clock.clone(),
            PairingSettings { dm_delay: std::time::Duration::ZERO, ..PairingSettings::default() },
        )
        .with_rng_seed(1);
        let service = SchedulerCommandService::new(
            reminders,
            Arc::new(coffee),
            messenger.clone(),
            clock,
            alerts,
            "coffee chat",
        );
        Harness { service, messenger, store }
    }

    fn envelope(command: BotCommand, guild_id: Option<&str>) -> CommandEnvelope {
        CommandEnvelope {
            command,
            guild_id: guild_id.map(str::to_owned),
            channel_id: "C1".to_owned(),
            user_id: "U1".to_owned(),
            request_id: "req-1".to_owned(),
        }
    }

    fn remind(time: &str, message: &str) -> CommandEnvelope {
        envelope(BotCommand::RemindMe { time: time.to_owned(), message: message.to_owned() }, Some("G1"))
    }

    #[tokio::test(start_paused = true)]
    async fn remindme_replies_cover_success_duplicate_and_bad_input() {
        let h = harness(Vec::new(), RecordingMessenger::default());

        let reply = h.service.remind_me("2 days", "call mom", &remind("2 days", "call mom")).await.expect("reply");
        assert_eq!(reply, replies::reminder_set("2 days", &NOW.to_string()));

        let reply = h.service.remind_me("2 days", "call mom", &remind("2 days", "call mom")).await.expect("reply");
        assert_eq!(reply, replies::duplicate_reminder(&NOW.to_string()));

        let reply = h.service.remind_me("whenever", "x", &remind("whenever", "x")).await.expect("reply");
        assert_eq!(reply, replies::invalid_time_format());

        h.store.set_fail_saves(true);
        let reply = h.service.remind_me("1h", "new", &remind("1h", "new")).await.expect("reply");
        assert_eq!(reply, replies::reminder_failed());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_replies_distinguish_missing_and_removed() {
        let h = harness(Vec::new(), RecordingMessenger::default());
        h.service.remind_me("1h", "tea", &remind("1h", "tea")).await.expect("create");

        let missing = CancelTarget::Id("nope".to_owned());
        let cancel = envelope(BotCommand::CancelReminder { target: missing.clone() }, Some("G1"));
        assert_eq!(
            h.service.cancel_reminder(&missing, &cancel).await.expect("reply"),
            replies::reminder_not_found("nope")
        );

        let existing = CancelTarget::Id(NOW.to_string());
        assert_eq!(
            h.service.cancel_reminder(&existing, &cancel).await.expect("reply"),
            replies::reminder_canceled(&NOW.to_string())
        );

        assert_eq!(
            h.service.cancel_reminder(&CancelTarget::All, &cancel).await.expect("reply"),
            replies::canceled_all(0)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn listreminders_sends_the_list_by_dm() {
        let h = harness(Vec::new(), RecordingMessenger::default());
        let list = envelope(BotCommand::ListReminders, Some("G1"));

        assert_eq!(h.service.list_reminders(&list).await.expect("reply"), replies::no_pending_reminders());

        h.service.remind_me("10m", "stretch", &remind("10m", "stretch")).await.expect("create");
        assert_eq!(h.service.list_reminders(&list).await.expect("reply"), replies::reminder_list_sent());

        let dms = h.messenger.sent_to("U1").await;
        assert_eq!(dms.len(), 1);
        assert!(dms[0].contains("stretch (in ~10 min)"));
    }

    #[tokio::test(start_paused = true)]
    async fn listreminders_reports_closed_dms() {
        let h = harness(Vec::new(), RecordingMessenger::failing_for(&["U1"]));
        h.service.remind_me("10m", "stretch", &remind("10m", "stretch")).await.expect("create");

        let list = envelope(BotCommand::ListReminders, Some("G1"));
        assert_eq!(
            h.service.list_reminders(&list).await.expect("reply"),
            replies::reminder_list_dm_failed()
        );
    }

    #[tokio::test]
    async fn coffee_commands_report_pairing_outcomes() {
        let members = vec![Member::new("1", "ada"), Member::new("2", "bea")];
        let h = harness(members, RecordingMessenger::default());

        let pair = envelope(BotCommand::CoffeePair, Some("G1"));
        assert_eq!(h.service.coffee_pair(&pair).await.expect("reply"), replies::paired_groups(1, 0));

        let list = envelope(BotCommand::CoffeeList, Some("G1"));
        assert_eq!(
            h.service.coffee_list(&list).await.expect("reply"),
            replies::coffee_list(
                "coffee chat",
                &[Participant::new("1", "ada"), Participant::new("2", "bea")]
            )
        );

        let dm = envelope(BotCommand::CoffeePair, None);
        assert_eq!(h.service.coffee_pair(&dm).await.expect("reply"), replies::guild_only());
    }

    #[tokio::test]
    async fn router_enforces_admin_list_before_pairing() {
        let h = harness(vec![Member::new("1", "ada"), Member::new("2", "bea")], RecordingMessenger::default());
        let router = CommandRouter::new(h.service).with_allowed_user_ids(vec!["ADMIN".to_owned()]);

        let reply = router.route(envelope(BotCommand::CoffeePair, Some("G1"))).await.expect("route");
        assert_eq!(reply.content, "❌ You don't have permission to run this command.");
        assert!(h.messenger.sent().await.is_empty());
    }
}
