use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use brewbot_core::duration::split_time_and_message;
use brewbot_core::errors::ApplicationError;

use crate::replies::{self, Reply};

/// Raw slash-command invocation as delivered by the gateway. Named options are
/// used when the platform provides them; otherwise arguments come from `text`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SlashCommandPayload {
    pub command: String,
    pub text: String,
    pub options: BTreeMap<String, String>,
    pub guild_id: Option<String>,
    pub channel_id: String,
    pub user_id: String,
    pub request_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CancelTarget {
    All,
    Id(String),
}

impl CancelTarget {
    /// `all` in any case selects every reminder; anything else is an exact id.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("all") {
            Self::All
        } else {
            Self::Id(trimmed.to_owned())
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BotCommand {
    RemindMe { time: String, message: String },
    CancelReminder { target: CancelTarget },
    ListReminders,
    CoffeePair,
    CoffeeList,
    Help,
}

impl BotCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::RemindMe { .. } => "remindme",
            Self::CancelReminder { .. } => "cancelreminder",
            Self::ListReminders => "listreminders",
            Self::CoffeePair => "coffee-pair",
            Self::CoffeeList => "coffee-list",
            Self::Help => "help",
        }
    }

    pub fn requires_admin(&self) -> bool {
        matches!(self, Self::CoffeePair | Self::CoffeeList)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandEnvelope {
    pub command: BotCommand,
    pub guild_id: Option<String>,
    pub channel_id: String,
    pub user_id: String,
    pub request_id: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandParseError {
    #[error("unsupported slash command: {0}")]
    UnsupportedCommand(String),
    #[error("`/{command}` is missing `{argument}`")]
    MissingArgument { command: &'static str, argument: &'static str, usage: &'static str },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandRouteError {
    #[error("command service failed: {0}")]
    Service(String),
}

pub fn normalize_command(payload: SlashCommandPayload) -> Result<CommandEnvelope, CommandParseError> {
    let name = payload.command.trim().trim_start_matches('/').to_ascii_lowercase();
    let command = match name.as_str() {
        "remindme" => parse_remind_me(&payload)?,
        "cancelreminder" => {
            let raw = option_or_text(&payload, "id");
            if raw.is_empty() {
                return Err(CommandParseError::MissingArgument {
                    command: "cancelreminder",
                    argument: "id",
                    usage: "<id|all>",
                });
            }
            BotCommand::CancelReminder { target: CancelTarget::parse(&raw) }
        }
        "listreminders" => BotCommand::ListReminders,
        "coffee-pair" | "paircoffee" => BotCommand::CoffeePair,
        "coffee-list" => BotCommand::CoffeeList,
        "help" => BotCommand::Help,
        _ => return Err(CommandParseError::UnsupportedCommand(payload.command)),
    };

    Ok(CommandEnvelope {
        command,
        guild_id: payload.guild_id,
        channel_id: payload.channel_id,
        user_id: payload.user_id,
        request_id: payload.request_id,
    })
}

fn parse_remind_me(payload: &SlashCommandPayload) -> Result<BotCommand, CommandParseError> {
    let missing = |argument: &'static str| CommandParseError::MissingArgument {
        command: "remindme",
        argument,
        usage: "<time> <message>",
    };

    let (time, message) = match (payload.options.get("time"), payload.options.get("message")) {
        (Some(time), Some(message)) => (time.trim().to_owned(), message.trim().to_owned()),
        _ => {
            let tokens: Vec<&str> = payload.text.split_whitespace().collect();
            split_time_and_message(&tokens)
        }
    };

    if time.is_empty() {
        return Err(missing("time"));
    }
    if message.is_empty() {
        return Err(missing("message"));
    }
    Ok(BotCommand::RemindMe { time, message })
}

fn option_or_text(payload: &SlashCommandPayload, option: &str) -> String {
    payload
        .options
        .get(option)
        .map(|value| value.trim().to_owned())
        .unwrap_or_else(|| payload.text.trim().to_owned())
}

/// Routes parsed commands to the service, enforcing the admin allow-list.
pub struct CommandRouter<S> {
    service: S,
    allowed_user_ids: Vec<String>,
}

impl<S> CommandRouter<S>
where
    S: BotCommandService,
{
    pub fn new(service: S) -> Self {
        Self { service, allowed_user_ids: Vec::new() }
    }

    /// Restricts admin commands to `allowed_user_ids`. An empty list leaves
    /// them open to everyone.
    pub fn with_allowed_user_ids(mut self, allowed_user_ids: Vec<String>) -> Self {
        self.allowed_user_ids = allowed_user_ids;
        self
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub async fn route(&self, envelope: CommandEnvelope) -> Result<Reply, CommandRouteError> {
        if envelope.command.requires_admin() && !self.is_allowed(&envelope.user_id) {
            let refusal = ApplicationError::PermissionDenied(format!(
                "{} is not allowed to run /{}",
                envelope.user_id,
                envelope.command.name()
            ))
            .into_interface(envelope.request_id.as_str());
            warn!(
                event_name = "ingress.command.permission_denied",
                command = envelope.command.name(),
                user_id = %envelope.user_id,
                correlation_id = %envelope.request_id,
                error = %refusal,
                "admin command refused"
            );
            return Ok(replies::interface_error(&refusal));
        }

        match &envelope.command {
            BotCommand::RemindMe { time, message } => {
                self.service.remind_me(time, message, &envelope).await
            }
            BotCommand::CancelReminder { target } => {
                self.service.cancel_reminder(target, &envelope).await
            }
            BotCommand::ListReminders => self.service.list_reminders(&envelope).await,
            BotCommand::CoffeePair => self.service.coffee_pair(&envelope).await,
            BotCommand::CoffeeList => self.service.coffee_list(&envelope).await,
            BotCommand::Help => Ok(replies::help_message()),
        }
    }

    fn is_allowed(&self, user_id: &str) -> bool {
        self.allowed_user_ids.is_empty() || self.allowed_user_ids.iter().any(|id| id == user_id)
    }
}

#[async_trait]
pub trait BotCommandService: Send + Sync {
    async fn remind_me(
        &self,
        time: &str,
        message: &str,
        envelope: &CommandEnvelope,
    ) -> Result<Reply, CommandRouteError>;

    async fn cancel_reminder(
        &self,
        target: &CancelTarget,
        envelope: &CommandEnvelope,
    ) -> Result<Reply, CommandRouteError>;

    async fn list_reminders(&self, envelope: &CommandEnvelope) -> Result<Reply, CommandRouteError>;

    async fn coffee_pair(&self, envelope: &CommandEnvelope) -> Result<Reply, CommandRouteError>;

    async fn coffee_list(&self, envelope: &CommandEnvelope) -> Result<Reply, CommandRouteError>;
}

/// Answers every command without side effects; used before the real services
/// are wired in.
#[derive(Default)]
pub struct NoopBotCommandService;

#[async_trait]
impl BotCommandService for NoopBotCommandService {
    async fn remind_me(
        &self,
        time: &str,
        _message: &str,
        envelope: &CommandEnvelope,
    ) -> Result<Reply, CommandRouteError> {
        Ok(replies::reminder_set(time, &envelope.request_id))
    }

    async fn cancel_reminder(
        &self,
        target: &CancelTarget,
        _envelope: &CommandEnvelope,
    ) -> Result<Reply, CommandRouteError> {
        Ok(match target {
            CancelTarget::All => replies::canceled_all(0),
            CancelTarget::Id(id) => replies::reminder_not_found(id),
        })
    }

    async fn list_reminders(&self, _envelope: &CommandEnvelope) -> Result<Reply, CommandRouteError> {
        Ok(replies::no_pending_reminders())
    }

    async fn coffee_pair(&self, _envelope: &CommandEnvelope) -> Result<Reply, CommandRouteError> {
        Ok(replies::no_pairings())
    }

    async fn coffee_list(&self, _envelope: &CommandEnvelope) -> Result<Reply, CommandRouteError> {
        Ok(replies::coffee_list("coffee chat", &[]))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use super::{
        normalize_command, BotCommand, BotCommandService, CancelTarget, CommandEnvelope,
        CommandParseError, CommandRouteError, CommandRouter, NoopBotCommandService,
        SlashCommandPayload,
    };
    use crate::replies::{self, Reply};

    fn payload(command: &str, text: &str) -> SlashCommandPayload {
        SlashCommandPayload {
            command: command.to_owned(),
            text: text.to_owned(),
            channel_id: "C1".to_owned(),
            user_id: "U1".to_owned(),
            request_id: "req-1".to_owned(),
            ..SlashCommandPayload::default()
        }
    }

    fn envelope(command: BotCommand, user_id: &str) -> CommandEnvelope {
        CommandEnvelope {
            command,
            guild_id: Some("G1".to_owned()),
            channel_id: "C1".to_owned(),
            user_id: user_id.to_owned(),
            request_id: format!("req-{user_id}"),
        }
    }

    #[test]
    fn remindme_splits_free_text_into_time_and_message() {
        let parsed = normalize_command(payload("/remindme", "2 days 3h call mom")).expect("parse");
        assert_eq!(
            parsed.command,
            BotCommand::RemindMe { time: "2 days 3h".to_owned(), message: "call mom".to_owned() }
        );
    }

    #[test]
    fn remindme_prefers_named_options() {
        let mut raw = payload("remindme", "ignored");
        raw.options = BTreeMap::from([
            ("time".to_owned(), " 10m ".to_owned()),
            ("message".to_owned(), "tea".to_owned()),
        ]);

        let parsed = normalize_command(raw).expect("parse");
        assert_eq!(
            parsed.command,
            BotCommand::RemindMe { time: "10m".to_owned(), message: "tea".to_owned() }
        );
    }

    #[test]
    fn remindme_without_message_reports_missing_argument() {
        let error = normalize_command(payload("/remindme", "10m")).expect_err("missing message");
        assert!(matches!(error, CommandParseError::MissingArgument { argument: "message", .. }));

        let error = normalize_command(payload("/remindme", "call mom")).expect_err("missing time");
        assert!(matches!(error, CommandParseError::MissingArgument { argument: "time", .. }));
    }

    #[test]
    fn cancel_target_all_is_case_insensitive_but_ids_are_exact() {
        assert_eq!(CancelTarget::parse("ALL"), CancelTarget::All);
        assert_eq!(CancelTarget::parse(" 17000 "), CancelTarget::Id("17000".to_owned()));

        let parsed = normalize_command(payload("/cancelreminder", "Abc")).expect("parse");
        assert_eq!(parsed.command, BotCommand::CancelReminder { target: CancelTarget::Id("Abc".to_owned()) });
    }

    #[test]
    fn unknown_commands_are_rejected() {
        let error = normalize_command(payload("/weather", "new")).expect_err("unsupported");
        assert_eq!(error, CommandParseError::UnsupportedCommand("/weather".to_owned()));
    }

    #[tokio::test]
    async fn admin_commands_respect_allow_list() {
        let router = CommandRouter::new(NoopBotCommandService)
            .with_allowed_user_ids(vec!["U-admin".to_owned()]);

        let denied = router.route(envelope(BotCommand::CoffeePair, "U-other")).await.expect("route");
        assert_eq!(denied, Reply::ephemeral("❌ You don't have permission to run this command."));

        let allowed = router.route(envelope(BotCommand::CoffeePair, "U-admin")).await.expect("route");
        assert_eq!(allowed, replies::no_pairings());

        let open = router.route(envelope(BotCommand::ListReminders, "U-other")).await.expect("route");
        assert_eq!(open, replies::no_pending_reminders());
    }

    #[tokio::test]
    async fn router_calls_service_entrypoints() {
        #[derive(Default)]
        struct RecordingService {
            calls: Mutex<Vec<&'static str>>,
        }

        #[async_trait::async_trait]
        impl BotCommandService for RecordingService {
            async fn remind_me(
                &self,
                _time: &str,
                _message: &str,
                _envelope: &CommandEnvelope,
            ) -> Result<Reply, CommandRouteError> {
                self.calls.lock().expect("lock").push("remindme");
                Ok(Reply::ephemeral("ok"))
            }

            async fn cancel_reminder(
                &self,
                _target: &CancelTarget,
                _envelope: &CommandEnvelope,
            ) -> Result<Reply, CommandRouteError> {
                self.calls.lock().expect("lock").push("cancelreminder");
                Ok(Reply::ephemeral("ok"))
            }

            async fn list_reminders(
                &self,
                _envelope: &CommandEnvelope,
            ) -> Result<Reply, CommandRouteError> {
                self.calls.lock().expect("lock").push("listreminders");
                Ok(Reply::ephemeral("ok"))
            }

            async fn coffee_pair(
                &self,
                _envelope: &CommandEnvelope,
            ) -> Result<Reply, CommandRouteError> {
                self.calls.lock().expect("lock").push("coffee-pair");
                Ok(Reply::ephemeral("ok"))
            }

            async fn coffee_list(
                &self,
                _envelope: &CommandEnvelope,
            ) -> Result<Reply, CommandRouteError> {
                self.calls.lock().expect("lock").push("coffee-list");
                Ok(Reply::ephemeral("ok"))
            }
        }

        let router = CommandRouter::new(RecordingService::default());
        for command in [
            BotCommand::RemindMe { time: "1h".to_owned(), message: "x".to_owned() },
            BotCommand::CancelReminder { target: CancelTarget::All },
            BotCommand::ListReminders,
            BotCommand::CoffeePair,
            BotCommand::CoffeeList,
            BotCommand::Help,
        ] {
            router.route(envelope(command, "U1")).await.expect("route");
        }

        let calls = router.service().calls.lock().expect("lock");
        assert_eq!(
            &*calls,
            &["remindme", "cancelreminder", "listreminders", "coffee-pair", "coffee-list"]
        );
    }
}
