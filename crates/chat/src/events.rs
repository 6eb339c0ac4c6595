use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;

use crate::{
    commands::{
        normalize_command, BotCommandService, CommandParseError, CommandRouteError, CommandRouter,
        NoopBotCommandService, SlashCommandPayload,
    },
    replies::{self, Reply},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayEnvelope {
    pub envelope_id: String,
    pub event: GatewayEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GatewayEvent {
    SlashCommand(SlashCommandPayload),
    Ready { session_id: String },
    Unsupported { event_type: String },
}

impl GatewayEvent {
    pub fn event_type(&self) -> GatewayEventType {
        match self {
            Self::SlashCommand(_) => GatewayEventType::SlashCommand,
            Self::Ready { .. } => GatewayEventType::Ready,
            Self::Unsupported { .. } => GatewayEventType::Unsupported,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GatewayEventType {
    SlashCommand,
    Ready,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(Reply),
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error(transparent)]
    Parse(#[from] CommandParseError),
    #[error(transparent)]
    Route(#[from] CommandRouteError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> GatewayEventType;
    async fn handle(
        &self,
        envelope: &GatewayEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<GatewayEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &GatewayEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

pub fn default_dispatcher() -> EventDispatcher {
    command_dispatcher(CommandRouter::new(NoopBotCommandService))
}

/// Dispatcher with the slash-command and ready handlers registered.
pub fn command_dispatcher<S>(router: CommandRouter<S>) -> EventDispatcher
where
    S: BotCommandService + 'static,
{
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(SlashCommandHandler::from_router(router));
    dispatcher.register(ReadyHandler);
    dispatcher
}

pub struct SlashCommandHandler<S> {
    router: CommandRouter<S>,
}

impl<S> SlashCommandHandler<S>
where
    S: BotCommandService,
{
    pub fn new(service: S) -> Self {
        Self { router: CommandRouter::new(service) }
    }

    pub fn from_router(router: CommandRouter<S>) -> Self {
        Self { router }
    }
}

#[async_trait]
impl<S> EventHandler for SlashCommandHandler<S>
where
    S: BotCommandService + 'static,
{
    fn event_type(&self) -> GatewayEventType {
        GatewayEventType::SlashCommand
    }

    async fn handle(
        &self,
        envelope: &GatewayEnvelope,
        _ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let GatewayEvent::SlashCommand(payload) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let normalized = match normalize_command(payload.clone()) {
            Ok(normalized) => normalized,
            Err(CommandParseError::MissingArgument { command, usage, .. }) => {
                return Ok(HandlerResult::Responded(replies::usage_hint(command, usage)));
            }
            Err(error) => return Err(error.into()),
        };
        let reply = self.router.route(normalized).await?;
        Ok(HandlerResult::Responded(reply))
    }
}

pub struct ReadyHandler;

#[async_trait]
impl EventHandler for ReadyHandler {
    fn event_type(&self) -> GatewayEventType {
        GatewayEventType::Ready
    }

    async fn handle(
        &self,
        envelope: &GatewayEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        if let GatewayEvent::Ready { session_id } = &envelope.event {
            tracing::info!(
                event_name = "ingress.gateway.ready",
                session_id = %session_id,
                correlation_id = %ctx.correlation_id,
                "gateway session ready"
            );
        }
        Ok(HandlerResult::Processed)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        default_dispatcher, EventContext, EventDispatcher, GatewayEnvelope, GatewayEvent,
        HandlerResult,
    };
    use crate::commands::SlashCommandPayload;
    use crate::replies;

    fn slash(command: &str, text: &str) -> GatewayEnvelope {
        GatewayEnvelope {
            envelope_id: "env-1".to_owned(),
            event: GatewayEvent::SlashCommand(SlashCommandPayload {
                command: command.to_owned(),
                text: text.to_owned(),
                channel_id: "C1".to_owned(),
                user_id: "U1".to_owned(),
                request_id: "req-1".to_owned(),
                ..SlashCommandPayload::default()
            }),
        }
    }

    #[tokio::test]
    async fn dispatcher_routes_slash_commands() {
        let dispatcher = default_dispatcher();

        let result =
            dispatcher.dispatch(&slash("/help", ""), &EventContext::default()).await.expect("dispatch");

        assert_eq!(result, HandlerResult::Responded(replies::help_message()));
    }

    #[tokio::test]
    async fn missing_arguments_produce_usage_reply() {
        let dispatcher = default_dispatcher();

        let result = dispatcher
            .dispatch(&slash("/remindme", "10m"), &EventContext::default())
            .await
            .expect("dispatch");

        assert_eq!(
            result,
            HandlerResult::Responded(replies::usage_hint("remindme", "<time> <message>"))
        );
    }

    #[tokio::test]
    async fn unsupported_commands_surface_as_dispatch_errors() {
        let dispatcher = default_dispatcher();
        let result = dispatcher.dispatch(&slash("/weather", "new"), &EventContext::default()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn dispatcher_returns_ignored_when_no_handler_registered() {
        let dispatcher = EventDispatcher::new();
        let envelope = GatewayEnvelope {
            envelope_id: "env-2".to_owned(),
            event: GatewayEvent::Unsupported { event_type: "typing_start".to_owned() },
        };

        let result =
            dispatcher.dispatch(&envelope, &EventContext::default()).await.expect("dispatch");

        assert_eq!(result, HandlerResult::Ignored);
    }

    #[tokio::test]
    async fn ready_events_are_processed_without_reply() {
        let dispatcher = default_dispatcher();
        let envelope = GatewayEnvelope {
            envelope_id: "env-3".to_owned(),
            event: GatewayEvent::Ready { session_id: "sess-1".to_owned() },
        };

        let result =
            dispatcher.dispatch(&envelope, &EventContext::default()).await.expect("dispatch");
        assert_eq!(result, HandlerResult::Processed);
    }

    #[test]
    fn default_dispatcher_registers_handlers() {
        assert_eq!(default_dispatcher().handler_count(), 2);
    }
}
